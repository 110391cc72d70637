//! Pluggable completion backend abstraction
//!
//! Insight generation needs exactly one operation from a language model: turn
//! a system role and a user prompt into text. This module hides which service
//! answers it.
//!
//! # Architecture
//!
//! - `CompletionBackend` trait: the one operation plus identification for logs
//! - `AIClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `OpenAICompatibleBackend`, `MockBackend`
//!
//! # Usage
//!
//! ```rust,ignore
//! let client = AIClient::from_config(&config.insight)?;
//! let text = client.complete(system, prompt, &credentials).await?;
//! ```

mod mock;
mod openai_compatible;

pub use mock::MockBackend;
pub use openai_compatible::OpenAICompatibleBackend;

use async_trait::async_trait;

use crate::config::{BackendKind, InsightConfig};
use crate::error::Result;
use crate::secrets::Credentials;

/// Interface every completion backend implements
///
/// Backends are Send + Sync so a client can be held across await points.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Send one system + user message pair and return the generated text
    async fn complete(&self, system: &str, user: &str, credentials: &Credentials)
        -> Result<String>;

    /// Model name (for logging)
    fn model(&self) -> &str;

    /// Host URL (for logging)
    fn host(&self) -> &str;
}

/// Concrete completion client
#[derive(Clone, Debug)]
pub enum AIClient {
    /// Any server implementing `/v1/chat/completions`
    OpenAICompatible(OpenAICompatibleBackend),
    /// In-process test double
    Mock(MockBackend),
}

impl AIClient {
    /// Build the backend selected by `[insight] backend`
    pub fn from_config(config: &InsightConfig) -> Result<Self> {
        match config.backend {
            BackendKind::OpenaiCompatible => {
                OpenAICompatibleBackend::from_config(config).map(AIClient::OpenAICompatible)
            }
            BackendKind::Mock => Ok(AIClient::Mock(MockBackend::new())),
        }
    }

    pub fn mock() -> Self {
        AIClient::Mock(MockBackend::new())
    }
}

#[async_trait]
impl CompletionBackend for AIClient {
    async fn complete(
        &self,
        system: &str,
        user: &str,
        credentials: &Credentials,
    ) -> Result<String> {
        match self {
            AIClient::OpenAICompatible(b) => b.complete(system, user, credentials).await,
            AIClient::Mock(b) => b.complete(system, user, credentials).await,
        }
    }

    fn model(&self) -> &str {
        match self {
            AIClient::OpenAICompatible(b) => b.model(),
            AIClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            AIClient::OpenAICompatible(b) => b.host(),
            AIClient::Mock(b) => b.host(),
        }
    }
}
