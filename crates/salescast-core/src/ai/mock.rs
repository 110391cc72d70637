//! Mock backend for testing
//!
//! Returns a canned narrative (or a canned failure) and counts calls, so tests
//! can assert when the network would or would not have been touched.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::secrets::Credentials;

use super::CompletionBackend;

const DEFAULT_NARRATIVE: &str = "## Executive Summary\n\
Sales are projected to continue on their current trajectory.\n\n\
## Trend & Pattern Identification\n\
The forecast follows the recent trend with a stable weekly rhythm.\n\n\
## Risks & Opportunities\n\
Watch for the lower bound in the final weeks of the horizon.\n\n\
## Action Recommendations\n\
- Marketing: schedule promotions ahead of expected peaks.\n\
- Inventory: stock to the upper bound around peak dates.";

#[derive(Debug, Clone)]
enum MockResponse {
    Narrative(String),
    Fail(String),
}

/// Mock completion backend
///
/// Clones share the call counter and the record of the last request.
#[derive(Debug, Clone)]
pub struct MockBackend {
    response: MockResponse,
    calls: Arc<AtomicUsize>,
    last_request: Arc<Mutex<Option<(String, String)>>>,
}

impl MockBackend {
    /// Mock that answers with a generic report
    pub fn new() -> Self {
        Self::with_narrative(DEFAULT_NARRATIVE)
    }

    pub fn with_narrative(text: &str) -> Self {
        Self {
            response: MockResponse::Narrative(text.to_string()),
            calls: Arc::new(AtomicUsize::new(0)),
            last_request: Arc::new(Mutex::new(None)),
        }
    }

    /// Mock whose every call fails with a service error
    pub fn failing(detail: &str) -> Self {
        Self {
            response: MockResponse::Fail(detail.to_string()),
            ..Self::new()
        }
    }

    /// Number of `complete` calls made so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// System and user prompt of the most recent call
    pub fn last_request(&self) -> Option<(String, String)> {
        self.last_request.lock().ok().and_then(|guard| guard.clone())
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionBackend for MockBackend {
    async fn complete(
        &self,
        system: &str,
        user: &str,
        _credentials: &Credentials,
    ) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some((system.to_string(), user.to_string()));
        }

        match &self.response {
            MockResponse::Narrative(text) => Ok(text.clone()),
            MockResponse::Fail(detail) => Err(Error::Service(detail.clone())),
        }
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}
