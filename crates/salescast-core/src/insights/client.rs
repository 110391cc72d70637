use tracing::{debug, info, warn};

use crate::ai::{AIClient, CompletionBackend};
use crate::error::ErrorKind;
use crate::models::{InsightRequest, InsightResult};
use crate::secrets::Credentials;

/// Sends insight requests to the completion service
///
/// Never returns an error: every failure becomes an [`InsightResult::Failure`]
/// so the caller can show it in the narrative panel while the forecast stays
/// on screen. No retries.
#[derive(Debug, Clone)]
pub struct InsightClient {
    backend: AIClient,
}

impl InsightClient {
    pub fn new(backend: AIClient) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &AIClient {
        &self.backend
    }

    pub async fn summarize(
        &self,
        request: &InsightRequest,
        credentials: Option<&Credentials>,
    ) -> InsightResult {
        let Some(credentials) = credentials else {
            debug!("No API key configured, skipping insight request");
            return InsightResult::failure(
                ErrorKind::MissingCredentials,
                "No API key configured for the completion service",
            );
        };

        info!(
            model = %self.backend.model(),
            points = request.excerpt.len(),
            "Requesting forecast insight"
        );

        match self
            .backend
            .complete(&request.system_prompt, &request.prompt, credentials)
            .await
        {
            Ok(narrative) => InsightResult::narrative(narrative),
            Err(e) => {
                warn!(host = %self.backend.host(), error = %e, "Insight request failed");
                InsightResult::failure(ErrorKind::ServiceError, e.to_string())
            }
        }
    }
}
