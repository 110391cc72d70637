//! OpenAI-compatible backend implementation
//!
//! Works with any server that implements the OpenAI chat completions API:
//! the hosted OpenAI API, Azure-style proxies, vLLM, LocalAI, llama-server.
//!
//! Configured from the `[insight]` config section; the API key arrives per
//! call from the secrets collaborator and is sent as a bearer token.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::InsightConfig;
use crate::error::{Error, Result};
use crate::secrets::Credentials;

use super::CompletionBackend;

/// Backend for `POST {base_url}/v1/chat/completions`
#[derive(Clone, Debug)]
pub struct OpenAICompatibleBackend {
    http_client: Client,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl OpenAICompatibleBackend {
    /// Backend with default sampling and no request timeout
    pub fn new(base_url: &str, model: &str) -> Self {
        let defaults = InsightConfig::default();
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            temperature: defaults.temperature,
            max_tokens: defaults.max_tokens,
        }
    }

    pub fn from_config(config: &InsightConfig) -> Result<Self> {
        let http_client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }
}

/// OpenAI chat completion request
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// OpenAI chat completion response
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Error body returned by OpenAI-style servers
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

#[async_trait]
impl CompletionBackend for OpenAICompatibleBackend {
    async fn complete(
        &self,
        system: &str,
        user: &str,
        credentials: &Credentials,
    ) -> Result<String> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: false,
        };

        debug!(
            host = %self.base_url,
            model = %self.model,
            prompt_chars = user.len(),
            "Sending chat completion request"
        );

        let response = self
            .http_client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(credentials.api_key())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(Error::Service(format!("API error {}: {}", status, detail)));
        }

        let chat_response: ChatCompletionResponse = response.json().await?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| Error::Service("No completion returned by the service".into()))
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockCompletionServer;

    fn creds() -> Credentials {
        Credentials::new("sk-test123").unwrap()
    }

    #[test]
    fn test_backend_new_trims_trailing_slash() {
        let backend = OpenAICompatibleBackend::new("http://localhost:12434/", "gpt-4o-mini");
        assert_eq!(backend.host(), "http://localhost:12434");
        assert_eq!(backend.model(), "gpt-4o-mini");
        assert_eq!(backend.temperature(), 0.5);
    }

    #[test]
    fn test_from_config() {
        let config = InsightConfig {
            base_url: "http://example.test/".into(),
            model: "test-model".into(),
            temperature: 0.2,
            max_tokens: Some(800),
            ..InsightConfig::default()
        };
        let backend = OpenAICompatibleBackend::from_config(&config).unwrap();
        assert_eq!(backend.host(), "http://example.test");
        assert_eq!(backend.model(), "test-model");
        assert_eq!(backend.temperature(), 0.2);
        assert_eq!(backend.max_tokens, Some(800));
    }

    #[tokio::test]
    async fn test_complete_sends_system_and_user() {
        let server = MockCompletionServer::start().await;
        server.set_reply("Forecast looks healthy.");
        let backend = OpenAICompatibleBackend::new(&server.url(), "gpt-4o-mini");

        let text = backend
            .complete("You are a senior business analyst.", "Analyze this.", &creds())
            .await
            .unwrap();
        assert_eq!(text, "Forecast looks healthy.");

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        let req = &requests[0];
        assert_eq!(req.authorization.as_deref(), Some("Bearer sk-test123"));
        assert_eq!(req.body["model"], "gpt-4o-mini");
        assert_eq!(req.body["temperature"], 0.5);
        assert_eq!(req.body["messages"][0]["role"], "system");
        assert_eq!(
            req.body["messages"][0]["content"],
            "You are a senior business analyst."
        );
        assert_eq!(req.body["messages"][1]["role"], "user");
        assert_eq!(req.body["messages"][1]["content"], "Analyze this.");
        assert!(req.body.get("max_tokens").is_none());
    }

    #[tokio::test]
    async fn test_complete_error_status() {
        let server = MockCompletionServer::start().await;
        server.fail_with(401);
        let backend = OpenAICompatibleBackend::new(&server.url(), "gpt-4o-mini");

        let err = backend.complete("sys", "user", &creds()).await.unwrap_err();
        match err {
            Error::Service(detail) => {
                assert!(detail.contains("401"), "detail: {}", detail);
                assert!(detail.contains("Incorrect API key"), "detail: {}", detail);
            }
            other => panic!("expected service error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_complete_unreachable() {
        let backend = OpenAICompatibleBackend::new("http://127.0.0.1:9", "gpt-4o-mini");
        let err = backend.complete("sys", "user", &creds()).await.unwrap_err();
        assert_eq!(err.kind(), Some(crate::error::ErrorKind::ServiceError));
    }
}
