//! Test utilities for salescast-core
//!
//! Provides a mock OpenAI-compatible completion server that records every
//! request it receives, for integration tests of the insight path.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use tokio::sync::oneshot;

/// Reply used until a test sets its own
pub const DEFAULT_REPLY: &str = "## Executive Summary\nMock narrative from the test server.";

/// One request seen by the mock server
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Value of the `Authorization` header, if any
    pub authorization: Option<String>,
    /// Parsed JSON body
    pub body: Value,
}

#[derive(Debug)]
struct ServerState {
    reply: String,
    fail_status: Option<u16>,
    requests: Vec<RecordedRequest>,
}

type SharedState = Arc<Mutex<ServerState>>;

/// Mock `/v1/chat/completions` server
pub struct MockCompletionServer {
    addr: SocketAddr,
    state: SharedState,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockCompletionServer {
    /// Start the mock server on an available port
    pub async fn start() -> Self {
        let state: SharedState = Arc::new(Mutex::new(ServerState {
            reply: DEFAULT_REPLY.to_string(),
            fail_status: None,
            requests: Vec::new(),
        }));

        let app = Router::new()
            .route("/v1/chat/completions", post(handle_chat))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Text returned as the completion content
    pub fn set_reply(&self, reply: &str) {
        self.state.lock().unwrap().reply = reply.to_string();
    }

    /// Answer every subsequent request with this HTTP status
    pub fn fail_with(&self, status: u16) {
        self.state.lock().unwrap().fail_status = Some(status);
    }

    /// Requests received so far, oldest first
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().unwrap().requests.len()
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockCompletionServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn handle_chat(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock().unwrap();
    state.requests.push(RecordedRequest {
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(String::from),
        body: body.clone(),
    });

    if let Some(code) = state.fail_status {
        let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let message = match code {
            401 => "Incorrect API key provided",
            429 => "Rate limit reached",
            _ => "The server had an error while processing your request",
        };
        return (
            status,
            Json(json!({ "error": { "message": message, "type": "mock_error" } })),
        )
            .into_response();
    }

    let model = body["model"].as_str().unwrap_or("mock").to_string();
    Json(json!({
        "id": "chatcmpl-mock",
        "object": "chat.completion",
        "model": model,
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": state.reply },
            "finish_reason": "stop"
        }]
    }))
    .into_response()
}
