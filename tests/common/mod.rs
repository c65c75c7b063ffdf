//! Shared test utilities
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    routing::post,
};
use parley::api::{self, ApiState};
use parley::{ConversationRelay, UpstreamClient};
use serde_json::{Value, json};
use tokio::net::TcpListener;

/// Model name the fake upstream is configured with
pub const TEST_MODEL: &str = "test-model";

/// A local stand-in for the chat-completion endpoint
pub struct FakeUpstream {
    pub url: String,
    requests: Arc<Mutex<Vec<Value>>>,
}

impl FakeUpstream {
    /// Request bodies received so far
    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }

    /// A relay pointed at this upstream
    pub fn relay(&self) -> ConversationRelay {
        let client = UpstreamClient::new(&self.url, TEST_MODEL, Duration::from_secs(5))
            .expect("failed to build upstream client");
        ConversationRelay::new(client)
    }
}

#[derive(Clone)]
struct UpstreamState {
    status: StatusCode,
    body: String,
    requests: Arc<Mutex<Vec<Value>>>,
}

async fn completions(
    State(state): State<UpstreamState>,
    Json(payload): Json<Value>,
) -> (StatusCode, [(header::HeaderName, &'static str); 1], String) {
    state.requests.lock().unwrap().push(payload);
    (
        state.status,
        [(header::CONTENT_TYPE, "application/json")],
        state.body,
    )
}

/// Serve a fixed response for every completion request
pub async fn spawn_upstream(status: StatusCode, body: impl Into<String>) -> FakeUpstream {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let state = UpstreamState {
        status,
        body: body.into(),
        requests: Arc::clone(&requests),
    };

    let app = Router::new()
        .route("/v1/chat/completions", post(completions))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    FakeUpstream {
        url: format!("http://{addr}/v1/chat/completions"),
        requests,
    }
}

async fn fixed_reply(
    State(body): State<&'static str>,
) -> ([(header::HeaderName, &'static str); 1], &'static str) {
    ([(header::CONTENT_TYPE, "application/json")], body)
}

/// Serve `body` with a 200 for every `/chat` request and return its URL
pub async fn spawn_chat_stub(body: &'static str) -> String {
    let app = Router::new()
        .route("/chat", post(fixed_reply))
        .with_state(body);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{addr}/chat")
}

/// A well-formed completion body carrying `content`
pub fn completion(content: &str) -> String {
    json!({
        "id": "chatcmpl-test",
        "choices": [
            { "index": 0, "message": { "role": "assistant", "content": content } }
        ]
    })
    .to_string()
}

/// Build the relay API router over a relay
pub fn build_test_router(relay: ConversationRelay) -> Router {
    api::router(Arc::new(ApiState { relay }))
}

/// Serve the relay API on an ephemeral port and return its `/chat` URL
pub async fn spawn_relay_api(relay: ConversationRelay) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = build_test_router(relay);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{addr}/chat")
}
