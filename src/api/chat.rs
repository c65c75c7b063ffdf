//! Chat endpoint: one conversation turn per request

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Serialize;

use super::ApiState;
use crate::conversation::{ChatRequest, ChatResponse};
use crate::Error;

/// Build chat router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .with_state(state)
}

/// Relay a conversation history and return the partner's reply
async fn chat(
    State(state): State<Arc<ApiState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ChatError> {
    let Json(request) = payload.map_err(|e| ChatError::BadRequest(e.body_text()))?;

    tracing::debug!(history = request.history.len(), "chat request");

    let reply = state.relay.reply(&request.history).await?;

    Ok(Json(ChatResponse {
        reply: reply.content,
    }))
}

/// Chat API errors
#[derive(Debug)]
pub enum ChatError {
    BadRequest(String),
    UpstreamFailed(String),
    Internal(String),
}

impl From<Error> for ChatError {
    fn from(e: Error) -> Self {
        match e {
            Error::EmptyResponse | Error::Upstream(_) => Self::UpstreamFailed(e.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: ErrorBody,
        }

        #[derive(Serialize)]
        struct ErrorBody {
            code: &'static str,
            message: String,
        }

        let (status, code, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            Self::UpstreamFailed(msg) => (StatusCode::BAD_GATEWAY, "upstream_failed", msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", msg),
        };

        if status.is_server_error() {
            tracing::warn!(code, message = %message, "chat request failed");
        }

        (status, Json(ErrorResponse { error: ErrorBody { code, message } })).into_response()
    }
}
