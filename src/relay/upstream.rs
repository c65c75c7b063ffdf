//! Client for the upstream chat-completion endpoint

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// One message in upstream vocabulary (`system`, `user`, `assistant`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamMessage {
    pub role: String,
    pub content: String,
}

impl UpstreamMessage {
    #[must_use]
    pub fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

/// Chat-completion request body
#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [UpstreamMessage],
    pub stream: bool,
}

/// Pull the reply out of a chat-completion response body
///
/// The reply lives at `choices[0].message.content` and must be a non-empty
/// string. Any other shape is an empty response.
///
/// # Errors
///
/// Returns `Error::EmptyResponse` if the body carries no usable reply
pub fn extract_reply(body: &[u8]) -> Result<String> {
    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|_| Error::EmptyResponse)?;

    value
        .pointer("/choices/0/message/content")
        .and_then(serde_json::Value::as_str)
        .filter(|content| !content.is_empty())
        .map(ToString::to_string)
        .ok_or(Error::EmptyResponse)
}

/// Sends chat-completion requests to the configured endpoint
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    url: String,
    model: String,
}

impl UpstreamClient {
    /// Create a new upstream client
    ///
    /// # Errors
    ///
    /// Returns error if the URL is empty or the HTTP client cannot be built
    pub fn new(url: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Result<Self> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(Error::Config("upstream URL is empty".to_string()));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url,
            model: model.into(),
        })
    }

    /// Model identifier sent with each request
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Endpoint URL
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Run one non-streaming completion and return the reply text
    ///
    /// # Errors
    ///
    /// Returns `Error::Upstream` if the call fails or is rejected, and
    /// `Error::EmptyResponse` if the response has no reply
    pub async fn complete(&self, messages: &[UpstreamMessage]) -> Result<String> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
            stream: false,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, url = %self.url, "upstream request failed");
                Error::Upstream(e.to_string())
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received upstream response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "upstream API error");
            return Err(Error::Upstream(format!("upstream API error {status}: {body}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Upstream(e.to_string()))?;

        extract_reply(&body).inspect_err(|_| {
            tracing::warn!(body_bytes = body.len(), "upstream response has no reply");
        })
    }
}
