//! HTTP client for the conversation relay's `/chat` endpoint

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::conversation::{ChatResponse, Message};
use crate::{Error, Result};

/// One round trip to the conversation relay
#[async_trait]
pub trait Relay: Send + Sync {
    /// Send the history and return the partner's reply
    ///
    /// # Errors
    ///
    /// Returns `Error::Relay` if the round trip fails for any reason
    async fn send(&self, history: &[Message]) -> Result<String>;
}

#[derive(Serialize)]
struct OutboundChat<'a> {
    history: &'a [Message],
}

/// Posts conversation histories to the relay server
#[derive(Debug, Clone)]
pub struct RelayClient {
    client: reqwest::Client,
    url: String,
}

impl RelayClient {
    /// Create a client for a relay `/chat` URL
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Relay for RelayClient {
    async fn send(&self, history: &[Message]) -> Result<String> {
        tracing::debug!(history = history.len(), url = %self.url, "posting history to relay");

        let response = self
            .client
            .post(&self.url)
            .json(&OutboundChat { history })
            .send()
            .await
            .map_err(|e| Error::Relay(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let reason = status.canonical_reason().unwrap_or("request failed");
            return Err(Error::Relay(format!("{} {reason}", status.as_u16())));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Relay(format!("unreadable reply: {e}")))?;

        Ok(body.reply)
    }
}
