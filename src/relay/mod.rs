//! Conversation relay between chat clients and the upstream model
//!
//! Turns a role-tagged history into a chat-completion request that opens
//! with a fixed practice-partner instruction, and validates the reply.

pub mod upstream;

use crate::conversation::Message;
use crate::Result;

pub use upstream::{UpstreamClient, UpstreamMessage, extract_reply};

/// Instruction placed ahead of every conversation sent upstream
pub const SYSTEM_PROMPT: &str = "You are an English practice assistant. Reply in simple English, \
using few words, and focus on helping the user practice conversation.";

/// Build the upstream message list for a history
///
/// The result always holds `history.len() + 1` messages: the system
/// instruction first, then the history in its original order with `bot`
/// relabelled as `assistant`.
#[must_use]
pub fn upstream_messages(history: &[Message]) -> Vec<UpstreamMessage> {
    std::iter::once(UpstreamMessage::new("system", SYSTEM_PROMPT))
        .chain(
            history
                .iter()
                .map(|m| UpstreamMessage::new(m.role.upstream_label(), m.content.clone())),
        )
        .collect()
}

/// Relays conversation histories to the upstream model
#[derive(Debug, Clone)]
pub struct ConversationRelay {
    upstream: UpstreamClient,
}

impl ConversationRelay {
    #[must_use]
    pub const fn new(upstream: UpstreamClient) -> Self {
        Self { upstream }
    }

    /// Upstream model identifier
    #[must_use]
    pub fn model(&self) -> &str {
        self.upstream.model()
    }

    /// Upstream endpoint URL
    #[must_use]
    pub fn upstream_url(&self) -> &str {
        self.upstream.url()
    }

    /// Get the partner's next message for a history
    ///
    /// # Errors
    ///
    /// Returns error if the upstream call fails or yields no reply
    pub async fn reply(&self, history: &[Message]) -> Result<Message> {
        let messages = upstream_messages(history);

        tracing::info!(
            messages = messages.len(),
            model = self.upstream.model(),
            "relaying conversation upstream"
        );
        tracing::debug!(
            payload = %serde_json::to_string(&messages).unwrap_or_default(),
            "sending messages"
        );

        let content = self.upstream.complete(&messages).await?;

        tracing::debug!(reply_len = content.len(), "upstream replied");
        Ok(Message::bot(content))
    }
}
