//! Outbound seam: what the relay router needs from a messaging provider.

use async_trait::async_trait;

use super::inbound::{ChatId, MessageId};

/// How the provider should interpret a text body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFormat {
    /// Sent verbatim, no markup.
    Plain,
    /// Telegram MarkdownV2; untrusted parts must already be escaped.
    MarkdownV2,
}

/// Failure of a single outbound call. The router turns these into status messages.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Network failure or timeout.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The provider answered and refused (e.g. the user blocked the bot).
    #[error("rejected ({status}): {description}")]
    Api { status: u16, description: String },
    /// The provider answered with something we could not read.
    #[error("unreadable response: {0}")]
    Decode(String),
}

/// Delivers messages to the provider and returns the id it assigned to what was sent.
#[async_trait]
pub trait Outbound: Send + Sync {
    /// Send a text message to a chat.
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        format: TextFormat,
    ) -> Result<MessageId, TransportError>;

    /// Forward an existing message so the copy keeps its "forwarded from" attribution.
    async fn forward(
        &self,
        dest_chat_id: ChatId,
        src_chat_id: ChatId,
        message_id: MessageId,
    ) -> Result<MessageId, TransportError>;
}
