//! Inbound message from a channel: decoded update handed to the relay router.

/// Telegram user id.
pub type UserId = i64;
/// Telegram chat id (equal to the user id for a private chat with the bot).
pub type ChatId = i64;
/// Telegram message id, unique per chat.
pub type MessageId = i64;

/// A message received by the bot, reduced to what the relay needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub update_id: i64,
    /// Author of the message. `None` for channel posts and other anonymous content.
    pub sender_id: Option<UserId>,
    /// Display name of the author (first name, plus last name when present).
    pub sender_name: String,
    pub chat_id: ChatId,
    pub message_id: MessageId,
    /// Text body; `None` for photos, stickers and other non-text content.
    pub text: Option<String>,
    /// Id of the message this one replies to, if any.
    pub reply_to_message_id: Option<MessageId>,
}
