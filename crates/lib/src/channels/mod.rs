//! Communication channels (Telegram).
//!
//! The relay router talks to the provider only through the [`Outbound`] trait and receives
//! decoded [`InboundMessage`]s; the Telegram connector implements both sides.

mod escape;
mod inbound;
mod outbound;
mod telegram;

pub use escape::escape_markdown_v2;
pub use inbound::{ChatId, InboundMessage, MessageId, UserId};
pub use outbound::{Outbound, TextFormat, TransportError};
pub use telegram::{TelegramChannel, TelegramUpdate};
