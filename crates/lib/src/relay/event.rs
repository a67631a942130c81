//! Inbound event kinds and the classification rule.

use crate::channels::{ChatId, InboundMessage, MessageId, UserId};
use crate::commands::{parse_command, CommandTable};

/// What an inbound message means to the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// Text from an end-user, to be announced and forwarded to the operator.
    UserMessage {
        origin_user_id: UserId,
        origin_chat_id: ChatId,
        message_id: MessageId,
        sender_name: String,
        text: String,
    },
    /// Operator text replying to a relayed message.
    OperatorReply {
        operator_chat_id: ChatId,
        replied_to_message_id: MessageId,
        text: String,
    },
    /// Operator text that does not reply to anything.
    OperatorNonReply { operator_chat_id: ChatId },
    /// Slash command from anyone.
    Command { chat_id: ChatId, name: String },
    /// Nothing the relay handles (no sender, non-text content).
    Unsupported { reason: &'static str },
}

/// Classify a message relative to the configured operator.
///
/// An operator reply whose text only looks like a command (`/etc/hosts ...`) stays a reply;
/// only commands known to `commands` take precedence over it.
pub fn classify(
    msg: &InboundMessage,
    operator_id: UserId,
    commands: &CommandTable,
) -> InboundEvent {
    let Some(sender_id) = msg.sender_id else {
        return InboundEvent::Unsupported {
            reason: "message has no sender",
        };
    };
    let Some(text) = msg.text.as_deref() else {
        return InboundEvent::Unsupported {
            reason: "non-text content",
        };
    };
    if let Some(name) = parse_command(text) {
        let operator_reply = sender_id == operator_id && msg.reply_to_message_id.is_some();
        if !operator_reply || commands.respond(&name).is_some() {
            return InboundEvent::Command {
                chat_id: msg.chat_id,
                name,
            };
        }
    }
    if sender_id == operator_id {
        return match msg.reply_to_message_id {
            Some(replied_to_message_id) => InboundEvent::OperatorReply {
                operator_chat_id: msg.chat_id,
                replied_to_message_id,
                text: text.to_string(),
            },
            None => InboundEvent::OperatorNonReply {
                operator_chat_id: msg.chat_id,
            },
        };
    }
    InboundEvent::UserMessage {
        origin_user_id: sender_id,
        origin_chat_id: msg.chat_id,
        message_id: msg.message_id,
        sender_name: msg.sender_name.clone(),
        text: text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::config::RelayTexts;

    const OPERATOR: UserId = 42;

    fn table() -> CommandTable {
        CommandTable::from_texts(&RelayTexts::default())
    }

    fn msg(sender: Option<UserId>, text: Option<&str>, reply_to: Option<MessageId>) -> InboundMessage {
        InboundMessage {
            update_id: 1,
            sender_id: sender,
            sender_name: "Ada".to_string(),
            chat_id: sender.unwrap_or(-1),
            message_id: 9,
            text: text.map(str::to_string),
            reply_to_message_id: reply_to,
        }
    }

    #[test]
    fn user_text_is_user_message() {
        let event = classify(&msg(Some(111), Some("hello"), None), OPERATOR, &table());
        assert_eq!(
            event,
            InboundEvent::UserMessage {
                origin_user_id: 111,
                origin_chat_id: 111,
                message_id: 9,
                sender_name: "Ada".to_string(),
                text: "hello".to_string(),
            }
        );
    }

    #[test]
    fn user_reply_is_still_user_message() {
        let event = classify(&msg(Some(111), Some("again"), Some(3)), OPERATOR, &table());
        assert!(matches!(event, InboundEvent::UserMessage { .. }));
    }

    #[test]
    fn operator_reply_and_non_reply() {
        assert_eq!(
            classify(&msg(Some(OPERATOR), Some("hi back"), Some(502)), OPERATOR, &table()),
            InboundEvent::OperatorReply {
                operator_chat_id: OPERATOR,
                replied_to_message_id: 502,
                text: "hi back".to_string(),
            }
        );
        assert_eq!(
            classify(&msg(Some(OPERATOR), Some("hello?"), None), OPERATOR, &table()),
            InboundEvent::OperatorNonReply {
                operator_chat_id: OPERATOR
            }
        );
    }

    #[test]
    fn commands_win_for_everyone() {
        assert_eq!(
            classify(&msg(Some(111), Some("/start"), None), OPERATOR, &table()),
            InboundEvent::Command {
                chat_id: 111,
                name: "start".to_string()
            }
        );
        assert!(matches!(
            classify(&msg(Some(OPERATOR), Some("/help"), Some(502)), OPERATOR, &table()),
            InboundEvent::Command { .. }
        ));
    }

    #[test]
    fn operator_reply_with_unknown_slash_text_stays_a_reply() {
        let reply = msg(Some(OPERATOR), Some("/etc/hosts needs a restart"), Some(502));
        assert_eq!(
            classify(&reply, OPERATOR, &table()),
            InboundEvent::OperatorReply {
                operator_chat_id: OPERATOR,
                replied_to_message_id: 502,
                text: "/etc/hosts needs a restart".to_string(),
            }
        );
        assert!(matches!(
            classify(&msg(Some(111), Some("/etc/hosts"), None), OPERATOR, &table()),
            InboundEvent::Command { .. }
        ));
    }

    #[test]
    fn unsupported_content() {
        assert!(matches!(
            classify(&msg(None, Some("channel post"), None), OPERATOR, &table()),
            InboundEvent::Unsupported { .. }
        ));
        assert!(matches!(
            classify(&msg(Some(111), None, None), OPERATOR, &table()),
            InboundEvent::Unsupported { .. }
        ));
        assert!(matches!(
            classify(&msg(Some(OPERATOR), None, Some(502)), OPERATOR, &table()),
            InboundEvent::Unsupported { .. }
        ));
    }
}
