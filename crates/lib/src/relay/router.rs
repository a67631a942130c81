//! Relay router: one handler per [`InboundEvent`] kind.
//!
//! The router never holds a store lock across an outbound call: each `put`/`get` completes
//! before or after a send, never around it. Transport failures become status messages.

use std::sync::Arc;

use crate::channels::{
    escape_markdown_v2, ChatId, InboundMessage, MessageId, Outbound, TextFormat, UserId,
};
use crate::commands::CommandTable;
use crate::config::RelayTexts;
use crate::correlation::CorrelationStore;

use super::event::{classify, InboundEvent};

/// What handling one event did. Returned for logging and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Header and forward both delivered and recorded.
    Relayed { header: MessageId, forward: MessageId },
    /// A leg failed; `header` is the recorded header id if that leg succeeded.
    RelayFailed {
        header: Option<MessageId>,
        reason: String,
    },
    ReplyDelivered { user_id: UserId },
    ReplyFailed { user_id: UserId, reason: String },
    ReplyUnresolved { replied_to: MessageId },
    UsageHint,
    CommandHandled { name: String },
    Dropped,
}

/// Routes inbound events. Cheap to clone; one clone per event task.
#[derive(Clone)]
pub struct RelayRouter {
    operator_id: UserId,
    store: Arc<CorrelationStore>,
    outbound: Arc<dyn Outbound>,
    commands: Arc<CommandTable>,
    texts: Arc<RelayTexts>,
}

impl RelayRouter {
    pub fn new(
        operator_id: UserId,
        store: Arc<CorrelationStore>,
        outbound: Arc<dyn Outbound>,
        texts: RelayTexts,
    ) -> Self {
        Self {
            operator_id,
            store,
            outbound,
            commands: Arc::new(CommandTable::from_texts(&texts)),
            texts: Arc::new(texts),
        }
    }

    pub fn operator_id(&self) -> UserId {
        self.operator_id
    }

    pub fn store(&self) -> &Arc<CorrelationStore> {
        &self.store
    }

    /// Classify and dispatch one inbound message.
    pub async fn handle(&self, msg: InboundMessage) -> RouteOutcome {
        let update_id = msg.update_id;
        let event = classify(&msg, self.operator_id, &self.commands);
        let outcome = self.dispatch(event).await;
        log::debug!("update {}: {:?}", update_id, outcome);
        outcome
    }

    pub async fn dispatch(&self, event: InboundEvent) -> RouteOutcome {
        match event {
            InboundEvent::UserMessage {
                origin_user_id,
                origin_chat_id,
                message_id,
                sender_name,
                text: _,
            } => {
                self.relay_user_message(origin_user_id, origin_chat_id, message_id, &sender_name)
                    .await
            }
            InboundEvent::OperatorReply {
                operator_chat_id,
                replied_to_message_id,
                text,
            } => {
                self.route_operator_reply(operator_chat_id, replied_to_message_id, &text)
                    .await
            }
            InboundEvent::OperatorNonReply { operator_chat_id } => {
                self.notify(operator_chat_id, &self.texts.usage_hint).await;
                RouteOutcome::UsageHint
            }
            InboundEvent::Command { chat_id, name } => self.run_command(chat_id, name).await,
            InboundEvent::Unsupported { reason } => {
                log::debug!("dropping inbound message: {}", reason);
                RouteOutcome::Dropped
            }
        }
    }

    fn header_text(&self, user_id: UserId, sender_name: &str) -> String {
        // {name} goes first: escaped text cannot contain a bare `{id}`.
        self.texts
            .header
            .replace("{name}", &escape_markdown_v2(sender_name))
            .replace("{id}", &escape_markdown_v2(&user_id.to_string()))
    }

    async fn relay_user_message(
        &self,
        user_id: UserId,
        user_chat_id: ChatId,
        message_id: MessageId,
        sender_name: &str,
    ) -> RouteOutcome {
        if user_id == self.operator_id {
            return RouteOutcome::Dropped;
        }
        log::info!("message {} from user {}", message_id, user_id);

        let operator_chat = self.operator_id;
        let header = match self
            .outbound
            .send_text(
                operator_chat,
                &self.header_text(user_id, sender_name),
                TextFormat::MarkdownV2,
            )
            .await
        {
            Ok(id) => id,
            Err(e) => {
                log::warn!("relay header for user {} failed: {}", user_id, e);
                self.notify(user_chat_id, &self.texts.relay_failed).await;
                return RouteOutcome::RelayFailed {
                    header: None,
                    reason: e.to_string(),
                };
            }
        };
        self.store.put(header, user_id).await;

        let forward = match self
            .outbound
            .forward(operator_chat, user_chat_id, message_id)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                log::warn!("relay forward for user {} failed: {}", user_id, e);
                self.notify(user_chat_id, &self.texts.relay_failed).await;
                return RouteOutcome::RelayFailed {
                    header: Some(header),
                    reason: e.to_string(),
                };
            }
        };
        self.store.put(forward, user_id).await;
        log::info!(
            "relayed message from user {}: header {}, forward {}",
            user_id,
            header,
            forward
        );
        RouteOutcome::Relayed { header, forward }
    }

    async fn route_operator_reply(
        &self,
        operator_chat: ChatId,
        replied_to: MessageId,
        text: &str,
    ) -> RouteOutcome {
        log::info!("operator replied to message {}", replied_to);
        let Some(user_id) = self.store.get(replied_to).await else {
            log::warn!("no user associated with message {}", replied_to);
            self.notify(operator_chat, &self.texts.reply_unresolved).await;
            return RouteOutcome::ReplyUnresolved { replied_to };
        };
        match self.outbound.send_text(user_id, text, TextFormat::Plain).await {
            Ok(_) => {
                log::info!("reply delivered to user {}", user_id);
                self.notify(operator_chat, &self.texts.reply_delivered).await;
                RouteOutcome::ReplyDelivered { user_id }
            }
            Err(e) => {
                let reason = e.to_string();
                log::error!("reply to user {} failed: {}", user_id, reason);
                let status = self.texts.reply_failed.replace("{reason}", &reason);
                self.notify(operator_chat, &status).await;
                RouteOutcome::ReplyFailed { user_id, reason }
            }
        }
    }

    async fn run_command(&self, chat_id: ChatId, name: String) -> RouteOutcome {
        match self.commands.respond(&name) {
            Some(reply) => {
                self.notify(chat_id, reply).await;
                RouteOutcome::CommandHandled { name }
            }
            None => {
                log::debug!("ignoring unknown command /{}", name);
                RouteOutcome::Dropped
            }
        }
    }

    /// Best-effort plain-text status message; failures are logged only.
    async fn notify(&self, chat_id: ChatId, text: &str) {
        if let Err(e) = self.outbound.send_text(chat_id, text, TextFormat::Plain).await {
            log::warn!("status message to chat {} failed: {}", chat_id, e);
        }
    }
}
