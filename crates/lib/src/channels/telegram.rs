//! Telegram channel: long-poll getUpdates or webhook, and sendMessage / forwardMessage via Bot API.

use crate::channels::inbound::{ChatId, InboundMessage, MessageId};
use crate::channels::outbound::{Outbound, TextFormat, TransportError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const LONG_POLL_TIMEOUT: u64 = 30;

/// Bot API envelope: `{ "ok": true, "result": ... }` or `{ "ok": false, "description": ... }`.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

/// Telegram update payload (getUpdates result item or webhook POST body).
#[derive(Debug, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramMessage {
    pub message_id: MessageId,
    #[serde(default)]
    pub from: Option<TelegramUser>,
    pub chat: TelegramChat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub reply_to_message: Option<TelegramMessageRef>,
}

/// The replied-to message; only its id matters.
#[derive(Debug, Deserialize)]
pub struct TelegramMessageRef {
    pub message_id: MessageId,
}

#[derive(Debug, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramChat {
    pub id: ChatId,
}

/// Result of sendMessage / forwardMessage: the message that was created.
#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: MessageId,
}

impl TelegramUpdate {
    /// Reduce the update to an [`InboundMessage`]. `None` for update kinds the relay ignores
    /// (edited messages, callback queries, ...).
    pub fn into_inbound(self) -> Option<InboundMessage> {
        let msg = self.message?;
        let sender_name = msg
            .from
            .as_ref()
            .map(|u| match u.last_name.as_deref() {
                Some(last) if !last.is_empty() => format!("{} {}", u.first_name, last),
                _ => u.first_name.clone(),
            })
            .unwrap_or_default();
        Some(InboundMessage {
            update_id: self.update_id,
            sender_id: msg.from.map(|u| u.id),
            sender_name,
            chat_id: msg.chat.id,
            message_id: msg.message_id,
            text: msg.text,
            reply_to_message_id: msg.reply_to_message.map(|r| r.message_id),
        })
    }
}

/// Telegram channel connector: Bot API client plus the optional getUpdates loop.
pub struct TelegramChannel {
    token: String,
    api_base: String,
    request_timeout: Duration,
    running: AtomicBool,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(token: impl Into<String>, api_base: impl Into<String>, request_timeout: Duration) -> Self {
        Self {
            token: token.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            request_timeout,
            running: AtomicBool::new(false),
            client: reqwest::Client::new(),
        }
    }

    fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop the getUpdates loop after its current poll returns.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    /// POST a Bot API method and unwrap the `{ ok, result }` envelope.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
        timeout: Duration,
    ) -> Result<T, TransportError> {
        let res = self
            .client
            .post(self.method_url(method))
            .json(&body)
            .timeout(timeout)
            .send()
            .await?;
        let status = res.status();
        let bytes = res.bytes().await?;
        match serde_json::from_slice::<ApiResponse<T>>(&bytes) {
            Ok(ApiResponse {
                ok: true,
                result: Some(result),
                ..
            }) => Ok(result),
            Ok(ApiResponse { description, .. }) => Err(TransportError::Api {
                status: status.as_u16(),
                description: description.unwrap_or_else(|| format!("{} returned ok: false", method)),
            }),
            Err(e) if status.is_success() => Err(TransportError::Decode(format!("{}: {}", method, e))),
            Err(_) => Err(TransportError::Api {
                status: status.as_u16(),
                description: String::from_utf8_lossy(&bytes).into_owned(),
            }),
        }
    }

    /// Start the getUpdates long-poll loop and push messages to the router queue.
    /// Returns a handle to await on shutdown.
    pub fn start_inbound(self: Arc<Self>, inbound_tx: mpsc::Sender<InboundMessage>) -> JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);
        log::info!("telegram channel: starting getUpdates long-poll loop");
        tokio::spawn(async move {
            run_get_updates_loop(self, inbound_tx).await;
        })
    }

    /// Call Telegram getUpdates (long poll). Returns (updates, next_offset).
    async fn get_updates(
        &self,
        offset: Option<i64>,
    ) -> Result<(Vec<TelegramUpdate>, Option<i64>), TransportError> {
        let mut body = serde_json::json!({
            "timeout": LONG_POLL_TIMEOUT,
            "allowed_updates": ["message"],
        });
        if let Some(off) = offset {
            body["offset"] = serde_json::Value::from(off);
        }
        let updates: Vec<TelegramUpdate> = self
            .call(
                "getUpdates",
                body,
                Duration::from_secs(LONG_POLL_TIMEOUT) + self.request_timeout,
            )
            .await?;
        let next_offset = updates.iter().map(|u| u.update_id).max().map(|id| id + 1);
        Ok((updates, next_offset))
    }

    /// Set webhook URL (and optional secret). When set, Telegram POSTs updates to the URL instead of getUpdates.
    pub async fn set_webhook(&self, url: &str, secret: Option<&str>) -> Result<(), TransportError> {
        let mut body = serde_json::json!({ "url": url, "allowed_updates": ["message"] });
        if let Some(s) = secret {
            body["secret_token"] = serde_json::Value::String(s.to_string());
        }
        let _: bool = self.call("setWebhook", body, self.request_timeout).await?;
        Ok(())
    }

    /// Remove webhook so the bot can use getUpdates again.
    pub async fn delete_webhook(&self) -> Result<(), TransportError> {
        let _: bool = self
            .call("deleteWebhook", serde_json::json!({}), self.request_timeout)
            .await?;
        Ok(())
    }

    /// Send a text message via sendMessage; returns the new message id.
    pub async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        format: TextFormat,
    ) -> Result<MessageId, TransportError> {
        let mut body = serde_json::json!({ "chat_id": chat_id, "text": text });
        if format == TextFormat::MarkdownV2 {
            body["parse_mode"] = serde_json::Value::String("MarkdownV2".to_string());
        }
        let sent: SentMessage = self.call("sendMessage", body, self.request_timeout).await?;
        Ok(sent.message_id)
    }

    /// Forward a message via forwardMessage; returns the id of the copy in `chat_id`.
    pub async fn forward_message(
        &self,
        chat_id: ChatId,
        from_chat_id: ChatId,
        message_id: MessageId,
    ) -> Result<MessageId, TransportError> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "from_chat_id": from_chat_id,
            "message_id": message_id,
        });
        let sent: SentMessage = self.call("forwardMessage", body, self.request_timeout).await?;
        Ok(sent.message_id)
    }
}

async fn run_get_updates_loop(channel: Arc<TelegramChannel>, inbound_tx: mpsc::Sender<InboundMessage>) {
    let mut offset: Option<i64> = None;
    while channel.running() {
        match channel.get_updates(offset).await {
            Ok((updates, next)) => {
                if next.is_some() {
                    offset = next;
                }
                for u in updates {
                    let Some(inbound) = u.into_inbound() else {
                        continue;
                    };
                    if inbound_tx.send(inbound).await.is_err() {
                        log::debug!("telegram: inbound channel closed, stopping loop");
                        return;
                    }
                }
            }
            Err(e) => {
                log::warn!("telegram getUpdates error: {}", e);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    }
    log::info!("telegram channel: getUpdates loop stopped");
}

#[async_trait]
impl Outbound for TelegramChannel {
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        format: TextFormat,
    ) -> Result<MessageId, TransportError> {
        self.send_message(chat_id, text, format).await
    }

    async fn forward(
        &self,
        dest_chat_id: ChatId,
        src_chat_id: ChatId,
        message_id: MessageId,
    ) -> Result<MessageId, TransportError> {
        self.forward_message(dest_chat_id, src_chat_id, message_id).await
    }
}
