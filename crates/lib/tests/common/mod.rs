//! Fake Telegram Bot API for integration tests: records calls, assigns message ids from 501.

#![allow(dead_code)]

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use relay::config::{resolve_settings_from, Config, RelaySettings};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TOKEN: &str = "123-test";
pub const OPERATOR: i64 = 42;
/// Chat id the fake API refuses to deliver to, like a user who blocked the bot.
pub const BLOCKED_USER: i64 = 777;

#[derive(Debug, Clone)]
pub struct Call {
    pub method: String,
    pub body: Value,
}

#[derive(Clone, Default)]
pub struct FakeBotApi {
    calls: Arc<Mutex<Vec<Call>>>,
    pending_updates: Arc<Mutex<VecDeque<Value>>>,
    next_id: Arc<AtomicI64>,
    reject_webhook: Arc<AtomicBool>,
}

impl FakeBotApi {
    pub fn new() -> Self {
        let api = Self::default();
        api.next_id.store(501, Ordering::SeqCst);
        api
    }

    /// Make setWebhook answer `ok: false`, like a URL Telegram cannot use.
    pub fn reject_webhook(&self) {
        self.reject_webhook.store(true, Ordering::SeqCst);
    }

    /// Queue an update to be returned by the next getUpdates call.
    pub fn push_update(&self, update: Value) {
        self.pending_updates.lock().unwrap().push_back(update);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, method: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.method == method)
            .collect()
    }

    /// Serve on a free port; returns the base URL to use as `apiBase`.
    pub async fn spawn(&self) -> String {
        let app = Router::new()
            .route("/:bot/:method", post(handle_method))
            .with_state(self.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake api");
        let addr = listener.local_addr().expect("fake api addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{}", addr)
    }

    /// Wait until `pred` holds for the recorded calls, or panic after 5s.
    pub async fn wait_for(&self, what: &str, pred: impl Fn(&[Call]) -> bool) {
        for _ in 0..100 {
            if pred(&self.calls()) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("timed out waiting for {}; calls: {:?}", what, self.calls());
    }
}

async fn handle_method(
    State(api): State<FakeBotApi>,
    Path((bot, method)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if bot != format!("bot{}", TOKEN) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "ok": false, "error_code": 401, "description": "Unauthorized" })),
        );
    }
    if method == "getUpdates" {
        let next = api.pending_updates.lock().unwrap().pop_front();
        return match next {
            Some(update) => (StatusCode::OK, Json(json!({ "ok": true, "result": [update] }))),
            None => {
                tokio::time::sleep(Duration::from_millis(100)).await;
                (StatusCode::OK, Json(json!({ "ok": true, "result": [] })))
            }
        };
    }
    api.calls.lock().unwrap().push(Call {
        method: method.clone(),
        body: body.clone(),
    });
    match method.as_str() {
        "setWebhook" if api.reject_webhook.load(Ordering::SeqCst) => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: bad webhook: HTTPS url must be provided for webhook"
            })),
        ),
        "setWebhook" | "deleteWebhook" => (StatusCode::OK, Json(json!({ "ok": true, "result": true }))),
        "sendMessage" | "forwardMessage" => {
            if body.get("chat_id").and_then(Value::as_i64) == Some(BLOCKED_USER) {
                return (
                    StatusCode::FORBIDDEN,
                    Json(json!({
                        "ok": false,
                        "error_code": 403,
                        "description": "Forbidden: bot was blocked by the user"
                    })),
                );
            }
            let id = api.next_id.fetch_add(1, Ordering::SeqCst);
            let chat_id = body["chat_id"].clone();
            (
                StatusCode::OK,
                Json(json!({
                    "ok": true,
                    "result": { "message_id": id, "chat": { "id": chat_id }, "date": 0 }
                })),
            )
        }
        _ => (
            StatusCode::NOT_FOUND,
            Json(json!({ "ok": false, "error_code": 404, "description": "Not Found" })),
        ),
    }
}

pub fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    listener.local_addr().expect("local_addr").port()
}

/// Settings for a gateway on `port` talking to the fake API; no process environment involved.
pub fn settings(api_base: &str, port: u16, webhook_url: Option<String>, secret: Option<&str>) -> RelaySettings {
    let mut config = Config::default();
    config.gateway.port = port;
    config.gateway.bind = Some("127.0.0.1".to_string());
    config.channels.telegram.bot_token = Some(TOKEN.to_string());
    config.channels.telegram.api_base = Some(api_base.to_string());
    config.channels.telegram.webhook_url = webhook_url;
    config.channels.telegram.webhook_secret = secret.map(str::to_string);
    config.channels.telegram.request_timeout_secs = Some(5);
    config.relay.admin_chat_id = Some(OPERATOR);
    resolve_settings_from(&config, |_: &str| None).expect("valid test settings")
}

pub fn user_update(update_id: i64, user: i64, message_id: i64, text: &str) -> Value {
    json!({
        "update_id": update_id,
        "message": {
            "message_id": message_id,
            "from": { "id": user, "is_bot": false, "first_name": "User", "last_name": user.to_string() },
            "chat": { "id": user, "type": "private" },
            "date": 0,
            "text": text
        }
    })
}

pub fn operator_reply_update(update_id: i64, replied_to: i64, text: &str) -> Value {
    json!({
        "update_id": update_id,
        "message": {
            "message_id": 9000 + update_id,
            "from": { "id": OPERATOR, "is_bot": false, "first_name": "Admin" },
            "chat": { "id": OPERATOR, "type": "private" },
            "date": 0,
            "text": text,
            "reply_to_message": { "message_id": replied_to, "chat": { "id": OPERATOR }, "date": 0 }
        }
    })
}
