//! Gateway HTTP server: health probe and Telegram webhook on a single port.

use crate::channels::{InboundMessage, TelegramChannel, TelegramUpdate};
use crate::config::{self, RelaySettings, WEBHOOK_PATH};
use crate::correlation::CorrelationStore;
use crate::relay::RelayRouter;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const INBOUND_QUEUE_CAPACITY: usize = 256;
const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// How updates reach the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundMode {
    /// Telegram POSTs updates to `/webhook`.
    Webhook,
    /// The getUpdates long-poll loop pulls updates.
    Polling,
}

impl InboundMode {
    pub fn as_str(self) -> &'static str {
        match self {
            InboundMode::Webhook => "webhook",
            InboundMode::Polling => "polling",
        }
    }
}

/// Shared state for the HTTP handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub settings: Arc<RelaySettings>,
    pub mode: InboundMode,
    /// Sender for decoded updates (webhook POSTs or getUpdates). The processor task receives.
    pub inbound_tx: mpsc::Sender<InboundMessage>,
    pub store: Arc<CorrelationStore>,
}

/// Consume the inbound queue, handling each message in its own task so users and the operator
/// are served concurrently. A failing handler is logged and does not stop the queue.
fn spawn_inbound_processor(
    router: RelayRouter,
    mut inbound_rx: mpsc::Receiver<InboundMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(msg) = inbound_rx.recv().await {
            let router = router.clone();
            let update_id = msg.update_id;
            tokio::spawn(async move {
                let handler = tokio::spawn(async move { router.handle(msg).await });
                if let Err(e) = handler.await {
                    log::error!("update {} handler failed: {}", update_id, e);
                }
            });
        }
        log::debug!("inbound queue closed");
    })
}

/// Build the HTTP routes for the given state.
pub fn build_app(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(health_http))
        .route(WEBHOOK_PATH, post(telegram_webhook))
        .with_state(state)
}

/// Run the relay: set up webhook or polling, serve HTTP on settings.bind:settings.port.
/// Blocks until shutdown (SIGINT or SIGTERM).
pub async fn run_gateway(settings: RelaySettings) -> Result<()> {
    let bind = settings.bind.trim().to_string();
    if !config::is_loopback_bind(&bind)
        && settings.webhook_url.is_some()
        && settings.webhook_secret.is_none()
    {
        log::warn!(
            "webhook endpoint exposed on {} without a secret; set TELEGRAM_WEBHOOK_SECRET to reject forged updates",
            bind
        );
    }

    let telegram = Arc::new(TelegramChannel::new(
        settings.bot_token.clone(),
        settings.api_base.clone(),
        settings.request_timeout,
    ));
    let store = Arc::new(CorrelationStore::new(settings.limits));
    let router = RelayRouter::new(
        settings.admin_chat_id,
        store.clone(),
        telegram.clone(),
        settings.texts.clone(),
    );
    log::info!(
        "relaying to operator {} (max {} correlations)",
        settings.admin_chat_id,
        settings
            .limits
            .max_entries
            .map(|n| n.to_string())
            .unwrap_or_else(|| "unbounded".to_string())
    );

    let (inbound_tx, inbound_rx) = mpsc::channel::<InboundMessage>(INBOUND_QUEUE_CAPACITY);
    let _processor = spawn_inbound_processor(router, inbound_rx);

    let mut channel_tasks = Vec::new();
    let mode = match settings.webhook_endpoint() {
        Some(endpoint) => {
            let secret = settings.webhook_secret.as_deref();
            telegram
                .set_webhook(&endpoint, secret)
                .await
                .context("registering telegram webhook")?;
            log::info!("telegram webhook set to {}", endpoint);
            InboundMode::Webhook
        }
        None => {
            // getUpdates is refused while a webhook is registered.
            if let Err(e) = telegram.delete_webhook().await {
                log::debug!("telegram delete_webhook before polling: {}", e);
            }
            channel_tasks.push(telegram.clone().start_inbound(inbound_tx.clone()));
            InboundMode::Polling
        }
    };

    let state = GatewayState {
        settings: Arc::new(settings.clone()),
        mode,
        inbound_tx,
        store,
    };
    let app = build_app(state);

    let bind_addr = format!("{}:{}", bind, settings.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {} ({} mode)", bind_addr, mode.as_str());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(telegram, mode, channel_tasks))
        .await
        .context("gateway server exited")?;
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
/// Stops the getUpdates loop or removes the webhook, then awaits channel tasks.
async fn shutdown_signal(
    telegram: Arc<TelegramChannel>,
    mode: InboundMode,
    channel_tasks: Vec<JoinHandle<()>>,
) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining connections");

    telegram.stop();
    if mode == InboundMode::Webhook {
        if let Err(e) = telegram.delete_webhook().await {
            log::debug!("telegram delete_webhook on shutdown: {}", e);
        }
    }
    for h in channel_tasks {
        let _ = h.await;
    }
    log::info!("channel tasks finished");
}

/// True when no secret is configured or the request carries the configured secret.
fn verify_secret(expected: Option<&str>, headers: &HeaderMap) -> bool {
    let Some(expected) = expected else {
        return true;
    };
    let provided = headers
        .get(SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    provided.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// POST /webhook: verifies the optional secret, decodes the update and enqueues the message.
async fn telegram_webhook(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if !verify_secret(state.settings.webhook_secret.as_deref(), &headers) {
        log::warn!("webhook: rejected update with missing or wrong secret");
        return StatusCode::FORBIDDEN;
    }
    let update: TelegramUpdate = match serde_json::from_slice(&body) {
        Ok(u) => u,
        Err(e) => {
            log::warn!("webhook: undecodable update: {}", e);
            return StatusCode::BAD_REQUEST;
        }
    };
    let Some(inbound) = update.into_inbound() else {
        return StatusCode::OK;
    };
    if state.inbound_tx.send(inbound).await.is_err() {
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    StatusCode::OK
}

/// GET / returns a simple health JSON (for probes).
async fn health_http(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "mode": state.mode.as_str(),
        "port": state.settings.port,
        "correlations": state.store.len().await,
    }))
}
