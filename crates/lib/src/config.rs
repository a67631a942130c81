//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.relay-bot/config.json`) and environment.
//! Environment variables win over the file so the bot can be deployed with no file at all
//! (`TELEGRAM_BOT_TOKEN`, `TELEGRAM_ADMIN_CHAT_ID`, `WEBHOOK_URL`, `PORT`).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::correlation::StoreLimits;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// HTTP server settings (health probe and webhook endpoint).
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Channel settings (Telegram).
    #[serde(default)]
    pub channels: ChannelsConfig,

    /// Operator identity, correlation store bounds and user-visible texts.
    #[serde(default)]
    pub relay: RelayConfig,
}

/// Gateway bind and port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port for HTTP (default 5000). Overridden by PORT env.
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address. Overridden by RELAY_BIND env. When unset: "0.0.0.0" in webhook mode
    /// (Telegram must reach the socket), "127.0.0.1" in polling mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
}

fn default_gateway_port() -> u16 {
    5000
}

const POLLING_BIND: &str = "127.0.0.1";
const WEBHOOK_BIND: &str = "0.0.0.0";

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: None,
        }
    }
}

/// Per-channel config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelsConfig {
    #[serde(default)]
    pub telegram: TelegramChannelConfig,
}

/// Telegram channel config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelegramChannelConfig {
    /// Bot token from BotFather. Overridden by TELEGRAM_BOT_TOKEN env when set.
    pub bot_token: Option<String>,
    /// Public base URL of this service. When set, webhook mode is used and Telegram POSTs
    /// updates to `{webhookUrl}/webhook`. If unset, long-poll getUpdates is used.
    pub webhook_url: Option<String>,
    /// Optional secret for webhook verification (X-Telegram-Bot-Api-Secret-Token).
    pub webhook_secret: Option<String>,
    /// Bot API base URL (default https://api.telegram.org). Overridden by TELEGRAM_API_BASE env.
    pub api_base: Option<String>,
    /// Timeout for a single outbound Bot API call, in seconds (default 15).
    pub request_timeout_secs: Option<u64>,
}

/// Relay settings: who the operator is and how many correlations to keep.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayConfig {
    /// Telegram id of the operator. Overridden by TELEGRAM_ADMIN_CHAT_ID env.
    pub admin_chat_id: Option<i64>,
    /// Upper bound on stored correlations; the oldest entry is evicted first (default 10000).
    #[serde(default = "default_max_correlations")]
    pub max_correlations: usize,
    /// Optional age limit for correlations, in seconds. Unset keeps entries until evicted by count.
    #[serde(default)]
    pub correlation_ttl_secs: Option<u64>,
    /// User-visible texts.
    #[serde(default)]
    pub texts: RelayTexts,
}

fn default_max_correlations() -> usize {
    10_000
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            admin_chat_id: None,
            max_correlations: default_max_correlations(),
            correlation_ttl_secs: None,
            texts: RelayTexts::default(),
        }
    }
}

/// Texts sent by the relay. `header` is MarkdownV2 and may use `{name}` and `{id}` (both are
/// escaped before substitution); `replyFailed` may use `{reason}`. All others are plain text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelayTexts {
    pub greeting: String,
    pub help: String,
    pub header: String,
    pub relay_failed: String,
    pub reply_delivered: String,
    pub reply_failed: String,
    pub reply_unresolved: String,
    pub usage_hint: String,
}

impl Default for RelayTexts {
    fn default() -> Self {
        Self {
            greeting: "Hello! Send your message here and it will be passed on to the admin."
                .to_string(),
            help: "Just write a message in this chat. The admin will receive it and can reply to you here."
                .to_string(),
            header: "📩 New message from {name} \\(ID: `{id}`\\):".to_string(),
            relay_failed: "Sorry, your message could not be delivered. Please try again later."
                .to_string(),
            reply_delivered: "✅ Reply delivered to the user.".to_string(),
            reply_failed: "❌ Delivery failed: {reason}".to_string(),
            reply_unresolved:
                "⚠️ No user is associated with that message. Reply directly to a message the bot forwarded."
                    .to_string(),
            usage_hint: "⚠️ Reply to a forwarded user message to answer it.".to_string(),
        }
    }
}

/// Fatal configuration problems, reported before the gateway starts serving.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("telegram bot token not configured (set TELEGRAM_BOT_TOKEN or channels.telegram.botToken)")]
    MissingBotToken,
    #[error("operator id not configured (set TELEGRAM_ADMIN_CHAT_ID or relay.adminChatId)")]
    MissingAdminChatId,
    #[error("{name} must be an integer, got {value:?}")]
    NotNumeric { name: &'static str, value: String },
    #[error("invalid value for {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },
}

/// Settings resolved from file and environment, validated and ready to run.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub bot_token: String,
    pub admin_chat_id: i64,
    pub bind: String,
    pub port: u16,
    pub webhook_url: Option<String>,
    pub webhook_secret: Option<String>,
    pub api_base: String,
    pub request_timeout: Duration,
    pub limits: StoreLimits,
    pub texts: RelayTexts,
}

impl RelaySettings {
    /// Full webhook URL registered with Telegram (`{webhookUrl}/webhook`), when in webhook mode.
    pub fn webhook_endpoint(&self) -> Option<String> {
        self.webhook_url
            .as_ref()
            .map(|u| format!("{}{}", u.trim_end_matches('/'), WEBHOOK_PATH))
    }
}

/// Path of the webhook route on the gateway.
pub const WEBHOOK_PATH: &str = "/webhook";

pub const DEFAULT_TELEGRAM_API_BASE: &str = "https://api.telegram.org";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

fn env_nonempty(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

fn config_nonempty(value: &Option<String>) -> Option<String> {
    value
        .as_ref()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Resolve and validate settings from config and the process environment.
pub fn resolve_settings(config: &Config) -> Result<RelaySettings, ConfigError> {
    resolve_settings_from(config, env_nonempty)
}

/// Resolve settings with an explicit environment lookup (non-empty, trimmed values only).
pub fn resolve_settings_from<F>(config: &Config, env: F) -> Result<RelaySettings, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let telegram = &config.channels.telegram;

    let bot_token = env("TELEGRAM_BOT_TOKEN")
        .or_else(|| config_nonempty(&telegram.bot_token))
        .ok_or(ConfigError::MissingBotToken)?;

    let admin_chat_id = match env("TELEGRAM_ADMIN_CHAT_ID") {
        Some(raw) => raw.parse::<i64>().map_err(|_| ConfigError::NotNumeric {
            name: "TELEGRAM_ADMIN_CHAT_ID",
            value: raw,
        })?,
        None => config
            .relay
            .admin_chat_id
            .ok_or(ConfigError::MissingAdminChatId)?,
    };

    let port = match env("PORT") {
        Some(raw) => raw.parse::<u16>().map_err(|_| ConfigError::NotNumeric {
            name: "PORT",
            value: raw,
        })?,
        None => config.gateway.port,
    };

    if config.relay.max_correlations == 0 {
        return Err(ConfigError::InvalidValue {
            name: "relay.maxCorrelations",
            reason: "must be greater than zero".to_string(),
        });
    }
    let ttl = match config.relay.correlation_ttl_secs {
        Some(0) => {
            return Err(ConfigError::InvalidValue {
                name: "relay.correlationTtlSecs",
                reason: "must be greater than zero when set".to_string(),
            })
        }
        Some(secs) => Some(Duration::from_secs(secs)),
        None => None,
    };

    let webhook_url = env("WEBHOOK_URL").or_else(|| config_nonempty(&telegram.webhook_url));
    if let Some(ref url) = webhook_url {
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(ConfigError::InvalidValue {
                name: "WEBHOOK_URL",
                reason: format!("expected an http(s) URL, got {:?}", url),
            });
        }
    }
    let bind = env("RELAY_BIND")
        .or_else(|| config_nonempty(&config.gateway.bind))
        .unwrap_or_else(|| {
            if webhook_url.is_some() {
                WEBHOOK_BIND.to_string()
            } else {
                POLLING_BIND.to_string()
            }
        });
    let webhook_secret =
        env("TELEGRAM_WEBHOOK_SECRET").or_else(|| config_nonempty(&telegram.webhook_secret));
    let api_base = env("TELEGRAM_API_BASE")
        .or_else(|| config_nonempty(&telegram.api_base))
        .unwrap_or_else(|| DEFAULT_TELEGRAM_API_BASE.to_string())
        .trim_end_matches('/')
        .to_string();

    Ok(RelaySettings {
        bot_token,
        admin_chat_id,
        bind,
        port,
        webhook_url,
        webhook_secret,
        api_base,
        request_timeout: Duration::from_secs(
            telegram
                .request_timeout_secs
                .filter(|s| *s > 0)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        ),
        limits: StoreLimits {
            max_entries: Some(config.relay.max_correlations),
            ttl,
        },
        texts: config.relay.texts.clone(),
    })
}

/// True if the bind address is loopback (127.0.0.1, ::1, etc.).
pub fn is_loopback_bind(bind: &str) -> bool {
    let b = bind.trim();
    b == "127.0.0.1" || b == "::1" || b == "localhost"
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("RELAY_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".relay-bot").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the given path (or the default path). Missing file => default config,
/// so an environment-only deployment needs no file.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}
