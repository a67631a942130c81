use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "relay-bot")]
#[command(about = "Anonymous user-to-operator Telegram relay", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a default config file.
    Init {
        /// Config file path (default: RELAY_CONFIG_PATH or ~/.relay-bot/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Run the relay (webhook when a webhook URL is configured, otherwise long polling).
    Run {
        /// Config file path (default: RELAY_CONFIG_PATH or ~/.relay-bot/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP port (default from PORT, then config, then 5000)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Load and validate the configuration, then print the resolved settings (token redacted).
    Check {
        /// Config file path (default: RELAY_CONFIG_PATH or ~/.relay-bot/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("relay-bot {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Run { config, port }) => {
            if let Err(e) = run_relay(config, port).await {
                log::error!("relay failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Check { config }) => {
            if let Err(e) = run_check(config) {
                log::error!("config check failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(relay::config::default_config_path);
    let dir = relay::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

fn load_settings(
    config_path: Option<std::path::PathBuf>,
) -> anyhow::Result<relay::config::RelaySettings> {
    let (config, path) = relay::config::load_config(config_path)?;
    log::debug!("loaded config from {}", path.display());
    Ok(relay::config::resolve_settings(&config)?)
}

async fn run_relay(config_path: Option<std::path::PathBuf>, port: Option<u16>) -> anyhow::Result<()> {
    let mut settings = load_settings(config_path)?;
    if let Some(p) = port {
        settings.port = p;
    }
    log::info!("starting relay on {}:{}", settings.bind, settings.port);
    relay::gateway::run_gateway(settings).await
}

fn run_check(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let settings = load_settings(config_path)?;
    let mode = if settings.webhook_url.is_some() {
        "webhook"
    } else {
        "polling"
    };
    let summary = serde_json::json!({
        "adminChatId": settings.admin_chat_id,
        "bind": settings.bind,
        "port": settings.port,
        "mode": mode,
        "webhookEndpoint": settings.webhook_endpoint(),
        "webhookSecret": settings.webhook_secret.is_some(),
        "apiBase": settings.api_base,
        "requestTimeoutSecs": settings.request_timeout.as_secs(),
        "maxCorrelations": settings.limits.max_entries,
        "correlationTtlSecs": settings.limits.ttl.map(|t| t.as_secs()),
        "botToken": redact(&settings.bot_token),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Keep the bot id prefix (`123456:`) and hide the secret part.
fn redact(token: &str) -> String {
    match token.split_once(':') {
        Some((id, _)) => format!("{}:***", id),
        None => "***".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_token_secret() {
        assert_eq!(redact("123456:ABC-def"), "123456:***");
        assert_eq!(redact("opaque"), "***");
    }

    #[test]
    fn parses_run_with_port() {
        let cli = Cli::try_parse_from(["relay-bot", "run", "--port", "8080"]).unwrap();
        match cli.command {
            Some(Commands::Run { port, config }) => {
                assert_eq!(port, Some(8080));
                assert!(config.is_none());
            }
            _ => panic!("expected run"),
        }
    }
}
