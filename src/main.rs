use anyhow::{Context, Result};
use clap::Parser;
use ddos_guard::config::Config;
use ddos_guard::server::Server;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use validator::Validate;

#[derive(Debug, Parser)]
#[command(name = "ddos-guard", version, about = "HTTP admission guard with strike-based blocking")]
struct Args {
    /// JSON configuration file (environment variables are used otherwise)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the bind address
    #[arg(short, long)]
    bind: Option<String>,

    /// Override the log level
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::from_env().context("Failed to load configuration from environment")?,
    };
    if let Some(bind) = args.bind {
        config.server.bind_addr = bind;
    }
    if let Some(log_level) = args.log_level {
        config.server.log_level = log_level;
    }
    config.server.validate().context("Invalid server configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("ddos_guard={},tower_http=debug", config.server.log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let guard = config.guard_config();
    tracing::info!("Starting ddos-guard");
    tracing::info!(
        bind_address = %config.server.bind_addr,
        guard_enabled = guard.enabled,
        per_ip_per_minute = guard.per_ip_per_minute,
        per_ip_burst = guard.per_ip_burst,
        global_per_minute = guard.global_per_minute,
        global_burst = guard.global_burst,
        strike_threshold = guard.strike_threshold,
        block_seconds = guard.block_seconds,
        whitelist_entries = guard.whitelist.len(),
        trust_forwarded_headers = config.server.trust_forwarded_headers,
        "Configuration loaded"
    );

    Server::new(&config)
        .run()
        .await
        .context("Server error")?;

    Ok(())
}
