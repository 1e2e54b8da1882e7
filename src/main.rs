//! # Autorelay — proxy gateway with scheduled check-in automation
//!
//! Dispatches inbound HTTP calls to registered proxy-handler modules and
//! runs a per-user cron workflow against the remote API.
//!
//! Usage:
//!   autorelay                        # Start gateway (default port 5000)
//!   autorelay --port 8080            # Custom port
//!   autorelay --config ./conf.toml   # Explicit config file

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use autorelay_core::AutorelayConfig;

#[derive(Parser)]
#[command(
    name = "autorelay",
    version,
    about = "Proxy gateway with per-user scheduled check-in automation"
)]
struct Cli {
    /// Bind host (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Bind port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Path to config file (default ~/.autorelay/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "autorelay=debug,autorelay_gateway=debug,autorelay_scheduler=debug,autorelay_store=debug,tower_http=debug"
    } else {
        "autorelay=info,autorelay_gateway=info,autorelay_scheduler=info,autorelay_store=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let mut config = match &cli.config {
        Some(path) => AutorelayConfig::load_from(path)?,
        None => AutorelayConfig::load()?,
    };
    if let Some(host) = cli.host {
        config.gateway.host = host;
    }
    if let Some(port) = cli.port {
        config.gateway.port = port;
    }

    tracing::info!(
        "starting autorelay v{} (remote: {})",
        env!("CARGO_PKG_VERSION"),
        config.remote.base_url
    );

    autorelay_gateway::start(&config).await?;
    Ok(())
}
