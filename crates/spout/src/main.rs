//! Spout - line-protocol ingestion front-end
//!
//! # Usage
//!
//! ```bash
//! # UDP or HTTP listener, as set by `mode` in the config
//! spout /etc/spout/listener.toml
//!
//! # Reads /etc/influx-spout.toml
//! spout
//!
//! # Override the configured log level
//! spout listener.toml --log-level debug
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use spout_config::{Config, LogFormat};
use spout_listener::Listener;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Config file read when none is given
const DEFAULT_CONFIG_PATH: &str = "/etc/influx-spout.toml";

/// Spout - accepts InfluxDB line protocol and publishes batches to NATS
#[derive(Parser, Debug)]
#[command(name = "spout")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error). Overrides config file.
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::from_file(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;

    let level = cli
        .log_level
        .as_deref()
        .unwrap_or(config.log.level.as_str());
    init_logging(level, config.log.format)?;

    info!(
        mode = %config.mode,
        name = %config.name,
        port = config.port,
        "starting spout"
    );

    let listener = Listener::start(&config)
        .await
        .with_context(|| format!("failed to start {}", config.mode))?;

    wait_for_shutdown().await;
    info!("shutdown signal received, stopping listener...");

    listener.stop().await;
    info!("shutdown complete");

    Ok(())
}

/// Initialize the tracing subscriber for logging
fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Console => registry
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }

    Ok(())
}

/// Wait for SIGINT or SIGTERM
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
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
}
