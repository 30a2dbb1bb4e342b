//! wsin-proxy: a WebSocket reverse proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌────────────────────────────────────────────────────────────┐
//!                  │                         WSIN PROXY                          │
//!                  │                                                             │
//!   GET /wsin/h/s/…│  ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────┐ │
//!  ────────────────┼─▶│   http   │──▶│ session  │──▶│ routing  │──▶│ registry │ │
//!                  │  │ dispatch │   │  driver  │   │ resolver │   │  lookup  │ │
//!                  │  └──────────┘   └────┬─────┘   └──────────┘   └──────────┘ │
//!                  │                      │                                      │
//!                  │                      ▼                                      │
//!   Client frames  │  ┌──────────┐   ┌──────────┐   ┌──────────┐                 │   Backend
//!  ◀──────────────▶┼──│   leg    │◀─▶│  relay   │◀─▶│   leg    │◀────────────────┼──▶ node
//!                  │  │downstream│   │          │   │ upstream │  (connector)    │
//!                  │  └──────────┘   └──────────┘   └──────────┘                 │
//!                  │                                                             │
//!                  │   config (toml + watcher) · lifecycle · observability       │
//!                  └────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use wsin_proxy::config::{load_config, watcher::ConfigWatcher, ProxyConfig};
use wsin_proxy::lifecycle::shutdown_signal;
use wsin_proxy::observability::logging;
use wsin_proxy::HttpServer;

/// WebSocket reverse proxy routing `/wsin/<host>/<service>/...` to registered nodes.
#[derive(Debug, Parser)]
#[command(name = "wsin-proxy", version, about)]
struct Cli {
    /// Path to a TOML config file. Watched for node table changes.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the port of the bind address.
    #[arg(short, long)]
    port: Option<u16>,

    /// Override the configured log level (RUST_LOG still wins).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(port) = cli.port {
        config.listener.set_port(port)?;
    }
    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }

    logging::init(&config.observability);
    tracing::info!("wsin-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        route_prefix = %config.upgrade.route_prefix,
        nodes = config.nodes.len(),
        dead_end = ?config.upgrade.dead_end,
        "Configuration loaded"
    );

    // The watcher must outlive the server; without a file, updates never arrive.
    let (_watcher, config_updates) = match &cli.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        None => {
            let (_tx, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let listener = TcpListener::bind(config.listener.socket_addr()?).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(config);
    server.run(listener, config_updates, shutdown_signal()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
