//! Media Gate
//!
//! Serves protected media files to authenticated clients with HTTP range
//! support, built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────────────┐
//!                         │                      MEDIA GATE                      │
//!                         │                                                      │
//!   POST /auth            │  ┌──────────┐    ┌──────────────────┐                │
//!   ──────────────────────┼─▶│   http   │───▶│  auth authority  │◀── sweeper     │
//!                         │  │ handlers │    └──────────────────┘                │
//!   GET /resource/<name>  │  │          │    ┌──────────────────┐                │
//!   ──────────────────────┼─▶│          │───▶│ content resolver │──── root dir   │
//!                         │  │          │    └──────────────────┘                │
//!                         │  │          │    ┌──────────────────┐                │
//!                         │  │          │───▶│ session tracker  │                │
//!                         │  └──────────┘    └────────┬─────────┘                │
//!                         │                           │ guard                    │
//!   206 / 200 bytes       │                  ┌────────▼─────────┐                │
//!   ◀─────────────────────┼──────────────────│ transfer engine  │                │
//!                         │                  └──────────────────┘                │
//!                         │                                                      │
//!                         │  ┌────────────────────────────────────────────────┐  │
//!                         │  │             Cross-Cutting Concerns             │  │
//!                         │  │  config · observability · security · lifecycle │  │
//!                         │  └────────────────────────────────────────────────┘  │
//!                         └──────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use media_gate::config::{load_config, validation::validate_config, ConfigError, GateConfig};
use media_gate::lifecycle::{shutdown_signal, Shutdown};
use media_gate::observability::{logging, metrics};
use media_gate::GateServer;

#[derive(Parser, Debug)]
#[command(name = "media-gate")]
#[command(about = "Token-gated media server with range support", long_about = None)]
struct Args {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the content root directory.
    #[arg(long)]
    root: Option<PathBuf>,

    /// Override the listening port (keeps the configured host).
    #[arg(short, long)]
    port: Option<u16>,

    /// Override the concurrent stream ceiling.
    #[arg(long)]
    max_streams: Option<usize>,
}

fn resolve_config(args: &Args) -> Result<GateConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => GateConfig::default(),
    };

    if let Some(root) = &args.root {
        config.content.root = root.clone();
    }
    if let Some(port) = args.port {
        let mut addr = config
            .listener
            .bind_address
            .parse::<SocketAddr>()
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], port)));
        addr.set_port(port);
        config.listener.bind_address = addr.to_string();
    }
    if let Some(max) = args.max_streams {
        config.streams.max_concurrent = max;
    }

    // Overrides can break what the file got right.
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = resolve_config(&args)?;

    logging::init_logging(&config.observability)?;

    tracing::info!("media-gate v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        root = %config.content.root.display(),
        max_streams = config.streams.max_concurrent,
        token_ttl_secs = config.tokens.ttl_secs,
        debug_endpoints = config.debug.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!(address = %local_addr, "Listening for connections");

    let server = GateServer::new(config)?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.trigger();
    });

    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
