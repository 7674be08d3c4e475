//! herdmaster service binary.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ TraceLayer ─▶ RequestIdLayer ─▶ body limit ─▶ deadline
//!                                                                      │
//!                                                                      ▼
//!                                                          ┌──────────────────────┐
//!                      429 + Retry-After ◀──── rejected ───│ admission controller │
//!                      429 + Retry-After ◀──── timed out ──│  in-flight ≤ max     │
//!                                                          │  running ≤ max       │
//!                                                          └──────────┬───────────┘
//!                                                                     │ slot
//!                                                                     ▼
//!     Client Response ◀──────────────────────────────────────── business routes
//!
//!     Side channels: admin API (own listener), Prometheus exporter
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use herdmaster::config::loader::{load_config, load_from_env};
use herdmaster::http::HttpServer;
use herdmaster::lifecycle::{signals, Shutdown};
use herdmaster::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "herdmaster")]
#[command(about = "HTTP service with admission control", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults and HM_* variables apply without it.
    #[arg(short, long, env = "HM_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => load_config(path),
        None => load_from_env(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(err) => {
            eprintln!("herdmaster: failed to load configuration: {err}");
            std::process::exit(1);
        }
    };

    logging::init(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "herdmaster starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_running = config.admission.max_running,
        max_in_flight = config.admission.max_in_flight,
        request_timeout_ms = config.timeouts.request_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(err) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %err,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    tokio::spawn(signals::wait_for_shutdown(shutdown.clone()));

    let server = HttpServer::new(config);
    server.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
