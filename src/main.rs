//! Rekor gateway
//!
//! Serves the Rekor v2 transparency-log service over gRPC and a REST/JSON
//! gateway derived from the same RPC contract, from a single process.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────┐
//!                        │                  REKOR GATEWAY                   │
//!                        │                                                  │
//!   REST client          │  ┌─────────┐   ┌──────────┐   ┌──────────────┐   │
//!   ─────────────────────┼─▶│  http   │──▶│ routing  │──▶│   gateway    │   │
//!                        │  │ server  │   │  table   │   │ params/decode│   │
//!                        │  └─────────┘   └──────────┘   └──────┬───────┘   │
//!                        │                                      │           │
//!                        │                          local ┌─────┴─────┐     │
//!                        │                    ┌───────────┤ dispatch  │     │
//!                        │                    │           └─────┬─────┘     │
//!                        │                    │                 │ remote    │
//!                        │                    ▼                 ▼           │
//!   gRPC client          │  ┌─────────┐   ┌──────────┐   ┌──────────────┐   │
//!   ─────────────────────┼─▶│   rpc   │──▶│  Rekor   │◀──│ tonic client │   │
//!                        │  │ server  │   │ service  │   └──────────────┘   │
//!                        │  └─────────┘   └──────────┘                      │
//!                        │                                                  │
//!                        │  config · observability · lifecycle (drain)      │
//!                        └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use rekor_gateway::config::{load_config, DispatchMode, GatewayConfig};
use rekor_gateway::observability::{logging, metrics};
use rekor_gateway::{Lifecycle, MemoryLog};

/// Rekor v2 over gRPC and REST.
#[derive(Parser)]
#[command(name = "rekor-gateway", version, about)]
struct Cli {
    /// Path to a TOML configuration file; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override how the REST gateway reaches the service
    #[arg(long, value_enum)]
    mode: Option<DispatchMode>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("rekor-gateway: {}: {err}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => GatewayConfig::default(),
    };
    if let Some(mode) = cli.mode {
        config.gateway.mode = mode;
    }

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "rekor-gateway starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(address) => metrics::init_metrics(address),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "Gateway exited with error");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: GatewayConfig) -> rekor_gateway::Result<()> {
    let service = Arc::new(MemoryLog::from_config(&config.log));
    Lifecycle::bind(config, service).await?.serve().await
}
