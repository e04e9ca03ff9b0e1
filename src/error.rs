//! Process-level error type.
//!
//! Per-request failures never reach this type: they are `tonic::Status`
//! values rendered by the gateway's response forwarder.

use thiserror::Error;

use crate::config::loader::ConfigError;
use crate::net::listener::ListenerError;
use crate::routing::RouteError;

/// Errors that stop the gateway process.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{listener} listener: {source}")]
    Bind {
        listener: &'static str,
        #[source]
        source: ListenerError,
    },

    #[error("{listener} listener failed: {source}")]
    Serve {
        listener: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("gRPC channel setup failed: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("invalid route table: {0}")]
    Routes(#[from] RouteError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = GatewayError> = std::result::Result<T, E>;
