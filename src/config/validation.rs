//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, limits > 0)
//! - Detect the two listeners claiming the same endpoint
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("grpc and http listeners both bind {address}")]
    SharedEndpoint { address: String },

    #[error("observability.metrics_address `{address}` is not a socket address")]
    MetricsAddress { address: String },
}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.grpc.host.trim().is_empty() {
        errors.push(ValidationError::Empty { field: "grpc.host" });
    }
    if config.http.host.trim().is_empty() {
        errors.push(ValidationError::Empty { field: "http.host" });
    }
    if config.log.origin.trim().is_empty() {
        errors.push(ValidationError::Empty { field: "log.origin" });
    }

    let positive: [(&'static str, u64); 6] = [
        ("grpc.request_timeout_secs", config.grpc.request_timeout_secs),
        ("http.idle_timeout_secs", config.http.idle_timeout_secs),
        ("http.read_timeout_secs", config.http.read_timeout_secs),
        ("http.write_timeout_secs", config.http.write_timeout_secs),
        ("http.max_body_bytes", config.http.max_body_bytes as u64),
        ("http.max_connections", config.http.max_connections as u64),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    if config.grpc.port != 0
        && config.grpc.port == config.http.port
        && config.grpc.host.eq_ignore_ascii_case(&config.http.host)
    {
        errors.push(ValidationError::SharedEndpoint {
            address: config.http.bind_address(),
        });
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::MetricsAddress {
            address: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
