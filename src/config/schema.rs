//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway process.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Native gRPC listener.
    pub grpc: GrpcConfig,

    /// REST gateway listener.
    pub http: HttpConfig,

    /// How the REST gateway reaches the service.
    pub gateway: DispatchConfig,

    /// Graceful shutdown settings.
    pub shutdown: ShutdownConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Settings for the bundled in-memory log.
    pub log: LogConfig,
}

/// gRPC listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GrpcConfig {
    /// Host or IP to bind.
    pub host: String,

    /// Port to bind; 0 picks an ephemeral port.
    pub port: u16,

    /// Per-call timeout enforced by the server, in seconds.
    pub request_timeout_secs: u64,
}

impl GrpcConfig {
    /// `host:port` form used for binding and logging.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for GrpcConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3001,
            request_timeout_secs: 60,
        }
    }
}

/// HTTP gateway listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Host or IP to bind.
    pub host: String,

    /// Port to bind; 0 picks an ephemeral port.
    pub port: u16,

    /// How long a kept-alive connection may sit without sending a request.
    pub idle_timeout_secs: u64,

    /// Deadline for reading a request body.
    pub read_timeout_secs: u64,

    /// Deadline for producing a response.
    pub write_timeout_secs: u64,

    /// Largest accepted request body.
    pub max_body_bytes: usize,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl HttpConfig {
    /// `host:port` form used for binding and logging.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3000,
            idle_timeout_secs: 60,
            read_timeout_secs: 60,
            write_timeout_secs: 60,
            max_body_bytes: 4 * 1024 * 1024,
            max_connections: 10_000,
        }
    }
}

/// Where gateway requests are dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// Call the in-process service directly.
    Local,
    /// Forward over a client connection to the sibling gRPC listener.
    #[default]
    Remote,
}

impl std::fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchMode::Local => f.write_str("local"),
            DispatchMode::Remote => f.write_str("remote"),
        }
    }
}

/// Gateway dispatch configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DispatchConfig {
    pub mode: DispatchMode,
}

/// Graceful shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Time each listener gets to drain in-flight work after a signal.
    pub grace_period_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_period_secs: 10,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// In-memory log configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LogConfig {
    /// Checkpoint origin line.
    pub origin: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            origin: "rekor.localhost".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: GatewayConfig = toml::from_str("").unwrap();
        assert_eq!(config.http.port, 3000);
        assert_eq!(config.grpc.port, 3001);
        assert_eq!(config.gateway.mode, DispatchMode::Remote);
        assert_eq!(config.shutdown.grace_period_secs, 10);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [http]
            port = 8080

            [gateway]
            mode = "local"

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.http.port, 8080);
        assert_eq!(config.http.host, "localhost");
        assert_eq!(config.http.bind_address(), "localhost:8080");
        assert_eq!(config.gateway.mode, DispatchMode::Local);
        assert_eq!(config.observability.log_format, LogFormat::Json);
    }
}
