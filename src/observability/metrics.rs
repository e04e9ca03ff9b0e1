//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define gateway metrics (requests, latency, connections)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by rpc, HTTP status
//! - `gateway_request_duration_seconds` (histogram): latency by rpc
//! - `gateway_active_connections` (gauge): open HTTP connections
//!
//! # Design Decisions
//! - Without an installed recorder every call is a no-op
//! - Labels are low-cardinality: rpc name, never the raw path

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

pub const REQUESTS_TOTAL: &str = "gateway_requests_total";
pub const REQUEST_DURATION_SECONDS: &str = "gateway_request_duration_seconds";
pub const ACTIVE_CONNECTIONS: &str = "gateway_active_connections";

/// Label used for requests that matched no route.
pub const UNROUTED: &str = "none";

/// Start the Prometheus scrape endpoint. Must run inside a Tokio runtime.
pub fn init_metrics(address: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(address).install() {
        Ok(()) => tracing::info!(%address, "Metrics endpoint listening"),
        Err(err) => tracing::error!(%address, error = %err, "Failed to install metrics exporter"),
    }
}

/// Record a finished gateway request.
pub fn record_request(rpc: &'static str, status: u16, started: Instant) {
    metrics::counter!(REQUESTS_TOTAL, "rpc" => rpc, "status" => status.to_string()).increment(1);
    metrics::histogram!(REQUEST_DURATION_SECONDS, "rpc" => rpc)
        .record(started.elapsed().as_secs_f64());
}

pub fn connection_opened() {
    metrics::gauge!(ACTIVE_CONNECTIONS).increment(1.0);
}

pub fn connection_closed() {
    metrics::gauge!(ACTIVE_CONNECTIONS).decrement(1.0);
}
