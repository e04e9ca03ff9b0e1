//! Rekor v2 served over gRPC and a REST/JSON gateway from one process.

pub mod config;
pub mod error;
pub mod gateway;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;
pub mod rpc;
pub mod service;

pub use config::schema::GatewayConfig;
pub use error::{GatewayError, Result};
pub use http::HttpServer;
pub use lifecycle::{Lifecycle, Shutdown};
pub use service::MemoryLog;
