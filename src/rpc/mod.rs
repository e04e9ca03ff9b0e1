//! The Rekor RPC contract and the gRPC listener.
//!
//! # Data Flow
//! ```text
//! gRPC client
//!     → server.rs (tonic accept loop, graceful shutdown)
//!     → RekorServer (generated, prost codec)
//!     → Rekor trait implementation (business logic, external)
//! ```
//!
//! The generated `rekor_server::Rekor` trait is the abstract service interface
//! consumed by both the gRPC listener and the REST gateway's local dispatcher.

pub(crate) mod json;
pub mod messages;
pub mod server;

pub use messages::*;

include!(concat!(env!("OUT_DIR"), "/dev.sigstore.rekor.v2.Rekor.rs"));

pub use rekor_client::RekorClient;
pub use rekor_server::{Rekor, RekorServer};
pub use server::RpcServer;

/// Fully qualified gRPC service name.
pub const SERVICE_NAME: &str = "dev.sigstore.rekor.v2.Rekor";
