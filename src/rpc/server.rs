//! gRPC listener.
//!
//! # Responsibilities
//! - Host the `Rekor` service on an already-bound TCP listener
//! - Stop accepting on the shutdown broadcast and let tonic drain streams
//!
//! # Design Decisions
//! - The listener is bound by the lifecycle manager so bind errors surface
//!   before anything is served
//! - The drain deadline is enforced by the caller, not here

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;

use crate::config::GrpcConfig;
use crate::error::GatewayError;
use crate::rpc::{Rekor, RekorServer};

/// The native gRPC endpoint.
pub struct RpcServer<S> {
    service: Arc<S>,
    request_timeout: Duration,
}

impl<S: Rekor> RpcServer<S> {
    pub fn new(service: Arc<S>, config: &GrpcConfig) -> Self {
        Self {
            service,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }

    /// Serve until the shutdown broadcast fires, then wait for in-flight calls.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), GatewayError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "gRPC server starting");

        let signal = async move {
            // A closed channel means the coordinator is gone; stop either way.
            let _ = shutdown.recv().await;
            tracing::info!("gRPC server draining");
        };

        Server::builder()
            .timeout(self.request_timeout)
            .trace_fn(|request| tracing::info_span!("grpc", path = %request.uri().path()))
            .add_service(RekorServer::from_arc(self.service))
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), signal)
            .await
            .map_err(|source| GatewayError::Serve {
                listener: "grpc",
                source: Box::new(source),
            })?;

        tracing::info!("gRPC server stopped");
        Ok(())
    }
}
