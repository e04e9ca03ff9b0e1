//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Wrap the gateway router with middleware (tracing, timeouts, request ID)
//! - Run the accept loop with HTTP/1.1 and h2c on one port
//! - Stop accepting on shutdown and drain open connections
//!
//! # Design Decisions
//! - A hand-rolled accept loop instead of `axum::serve`, so the connection
//!   limit, idle timeout and drain are under our control
//! - The peer address is attached per connection as `ConnectInfo`
//! - The drain deadline is enforced by the caller, not here

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::ConnectInfo;
use axum::Router;
use hyper::body::Incoming;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto;
use hyper_util::server::graceful::GracefulShutdown;
use hyper_util::service::TowerToHyperService;
use tokio::sync::broadcast;
use tower::ServiceExt;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::HttpConfig;
use crate::error::GatewayError;
use crate::gateway::{gateway_router, GatewayState};
use crate::http::request::MakeRequestUuid;
use crate::net::{ConnectionTracker, Listener, ListenerError};
use crate::observability::tracing::http_span;

/// Pause after a failed accept, so a full fd table does not spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// The REST gateway endpoint.
pub struct HttpServer {
    router: Router,
    idle_timeout: Duration,
}

impl HttpServer {
    /// Create a new HTTP server serving the gateway.
    pub fn new(state: GatewayState, config: &HttpConfig) -> Self {
        Self {
            router: Self::build_router(state, config),
            idle_timeout: Duration::from_secs(config.idle_timeout_secs),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: GatewayState, config: &HttpConfig) -> Router {
        gateway_router(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.write_timeout_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(http_span))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Serve until the shutdown broadcast fires, then wait for open
    /// connections to finish their in-flight requests.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), GatewayError> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            max_connections = listener.max_connections(),
            "HTTP server starting"
        );

        let graceful = GracefulShutdown::new();
        let tracker = ConnectionTracker::new("http");
        let mut builder = auto::Builder::new(TokioExecutor::new());
        builder
            .http1()
            .timer(TokioTimer::new())
            .header_read_timeout(self.idle_timeout);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer, permit) = match accepted {
                        Ok(connection) => connection,
                        Err(ListenerError::Closed) => break,
                        Err(err) => {
                            tracing::warn!(error = %err, "Accept failed");
                            tokio::time::sleep(ACCEPT_BACKOFF).await;
                            continue;
                        }
                    };

                    let guard = tracker.track(peer);
                    let service = self.router.clone().map_request(
                        move |mut request: axum::http::Request<Incoming>| {
                            request.extensions_mut().insert(ConnectInfo::<SocketAddr>(peer));
                            request
                        },
                    );
                    let connection = builder
                        .serve_connection(TokioIo::new(stream), TowerToHyperService::new(service))
                        .into_owned();
                    let connection = graceful.watch(connection);

                    tokio::spawn(async move {
                        if let Err(err) = connection.await {
                            tracing::debug!(
                                connection = %guard,
                                peer_addr = %guard.peer(),
                                error = %err,
                                "Connection ended with error"
                            );
                        }
                        drop(permit);
                        drop(guard);
                    });
                }
                _ = shutdown.recv() => break,
            }
        }

        drop(listener);
        tracing::info!(
            active_connections = tracker.open(),
            "HTTP server draining"
        );
        graceful.shutdown().await;
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
