//! Dual-listener process lifecycle.
//!
//! # Responsibilities
//! - Bind the gRPC and HTTP listeners
//! - Build the dispatcher for the configured mode
//! - Run both servers until a signal or a server failure
//! - Drain both within the grace period and report the outcome
//!
//! # Design Decisions
//! - Each server owns its listener and its drain; this module only
//!   broadcasts the stop and waits
//! - A server that stops on its own takes the sibling down with it, and the
//!   process exits with its error
//! - Drain problems after a requested stop are logged, never fatal

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::{JoinError, JoinHandle};

use crate::config::{DispatchMode, GatewayConfig};
use crate::error::GatewayError;
use crate::gateway::{rekor_routes, Dispatcher, GatewayState, LocalDispatcher, RemoteDispatcher};
use crate::http::HttpServer;
use crate::lifecycle::shutdown::{drain_within, Drain, Shutdown};
use crate::lifecycle::signals;
use crate::lifecycle::startup::{dial_address, BoundListeners};
use crate::rpc::{Rekor, RpcServer};

type ServerTask = JoinHandle<Result<(), GatewayError>>;

/// A gateway with both listeners bound, ready to serve.
pub struct Lifecycle<S> {
    config: GatewayConfig,
    service: Arc<S>,
    listeners: BoundListeners,
    dispatcher: Arc<dyn Dispatcher>,
    shutdown: Shutdown,
}

impl<S: Rekor> Lifecycle<S> {
    /// Bind both listeners and prepare the dispatcher.
    pub async fn bind(config: GatewayConfig, service: Arc<S>) -> Result<Self, GatewayError> {
        let listeners = BoundListeners::bind(&config).await?;

        let dispatcher: Arc<dyn Dispatcher> = match config.gateway.mode {
            DispatchMode::Local => Arc::new(LocalDispatcher::new(Arc::clone(&service))),
            DispatchMode::Remote => {
                let target = dial_address(listeners.rpc_addr);
                tracing::info!(%target, "Gateway dispatching over gRPC client");
                Arc::new(RemoteDispatcher::connect_lazy(target)?)
            }
        };

        Ok(Self {
            config,
            service,
            listeners,
            dispatcher,
            shutdown: Shutdown::new(),
        })
    }

    pub fn rpc_addr(&self) -> SocketAddr {
        self.listeners.rpc_addr
    }

    pub fn http_addr(&self) -> SocketAddr {
        self.listeners.http_addr
    }

    pub fn mode(&self) -> DispatchMode {
        self.dispatcher.mode()
    }

    /// Serve until SIGINT or SIGTERM.
    pub async fn serve(self) -> Result<(), GatewayError> {
        self.serve_until(signals::termination()).await
    }

    /// Serve until `signal` resolves or a server fails.
    pub async fn serve_until<F>(self, signal: F) -> Result<(), GatewayError>
    where
        F: Future<Output = ()> + Send,
    {
        let Self {
            config,
            service,
            listeners,
            dispatcher,
            shutdown,
        } = self;

        let routes = rekor_routes()?;
        tracing::debug!(routes = routes.routes().len(), "REST routes registered");
        let state = GatewayState::new(routes, dispatcher, &config.http);
        let http = HttpServer::new(state, &config.http);
        let rpc = RpcServer::new(service, &config.grpc);
        let grace = Duration::from_secs(config.shutdown.grace_period_secs);

        let mut rpc_task: ServerTask = tokio::spawn(rpc.run(listeners.rpc, shutdown.subscribe()));
        let mut http_task: ServerTask =
            tokio::spawn(http.run(listeners.http, shutdown.subscribe()));
        tracing::info!(
            grpc = %listeners.rpc_addr,
            http = %listeners.http_addr,
            mode = %config.gateway.mode,
            "Gateway serving"
        );

        let early = tokio::select! {
            _ = signal => {
                tracing::info!("Shutdown requested, draining listeners");
                None
            }
            joined = &mut rpc_task => Some(("grpc", joined)),
            joined = &mut http_task => Some(("http", joined)),
        };

        shutdown.trigger();

        match early {
            None => {
                let (rpc, http) =
                    tokio::join!(drain_within(grace, rpc_task), drain_within(grace, http_task));
                report_drain("grpc", rpc);
                report_drain("http", http);
                tracing::info!("Shutdown complete");
                Ok(())
            }
            Some((listener, joined)) => {
                let sibling = if listener == "grpc" {
                    ("http", http_task)
                } else {
                    ("grpc", rpc_task)
                };
                report_drain(sibling.0, drain_within(grace, sibling.1).await);

                let err = unexpected_exit(listener, joined);
                tracing::error!(listener, error = %err, "Listener stopped unexpectedly");
                Err(err)
            }
        }
    }
}

fn unexpected_exit(
    listener: &'static str,
    joined: Result<Result<(), GatewayError>, JoinError>,
) -> GatewayError {
    match joined {
        Ok(Err(err)) => err,
        Ok(Ok(())) => GatewayError::Serve {
            listener,
            source: "stopped before shutdown was requested".into(),
        },
        Err(join) => GatewayError::Serve {
            listener,
            source: Box::new(join),
        },
    }
}

fn report_drain(listener: &'static str, drain: Drain) {
    match drain {
        Drain::Completed(Ok(())) => tracing::debug!(listener, "Listener drained"),
        Drain::Completed(Err(err)) => {
            tracing::warn!(listener, error = %err, "Listener failed while draining")
        }
        Drain::TimedOut => {
            tracing::warn!(listener, "Grace period elapsed; remaining connections dropped")
        }
        Drain::Failed(err) => tracing::warn!(listener, error = %err, "Listener task failed"),
    }
}
