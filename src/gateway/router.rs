//! The gateway request handler.
//!
//! # Data Flow
//! ```text
//! HTTP request
//!     → route lookup (404 envelope on miss)
//!     → metadata annotation + path parameter coercion
//!     → body read (CreateEntry only, size and time bounded)
//!     → decode into RpcRequest
//!     → dispatch (local or remote), bounded by Grpc-Timeout
//!     → forward.rs renders the outcome
//! ```
//!
//! Each stage either hands a value to the next or produces the response;
//! nothing runs concurrently within one request.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::request::Parts;
use axum::response::Response;
use axum::Router;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tonic::{Code, Status};
use tracing::Instrument;

use crate::config::HttpConfig;
use crate::gateway::dispatch::{Dispatched, Dispatcher, RpcCall};
use crate::gateway::forward;
use crate::gateway::metadata::{self, CallMetadata};
use crate::gateway::params::TypedParams;
use crate::gateway::routes::RpcRoute;
use crate::http::request::RequestIdExt;
use crate::observability::metrics;
use crate::routing::{PathParams, PathTemplate, RouteTable};

/// Shared, immutable state for every gateway request.
#[derive(Clone)]
pub struct GatewayState {
    routes: Arc<RouteTable<RpcRoute>>,
    dispatcher: Arc<dyn Dispatcher>,
    max_body_bytes: usize,
    read_timeout: Duration,
}

impl GatewayState {
    pub fn new(
        routes: RouteTable<RpcRoute>,
        dispatcher: Arc<dyn Dispatcher>,
        config: &HttpConfig,
    ) -> Self {
        Self {
            routes: Arc::new(routes),
            dispatcher,
            max_body_bytes: config.max_body_bytes,
            read_timeout: Duration::from_secs(config.read_timeout_secs),
        }
    }

    pub fn dispatcher(&self) -> &Arc<dyn Dispatcher> {
        &self.dispatcher
    }
}

/// Axum router that sends every request through the gateway.
pub fn gateway_router(state: GatewayState) -> Router {
    Router::new().fallback(handle).with_state(state)
}

async fn handle(State(state): State<GatewayState>, request: Request) -> Response {
    let started = Instant::now();
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let (parts, body) = request.into_parts();

    let Some(hit) = state.routes.match_route(&parts.method, parts.uri.path()) else {
        tracing::debug!(method = %parts.method, path = %parts.uri.path(), "No route matched");
        let response = forward::not_found();
        metrics::record_request(metrics::UNROUTED, response.status().as_u16(), started);
        return response;
    };

    let route = hit.route.target;
    let span = tracing::info_span!(
        "rpc",
        rpc = route.rpc.name(),
        route = %hit.route.template.pattern(),
        request_id = parts.headers.request_id().unwrap_or("-"),
    );

    let response = serve(&state, route, &hit.route.template, hit.params, parts, body, peer)
        .instrument(span)
        .await
        .unwrap_or_else(|status| {
            tracing::debug!(code = ?status.code(), message = status.message(), "Request rejected");
            forward::error_response(&status)
        });

    metrics::record_request(route.rpc.name(), response.status().as_u16(), started);
    response
}

/// Everything after a route matched. `Err` is a failure before dispatch.
async fn serve(
    state: &GatewayState,
    route: RpcRoute,
    template: &PathTemplate,
    raw: PathParams,
    parts: Parts,
    body: Body,
    peer: Option<SocketAddr>,
) -> Result<Response, Status> {
    let annotated = metadata::annotate(&parts.headers, peer)?;
    let params = TypedParams::bind(template, &raw)?;
    let bytes = if route.reads_body {
        read_body(body, state.max_body_bytes, state.read_timeout).await?
    } else {
        Bytes::new()
    };
    let request = (route.decode)(&params, bytes)?;

    // Cancelled when this future completes or is dropped with the connection.
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let call = RpcCall {
        request,
        metadata: annotated.metadata,
        timeout: annotated.timeout,
        cancel: cancel.clone(),
    };

    let dispatched = match annotated.timeout {
        Some(limit) => {
            let deadline = Instant::now() + limit;
            match tokio::time::timeout(limit, state.dispatcher.dispatch(call)).await {
                Ok(dispatched) => past_deadline(dispatched, deadline, Instant::now()),
                Err(_) => {
                    cancel.cancel();
                    deadline_exceeded()
                }
            }
        }
        None => state.dispatcher.dispatch(call).await,
    };

    match &dispatched.result {
        Ok(_) => tracing::debug!("RPC succeeded"),
        Err(status) => {
            tracing::debug!(code = ?status.code(), message = status.message(), "RPC failed")
        }
    }

    Ok(forward::forward(
        dispatched,
        metadata::wants_trailers(&parts.headers),
    ))
}

fn deadline_exceeded() -> Dispatched {
    Dispatched {
        result: Err(Status::deadline_exceeded("context deadline exceeded")),
        metadata: CallMetadata::default(),
    }
}

/// The gateway's deadline decides expiry. A remote server enforcing the same
/// `grpc-timeout` answers `Cancelled`, which can win the race against the
/// local timer; once the deadline has passed that answer is reported as
/// `DeadlineExceeded`, the same as in local mode.
fn past_deadline(dispatched: Dispatched, deadline: Instant, now: Instant) -> Dispatched {
    match &dispatched.result {
        Err(status) if status.code() == Code::Cancelled && now + DEADLINE_SLACK >= deadline => {
            deadline_exceeded()
        }
        _ => dispatched,
    }
}

/// Timer granularity between the gateway's clock and the remote call's.
const DEADLINE_SLACK: Duration = Duration::from_millis(5);

async fn read_body(body: Body, limit: usize, deadline: Duration) -> Result<Bytes, Status> {
    match tokio::time::timeout(deadline, axum::body::to_bytes(body, limit)).await {
        Ok(Ok(bytes)) => Ok(bytes),
        Ok(Err(err)) => Err(Status::invalid_argument(format!(
            "failed to read request body: {err}"
        ))),
        Err(_) => Err(Status::invalid_argument("timed out reading request body")),
    }
}
