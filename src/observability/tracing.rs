//! Request spans.
//!
//! `TraceLayer` opens one span per HTTP request; the gateway handler nests
//! an `rpc` span inside it once the route is known.

use axum::body::Body;
use axum::http::Request;
use tracing::Span;

use crate::http::request::RequestIdExt;

/// Span factory for `tower_http::trace::TraceLayer`.
pub fn http_span(request: &Request<Body>) -> Span {
    tracing::info_span!(
        "http",
        method = %request.method(),
        path = %request.uri().path(),
        request_id = request.headers().request_id().unwrap_or("-"),
    )
}
