//! Rendering call outcomes as HTTP responses.
//!
//! # Responsibilities
//! - Map every gRPC status code to exactly one HTTP status
//! - Render replies as JSON or as raw `HttpBody` bytes
//! - Render errors as the `{code, message, details}` envelope
//! - Attach call metadata as prefixed headers, and as trailers when the
//!   client accepts them
//!
//! # Design Decisions
//! - A reply that fails to serialize becomes a 500 with code `Internal`;
//!   it is never dropped silently
//! - Trailers are carried by a streamed body so hyper can emit them on
//!   chunked HTTP/1.1 and HTTP/2 alike

use std::convert::Infallible;

use axum::body::Body;
use axum::http::header::{self, HeaderMap, HeaderValue};
use axum::http::StatusCode;
use axum::response::Response;
use bytes::Bytes;
use futures_util::stream;
use http_body::Frame;
use http_body_util::StreamBody;
use serde::Serialize;
use tonic::{Code, Status};

use crate::gateway::dispatch::{Dispatched, RpcReply};
use crate::gateway::metadata::CallMetadata;

const APPLICATION_JSON: &str = "application/json";
const OCTET_STREAM: &str = "application/octet-stream";

/// HTTP status for a gRPC status code.
pub fn http_status(code: Code) -> StatusCode {
    match code {
        Code::Ok => StatusCode::OK,
        Code::Cancelled => client_closed_request(),
        Code::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
        Code::InvalidArgument => StatusCode::BAD_REQUEST,
        Code::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        Code::NotFound => StatusCode::NOT_FOUND,
        Code::AlreadyExists => StatusCode::CONFLICT,
        Code::PermissionDenied => StatusCode::FORBIDDEN,
        Code::ResourceExhausted => StatusCode::TOO_MANY_REQUESTS,
        Code::FailedPrecondition => StatusCode::BAD_REQUEST,
        Code::Aborted => StatusCode::CONFLICT,
        Code::OutOfRange => StatusCode::BAD_REQUEST,
        Code::Unimplemented => StatusCode::NOT_IMPLEMENTED,
        Code::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        Code::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        Code::DataLoss => StatusCode::INTERNAL_SERVER_ERROR,
        Code::Unauthenticated => StatusCode::UNAUTHORIZED,
    }
}

/// Non-standard 499, used for cancelled calls.
fn client_closed_request() -> StatusCode {
    StatusCode::from_u16(499).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// JSON error envelope.
#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    pub code: i32,
    pub message: &'a str,
    pub details: Vec<serde_json::Value>,
}

/// Render a finished call.
pub fn forward(dispatched: Dispatched, wants_trailers: bool) -> Response {
    let Dispatched { result, metadata } = dispatched;
    let rendered = match result {
        Ok(reply) => render_reply(reply),
        Err(status) => Err(status),
    };
    match rendered {
        Ok((content_type, bytes)) => {
            respond(StatusCode::OK, content_type, bytes, &metadata, wants_trailers)
        }
        Err(status) => render_error(&status, &metadata, wants_trailers),
    }
}

/// Render a status with no call metadata, for failures before dispatch.
pub fn error_response(status: &Status) -> Response {
    render_error(status, &CallMetadata::default(), false)
}

/// The response for a request no route matched.
pub fn not_found() -> Response {
    error_response(&Status::not_found("Not Found"))
}

fn render_reply(reply: RpcReply) -> Result<(HeaderValue, Bytes), Status> {
    match reply {
        RpcReply::Entry(entry) => serde_json::to_vec(&entry)
            .map(|json| (HeaderValue::from_static(APPLICATION_JSON), Bytes::from(json)))
            .map_err(|err| Status::internal(format!("failed to marshal response: {err}"))),
        RpcReply::Body(body) => {
            let content_type = if body.content_type.is_empty() {
                HeaderValue::from_static(OCTET_STREAM)
            } else {
                HeaderValue::from_str(&body.content_type)
                    .unwrap_or_else(|_| HeaderValue::from_static(OCTET_STREAM))
            };
            Ok((content_type, Bytes::from(body.data)))
        }
    }
}

fn render_error(status: &Status, metadata: &CallMetadata, wants_trailers: bool) -> Response {
    let envelope = ErrorBody {
        code: status.code() as i32,
        message: status.message(),
        details: Vec::new(),
    };
    let (http, body) = match serde_json::to_vec(&envelope) {
        Ok(json) => (http_status(status.code()), Bytes::from(json)),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Bytes::from_static(br#"{"code":13,"message":"failed to marshal error message","details":[]}"#),
        ),
    };

    let mut response = respond(
        http,
        HeaderValue::from_static(APPLICATION_JSON),
        body,
        metadata,
        wants_trailers,
    );
    if status.code() == Code::Unauthenticated {
        if let Ok(challenge) = HeaderValue::from_str(status.message()) {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, challenge);
        }
    }
    response
}

fn respond(
    status: StatusCode,
    content_type: HeaderValue,
    bytes: Bytes,
    metadata: &CallMetadata,
    wants_trailers: bool,
) -> Response {
    let trailers = if wants_trailers {
        metadata.response_trailers()
    } else {
        HeaderMap::new()
    };

    let body = if trailers.is_empty() {
        Body::from(bytes)
    } else {
        Body::new(with_trailers(bytes, trailers.clone()))
    };

    let mut response = Response::new(body);
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.extend(metadata.response_headers());
    headers.insert(header::CONTENT_TYPE, content_type);
    if !trailers.is_empty() {
        let announced = trailers
            .keys()
            .map(|name| name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        if let Ok(value) = HeaderValue::from_str(&announced) {
            headers.insert(header::TRAILER, value);
        }
    }
    response
}

fn with_trailers(
    bytes: Bytes,
    trailers: HeaderMap,
) -> StreamBody<impl futures_util::Stream<Item = Result<Frame<Bytes>, Infallible>>> {
    StreamBody::new(stream::iter([
        Ok(Frame::data(bytes)),
        Ok(Frame::trailers(trailers)),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderName;
    use http_body_util::BodyExt;

    use crate::rpc::{HttpBody, TransparencyLogEntry};

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn status_table_is_total() {
        let expected = [
            (Code::Ok, 200),
            (Code::Cancelled, 499),
            (Code::Unknown, 500),
            (Code::InvalidArgument, 400),
            (Code::DeadlineExceeded, 504),
            (Code::NotFound, 404),
            (Code::AlreadyExists, 409),
            (Code::PermissionDenied, 403),
            (Code::ResourceExhausted, 429),
            (Code::FailedPrecondition, 400),
            (Code::Aborted, 409),
            (Code::OutOfRange, 400),
            (Code::Unimplemented, 501),
            (Code::Internal, 500),
            (Code::Unavailable, 503),
            (Code::DataLoss, 500),
            (Code::Unauthenticated, 401),
        ];
        for (code, http) in expected {
            assert_eq!(http_status(code).as_u16(), http, "{code:?}");
        }
    }

    #[tokio::test]
    async fn not_found_envelope() {
        let response = not_found();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            APPLICATION_JSON
        );
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"code": 5, "message": "Not Found", "details": []})
        );
    }

    #[tokio::test]
    async fn entry_renders_as_json() {
        let dispatched = Dispatched {
            result: Ok(RpcReply::Entry(TransparencyLogEntry {
                log_index: 3,
                ..Default::default()
            })),
            metadata: CallMetadata::default(),
        };
        let response = forward(dispatched, false);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["logIndex"], "3");
    }

    #[tokio::test]
    async fn http_body_is_written_raw() {
        let dispatched = Dispatched {
            result: Ok(RpcReply::Body(HttpBody::new("", vec![1, 2, 3]))),
            metadata: CallMetadata::default(),
        };
        let response = forward(dispatched, false);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            OCTET_STREAM
        );
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], &[1, 2, 3]);
    }

    #[tokio::test]
    async fn unauthenticated_sets_challenge() {
        let response = error_response(&Status::unauthenticated("Bearer realm=\"rekor\""));
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer realm=\"rekor\""
        );
    }

    #[tokio::test]
    async fn metadata_becomes_headers_and_trailers() {
        let mut metadata = CallMetadata::default();
        metadata
            .headers
            .insert(HeaderName::from_static("x-h"), HeaderValue::from_static("1"));
        metadata
            .trailers
            .insert(HeaderName::from_static("x-t"), HeaderValue::from_static("2"));
        let dispatched = Dispatched {
            result: Ok(RpcReply::Body(HttpBody::new("text/plain", b"ok".to_vec()))),
            metadata: metadata.clone(),
        };

        let response = forward(dispatched, true);
        assert_eq!(response.headers().get("grpc-metadata-x-h").unwrap(), "1");
        assert_eq!(response.headers().get(header::TRAILER).unwrap(), "grpc-trailer-x-t");
        let collected = response.into_body().collect().await.unwrap();
        assert_eq!(
            collected.trailers().unwrap().get("grpc-trailer-x-t").unwrap(),
            "2"
        );
        assert_eq!(&collected.to_bytes()[..], b"ok");

        let dispatched = Dispatched {
            result: Err(Status::aborted("conflict")),
            metadata,
        };
        let response = forward(dispatched, false);
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert!(response.headers().get(header::TRAILER).is_none());
        let collected = response.into_body().collect().await.unwrap();
        assert!(collected.trailers().is_none());
    }
}
