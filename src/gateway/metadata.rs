//! Mapping between HTTP headers and gRPC metadata.
//!
//! # Responsibilities
//! - Annotate an incoming HTTP request as outgoing call metadata
//! - Parse `Grpc-Timeout` into a call deadline
//! - Collect header/trailer metadata produced by a call
//! - Render that metadata back as `Grpc-Metadata-*` headers and
//!   `Grpc-Trailer-*` trailers
//!
//! # Design Decisions
//! - Transport-owned keys are never forwarded in either direction
//! - Only headers with a stable meaning are forwarded under `grpcgateway-`;
//!   anything else must be opted in with the `Grpc-Metadata-` prefix

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use tonic::metadata::MetadataMap;
use tonic::Status;

/// Incoming header that carries explicit call metadata.
pub const METADATA_HEADER_PREFIX: &str = "grpc-metadata-";
/// Prefix for forwarded permanent HTTP headers.
pub const METADATA_PREFIX: &str = "grpcgateway-";
/// Prefix for response trailers carrying trailer metadata.
pub const METADATA_TRAILER_PREFIX: &str = "grpc-trailer-";

const GRPC_TIMEOUT: &str = "grpc-timeout";
const X_FORWARDED_HOST: &str = "x-forwarded-host";
const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Headers with a standard meaning, forwarded as `grpcgateway-<name>`.
const PERMANENT_HEADERS: &[&str] = &[
    "accept",
    "accept-charset",
    "accept-language",
    "accept-ranges",
    "cache-control",
    "content-type",
    "cookie",
    "date",
    "expect",
    "from",
    "if-match",
    "if-modified-since",
    "if-none-match",
    "if-schedule-tag-match",
    "if-unmodified-since",
    "max-forwards",
    "origin",
    "pragma",
    "referer",
    "user-agent",
    "via",
    "warning",
];

/// Keys owned by the HTTP/2 or gRPC transport.
pub fn is_reserved(key: &str) -> bool {
    matches!(
        key,
        "content-type"
            | "content-length"
            | "connection"
            | "date"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "user-agent"
            | "host"
    ) || key.starts_with("grpc-")
}

/// Outgoing call metadata plus the parsed deadline.
#[derive(Debug, Default)]
pub struct Annotated {
    pub metadata: MetadataMap,
    pub timeout: Option<Duration>,
}

/// Translate request headers into call metadata.
pub fn annotate(headers: &HeaderMap, peer: Option<SocketAddr>) -> Result<Annotated, Status> {
    let mut out = HeaderMap::new();

    for (name, value) in headers {
        let key = name.as_str();
        if key == header::AUTHORIZATION.as_str() {
            out.append(header::AUTHORIZATION, value.clone());
        } else if PERMANENT_HEADERS.contains(&key) {
            if let Ok(name) = HeaderName::try_from(format!("{METADATA_PREFIX}{key}")) {
                out.append(name, value.clone());
            }
        } else if let Some(stripped) = key.strip_prefix(METADATA_HEADER_PREFIX) {
            if stripped.is_empty() || is_reserved(stripped) {
                continue;
            }
            if let Ok(name) = HeaderName::try_from(stripped) {
                out.append(name, value.clone());
            }
        }
    }

    let forwarded_host = headers
        .get(X_FORWARDED_HOST)
        .or_else(|| headers.get(header::HOST));
    if let Some(host) = forwarded_host {
        out.insert(X_FORWARDED_HOST, host.clone());
    }

    if let Some(peer) = peer {
        let ip = peer.ip().to_string();
        let forwarded_for = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
            Some(chain) if !chain.is_empty() => format!("{chain}, {ip}"),
            _ => ip,
        };
        if let Ok(value) = HeaderValue::try_from(forwarded_for) {
            out.insert(X_FORWARDED_FOR, value);
        }
    }

    let timeout = match headers.get(GRPC_TIMEOUT) {
        Some(value) => {
            let text = value.to_str().unwrap_or_default();
            Some(parse_timeout(text).ok_or_else(|| {
                Status::invalid_argument(format!("invalid grpc-timeout: {text}"))
            })?)
        }
        None => None,
    };

    Ok(Annotated {
        metadata: MetadataMap::from_headers(out),
        timeout,
    })
}

/// Parse a `Grpc-Timeout` value: at most eight digits and a unit.
pub fn parse_timeout(text: &str) -> Option<Duration> {
    let unit = text.chars().last()?;
    let digits = &text[..text.len() - unit.len_utf8()];
    if digits.is_empty() || digits.len() > 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let amount: u64 = digits.parse().ok()?;
    let duration = match unit {
        'H' => Duration::from_secs(amount * 3600),
        'M' => Duration::from_secs(amount * 60),
        'S' => Duration::from_secs(amount),
        'm' => Duration::from_millis(amount),
        'u' => Duration::from_micros(amount),
        'n' => Duration::from_nanos(amount),
        _ => return None,
    };
    Some(duration)
}

/// Whether the client asked for HTTP trailers.
pub fn wants_trailers(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::TE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.to_ascii_lowercase().contains("trailers"))
}

/// Header and trailer metadata produced by one call.
#[derive(Debug, Clone, Default)]
pub struct CallMetadata {
    pub headers: HeaderMap,
    pub trailers: HeaderMap,
}

impl CallMetadata {
    /// Fold `other` into `self`, keeping every value.
    pub fn join(&mut self, other: CallMetadata) {
        append_all(&mut self.headers, other.headers);
        append_all(&mut self.trailers, other.trailers);
    }

    pub fn add_headers(&mut self, metadata: MetadataMap) {
        append_all(&mut self.headers, metadata.into_headers());
    }

    pub fn add_trailers(&mut self, metadata: MetadataMap) {
        append_all(&mut self.trailers, metadata.into_headers());
    }

    /// `Grpc-Metadata-<key>` response headers.
    pub fn response_headers(&self) -> HeaderMap {
        prefixed(&self.headers, METADATA_HEADER_PREFIX)
    }

    /// `Grpc-Trailer-<key>` response trailers.
    pub fn response_trailers(&self) -> HeaderMap {
        prefixed(&self.trailers, METADATA_TRAILER_PREFIX)
    }
}

fn append_all(into: &mut HeaderMap, from: HeaderMap) {
    let mut current: Option<HeaderName> = None;
    for (name, value) in from {
        if let Some(name) = name {
            current = Some(name);
        }
        if let Some(name) = &current {
            into.append(name.clone(), value);
        }
    }
}

fn prefixed(source: &HeaderMap, prefix: &str) -> HeaderMap {
    let mut out = HeaderMap::new();
    for (name, value) in source {
        if is_reserved(name.as_str()) {
            continue;
        }
        if let Ok(name) = HeaderName::try_from(format!("{prefix}{}", name.as_str())) {
            out.append(name, value.clone());
        }
    }
    out
}

/// Lets an in-process service set response headers and trailers.
///
/// The local dispatcher places a sink in the request extensions; a service
/// fetches it with `request.extensions().get::<MetadataSink>()`.
#[derive(Debug, Clone, Default)]
pub struct MetadataSink {
    inner: Arc<Mutex<CallMetadata>>,
}

impl MetadataSink {
    pub fn set_header(&self, name: HeaderName, value: HeaderValue) {
        self.with(|md| {
            md.headers.append(name, value);
        });
    }

    pub fn set_trailer(&self, name: HeaderName, value: HeaderValue) {
        self.with(|md| {
            md.trailers.append(name, value);
        });
    }

    /// Take everything recorded so far.
    pub fn take(&self) -> CallMetadata {
        self.with(std::mem::take)
    }

    fn with<R>(&self, f: impl FnOnce(&mut CallMetadata) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }
}
