//! HTTP-to-RPC gateway.
//!
//! # Data Flow
//! ```text
//! HTTP request
//!     → router.rs (per-request pipeline)
//!     → routes.rs (route table of RpcRoute targets)
//!     → params.rs + decode.rs (typed RpcRequest)
//!     → metadata.rs (headers → call metadata)
//!     → dispatch.rs (LocalDispatcher | RemoteDispatcher)
//!     → forward.rs (HTTP status, JSON or raw body, metadata headers)
//! ```
//!
//! # Design Decisions
//! - Route entries are an explicit descriptor table built once at startup
//! - Local and remote invocation share one `Dispatcher` trait and produce the
//!   same `Dispatched` shape, so responses are identical in both modes
//! - Per-request cancellation is separate from process shutdown

pub mod decode;
pub mod dispatch;
pub mod forward;
pub mod metadata;
pub mod params;
pub mod router;
pub mod routes;

pub use dispatch::{
    Dispatched, Dispatcher, LocalDispatcher, RemoteDispatcher, RpcCall, RpcReply, RpcRequest,
};
pub use metadata::{CallMetadata, MetadataSink};
pub use router::{gateway_router, GatewayState};
pub use routes::{rekor_routes, RpcMethod, RpcRoute};
