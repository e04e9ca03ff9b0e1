//! Dispatching typed requests to the Rekor service.
//!
//! # Responsibilities
//! - Invoke the right RPC for an [`RpcRequest`]
//! - Return the reply together with the header and trailer metadata the
//!   call produced, on success and failure alike
//!
//! # Design Decisions
//! - One trait, two implementations chosen once at startup
//! - Errors pass through untouched; no retries
//! - The remote client is cloned per call from one lazily connected channel

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tonic::metadata::MetadataMap;
use tonic::transport::{Channel, Endpoint};
use tonic::{Extensions, Request, Response, Status};

use crate::config::DispatchMode;
use crate::error::GatewayError;
use crate::gateway::metadata::{CallMetadata, MetadataSink};
use crate::gateway::routes::RpcMethod;
use crate::rpc::{
    CreateEntryRequest, Empty, EntryBundleRequest, HttpBody, PartialEntryBundleRequest,
    PartialTileRequest, Rekor, RekorClient, TileRequest, TransparencyLogEntry,
};

/// A fully decoded request for one RPC method.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcRequest {
    CreateEntry(CreateEntryRequest),
    GetTile(TileRequest),
    GetPartialTile(PartialTileRequest),
    GetEntryBundle(EntryBundleRequest),
    GetPartialEntryBundle(PartialEntryBundleRequest),
    GetCheckpoint,
}

impl RpcRequest {
    pub fn method(&self) -> RpcMethod {
        match self {
            RpcRequest::CreateEntry(_) => RpcMethod::CreateEntry,
            RpcRequest::GetTile(_) => RpcMethod::GetTile,
            RpcRequest::GetPartialTile(_) => RpcMethod::GetPartialTile,
            RpcRequest::GetEntryBundle(_) => RpcMethod::GetEntryBundle,
            RpcRequest::GetPartialEntryBundle(_) => RpcMethod::GetPartialEntryBundle,
            RpcRequest::GetCheckpoint => RpcMethod::GetCheckpoint,
        }
    }
}

/// A successful RPC response.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcReply {
    Entry(TransparencyLogEntry),
    Body(HttpBody),
}

/// Everything needed to perform one call.
#[derive(Debug)]
pub struct RpcCall {
    pub request: RpcRequest,
    pub metadata: MetadataMap,
    pub timeout: Option<Duration>,
    pub cancel: CancellationToken,
}

impl RpcCall {
    pub fn new(request: RpcRequest) -> Self {
        Self {
            request,
            metadata: MetadataMap::new(),
            timeout: None,
            cancel: CancellationToken::new(),
        }
    }
}

/// Outcome of a call.
#[derive(Debug)]
pub struct Dispatched {
    pub result: Result<RpcReply, Status>,
    pub metadata: CallMetadata,
}

impl Dispatched {
    fn from_result<T>(result: Result<Response<T>, Status>, wrap: fn(T) -> RpcReply) -> Self {
        let mut metadata = CallMetadata::default();
        let result = match result {
            Ok(response) => {
                let (headers, message, _) = response.into_parts();
                metadata.add_headers(headers);
                Ok(wrap(message))
            }
            Err(status) => {
                metadata.add_trailers(status.metadata().clone());
                Err(status)
            }
        };
        Self { result, metadata }
    }
}

/// Performs calls against the Rekor service.
#[async_trait]
pub trait Dispatcher: Send + Sync + 'static {
    async fn dispatch(&self, call: RpcCall) -> Dispatched;

    fn mode(&self) -> DispatchMode;
}

/// Calls an in-process service directly.
pub struct LocalDispatcher<S> {
    service: Arc<S>,
}

impl<S: Rekor> LocalDispatcher<S> {
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S: Rekor> Dispatcher for LocalDispatcher<S> {
    async fn dispatch(&self, call: RpcCall) -> Dispatched {
        let sink = MetadataSink::default();
        let mut extensions = Extensions::new();
        extensions.insert(sink.clone());
        extensions.insert(call.cancel.clone());

        let metadata = call.metadata;
        let service = &self.service;

        let mut dispatched = match call.request {
            RpcRequest::CreateEntry(message) => Dispatched::from_result(
                service
                    .create_entry(Request::from_parts(metadata, extensions, message))
                    .await,
                RpcReply::Entry,
            ),
            RpcRequest::GetTile(message) => Dispatched::from_result(
                service
                    .get_tile(Request::from_parts(metadata, extensions, message))
                    .await,
                RpcReply::Body,
            ),
            RpcRequest::GetPartialTile(message) => Dispatched::from_result(
                service
                    .get_partial_tile(Request::from_parts(metadata, extensions, message))
                    .await,
                RpcReply::Body,
            ),
            RpcRequest::GetEntryBundle(message) => Dispatched::from_result(
                service
                    .get_entry_bundle(Request::from_parts(metadata, extensions, message))
                    .await,
                RpcReply::Body,
            ),
            RpcRequest::GetPartialEntryBundle(message) => Dispatched::from_result(
                service
                    .get_partial_entry_bundle(Request::from_parts(metadata, extensions, message))
                    .await,
                RpcReply::Body,
            ),
            RpcRequest::GetCheckpoint => Dispatched::from_result(
                service
                    .get_checkpoint(Request::from_parts(metadata, extensions, Empty {}))
                    .await,
                RpcReply::Body,
            ),
        };

        dispatched.metadata.join(sink.take());
        dispatched
    }

    fn mode(&self) -> DispatchMode {
        DispatchMode::Local
    }
}

/// Forwards calls over a gRPC client connection.
#[derive(Clone)]
pub struct RemoteDispatcher {
    client: RekorClient<Channel>,
}

impl RemoteDispatcher {
    pub fn new(channel: Channel) -> Self {
        Self {
            client: RekorClient::new(channel),
        }
    }

    /// Channel to `address` that connects on first use.
    pub fn connect_lazy(address: std::net::SocketAddr) -> Result<Self, GatewayError> {
        let channel = Endpoint::from_shared(format!("http://{address}"))?.connect_lazy();
        Ok(Self::new(channel))
    }
}

fn outgoing<T>(metadata: MetadataMap, timeout: Option<Duration>, message: T) -> Request<T> {
    let mut request = Request::from_parts(metadata, Extensions::new(), message);
    if let Some(timeout) = timeout {
        request.set_timeout(timeout);
    }
    request
}

#[async_trait]
impl Dispatcher for RemoteDispatcher {
    async fn dispatch(&self, call: RpcCall) -> Dispatched {
        let mut client = self.client.clone();
        let RpcCall {
            request,
            metadata,
            timeout,
            ..
        } = call;

        match request {
            RpcRequest::CreateEntry(message) => Dispatched::from_result(
                client.create_entry(outgoing(metadata, timeout, message)).await,
                RpcReply::Entry,
            ),
            RpcRequest::GetTile(message) => Dispatched::from_result(
                client.get_tile(outgoing(metadata, timeout, message)).await,
                RpcReply::Body,
            ),
            RpcRequest::GetPartialTile(message) => Dispatched::from_result(
                client.get_partial_tile(outgoing(metadata, timeout, message)).await,
                RpcReply::Body,
            ),
            RpcRequest::GetEntryBundle(message) => Dispatched::from_result(
                client.get_entry_bundle(outgoing(metadata, timeout, message)).await,
                RpcReply::Body,
            ),
            RpcRequest::GetPartialEntryBundle(message) => Dispatched::from_result(
                client
                    .get_partial_entry_bundle(outgoing(metadata, timeout, message))
                    .await,
                RpcReply::Body,
            ),
            RpcRequest::GetCheckpoint => Dispatched::from_result(
                client.get_checkpoint(outgoing(metadata, timeout, Empty {})).await,
                RpcReply::Body,
            ),
        }
    }

    fn mode(&self) -> DispatchMode {
        DispatchMode::Remote
    }
}
