//! Per-method request decoders.
//!
//! Each decoder turns typed path parameters and, for `CreateEntry`, the
//! request body into an [`RpcRequest`]. A request is only produced when every
//! field it declares decoded.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use tonic::Status;

use crate::gateway::dispatch::RpcRequest;
use crate::gateway::params::TypedParams;
use crate::rpc::{
    CreateEntryRequest, EntryBundleRequest, PartialEntryBundleRequest, PartialTileRequest,
    TileRequest,
};

/// Decode the first JSON value in a body; anything after it is ignored.
/// Blank bodies decode to the default message.
pub fn json_body<T>(body: &[u8]) -> Result<T, Status>
where
    T: DeserializeOwned + Default,
{
    match serde_json::Deserializer::from_slice(body).into_iter::<T>().next() {
        Some(Ok(message)) => Ok(message),
        Some(Err(err)) => Err(Status::invalid_argument(err.to_string())),
        None => Ok(T::default()),
    }
}

pub fn create_entry(_params: &TypedParams, body: Bytes) -> Result<RpcRequest, Status> {
    let request: CreateEntryRequest = json_body(&body)?;
    Ok(RpcRequest::CreateEntry(request))
}

pub fn get_tile(params: &TypedParams, _body: Bytes) -> Result<RpcRequest, Status> {
    Ok(RpcRequest::GetTile(TileRequest {
        l: params.int32("L")?,
        n: params.int32("N")?,
    }))
}

pub fn get_partial_tile(params: &TypedParams, _body: Bytes) -> Result<RpcRequest, Status> {
    Ok(RpcRequest::GetPartialTile(PartialTileRequest {
        l: params.int32("L")?,
        n: params.string("N")?,
        w: params.int32("W")?,
    }))
}

pub fn get_entry_bundle(params: &TypedParams, _body: Bytes) -> Result<RpcRequest, Status> {
    Ok(RpcRequest::GetEntryBundle(EntryBundleRequest {
        n: params.int32("N")?,
    }))
}

pub fn get_partial_entry_bundle(params: &TypedParams, _body: Bytes) -> Result<RpcRequest, Status> {
    Ok(RpcRequest::GetPartialEntryBundle(PartialEntryBundleRequest {
        n: params.string("N")?,
        w: params.int32("W")?,
    }))
}

pub fn get_checkpoint(_params: &TypedParams, _body: Bytes) -> Result<RpcRequest, Status> {
    Ok(RpcRequest::GetCheckpoint)
}
