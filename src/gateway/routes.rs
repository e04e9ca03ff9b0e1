//! The REST surface of the Rekor service.

use axum::http::Method;
use bytes::Bytes;
use tonic::Status;

use crate::gateway::decode;
use crate::gateway::dispatch::RpcRequest;
use crate::gateway::params::TypedParams;
use crate::routing::{RouteError, RouteTable};
use crate::rpc::SERVICE_NAME;

/// The RPC methods reachable through the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RpcMethod {
    CreateEntry,
    GetTile,
    GetPartialTile,
    GetEntryBundle,
    GetPartialEntryBundle,
    GetCheckpoint,
}

impl RpcMethod {
    pub const ALL: [RpcMethod; 6] = [
        RpcMethod::CreateEntry,
        RpcMethod::GetTile,
        RpcMethod::GetPartialTile,
        RpcMethod::GetEntryBundle,
        RpcMethod::GetPartialEntryBundle,
        RpcMethod::GetCheckpoint,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            RpcMethod::CreateEntry => "CreateEntry",
            RpcMethod::GetTile => "GetTile",
            RpcMethod::GetPartialTile => "GetPartialTile",
            RpcMethod::GetEntryBundle => "GetEntryBundle",
            RpcMethod::GetPartialEntryBundle => "GetPartialEntryBundle",
            RpcMethod::GetCheckpoint => "GetCheckpoint",
        }
    }

    /// gRPC path, e.g. `/dev.sigstore.rekor.v2.Rekor/GetTile`.
    pub fn full_name(&self) -> String {
        format!("/{SERVICE_NAME}/{}", self.name())
    }
}

impl std::fmt::Display for RpcMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Builds a typed request from path parameters and the request body.
pub type DecodeFn = fn(&TypedParams, Bytes) -> Result<RpcRequest, Status>;

/// Route target: which RPC to call and how to build its request.
#[derive(Debug, Clone, Copy)]
pub struct RpcRoute {
    pub rpc: RpcMethod,
    pub decode: DecodeFn,
    /// Only routes that read the body have it buffered.
    pub reads_body: bool,
}

impl RpcRoute {
    fn new(rpc: RpcMethod, decode: DecodeFn) -> Self {
        Self {
            rpc,
            decode,
            reads_body: false,
        }
    }

    fn with_body(mut self) -> Self {
        self.reads_body = true;
        self
    }
}

/// Build the gateway's route table.
///
/// Entry-bundle routes are registered after the tile routes so that
/// `/api/v2/tile/entries/...` resolves to them.
pub fn rekor_routes() -> Result<RouteTable<RpcRoute>, RouteError> {
    let mut table = RouteTable::new();
    table.register(
        Method::POST,
        "/api/v2/log/entries",
        RpcRoute::new(RpcMethod::CreateEntry, decode::create_entry).with_body(),
    )?;
    table.register(
        Method::GET,
        "/api/v2/tile/{L:int32}/{N:int32}",
        RpcRoute::new(RpcMethod::GetTile, decode::get_tile),
    )?;
    table.register(
        Method::GET,
        "/api/v2/tile/{L:int32}/{N:string}/{W:int32}",
        RpcRoute::new(RpcMethod::GetPartialTile, decode::get_partial_tile),
    )?;
    table.register(
        Method::GET,
        "/api/v2/tile/entries/{N:int32}",
        RpcRoute::new(RpcMethod::GetEntryBundle, decode::get_entry_bundle),
    )?;
    table.register(
        Method::GET,
        "/api/v2/tile/entries/{N:string}/{W:int32}",
        RpcRoute::new(RpcMethod::GetPartialEntryBundle, decode::get_partial_entry_bundle),
    )?;
    table.register(
        Method::GET,
        "/api/v2/checkpoint",
        RpcRoute::new(RpcMethod::GetCheckpoint, decode::get_checkpoint),
    )?;
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(method: Method, path: &str) -> Option<RpcMethod> {
        let table = rekor_routes().unwrap();
        table.match_route(&method, path).map(|hit| hit.route.target.rpc)
    }

    #[test]
    fn every_method_has_one_route() {
        let table = rekor_routes().unwrap();
        for rpc in RpcMethod::ALL {
            assert_eq!(
                table.routes().iter().filter(|r| r.target.rpc == rpc).count(),
                1,
                "{rpc}"
            );
        }
    }

    #[test]
    fn resolves_each_path() {
        assert_eq!(resolve(Method::POST, "/api/v2/log/entries"), Some(RpcMethod::CreateEntry));
        assert_eq!(resolve(Method::GET, "/api/v2/tile/3/5"), Some(RpcMethod::GetTile));
        assert_eq!(resolve(Method::GET, "/api/v2/tile/3/x001/9"), Some(RpcMethod::GetPartialTile));
        assert_eq!(resolve(Method::GET, "/api/v2/checkpoint"), Some(RpcMethod::GetCheckpoint));
    }

    #[test]
    fn entry_bundles_shadow_tiles() {
        assert_eq!(
            resolve(Method::GET, "/api/v2/tile/entries/7"),
            Some(RpcMethod::GetEntryBundle)
        );
        assert_eq!(
            resolve(Method::GET, "/api/v2/tile/entries/x001/7"),
            Some(RpcMethod::GetPartialEntryBundle)
        );
    }

    #[test]
    fn wrong_method_is_unrouted() {
        assert_eq!(resolve(Method::GET, "/api/v2/log/entries"), None);
        assert_eq!(resolve(Method::POST, "/api/v2/checkpoint"), None);
    }

    #[test]
    fn only_create_entry_reads_the_body() {
        let table = rekor_routes().unwrap();
        for route in table.routes() {
            assert_eq!(route.target.reads_body, route.target.rpc == RpcMethod::CreateEntry);
        }
    }

    #[test]
    fn full_names_are_grpc_paths() {
        assert_eq!(
            RpcMethod::GetTile.full_name(),
            "/dev.sigstore.rekor.v2.Rekor/GetTile"
        );
    }
}
