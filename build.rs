//! Generates the `Rekor` tonic server and client.
//!
//! Messages are hand-written prost structs in `src/rpc/messages.rs`, so the
//! service is described here instead of in a `.proto` file and no `protoc`
//! is needed at build time.

use tonic_build::manual::{Builder, Method, Service};

const CODEC: &str = "tonic::codec::ProstCodec";

fn unary(name: &str, route: &str, input: &str, output: &str) -> Method {
    Method::builder()
        .name(name)
        .route_name(route)
        .input_type(input)
        .output_type(output)
        .codec_path(CODEC)
        .build()
}

fn main() {
    let service = Service::builder()
        .name("Rekor")
        .package("dev.sigstore.rekor.v2")
        .method(unary(
            "create_entry",
            "CreateEntry",
            "crate::rpc::CreateEntryRequest",
            "crate::rpc::TransparencyLogEntry",
        ))
        .method(unary(
            "get_tile",
            "GetTile",
            "crate::rpc::TileRequest",
            "crate::rpc::HttpBody",
        ))
        .method(unary(
            "get_partial_tile",
            "GetPartialTile",
            "crate::rpc::PartialTileRequest",
            "crate::rpc::HttpBody",
        ))
        .method(unary(
            "get_entry_bundle",
            "GetEntryBundle",
            "crate::rpc::EntryBundleRequest",
            "crate::rpc::HttpBody",
        ))
        .method(unary(
            "get_partial_entry_bundle",
            "GetPartialEntryBundle",
            "crate::rpc::PartialEntryBundleRequest",
            "crate::rpc::HttpBody",
        ))
        .method(unary(
            "get_checkpoint",
            "GetCheckpoint",
            "crate::rpc::Empty",
            "crate::rpc::HttpBody",
        ))
        .build();

    Builder::new().compile(&[service]);
}
