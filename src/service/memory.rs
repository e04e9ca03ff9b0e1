//! In-memory transparency log implementing the `Rekor` service.
//!
//! Entries are appended to a single RFC 6962 tree and integrated
//! immediately, so every accepted entry comes back with an inclusion proof
//! against the checkpoint that first contains it.
//!
//! Tiles follow the tlog-tiles layout: 256 hashes per tile, level `L`
//! holding nodes at tree height `8 * L`. Entry bundles hold the same 256
//! entries, each prefixed with its length as a big-endian `u16`.

use std::collections::HashMap;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status};

use crate::config::LogConfig;
use crate::rpc::json::key_details;
use crate::rpc::create_entry_request::Spec;
use crate::rpc::{
    Checkpoint, CreateEntryRequest, DsseRequestV002, Empty, EntryBundleRequest,
    HashedRekordRequestV002, HttpBody, InclusionProof, KindVersion, LogId,
    PartialEntryBundleRequest, PartialTileRequest, Rekor, TileRequest, TransparencyLogEntry,
    Verifier,
};
use crate::service::merkle::{Hash, MerkleTree};

/// Hashes or entries per full tile.
pub const TILE_WIDTH: u64 = 256;

/// Tree height covered by one tile level.
const TILE_HEIGHT: usize = 8;

const ENTRY_VERSION: &str = "0.0.2";
const CHECKPOINT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";
const TILE_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Default)]
struct LogState {
    tree: MerkleTree,
    entries: Vec<Vec<u8>>,
    by_body: HashMap<Hash, u64>,
}

/// Append-only log held in process memory.
pub struct MemoryLog {
    origin: String,
    log_id: Vec<u8>,
    state: RwLock<LogState>,
}

impl MemoryLog {
    pub fn new(origin: impl Into<String>) -> Self {
        let origin = origin.into();
        let log_id = Sha256::digest(origin.as_bytes()).to_vec();
        Self {
            origin,
            log_id,
            state: RwLock::new(LogState::default()),
        }
    }

    pub fn from_config(config: &LogConfig) -> Self {
        Self::new(config.origin.clone())
    }

    pub async fn size(&self) -> u64 {
        self.state.read().await.tree.size()
    }

    fn checkpoint(&self, size: u64, root: &Hash) -> String {
        format!("{}\n{}\n{}\n", self.origin, size, STANDARD.encode(root))
    }
}

/// An entry's kind and canonical JSON body.
struct Canonical {
    kind: &'static str,
    body: Vec<u8>,
}

fn canonicalize(spec: Option<Spec>) -> Result<Canonical, Status> {
    let (kind, spec) = match spec {
        Some(Spec::HashedRekordRequestV002(request)) => ("hashedrekord", hashed_rekord(request)?),
        Some(Spec::DsseRequestV002(request)) => ("dsse", dsse(request)?),
        None => return Err(Status::invalid_argument("missing entry spec")),
    };
    let body = json!({
        "apiVersion": ENTRY_VERSION,
        "kind": kind,
        "spec": spec,
    });
    let body = serde_json::to_vec(&body)
        .map_err(|err| Status::internal(format!("failed to encode entry: {err}")))?;
    if body.len() > usize::from(u16::MAX) {
        return Err(Status::invalid_argument("entry too large"));
    }
    Ok(Canonical { kind, body })
}

fn hashed_rekord(request: HashedRekordRequestV002) -> Result<Value, Status> {
    if request.digest.is_empty() {
        return Err(Status::invalid_argument("missing digest"));
    }
    let signature = request
        .signature
        .ok_or_else(|| Status::invalid_argument("missing signature"))?;
    if signature.content.is_empty() {
        return Err(Status::invalid_argument("missing signature content"));
    }
    let verifier = verifier(signature.verifier.as_ref())?;
    Ok(json!({
        "hashedRekordV002": {
            "data": {"algorithm": "SHA2_256", "digest": STANDARD.encode(&request.digest)},
            "signature": {"content": STANDARD.encode(&signature.content), "verifier": verifier},
        }
    }))
}

fn dsse(request: DsseRequestV002) -> Result<Value, Status> {
    let envelope = request
        .envelope
        .ok_or_else(|| Status::invalid_argument("missing envelope"))?;
    if envelope.payload.is_empty() {
        return Err(Status::invalid_argument("missing envelope payload"));
    }
    if envelope.signatures.is_empty() {
        return Err(Status::invalid_argument("envelope has no signatures"));
    }
    if request.verifiers.is_empty() {
        return Err(Status::invalid_argument("missing verifiers"));
    }
    let verifiers = request
        .verifiers
        .iter()
        .map(|v| verifier(Some(v)))
        .collect::<Result<Vec<_>, _>>()?;
    let signatures: Vec<Value> = envelope
        .signatures
        .iter()
        .map(|signature| json!({"content": STANDARD.encode(&signature.sig), "keyid": signature.keyid}))
        .collect();
    let payload_hash = Sha256::digest(&envelope.payload);
    Ok(json!({
        "dsseV002": {
            "payloadHash": {"algorithm": "SHA2_256", "digest": STANDARD.encode(payload_hash)},
            "payloadType": envelope.payload_type,
            "signatures": signatures,
            "verifiers": verifiers,
        }
    }))
}

fn verifier(verifier: Option<&Verifier>) -> Result<Value, Status> {
    let missing = || Status::invalid_argument("missing verifier");
    let verifier = verifier.ok_or_else(missing)?;
    let material = match (&verifier.public_key, &verifier.x509_certificate) {
        (Some(key), _) if !key.raw_bytes.is_empty() => {
            json!({"publicKey": {"rawBytes": STANDARD.encode(&key.raw_bytes)}})
        }
        (_, Some(cert)) if !cert.raw_bytes.is_empty() => {
            json!({"x509Certificate": {"rawBytes": STANDARD.encode(&cert.raw_bytes)}})
        }
        _ => return Err(missing()),
    };
    let mut material = material;
    material["keyDetails"] = match key_details::name(verifier.key_details) {
        Some(name) => json!(name),
        None => json!(verifier.key_details),
    };
    Ok(material)
}

/// Parse a tile index given either in decimal or as a tlog path
/// (`x001/x234/067`).
fn parse_index(text: &str) -> Result<u64, Status> {
    let invalid = || Status::invalid_argument(format!("invalid tile index {text:?}"));
    if !text.contains('/') && !text.starts_with('x') {
        return text.parse().map_err(|_| invalid());
    }
    let mut index: u64 = 0;
    let mut parts = text.split('/').peekable();
    while let Some(part) = parts.next() {
        let digits = match (part.strip_prefix('x'), parts.peek()) {
            (Some(digits), Some(_)) => digits,
            (None, None) => part,
            _ => return Err(invalid()),
        };
        if digits.len() != 3 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let group: u64 = digits.parse().map_err(|_| invalid())?;
        index = index
            .checked_mul(1000)
            .and_then(|i| i.checked_add(group))
            .ok_or_else(invalid)?;
    }
    Ok(index)
}

fn non_negative(name: &str, value: i32) -> Result<u64, Status> {
    u64::try_from(value).map_err(|_| Status::invalid_argument(format!("{name} must not be negative")))
}

fn partial_width(value: i32) -> Result<u64, Status> {
    match u64::try_from(value) {
        Ok(width) if (1..TILE_WIDTH).contains(&width) => Ok(width),
        _ => Err(Status::invalid_argument(format!(
            "partial width must be between 1 and {}, got {value}",
            TILE_WIDTH - 1
        ))),
    }
}

impl LogState {
    fn tile(&self, level: i32, index: u64, width: u64) -> Result<HttpBody, Status> {
        let height = non_negative("level", level)?
            .checked_mul(TILE_HEIGHT as u64)
            .and_then(|h| usize::try_from(h).ok())
            .filter(|h| *h < 64)
            .ok_or_else(|| Status::invalid_argument(format!("tile level {level} out of range")))?;
        let start = index
            .checked_mul(TILE_WIDTH)
            .ok_or_else(|| Status::invalid_argument("tile index out of range"))?;
        if self.tree.width(height) < start.saturating_add(width) {
            return Err(Status::not_found(format!("tile {level}/{index} not available")));
        }
        let mut data = Vec::with_capacity(width as usize * 32);
        for i in start..start + width {
            let hash = self
                .tree
                .node(height, i)
                .ok_or_else(|| Status::internal("tile hash missing"))?;
            data.extend_from_slice(&hash);
        }
        Ok(HttpBody::new(TILE_CONTENT_TYPE, data))
    }

    fn bundle(&self, index: u64, width: u64) -> Result<HttpBody, Status> {
        let start = index
            .checked_mul(TILE_WIDTH)
            .and_then(|s| usize::try_from(s).ok())
            .ok_or_else(|| Status::invalid_argument("bundle index out of range"))?;
        let end = start.saturating_add(width as usize);
        let Some(entries) = self.entries.get(start..end) else {
            return Err(Status::not_found(format!("entry bundle {index} not available")));
        };
        let mut data = Vec::new();
        for entry in entries {
            data.extend_from_slice(&(entry.len() as u16).to_be_bytes());
            data.extend_from_slice(entry);
        }
        Ok(HttpBody::new(TILE_CONTENT_TYPE, data))
    }
}

#[async_trait]
impl Rekor for MemoryLog {
    async fn create_entry(
        &self,
        request: Request<CreateEntryRequest>,
    ) -> Result<Response<TransparencyLogEntry>, Status> {
        let cancel = request.extensions().get::<CancellationToken>().cloned();
        let canonical = canonicalize(request.into_inner().spec)?;
        let key: Hash = Sha256::digest(&canonical.body).into();

        let mut state = self.state.write().await;
        if let Some(existing) = state.by_body.get(&key) {
            return Err(Status::already_exists(format!(
                "entry already exists at index {existing}"
            )));
        }
        if cancel.is_some_and(|token| token.is_cancelled()) {
            return Err(Status::cancelled("request cancelled before integration"));
        }

        let index = state.tree.push(&canonical.body);
        state.entries.push(canonical.body.clone());
        state.by_body.insert(key, index);

        let size = state.tree.size();
        let root = state.tree.root();
        let hashes = state
            .tree
            .inclusion_proof(index, size)
            .ok_or_else(|| Status::internal("inclusion proof unavailable"))?;
        drop(state);

        tracing::info!(index, kind = canonical.kind, "Entry integrated");

        let index = i64::try_from(index).map_err(|_| Status::internal("log index overflow"))?;
        let size = i64::try_from(size).map_err(|_| Status::internal("tree size overflow"))?;
        Ok(Response::new(TransparencyLogEntry {
            log_index: index,
            log_id: Some(LogId {
                key_id: self.log_id.clone(),
            }),
            kind_version: Some(KindVersion {
                kind: canonical.kind.to_string(),
                version: ENTRY_VERSION.to_string(),
            }),
            inclusion_proof: Some(InclusionProof {
                log_index: index,
                root_hash: root.to_vec(),
                tree_size: size,
                hashes: hashes.iter().map(|hash| hash.to_vec()).collect(),
                checkpoint: Some(Checkpoint {
                    envelope: self.checkpoint(size as u64, &root),
                }),
            }),
            canonicalized_body: canonical.body,
        }))
    }

    async fn get_tile(&self, request: Request<TileRequest>) -> Result<Response<HttpBody>, Status> {
        let TileRequest { l, n } = request.into_inner();
        let index = non_negative("tile index", n)?;
        let state = self.state.read().await;
        state.tile(l, index, TILE_WIDTH).map(Response::new)
    }

    async fn get_partial_tile(
        &self,
        request: Request<PartialTileRequest>,
    ) -> Result<Response<HttpBody>, Status> {
        let PartialTileRequest { l, n, w } = request.into_inner();
        let index = parse_index(&n)?;
        let width = partial_width(w)?;
        let state = self.state.read().await;
        state.tile(l, index, width).map(Response::new)
    }

    async fn get_entry_bundle(
        &self,
        request: Request<EntryBundleRequest>,
    ) -> Result<Response<HttpBody>, Status> {
        let index = non_negative("bundle index", request.into_inner().n)?;
        let state = self.state.read().await;
        state.bundle(index, TILE_WIDTH).map(Response::new)
    }

    async fn get_partial_entry_bundle(
        &self,
        request: Request<PartialEntryBundleRequest>,
    ) -> Result<Response<HttpBody>, Status> {
        let PartialEntryBundleRequest { n, w } = request.into_inner();
        let index = parse_index(&n)?;
        let width = partial_width(w)?;
        let state = self.state.read().await;
        state.bundle(index, width).map(Response::new)
    }

    async fn get_checkpoint(&self, _: Request<Empty>) -> Result<Response<HttpBody>, Status> {
        let state = self.state.read().await;
        let note = self.checkpoint(state.tree.size(), &state.tree.root());
        Ok(Response::new(HttpBody::new(
            CHECKPOINT_CONTENT_TYPE,
            note.into_bytes(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::{Envelope, EnvelopeSignature, PublicKey, Signature};
    use tonic::Code;

    fn hashed(digest: &[u8]) -> CreateEntryRequest {
        CreateEntryRequest {
            spec: Some(Spec::HashedRekordRequestV002(HashedRekordRequestV002 {
                digest: digest.to_vec(),
                signature: Some(Signature {
                    content: b"sig".to_vec(),
                    verifier: Some(Verifier {
                        public_key: Some(PublicKey {
                            raw_bytes: b"key".to_vec(),
                        }),
                        x509_certificate: None,
                        key_details: 5,
                    }),
                }),
            })),
        }
    }

    async fn log_with(n: usize) -> MemoryLog {
        let log = MemoryLog::new("test.log");
        for i in 0..n {
            log.create_entry(Request::new(hashed(format!("digest-{i}").as_bytes())))
                .await
                .unwrap();
        }
        log
    }

    #[tokio::test]
    async fn create_entry_returns_proof_and_checkpoint() {
        let log = log_with(2).await;
        let entry = log
            .create_entry(Request::new(hashed(b"third")))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(entry.log_index, 2);
        assert_eq!(entry.kind_version.unwrap().kind, "hashedrekord");
        let proof = entry.inclusion_proof.unwrap();
        assert_eq!(proof.tree_size, 3);
        assert_eq!(proof.hashes.len(), 1);
        let checkpoint = proof.checkpoint.unwrap().envelope;
        assert!(checkpoint.starts_with("test.log\n3\n"));

        let body: Value = serde_json::from_slice(&entry.canonicalized_body).unwrap();
        assert_eq!(body["kind"], "hashedrekord");
        assert_eq!(
            body["spec"]["hashedRekordV002"]["signature"]["verifier"]["keyDetails"],
            "PKIX_ECDSA_P256_SHA_256"
        );
    }

    #[tokio::test]
    async fn duplicate_entry_is_already_exists() {
        let log = log_with(1).await;
        let err = log
            .create_entry(Request::new(hashed(b"digest-0")))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::AlreadyExists);
        assert_eq!(log.size().await, 1);
    }

    #[tokio::test]
    async fn incomplete_requests_are_invalid() {
        let log = MemoryLog::new("test.log");
        let mut no_verifier = hashed(b"d");
        if let Some(Spec::HashedRekordRequestV002(ref mut rekord)) = no_verifier.spec {
            rekord.signature.as_mut().unwrap().verifier = None;
        }
        let dsse_without_verifiers = CreateEntryRequest {
            spec: Some(Spec::DsseRequestV002(DsseRequestV002 {
                envelope: Some(Envelope {
                    payload: b"{}".to_vec(),
                    payload_type: "application/vnd.in-toto+json".into(),
                    signatures: vec![EnvelopeSignature {
                        sig: b"s".to_vec(),
                        keyid: String::new(),
                    }],
                }),
                verifiers: Vec::new(),
            })),
        };

        for request in [
            CreateEntryRequest::default(),
            hashed(b""),
            no_verifier,
            dsse_without_verifiers,
        ] {
            let err = log.create_entry(Request::new(request)).await.unwrap_err();
            assert_eq!(err.code(), Code::InvalidArgument, "{}", err.message());
        }
        assert_eq!(log.size().await, 0);
    }

    #[tokio::test]
    async fn cancelled_request_is_not_integrated() {
        let log = MemoryLog::new("test.log");
        let mut request = Request::new(hashed(b"late"));
        let token = CancellationToken::new();
        token.cancel();
        request.extensions_mut().insert(token);

        let err = log.create_entry(request).await.unwrap_err();
        assert_eq!(err.code(), Code::Cancelled);
        assert_eq!(log.size().await, 0);
    }

    #[tokio::test]
    async fn partial_tile_holds_leaf_hashes() {
        let log = log_with(3).await;
        let tile = log
            .get_partial_tile(Request::new(PartialTileRequest {
                l: 0,
                n: "0".into(),
                w: 3,
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(tile.data.len(), 3 * 32);
        assert_eq!(tile.content_type, TILE_CONTENT_TYPE);

        let err = log
            .get_partial_tile(Request::new(PartialTileRequest {
                l: 0,
                n: "0".into(),
                w: 4,
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::NotFound);
    }

    #[tokio::test]
    async fn full_tile_needs_256_hashes() {
        let log = log_with(256).await;
        let tile = log
            .get_tile(Request::new(TileRequest { l: 0, n: 0 }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(tile.data.len(), 256 * 32);

        let root = log
            .get_partial_tile(Request::new(PartialTileRequest {
                l: 1,
                n: "000".into(),
                w: 1,
            }))
            .await
            .unwrap()
            .into_inner();
        let state = log.state.read().await;
        assert_eq!(root.data, state.tree.root().to_vec());
        drop(state);

        let err = log
            .get_tile(Request::new(TileRequest { l: 0, n: 1 }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::NotFound);
    }

    #[tokio::test]
    async fn entry_bundle_is_length_prefixed() {
        let log = log_with(2).await;
        let bundle = log
            .get_partial_entry_bundle(Request::new(PartialEntryBundleRequest {
                n: "0".into(),
                w: 2,
            }))
            .await
            .unwrap()
            .into_inner()
            .data;

        let state = log.state.read().await;
        let first = &state.entries[0];
        assert_eq!(&bundle[..2], &(first.len() as u16).to_be_bytes());
        assert_eq!(&bundle[2..2 + first.len()], first.as_slice());
        assert_eq!(bundle.len(), 4 + first.len() + state.entries[1].len());
    }

    #[tokio::test]
    async fn bad_widths_and_indexes_are_invalid() {
        let log = log_with(1).await;
        for w in [0, 256, -1] {
            let err = log
                .get_partial_entry_bundle(Request::new(PartialEntryBundleRequest {
                    n: "0".into(),
                    w,
                }))
                .await
                .unwrap_err();
            assert_eq!(err.code(), Code::InvalidArgument);
        }
        let err = log
            .get_tile(Request::new(TileRequest { l: -1, n: 0 }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn checkpoint_of_empty_log() {
        let log = MemoryLog::new("rekor.localhost");
        let body = log
            .get_checkpoint(Request::new(Empty {}))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(body.content_type, CHECKPOINT_CONTENT_TYPE);
        assert_eq!(
            String::from_utf8(body.data).unwrap(),
            "rekor.localhost\n0\n47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU=\n"
        );
    }

    #[test]
    fn tile_paths_parse() {
        assert_eq!(parse_index("0").unwrap(), 0);
        assert_eq!(parse_index("1234067").unwrap(), 1_234_067);
        assert_eq!(parse_index("067").unwrap(), 67);
        assert_eq!(parse_index("x001/x234/067").unwrap(), 1_234_067);
        assert!(parse_index("x001").is_err());
        assert!(parse_index("001/234").is_err());
        assert!(parse_index("x1/234").is_err());
        assert!(parse_index("").is_err());
    }
}
