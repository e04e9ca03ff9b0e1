//! Rekor v2 request and response messages.
//!
//! Each message is a prost struct (binary wire format on the gRPC listener)
//! and, where it crosses the REST gateway as JSON, a serde type following the
//! proto3 JSON mapping: lowerCamelCase names, original field names accepted
//! on input, unknown fields ignored.

use serde::{Deserialize, Serialize};

use super::json::{bytes_b64, bytes_list_b64, int64_str, key_details, null_default};

/// Request for `CreateEntry`. At most one entry kind may be set.
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(try_from = "CreateEntryRequestJson", into = "CreateEntryRequestJson")]
pub struct CreateEntryRequest {
    #[prost(oneof = "create_entry_request::Spec", tags = "1, 2")]
    pub spec: Option<create_entry_request::Spec>,
}

pub mod create_entry_request {
    /// The entry kind being submitted.
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Spec {
        #[prost(message, tag = "1")]
        HashedRekordRequestV002(super::HashedRekordRequestV002),
        #[prost(message, tag = "2")]
        DsseRequestV002(super::DsseRequestV002),
    }
}

/// JSON shape of [`CreateEntryRequest`]: the oneof members appear as sibling
/// optional fields.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CreateEntryRequestJson {
    #[serde(
        alias = "hashed_rekord_request_v002",
        skip_serializing_if = "Option::is_none"
    )]
    hashed_rekord_request_v002: Option<HashedRekordRequestV002>,
    #[serde(alias = "dsse_request_v002", skip_serializing_if = "Option::is_none")]
    dsse_request_v002: Option<DsseRequestV002>,
}

impl TryFrom<CreateEntryRequestJson> for CreateEntryRequest {
    type Error = String;

    fn try_from(json: CreateEntryRequestJson) -> Result<Self, Self::Error> {
        use create_entry_request::Spec;

        let spec = match (json.hashed_rekord_request_v002, json.dsse_request_v002) {
            (Some(_), Some(_)) => {
                return Err(
                    "oneof spec is already set: hashedRekordRequestV002 and dsseRequestV002 are exclusive"
                        .to_string(),
                )
            }
            (Some(hashed), None) => Some(Spec::HashedRekordRequestV002(hashed)),
            (None, Some(dsse)) => Some(Spec::DsseRequestV002(dsse)),
            (None, None) => None,
        };
        Ok(Self { spec })
    }
}

impl From<CreateEntryRequest> for CreateEntryRequestJson {
    fn from(request: CreateEntryRequest) -> Self {
        use create_entry_request::Spec;

        match request.spec {
            Some(Spec::HashedRekordRequestV002(hashed)) => Self {
                hashed_rekord_request_v002: Some(hashed),
                dsse_request_v002: None,
            },
            Some(Spec::DsseRequestV002(dsse)) => Self {
                hashed_rekord_request_v002: None,
                dsse_request_v002: Some(dsse),
            },
            None => Self::default(),
        }
    }
}

/// A signed artifact digest.
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HashedRekordRequestV002 {
    #[prost(bytes = "vec", tag = "1")]
    #[serde(with = "bytes_b64")]
    pub digest: Vec<u8>,
    #[prost(message, optional, tag = "2")]
    pub signature: Option<Signature>,
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Signature {
    #[prost(bytes = "vec", tag = "1")]
    #[serde(with = "bytes_b64")]
    pub content: Vec<u8>,
    #[prost(message, optional, tag = "2")]
    pub verifier: Option<Verifier>,
}

/// Verification material: a raw public key or an X.509 certificate.
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Verifier {
    #[prost(message, optional, tag = "1")]
    #[serde(alias = "public_key")]
    pub public_key: Option<PublicKey>,
    #[prost(message, optional, tag = "2")]
    #[serde(alias = "x509_certificate")]
    pub x509_certificate: Option<X509Certificate>,
    /// A `PublicKeyDetails` value; JSON carries its name.
    #[prost(int32, tag = "3")]
    #[serde(with = "key_details", alias = "key_details")]
    pub key_details: i32,
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PublicKey {
    #[prost(bytes = "vec", tag = "1")]
    #[serde(with = "bytes_b64", alias = "raw_bytes")]
    pub raw_bytes: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct X509Certificate {
    #[prost(bytes = "vec", tag = "1")]
    #[serde(with = "bytes_b64", alias = "raw_bytes")]
    pub raw_bytes: Vec<u8>,
}

/// A DSSE envelope with the verifiers for its signatures.
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DsseRequestV002 {
    #[prost(message, optional, tag = "1")]
    pub envelope: Option<Envelope>,
    #[prost(message, repeated, tag = "2")]
    pub verifiers: Vec<Verifier>,
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Envelope {
    #[prost(bytes = "vec", tag = "1")]
    #[serde(with = "bytes_b64")]
    pub payload: Vec<u8>,
    #[prost(string, tag = "2")]
    #[serde(deserialize_with = "null_default::deserialize", alias = "payload_type")]
    pub payload_type: String,
    #[prost(message, repeated, tag = "3")]
    pub signatures: Vec<EnvelopeSignature>,
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopeSignature {
    #[prost(bytes = "vec", tag = "1")]
    #[serde(with = "bytes_b64")]
    pub sig: Vec<u8>,
    #[prost(string, tag = "2")]
    #[serde(deserialize_with = "null_default::deserialize")]
    pub keyid: String,
}

/// Request for a full tile: level `L`, index `N`.
#[derive(Clone, PartialEq, prost::Message)]
pub struct TileRequest {
    #[prost(int32, tag = "1")]
    pub l: i32,
    #[prost(int32, tag = "2")]
    pub n: i32,
}

/// Request for a partial tile of width `W`.
#[derive(Clone, PartialEq, prost::Message)]
pub struct PartialTileRequest {
    #[prost(int32, tag = "1")]
    pub l: i32,
    #[prost(string, tag = "2")]
    pub n: String,
    #[prost(int32, tag = "3")]
    pub w: i32,
}

/// Request for a full entry bundle.
#[derive(Clone, PartialEq, prost::Message)]
pub struct EntryBundleRequest {
    #[prost(int32, tag = "1")]
    pub n: i32,
}

/// Request for a partial entry bundle of width `W`.
#[derive(Clone, PartialEq, prost::Message)]
pub struct PartialEntryBundleRequest {
    #[prost(string, tag = "1")]
    pub n: String,
    #[prost(int32, tag = "2")]
    pub w: i32,
}

/// Request for `GetCheckpoint`; the wire form of `google.protobuf.Empty`.
#[derive(Clone, Copy, PartialEq, prost::Message)]
pub struct Empty {}

/// An opaque HTTP payload. The gateway writes `data` verbatim with
/// `content_type` instead of rendering JSON.
#[derive(Clone, PartialEq, prost::Message)]
pub struct HttpBody {
    #[prost(string, tag = "1")]
    pub content_type: String,
    #[prost(bytes = "vec", tag = "2")]
    pub data: Vec<u8>,
}

impl HttpBody {
    pub fn new(content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            content_type: content_type.into(),
            data,
        }
    }
}

/// The log's receipt for an integrated entry.
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransparencyLogEntry {
    #[prost(int64, tag = "1")]
    #[serde(with = "int64_str", alias = "log_index")]
    pub log_index: i64,
    #[prost(message, optional, tag = "2")]
    #[serde(alias = "log_id")]
    pub log_id: Option<LogId>,
    #[prost(message, optional, tag = "3")]
    #[serde(alias = "kind_version")]
    pub kind_version: Option<KindVersion>,
    #[prost(message, optional, tag = "6")]
    #[serde(alias = "inclusion_proof")]
    pub inclusion_proof: Option<InclusionProof>,
    #[prost(bytes = "vec", tag = "7")]
    #[serde(with = "bytes_b64", alias = "canonicalized_body")]
    pub canonicalized_body: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogId {
    #[prost(bytes = "vec", tag = "1")]
    #[serde(with = "bytes_b64", alias = "key_id")]
    pub key_id: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct KindVersion {
    #[prost(string, tag = "1")]
    #[serde(deserialize_with = "null_default::deserialize")]
    pub kind: String,
    #[prost(string, tag = "2")]
    #[serde(deserialize_with = "null_default::deserialize")]
    pub version: String,
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InclusionProof {
    #[prost(int64, tag = "1")]
    #[serde(with = "int64_str", alias = "log_index")]
    pub log_index: i64,
    #[prost(bytes = "vec", tag = "2")]
    #[serde(with = "bytes_b64", alias = "root_hash")]
    pub root_hash: Vec<u8>,
    #[prost(int64, tag = "3")]
    #[serde(with = "int64_str", alias = "tree_size")]
    pub tree_size: i64,
    #[prost(bytes = "vec", repeated, tag = "4")]
    #[serde(with = "bytes_list_b64")]
    pub hashes: Vec<Vec<u8>>,
    #[prost(message, optional, tag = "5")]
    pub checkpoint: Option<Checkpoint>,
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct Checkpoint {
    #[prost(string, tag = "1")]
    #[serde(deserialize_with = "null_default::deserialize")]
    pub envelope: String,
}
