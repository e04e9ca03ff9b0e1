//! Serde adapters for the proto3 JSON mapping.
//!
//! proto3 JSON renders `bytes` as base64, 64-bit integers as strings and
//! enums by name. Parsing is lenient the same way protojson is: base64 may be
//! standard or URL-safe, padded or not, `int64` may arrive as a string or a
//! number, an enum as its name or its number, and `null` on any field means
//! the field is unset.

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serializer};

fn decode_base64(text: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let unpadded = text.trim_end_matches('=');
    if unpadded.contains(['-', '_']) {
        URL_SAFE_NO_PAD.decode(unpadded)
    } else {
        STANDARD_NO_PAD.decode(unpadded)
    }
}

/// `bytes` fields.
pub mod bytes_b64 {
    use super::*;

    pub fn serialize<S: Serializer>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = Option::<String>::deserialize(deserializer)?;
        match text {
            Some(text) => decode_base64(&text).map_err(de::Error::custom),
            None => Ok(Vec::new()),
        }
    }
}

/// `repeated bytes` fields.
pub mod bytes_list_b64 {
    use super::*;
    use serde::ser::SerializeSeq;

    pub fn serialize<S: Serializer>(values: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(values.len()))?;
        for value in values {
            seq.serialize_element(&STANDARD.encode(value))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<Vec<u8>>, D::Error> {
        let texts = Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default();
        texts
            .iter()
            .map(|text| decode_base64(text).map_err(de::Error::custom))
            .collect()
    }
}

/// `int64` fields.
pub mod int64_str {
    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Int64Repr {
        Number(i64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        match Option::<Int64Repr>::deserialize(deserializer)? {
            Some(Int64Repr::Number(n)) => Ok(n),
            Some(Int64Repr::Text(text)) => text.trim().parse().map_err(de::Error::custom),
            None => Ok(0),
        }
    }
}

/// Scalar `string` and `int32` fields, where `null` reads as the default.
pub mod null_default {
    use super::*;

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de> + Default,
    {
        Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
    }
}

/// `PublicKeyDetails` enum fields, written by name.
pub mod key_details {
    use super::*;

    const NAMES: &[(&str, i32)] = &[
        ("PUBLIC_KEY_DETAILS_UNSPECIFIED", 0),
        ("PKCS1_RSA_PKCS1V5", 1),
        ("PKCS1_RSA_PSS", 2),
        ("PKIX_RSA_PKCS1V5", 3),
        ("PKIX_RSA_PSS", 4),
        ("PKIX_ECDSA_P256_SHA_256", 5),
        ("PKIX_ECDSA_P256_HMAC_SHA_256", 6),
        ("PKIX_ED25519", 7),
        ("PKIX_ED25519_PH", 8),
        ("PKIX_RSA_PKCS1V15_2048_SHA256", 9),
        ("PKIX_RSA_PKCS1V15_3072_SHA256", 10),
        ("PKIX_RSA_PKCS1V15_4096_SHA256", 11),
        ("PKIX_ECDSA_P384_SHA_256", 12),
        ("PKIX_ECDSA_P521_SHA_256", 13),
        ("PKIX_ECDSA_P384_SHA_384", 14),
        ("PKIX_ECDSA_P521_SHA_512", 15),
        ("PKIX_RSA_PSS_2048_SHA256", 16),
        ("PKIX_RSA_PSS_3072_SHA256", 17),
        ("PKIX_RSA_PSS_4096_SHA256", 18),
        ("LMS_SHA256", 19),
        ("LMOTS_SHA256", 20),
        ("ML_DSA_65", 21),
        ("ML_DSA_87", 22),
    ];

    pub fn name(value: i32) -> Option<&'static str> {
        NAMES
            .iter()
            .find(|(_, number)| *number == value)
            .map(|(name, _)| *name)
    }

    fn number(name: &str) -> Option<i32> {
        NAMES
            .iter()
            .find(|(known, _)| *known == name)
            .map(|(_, number)| *number)
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum EnumRepr {
        Number(i32),
        Name(String),
    }

    /// Unknown numbers have no name and are written as numbers.
    pub fn serialize<S: Serializer>(value: &i32, serializer: S) -> Result<S::Ok, S::Error> {
        match name(*value) {
            Some(name) => serializer.serialize_str(name),
            None => serializer.serialize_i32(*value),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i32, D::Error> {
        match Option::<EnumRepr>::deserialize(deserializer)? {
            Some(EnumRepr::Number(n)) => Ok(n),
            Some(EnumRepr::Name(text)) => number(&text).ok_or_else(|| {
                de::Error::custom(format!("invalid value for enum PublicKeyDetails: {text}"))
            }),
            None => Ok(0),
        }
    }
}
