//! Serde adapters for byte fields.
//!
//! JSON (anything human-readable) gets `0x`-prefixed lowercase hex. Binary
//! formats get the raw bytes as a plain sequence, which keeps the bincode
//! layout of canonical encodings free of any text.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Decode hex with or without a `0x` prefix.
pub(crate) fn decode_prefixed(s: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let trimmed = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    hex::decode(trimmed)
}

/// Encode bytes as `0x`-prefixed lowercase hex.
pub(crate) fn encode_prefixed(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// `#[serde(with = "serde_hex::bytes")]` for `Vec<u8>`.
pub(crate) mod bytes {
    use super::*;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&encode_prefixed(bytes))
        } else {
            bytes.serialize(serializer)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            decode_prefixed(&s).map_err(D::Error::custom)
        } else {
            Vec::<u8>::deserialize(deserializer)
        }
    }
}

/// `#[serde(with = "serde_hex::array")]` for `[u8; N]`.
pub(crate) mod array {
    use super::*;

    pub fn serialize<S: Serializer, const N: usize>(
        bytes: &[u8; N],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        super::bytes::serialize(bytes.as_slice(), serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
        deserializer: D,
    ) -> Result<[u8; N], D::Error> {
        let raw = super::bytes::deserialize(deserializer)?;
        let len = raw.len();
        raw.try_into()
            .map_err(|_| D::Error::custom(format!("expected {} bytes, got {}", N, len)))
    }
}
