//! # Canonical Encoder
//!
//! Fixed, unambiguous byte encodings for proposal metadata and action lists.
//! Commitments are hashes of these bytes, so two logically identical inputs
//! MUST encode identically, on every machine, forever.
//!
//! ## Metadata
//!
//! Arbitrary serializable metadata is first lowered into a closed value
//! model, [`CanonicalValue`]:
//!
//! | Variant    | Tag | Body                                   |
//! |------------|-----|----------------------------------------|
//! | `Null`     | 0   | none                                   |
//! | `Bool`     | 1   | 1 byte                                 |
//! | `Unsigned` | 2   | u64 LE                                 |
//! | `Signed`   | 3   | i64 LE (negative values only)          |
//! | `Text`     | 4   | u64 LE length + UTF-8                  |
//! | `List`     | 5   | u64 LE count + items                   |
//! | `Map`      | 6   | u64 LE count + (key, value) sorted by key |
//!
//! Tags are u32 LE. This is exactly bincode's fixed-int little-endian
//! layout, which is simple enough to reimplement in any language from this
//! table alone.
//!
//! A value may sit inside at most [`MAX_CANONICAL_DEPTH`] non-empty lists
//! or maps. Deeper input is rejected both when lowering and before decoding.
//!
//! Map keys are always sorted (it's a `BTreeMap`), integers are normalized
//! (non-negative ⇒ `Unsigned`) and floats are rejected outright: there is no
//! unambiguous canonical float, and governance metadata has no business
//! carrying one.
//!
//! ## Actions
//!
//! `u64 LE count`, then per action: `to` (20 raw bytes), `value` (u128 LE),
//! `data` (u64 LE length + bytes).

use bincode::Options;
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use thiserror::Error;

use super::types::ProposalAction;
use crate::config::{MAX_CANONICAL_DEPTH, MAX_CANONICAL_PAYLOAD_BYTES};

/// Errors from the canonical encoder.
///
/// Any of these aborts proposal creation before a key is ever generated.
#[derive(Debug, Error)]
pub enum EncodingError {
    /// The input could not be serialized at all (e.g. non-string map keys).
    #[error("value is not serializable: {0}")]
    Unserializable(String),

    /// Floats have no canonical form.
    #[error("floating-point value at `{path}` has no canonical encoding")]
    UnsupportedFloat { path: String },

    /// Lists and maps nested deeper than [`MAX_CANONICAL_DEPTH`].
    #[error("value nests more than {limit} lists or maps deep")]
    TooDeep { limit: usize },

    /// The binary codec failed (size limit, truncated or trailing bytes).
    #[error("canonical codec error: {0}")]
    Codec(String),
}

// ---------------------------------------------------------------------------
// CanonicalValue
// ---------------------------------------------------------------------------

/// A metadata value with exactly one byte encoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CanonicalValue {
    Null,
    Bool(bool),
    Unsigned(u64),
    /// Always negative. Non-negative integers are `Unsigned`.
    Signed(i64),
    Text(String),
    List(Vec<CanonicalValue>),
    Map(BTreeMap<String, CanonicalValue>),
}

impl CanonicalValue {
    /// Lower any serializable value into canonical form.
    ///
    /// # Example
    ///
    /// ```
    /// use council_seal::proposal::CanonicalValue;
    ///
    /// let a = CanonicalValue::from_serializable(&serde_json::json!({"b": 1, "a": 2})).unwrap();
    /// let b = CanonicalValue::from_serializable(&serde_json::json!({"a": 2, "b": 1})).unwrap();
    /// assert_eq!(a, b);
    /// ```
    pub fn from_serializable<T: Serialize + ?Sized>(value: &T) -> Result<Self, EncodingError> {
        let json =
            serde_json::to_value(value).map_err(|e| EncodingError::Unserializable(e.to_string()))?;
        Self::from_json(json)
    }

    /// Convert a JSON value, rejecting floats and over-deep nesting.
    pub fn from_json(value: serde_json::Value) -> Result<Self, EncodingError> {
        lower_json(value, "$", 0)
    }

    /// Plain JSON rendering (keys in sorted order).
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            CanonicalValue::Null => Value::Null,
            CanonicalValue::Bool(b) => Value::Bool(*b),
            CanonicalValue::Unsigned(n) => Value::from(*n),
            CanonicalValue::Signed(n) => Value::from(*n),
            CanonicalValue::Text(s) => Value::String(s.clone()),
            CanonicalValue::List(items) => {
                Value::Array(items.iter().map(CanonicalValue::to_json).collect())
            }
            CanonicalValue::Map(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    /// Decode into a typed metadata record.
    pub fn decode_into<T: DeserializeOwned>(&self) -> Result<T, EncodingError> {
        serde_json::from_value(self.to_json()).map_err(|e| EncodingError::Codec(e.to_string()))
    }

    /// Look up a top-level field of a map value.
    pub fn get(&self, key: &str) -> Option<&CanonicalValue> {
        match self {
            CanonicalValue::Map(entries) => entries.get(key),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CanonicalValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// `depth` counts the containers enclosing `value`.
fn lower_json(
    value: serde_json::Value,
    path: &str,
    depth: usize,
) -> Result<CanonicalValue, EncodingError> {
    use serde_json::Value;
    let non_empty = match &value {
        Value::Array(items) => !items.is_empty(),
        Value::Object(entries) => !entries.is_empty(),
        _ => false,
    };
    if non_empty && depth >= MAX_CANONICAL_DEPTH {
        return Err(EncodingError::TooDeep {
            limit: MAX_CANONICAL_DEPTH,
        });
    }
    Ok(match value {
        Value::Null => CanonicalValue::Null,
        Value::Bool(b) => CanonicalValue::Bool(b),
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                CanonicalValue::Unsigned(u)
            } else if let Some(i) = n.as_i64() {
                CanonicalValue::Signed(i)
            } else {
                return Err(EncodingError::UnsupportedFloat {
                    path: path.to_string(),
                });
            }
        }
        Value::String(s) => CanonicalValue::Text(s),
        Value::Array(items) => CanonicalValue::List(
            items
                .into_iter()
                .enumerate()
                .map(|(i, item)| lower_json(item, &format!("{}[{}]", path, i), depth + 1))
                .collect::<Result<_, _>>()?,
        ),
        Value::Object(entries) => CanonicalValue::Map(
            entries
                .into_iter()
                .map(|(k, v)| {
                    let child = lower_json(v, &format!("{}.{}", path, k), depth + 1)?;
                    Ok((k, child))
                })
                .collect::<Result<_, EncodingError>>()?,
        ),
    })
}

// Binary formats see a tagged enum; human-readable ones see plain JSON.
// The two mirror enums below must keep the same variant order.

#[derive(Serialize)]
enum BinaryRef<'a> {
    Null,
    Bool(bool),
    Unsigned(u64),
    Signed(i64),
    Text(&'a str),
    List(&'a [CanonicalValue]),
    Map(&'a BTreeMap<String, CanonicalValue>),
}

#[derive(Deserialize)]
enum BinaryOwned {
    Null,
    Bool(bool),
    Unsigned(u64),
    Signed(i64),
    Text(String),
    List(Vec<CanonicalValue>),
    Map(BTreeMap<String, CanonicalValue>),
}

impl Serialize for CanonicalValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            return self.to_json().serialize(serializer);
        }
        let repr = match self {
            CanonicalValue::Null => BinaryRef::Null,
            CanonicalValue::Bool(b) => BinaryRef::Bool(*b),
            CanonicalValue::Unsigned(n) => BinaryRef::Unsigned(*n),
            CanonicalValue::Signed(n) => BinaryRef::Signed(*n),
            CanonicalValue::Text(s) => BinaryRef::Text(s),
            CanonicalValue::List(items) => BinaryRef::List(items),
            CanonicalValue::Map(entries) => BinaryRef::Map(entries),
        };
        repr.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CanonicalValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let json = serde_json::Value::deserialize(deserializer)?;
            return CanonicalValue::from_json(json).map_err(D::Error::custom);
        }
        Ok(match BinaryOwned::deserialize(deserializer)? {
            BinaryOwned::Null => CanonicalValue::Null,
            BinaryOwned::Bool(b) => CanonicalValue::Bool(b),
            BinaryOwned::Unsigned(n) => CanonicalValue::Unsigned(n),
            BinaryOwned::Signed(n) => CanonicalValue::Signed(n),
            BinaryOwned::Text(s) => CanonicalValue::Text(s),
            BinaryOwned::List(items) => CanonicalValue::List(items),
            BinaryOwned::Map(entries) => CanonicalValue::Map(entries),
        })
    }
}

// ---------------------------------------------------------------------------
// Encoder
// ---------------------------------------------------------------------------

/// Fixed-int, little-endian, size-limited, no trailing bytes.
fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .with_limit(MAX_CANONICAL_PAYLOAD_BYTES)
        .reject_trailing_bytes()
}

/// Canonical bytes of a metadata value.
pub fn encode_metadata(metadata: &CanonicalValue) -> Result<Vec<u8>, EncodingError> {
    codec()
        .serialize(metadata)
        .map_err(|e| EncodingError::Codec(e.to_string()))
}

/// Canonical bytes of an ordered action list.
pub fn encode_actions(actions: &[ProposalAction]) -> Result<Vec<u8>, EncodingError> {
    codec()
        .serialize(actions)
        .map_err(|e| EncodingError::Codec(e.to_string()))
}

/// Inverse of [`encode_metadata`].
///
/// Nesting depth is checked on the raw bytes first, so hostile input cannot
/// drive the recursive decoder arbitrarily deep.
pub fn decode_metadata(bytes: &[u8]) -> Result<CanonicalValue, EncodingError> {
    if nests_deeper_than(bytes, MAX_CANONICAL_DEPTH) {
        return Err(EncodingError::TooDeep {
            limit: MAX_CANONICAL_DEPTH,
        });
    }
    codec()
        .deserialize(bytes)
        .map_err(|e| EncodingError::Codec(e.to_string()))
}

/// Inverse of [`encode_actions`].
pub fn decode_actions(bytes: &[u8]) -> Result<Vec<ProposalAction>, EncodingError> {
    codec()
        .deserialize(bytes)
        .map_err(|e| EncodingError::Codec(e.to_string()))
}

// ---------------------------------------------------------------------------
// Depth scan
// ---------------------------------------------------------------------------

const TAG_NULL: u32 = 0;
const TAG_BOOL: u32 = 1;
const TAG_UNSIGNED: u32 = 2;
const TAG_SIGNED: u32 = 3;
const TAG_TEXT: u32 = 4;
const TAG_LIST: u32 = 5;
const TAG_MAP: u32 = 6;

struct OpenContainer {
    remaining: u64,
    is_map: bool,
}

/// Walk the tag stream of an encoded metadata value without recursing.
///
/// Only answers the depth question. Truncated input and unknown tags yield
/// `false` and are left for the codec to report.
fn nests_deeper_than(bytes: &[u8], limit: usize) -> bool {
    scan_depth(bytes, limit).unwrap_or(false)
}

fn scan_depth(mut bytes: &[u8], limit: usize) -> Option<bool> {
    let mut open: Vec<OpenContainer> = Vec::new();
    loop {
        match take_u32(&mut bytes)? {
            TAG_NULL => {}
            TAG_BOOL => skip(&mut bytes, 1)?,
            TAG_UNSIGNED | TAG_SIGNED => skip(&mut bytes, 8)?,
            TAG_TEXT => {
                let len = take_u64(&mut bytes)?;
                skip(&mut bytes, len)?;
            }
            tag @ (TAG_LIST | TAG_MAP) => {
                let remaining = take_u64(&mut bytes)?;
                if remaining > 0 {
                    if open.len() >= limit {
                        return Some(true);
                    }
                    open.push(OpenContainer {
                        remaining,
                        is_map: tag == TAG_MAP,
                    });
                }
            }
            _ => return None,
        }

        // Position on the next value, closing finished containers.
        loop {
            let Some(top) = open.last_mut() else {
                return Some(false);
            };
            if top.remaining == 0 {
                open.pop();
                continue;
            }
            top.remaining -= 1;
            if top.is_map {
                let key_len = take_u64(&mut bytes)?;
                skip(&mut bytes, key_len)?;
            }
            break;
        }
    }
}

fn take<const N: usize>(bytes: &mut &[u8]) -> Option<[u8; N]> {
    let all: &[u8] = *bytes;
    let head: [u8; N] = all.get(..N)?.try_into().ok()?;
    *bytes = &all[N..];
    Some(head)
}

fn take_u32(bytes: &mut &[u8]) -> Option<u32> {
    take::<4>(bytes).map(u32::from_le_bytes)
}

fn take_u64(bytes: &mut &[u8]) -> Option<u64> {
    take::<8>(bytes).map(u64::from_le_bytes)
}

fn skip(bytes: &mut &[u8], len: u64) -> Option<()> {
    let all: &[u8] = *bytes;
    *bytes = all.get(usize::try_from(len).ok()?..)?;
    Some(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proposal::types::Address;
    use serde_json::json;

    #[test]
    fn test_key_order_does_not_matter() {
        let a = CanonicalValue::from_serializable(&json!({"title": "Test", "summary": "x"}))
            .unwrap();
        let b = CanonicalValue::from_serializable(&json!({"summary": "x", "title": "Test"}))
            .unwrap();
        assert_eq!(encode_metadata(&a).unwrap(), encode_metadata(&b).unwrap());
    }

    #[test]
    fn test_known_metadata_layout() {
        let value = CanonicalValue::from_serializable(&json!({"t": true})).unwrap();
        let bytes = encode_metadata(&value).unwrap();
        let expected: Vec<u8> = [
            &6u32.to_le_bytes()[..], // Map
            &1u64.to_le_bytes()[..], // one entry
            &1u64.to_le_bytes()[..], // key length
            &b"t"[..],
            &1u32.to_le_bytes()[..], // Bool
            &[1u8][..],
        ]
        .concat();
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_integers_are_normalized() {
        let from_signed = CanonicalValue::from_serializable(&5i64).unwrap();
        let from_unsigned = CanonicalValue::from_serializable(&5u8).unwrap();
        assert_eq!(from_signed, CanonicalValue::Unsigned(5));
        assert_eq!(from_signed, from_unsigned);
        assert_eq!(
            CanonicalValue::from_serializable(&-3i32).unwrap(),
            CanonicalValue::Signed(-3)
        );
    }

    #[test]
    fn test_float_rejected_with_path() {
        let err = CanonicalValue::from_serializable(&json!({"quorum": [1, 2.5]})).unwrap_err();
        match err {
            EncodingError::UnsupportedFloat { path } => assert_eq!(path, "$.quorum[1]"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_non_string_keys_rejected() {
        let mut weird = std::collections::HashMap::new();
        weird.insert(vec![1u8, 2], "v");
        assert!(matches!(
            CanonicalValue::from_serializable(&weird),
            Err(EncodingError::Unserializable(_))
        ));
    }

    #[test]
    fn test_metadata_decode_inverts_encode() {
        let value = CanonicalValue::from_serializable(&json!({
            "title": "Pause bridge",
            "tags": ["security", "bridge"],
            "nested": {"level": -2, "ok": null}
        }))
        .unwrap();
        let bytes = encode_metadata(&value).unwrap();
        assert_eq!(decode_metadata(&bytes).unwrap(), value);
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = encode_metadata(&CanonicalValue::Null).unwrap();
        bytes.push(0);
        assert!(decode_metadata(&bytes).is_err());
    }

    fn nested_lists(depth: usize, innermost: serde_json::Value) -> serde_json::Value {
        (0..depth).fold(innermost, |inner, _| json!([inner]))
    }

    /// `depth` single-element lists around a `Null`, encoded by hand.
    fn nested_list_bytes(depth: usize) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(depth * 12 + 4);
        for _ in 0..depth {
            bytes.extend_from_slice(&5u32.to_le_bytes());
            bytes.extend_from_slice(&1u64.to_le_bytes());
        }
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes
    }

    #[test]
    fn test_nesting_at_limit_is_accepted() {
        let value = CanonicalValue::from_json(nested_lists(MAX_CANONICAL_DEPTH, json!(null)))
            .unwrap();
        let bytes = encode_metadata(&value).unwrap();
        assert_eq!(bytes, nested_list_bytes(MAX_CANONICAL_DEPTH));
        assert_eq!(decode_metadata(&bytes).unwrap(), value);
    }

    #[test]
    fn test_nesting_past_limit_is_rejected_when_lowering() {
        let body = nested_lists(MAX_CANONICAL_DEPTH, json!(1));
        let too_deep = json!({ "title": "Test", "body": body });
        assert!(matches!(
            CanonicalValue::from_json(too_deep),
            Err(EncodingError::TooDeep { limit: MAX_CANONICAL_DEPTH })
        ));
    }

    #[test]
    fn test_empty_containers_do_not_count_toward_depth() {
        let value = CanonicalValue::from_json(nested_lists(MAX_CANONICAL_DEPTH, json!([])))
            .unwrap();
        let bytes = encode_metadata(&value).unwrap();
        assert_eq!(decode_metadata(&bytes).unwrap(), value);
    }

    #[test]
    fn test_hostile_nesting_is_rejected_before_decoding() {
        let bytes = nested_list_bytes(200_000);
        assert!(matches!(
            decode_metadata(&bytes),
            Err(EncodingError::TooDeep { .. })
        ));
        assert!(matches!(
            decode_metadata(&nested_list_bytes(MAX_CANONICAL_DEPTH + 1)),
            Err(EncodingError::TooDeep { .. })
        ));
    }

    #[test]
    fn test_depth_scan_skips_text_and_map_keys() {
        // Map { "[[[": List [ Text "\x05..." ] } must not be mistaken for
        // nested lists just because its strings contain list tags.
        let noisy: String = "\u{5}".repeat(64);
        let value = CanonicalValue::from_json(json!({ "[[[": [noisy] })).unwrap();
        let bytes = encode_metadata(&value).unwrap();
        assert!(!nests_deeper_than(&bytes, 2));
        assert!(nests_deeper_than(&bytes, 1));
        // Truncated input is left for the codec to report.
        assert!(!nests_deeper_than(&bytes[..bytes.len() - 1], 2));
        assert!(decode_metadata(&bytes[..bytes.len() - 1]).is_err());
    }

    #[test]
    fn test_known_action_layout() {
        let to = Address::from_bytes([0x11; 20]);
        let actions = vec![ProposalAction::new(to, 7, vec![0xaa])];
        let bytes = encode_actions(&actions).unwrap();
        let expected: Vec<u8> = [
            &1u64.to_le_bytes()[..],
            &[0x11u8; 20][..],
            &7u128.to_le_bytes()[..],
            &1u64.to_le_bytes()[..],
            &[0xaa][..],
        ]
        .concat();
        assert_eq!(bytes, expected);
        assert_eq!(decode_actions(&bytes).unwrap(), actions);
    }

    #[test]
    fn test_action_order_matters() {
        let a = ProposalAction::transfer(Address::from_bytes([1; 20]), 1);
        let b = ProposalAction::transfer(Address::from_bytes([2; 20]), 1);
        assert_ne!(
            encode_actions(&[a.clone(), b.clone()]).unwrap(),
            encode_actions(&[b, a]).unwrap()
        );
    }

    #[test]
    fn test_json_form_is_plain() {
        let value = CanonicalValue::from_serializable(&json!({"title": "Test"})).unwrap();
        assert_eq!(
            serde_json::to_string(&value).unwrap(),
            r#"{"title":"Test"}"#
        );
        let back: CanonicalValue = serde_json::from_str(r#"{"title":"Test"}"#).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_decode_into_typed_record() {
        #[derive(Deserialize, PartialEq, Debug)]
        struct Meta {
            title: String,
        }
        let value = CanonicalValue::from_serializable(&json!({"title": "Test"})).unwrap();
        let meta: Meta = value.decode_into().unwrap();
        assert_eq!(meta.title, "Test");
        assert_eq!(value.get("title").and_then(CanonicalValue::as_str), Some("Test"));
    }
}
