//! Core proposal types: addresses, actions, payloads and recipients.
//!
//! These are plain values. A [`ProposalPayload`] is immutable once built;
//! the only way to "change" a proposal is to build a new one and seal it
//! again.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::canonical::{CanonicalValue, EncodingError};
use crate::config::ADDRESS_LENGTH;
use crate::crypto::RecipientPublicKey;

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid address hex: {0}")]
    InvalidHex(String),

    #[error("invalid address length: expected {ADDRESS_LENGTH} bytes, got {0}")]
    InvalidLength(usize),
}

/// A 20-byte account address: committee members and action targets alike.
///
/// Displays and parses as `0x`-prefixed hex. In binary encodings it is the
/// raw 20 bytes with no length prefix.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_LENGTH]);

impl Address {
    pub const fn from_bytes(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = crate::serde_hex::decode_prefixed(s.trim())
            .map_err(|e| AddressError::InvalidHex(e.to_string()))?;
        let len = bytes.len();
        let arr: [u8; ADDRESS_LENGTH] = bytes
            .try_into()
            .map_err(|_| AddressError::InvalidLength(len))?;
        Ok(Self(arr))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.collect_str(self)
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            s.parse().map_err(D::Error::custom)
        } else {
            <[u8; ADDRESS_LENGTH]>::deserialize(deserializer).map(Self)
        }
    }
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// One call the proposal executes if approved: `to.call{value}(data)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalAction {
    /// Target address.
    pub to: Address,
    /// Native value attached to the call, in the smallest unit.
    pub value: u128,
    /// Raw calldata. Empty for plain transfers.
    #[serde(with = "crate::serde_hex::bytes", default)]
    pub data: Vec<u8>,
}

impl ProposalAction {
    pub fn new(to: Address, value: u128, data: Vec<u8>) -> Self {
        Self { to, value, data }
    }

    /// A plain value transfer with no calldata.
    pub fn transfer(to: Address, value: u128) -> Self {
        Self::new(to, value, Vec::new())
    }
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// The plaintext of an emergency proposal: metadata plus ordered actions.
///
/// Fields are private so a payload cannot be edited after construction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalPayload {
    metadata: CanonicalValue,
    actions: Vec<ProposalAction>,
}

impl ProposalPayload {
    /// Build a payload from any serializable metadata record.
    ///
    /// Fails with [`EncodingError`] if the metadata has no canonical form
    /// (floats, non-string map keys).
    pub fn new<M: Serialize>(
        metadata: &M,
        actions: Vec<ProposalAction>,
    ) -> Result<Self, EncodingError> {
        Ok(Self {
            metadata: CanonicalValue::from_serializable(metadata)?,
            actions,
        })
    }

    /// Build a payload from an already canonical metadata value.
    pub fn from_parts(metadata: CanonicalValue, actions: Vec<ProposalAction>) -> Self {
        Self { metadata, actions }
    }

    pub fn metadata(&self) -> &CanonicalValue {
        &self.metadata
    }

    pub fn actions(&self) -> &[ProposalAction] {
        &self.actions
    }
}

// ---------------------------------------------------------------------------
// Recipient
// ---------------------------------------------------------------------------

/// A committee member paired with whatever key the directory returned.
///
/// Identity and key travel together, so a skipped lookup can never shift
/// another member's key onto the wrong identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recipient {
    pub identity: Address,
    pub public_key: Option<RecipientPublicKey>,
}

impl Recipient {
    pub fn new(identity: Address, public_key: Option<RecipientPublicKey>) -> Self {
        Self {
            identity,
            public_key,
        }
    }

    /// A member that can be wrapped to.
    pub fn with_key(identity: Address, public_key: RecipientPublicKey) -> Self {
        Self::new(identity, Some(public_key))
    }

    /// A member with no published key. Never wrapped to.
    pub fn without_key(identity: Address) -> Self {
        Self::new(identity, None)
    }
}
