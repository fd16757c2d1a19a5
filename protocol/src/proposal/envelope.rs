//! # Encrypted Envelope
//!
//! The exact structure persisted to the content-addressed store. JSON on the
//! wire, camelCase field names, hex everywhere bytes appear:
//!
//! ```text
//! {
//!   "version": 1,
//!   "encryptedMetadata": { "nonce": "0x…", "ciphertext": "0x…" },
//!   "encryptedActions":  { "nonce": "0x…", "ciphertext": "0x…" },
//!   "wrappedKeys": [
//!     { "identity": "0x…", "wrappedKey": "0x…" },
//!     …
//!   ]
//! }
//! ```
//!
//! Nothing in here is secret. An envelope is safe to publish; that is the
//! point. Once stored it is never mutated: a changed proposal gets a new
//! envelope, a new content id and new commitments.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::Address;
use crate::config::{AES_NONCE_LENGTH, ACTIONS_PART_LABEL, ENVELOPE_VERSION, METADATA_PART_LABEL};

/// The two independently encrypted halves of a proposal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PayloadPart {
    Metadata,
    Actions,
}

impl PayloadPart {
    /// Label mixed into the part's associated data.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Metadata => METADATA_PART_LABEL,
            Self::Actions => ACTIONS_PART_LABEL,
        }
    }
}

impl std::fmt::Display for PayloadPart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Metadata => f.write_str("metadata"),
            Self::Actions => f.write_str("actions"),
        }
    }
}

#[derive(Debug, Error)]
pub enum EnvelopeFormatError {
    #[error("envelope is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported envelope version {found} (expected {ENVELOPE_VERSION})")]
    UnsupportedVersion { found: u16 },
}

/// One AEAD ciphertext with its nonce.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedPart {
    #[serde(with = "crate::serde_hex::array")]
    pub nonce: [u8; AES_NONCE_LENGTH],
    /// Ciphertext with the 16-byte tag appended.
    #[serde(with = "crate::serde_hex::bytes")]
    pub ciphertext: Vec<u8>,
}

/// The content key wrapped for one committee member.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrappedKey {
    pub identity: Address,
    #[serde(with = "crate::serde_hex::bytes")]
    pub wrapped_key: Vec<u8>,
}

/// A sealed emergency proposal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedEnvelope {
    pub version: u16,
    pub encrypted_metadata: SealedPart,
    pub encrypted_actions: SealedPart,
    pub wrapped_keys: Vec<WrappedKey>,
}

impl EncryptedEnvelope {
    /// Serialize to the bytes handed to the content-addressed store.
    pub fn to_bytes(&self) -> Result<Vec<u8>, EnvelopeFormatError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse bytes fetched from the content-addressed store.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EnvelopeFormatError> {
        let envelope: Self = serde_json::from_slice(bytes)?;
        if envelope.version != ENVELOPE_VERSION {
            return Err(EnvelopeFormatError::UnsupportedVersion {
                found: envelope.version,
            });
        }
        Ok(envelope)
    }

    /// Identities that received a wrapped key, in wrap order.
    pub fn recipients(&self) -> impl Iterator<Item = &Address> + '_ {
        self.wrapped_keys.iter().map(|entry| &entry.identity)
    }

    /// The sealed ciphertext for `part`.
    pub fn part(&self, part: PayloadPart) -> &SealedPart {
        match part {
            PayloadPart::Metadata => &self.encrypted_metadata,
            PayloadPart::Actions => &self.encrypted_actions,
        }
    }

    /// The wrapped entry for `identity`, if any.
    pub fn entry_for(&self, identity: &Address) -> Option<&WrappedKey> {
        self.wrapped_keys
            .iter()
            .find(|entry| &entry.identity == identity)
    }
}

/// Associated data for a payload part: label plus envelope version.
pub(crate) fn part_aad(part: PayloadPart, version: u16) -> Vec<u8> {
    let label = part.label();
    let mut aad = Vec::with_capacity(label.len() + 2);
    aad.extend_from_slice(label.as_bytes());
    aad.extend_from_slice(&version.to_be_bytes());
    aad
}

/// Associated data for a wrapped key: the member's raw address bytes.
pub(crate) fn wrap_aad(identity: &Address) -> Vec<u8> {
    identity.as_bytes().to_vec()
}
