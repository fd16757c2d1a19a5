//! # Commitment Hasher
//!
//! Two SHA-256 digests over the canonical encodings, recorded in the ledger
//! next to the proposal id and kept out of the envelope's reach:
//!
//! ```text
//! publicMetadataHash     = SHA-256(encode_metadata(metadata))
//! destinationActionsHash = SHA-256(encode_actions(actions))
//! ```
//!
//! The metadata digest covers the canonical metadata bytes themselves, not
//! the content id or any storage URI, so a reviewer who decrypts the
//! metadata can detect a substituted record even if the store is honest
//! about the envelope it hands out.
//!
//! Pure functions of their input. No randomness, no keys.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::DIGEST_LENGTH;
use crate::crypto::sha256_array;

/// Digest pair recorded outside the envelope at creation time.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commitments {
    #[serde(with = "crate::serde_hex::array")]
    pub public_metadata_hash: [u8; DIGEST_LENGTH],
    #[serde(with = "crate::serde_hex::array")]
    pub destination_actions_hash: [u8; DIGEST_LENGTH],
}

/// Names one half of a [`Commitments`] pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommitmentField {
    PublicMetadataHash,
    DestinationActionsHash,
}

impl CommitmentField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PublicMetadataHash => "publicMetadataHash",
            Self::DestinationActionsHash => "destinationActionsHash",
        }
    }
}

impl fmt::Display for CommitmentField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Digest of canonical metadata bytes.
pub fn hash_metadata(metadata_bytes: &[u8]) -> [u8; DIGEST_LENGTH] {
    sha256_array(metadata_bytes)
}

/// Digest of canonical action-list bytes.
pub fn hash_actions(actions_bytes: &[u8]) -> [u8; DIGEST_LENGTH] {
    sha256_array(actions_bytes)
}

/// Compute both commitments from the canonical encodings.
pub fn compute_commitments(metadata_bytes: &[u8], actions_bytes: &[u8]) -> Commitments {
    Commitments {
        public_metadata_hash: hash_metadata(metadata_bytes),
        destination_actions_hash: hash_actions(actions_bytes),
    }
}

impl Commitments {
    /// Compare against the authoritative record, field by field.
    ///
    /// Both fields are always checked; the first mismatch in declaration
    /// order is reported.
    pub fn check_against(&self, recorded: &Commitments) -> Result<(), CommitmentField> {
        let metadata_ok = self.public_metadata_hash == recorded.public_metadata_hash;
        let actions_ok = self.destination_actions_hash == recorded.destination_actions_hash;
        match (metadata_ok, actions_ok) {
            (true, true) => Ok(()),
            (false, _) => Err(CommitmentField::PublicMetadataHash),
            (true, false) => Err(CommitmentField::DestinationActionsHash),
        }
    }

    /// The digest stored under `field`.
    pub fn get(&self, field: CommitmentField) -> &[u8; DIGEST_LENGTH] {
        match field {
            CommitmentField::PublicMetadataHash => &self.public_metadata_hash,
            CommitmentField::DestinationActionsHash => &self.destination_actions_hash,
        }
    }
}

impl fmt::Debug for Commitments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Commitments")
            .field("public_metadata_hash", &hex::encode(self.public_metadata_hash))
            .field(
                "destination_actions_hash",
                &hex::encode(self.destination_actions_hash),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        let a = compute_commitments(b"meta", b"actions");
        let b = compute_commitments(b"meta", b"actions");
        assert_eq!(a, b);
    }

    #[test]
    fn test_distinct_inputs_distinct_digests() {
        let base = compute_commitments(b"meta", b"actions");
        let other = compute_commitments(b"meta", b"actions!");
        assert_eq!(base.public_metadata_hash, other.public_metadata_hash);
        assert_ne!(base.destination_actions_hash, other.destination_actions_hash);
    }

    #[test]
    fn test_known_vector() {
        // SHA-256 of the empty string.
        let c = compute_commitments(b"", b"");
        assert_eq!(
            hex::encode(c.public_metadata_hash),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_check_names_the_field() {
        let recorded = compute_commitments(b"m", b"a");
        assert_eq!(recorded.check_against(&recorded), Ok(()));

        let bad_actions = compute_commitments(b"m", b"x");
        assert_eq!(
            bad_actions.check_against(&recorded),
            Err(CommitmentField::DestinationActionsHash)
        );

        let bad_both = compute_commitments(b"y", b"x");
        assert_eq!(
            bad_both.check_against(&recorded),
            Err(CommitmentField::PublicMetadataHash)
        );
    }

    #[test]
    fn test_json_shape() {
        let c = compute_commitments(b"m", b"a");
        let json = serde_json::to_value(c).unwrap();
        assert!(json["publicMetadataHash"].as_str().unwrap().starts_with("0x"));
        assert!(json["destinationActionsHash"].is_string());
        let back: Commitments = serde_json::from_value(json).unwrap();
        assert_eq!(back, c);
    }
}
