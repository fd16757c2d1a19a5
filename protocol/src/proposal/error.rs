//! Error types for sealing and reviewing emergency proposals.
//!
//! Creation and verification fail in very different ways, so they get
//! separate enums. Every creation error is fatal to the whole operation.
//! Every verification error is a terminal rejection, and each one maps to
//! the [`VerificationStage`] it was raised in so a caller can tell "this
//! envelope isn't for me" from "someone tampered with it".

use std::fmt;
use thiserror::Error;

use super::canonical::EncodingError;
use super::commitment::CommitmentField;
use super::envelope::{EnvelopeFormatError, PayloadPart};
use super::types::Address;
use crate::crypto::{EncryptionError, WrapError};
use crate::registry::{DirectoryError, LedgerError, StorageError};

/// Errors that abort proposal creation.
#[derive(Debug, Error)]
pub enum SealError {
    /// Metadata or actions have no canonical encoding. Raised before any
    /// key material exists.
    #[error("canonical encoding failed: {0}")]
    Encoding(#[from] EncodingError),

    /// Not one recipient had a usable public key. No envelope, no
    /// commitments.
    #[error("no valid recipients ({considered} considered)")]
    NoValidRecipients {
        /// How many recipients were offered, valid or not.
        considered: usize,
    },

    /// Payload encryption failed.
    #[error("payload encryption failed: {0}")]
    Encryption(#[from] EncryptionError),

    /// Key wrapping failed for a reason other than an unusable key.
    #[error("key wrapping failed: {0}")]
    Wrap(#[from] WrapError),

    /// The envelope could not be serialized for upload.
    #[error("envelope serialization failed: {0}")]
    Envelope(#[from] EnvelopeFormatError),

    /// A key directory lookup failed outright (not merely "no key").
    #[error("key directory error: {0}")]
    Directory(#[from] DirectoryError),

    /// Uploading the envelope failed.
    #[error("content store error: {0}")]
    Storage(#[from] StorageError),

    /// Recording the commitments failed.
    #[error("commitment ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// The step of the review pipeline an error was raised in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VerificationStage {
    /// Loading the ledger record and the envelope.
    Fetch,
    /// Finding and unwrapping the caller's key entry.
    Unwrap,
    /// Decrypting and decoding the payload parts.
    Decrypt,
    /// Comparing recomputed commitments with the recorded ones.
    Verify,
}

impl fmt::Display for VerificationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Fetch => "fetch",
            Self::Unwrap => "unwrap",
            Self::Decrypt => "decrypt",
            Self::Verify => "verify",
        };
        f.write_str(name)
    }
}

/// Errors that reject a proposal during review.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// The envelope carries no wrapped key for this identity.
    #[error("{identity} is not a recipient of this proposal")]
    NotARecipient {
        /// The identity that asked.
        identity: Address,
    },

    /// The wrapped entry exists but could not be opened with the caller's
    /// key: wrong key or corrupted entry.
    #[error("could not unwrap the proposal key: {0}")]
    UnwrapFailed(#[source] WrapError),

    /// AEAD tag check failed. The ciphertext was modified.
    #[error("integrity check failed for encrypted {part}")]
    IntegrityFailure {
        /// Which ciphertext failed.
        part: PayloadPart,
    },

    /// Authenticated plaintext that does not decode. Only the creator's
    /// key could have produced it.
    #[error("decrypted {part} is not a valid canonical encoding: {source}")]
    MalformedPayload {
        /// Which part failed to decode.
        part: PayloadPart,
        #[source]
        source: EncodingError,
    },

    /// Decrypted content does not match the recorded commitment.
    #[error("commitment mismatch on {field}: recorded {recorded}, recomputed {recomputed}")]
    CommitmentMismatch {
        /// The mismatched digest.
        field: CommitmentField,
        /// Hex of the authoritative digest.
        recorded: String,
        /// Hex of the digest recomputed from the decrypted content.
        recomputed: String,
    },

    /// No commitments are recorded for this proposal id.
    #[error("no commitments recorded for proposal {0}")]
    UnknownProposal(u64),

    /// The stored bytes are not an envelope this version understands.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(#[from] EnvelopeFormatError),

    #[error("content store error: {0}")]
    Storage(#[from] StorageError),

    #[error("commitment ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl VerifyError {
    /// The pipeline stage this error was raised in.
    pub fn stage(&self) -> VerificationStage {
        match self {
            Self::UnknownProposal(_)
            | Self::MalformedEnvelope(_)
            | Self::Storage(_)
            | Self::Ledger(_) => VerificationStage::Fetch,
            Self::NotARecipient { .. } | Self::UnwrapFailed(_) => VerificationStage::Unwrap,
            Self::IntegrityFailure { .. } | Self::MalformedPayload { .. } => {
                VerificationStage::Decrypt
            }
            Self::CommitmentMismatch { .. } => VerificationStage::Verify,
        }
    }

    /// True when the content itself cannot be trusted, as opposed to the
    /// caller simply lacking access. These must reach the approver as a
    /// trust failure.
    pub fn is_trust_failure(&self) -> bool {
        matches!(
            self,
            Self::IntegrityFailure { .. }
                | Self::MalformedPayload { .. }
                | Self::CommitmentMismatch { .. }
        )
    }
}
