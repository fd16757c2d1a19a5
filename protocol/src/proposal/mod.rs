//! # Sealed Emergency Proposals
//!
//! Envelope encryption for proposals that must stay confidential until the
//! security council acts on them, yet stay provably tied to what was
//! recorded at creation time.
//!
//! ```text
//!                      ┌──────────────────┐
//!   ProposalPayload ──▶│ canonical encode │──┬──▶ SHA-256 ──▶ Commitments ──▶ ledger
//!                      └──────────────────┘  │
//!                                            └──▶ AES-256-GCM ──▶ EncryptedEnvelope ──▶ store
//!                                                  (one key)        ▲
//!                              recipients ──▶ X25519 wrap per member┘
//! ```
//!
//! Review runs the same path backwards: unwrap, decrypt, re-encode, hash,
//! compare with the ledger.
//!
//! ## Modules
//!
//! - `types`: addresses, actions, payloads, recipients
//! - `canonical`: the fixed byte encoding commitments are computed over
//! - `commitment`: the two digests recorded outside the envelope
//! - `envelope`: the wire structure handed to the content store
//! - `seal`: creation
//! - `verify`: review
//! - `error`: `SealError`, `VerifyError`

pub mod canonical;
pub mod commitment;
pub mod envelope;
pub mod error;
pub mod seal;
pub mod types;
pub mod verify;

pub use canonical::{CanonicalValue, EncodingError};
pub use commitment::{compute_commitments, CommitmentField, Commitments};
pub use envelope::{EncryptedEnvelope, EnvelopeFormatError, PayloadPart, SealedPart, WrappedKey};
pub use error::{SealError, VerificationStage, VerifyError};
pub use seal::{seal_proposal, SealedProposal};
pub use types::{Address, AddressError, ProposalAction, ProposalPayload, Recipient};
pub use verify::{
    open_envelope, preview_metadata, DecryptedMetadata, DecryptedProposal, FetchedEnvelope,
    UnwrappedEnvelope, VerifiedMetadata, VerifiedProposal,
};
