//! # Envelope Verifier
//!
//! The reviewer's side of a sealed proposal, as a typestate pipeline:
//!
//! ```text
//! FetchedEnvelope ──unwrap_for──▶ UnwrappedEnvelope ──decrypt──▶ DecryptedProposal ──verify──▶ VerifiedProposal
//!        │                              │                             │
//!        ▼                              ▼                             ▼
//!  NotARecipient                 IntegrityFailure              CommitmentMismatch
//!  UnwrapFailed                  MalformedPayload
//! ```
//!
//! Each transition consumes the previous state, so the only way to hold a
//! [`VerifiedProposal`] is to have gone through every step. Any error is a
//! terminal rejection.
//!
//! The recovered content key lives inside [`UnwrappedEnvelope`] and is
//! dropped (and zeroized) by the decrypt step.
//!
//! [`UnwrappedEnvelope::decrypt_metadata`] is a shorter path for listing
//! screens: it opens only the metadata part and checks only its digest.

use tracing::{debug, info, warn};

use super::canonical::{decode_actions, decode_metadata, encode_actions, encode_metadata, CanonicalValue};
use super::commitment::{compute_commitments, hash_metadata, CommitmentField, Commitments};
use super::envelope::{part_aad, wrap_aad, EncryptedEnvelope, PayloadPart};
use super::error::VerifyError;
use super::types::{Address, ProposalAction, ProposalPayload};
use crate::crypto::encryption::decrypt_with_aad;
use crate::crypto::{unwrap_key, CouncilKeypair, SymmetricKey};

// ---------------------------------------------------------------------------
// Fetched
// ---------------------------------------------------------------------------

/// An envelope paired with the authoritative commitments it must match.
#[derive(Debug, Clone)]
pub struct FetchedEnvelope {
    envelope: EncryptedEnvelope,
    recorded: Commitments,
}

impl FetchedEnvelope {
    pub fn new(envelope: EncryptedEnvelope, recorded: Commitments) -> Self {
        Self { envelope, recorded }
    }

    pub fn envelope(&self) -> &EncryptedEnvelope {
        &self.envelope
    }

    pub fn recorded(&self) -> &Commitments {
        &self.recorded
    }

    /// Locate `identity`'s wrapped entry and recover the content key.
    pub fn unwrap_for(
        self,
        identity: &Address,
        keypair: &CouncilKeypair,
    ) -> Result<UnwrappedEnvelope, VerifyError> {
        let entry = self
            .envelope
            .entry_for(identity)
            .ok_or(VerifyError::NotARecipient {
                identity: *identity,
            })?;

        let key = unwrap_key(&entry.wrapped_key, keypair, &wrap_aad(identity))
            .map_err(VerifyError::UnwrapFailed)?;
        debug!(%identity, "content key unwrapped");

        Ok(UnwrappedEnvelope {
            envelope: self.envelope,
            recorded: self.recorded,
            key,
        })
    }
}

// ---------------------------------------------------------------------------
// Unwrapped
// ---------------------------------------------------------------------------

/// Holds the recovered content key. Not `Clone`.
#[derive(Debug)]
pub struct UnwrappedEnvelope {
    envelope: EncryptedEnvelope,
    recorded: Commitments,
    key: SymmetricKey,
}

impl UnwrappedEnvelope {
    /// Decrypt and decode both parts, then recompute the commitments from
    /// the canonical re-encoding of what came out.
    pub fn decrypt(self) -> Result<DecryptedProposal, VerifyError> {
        let metadata_plain = open_part(&self.key, &self.envelope, PayloadPart::Metadata)?;
        let actions_plain = open_part(&self.key, &self.envelope, PayloadPart::Actions)?;
        drop(self.key);

        let metadata = decode_metadata(&metadata_plain).map_err(|source| {
            VerifyError::MalformedPayload {
                part: PayloadPart::Metadata,
                source,
            }
        })?;
        let actions = decode_actions(&actions_plain).map_err(|source| {
            VerifyError::MalformedPayload {
                part: PayloadPart::Actions,
                source,
            }
        })?;

        let metadata_bytes =
            encode_metadata(&metadata).map_err(|source| VerifyError::MalformedPayload {
                part: PayloadPart::Metadata,
                source,
            })?;
        let actions_bytes =
            encode_actions(&actions).map_err(|source| VerifyError::MalformedPayload {
                part: PayloadPart::Actions,
                source,
            })?;

        Ok(DecryptedProposal {
            payload: ProposalPayload::from_parts(metadata, actions),
            recomputed: compute_commitments(&metadata_bytes, &actions_bytes),
            recorded: self.recorded,
        })
    }

    /// Decrypt only the metadata part. The actions ciphertext is never
    /// touched.
    pub fn decrypt_metadata(self) -> Result<DecryptedMetadata, VerifyError> {
        let plain = open_part(&self.key, &self.envelope, PayloadPart::Metadata)?;
        drop(self.key);

        let metadata = decode_metadata(&plain).map_err(|source| VerifyError::MalformedPayload {
            part: PayloadPart::Metadata,
            source,
        })?;
        let bytes = encode_metadata(&metadata).map_err(|source| VerifyError::MalformedPayload {
            part: PayloadPart::Metadata,
            source,
        })?;

        Ok(DecryptedMetadata {
            metadata,
            recomputed: hash_metadata(&bytes),
            recorded: self.recorded,
        })
    }
}

fn open_part(
    key: &SymmetricKey,
    envelope: &EncryptedEnvelope,
    part: PayloadPart,
) -> Result<Vec<u8>, VerifyError> {
    let sealed = envelope.part(part);
    decrypt_with_aad(
        key.as_bytes(),
        &sealed.nonce,
        &sealed.ciphertext,
        &part_aad(part, envelope.version),
    )
    .map_err(|_| VerifyError::IntegrityFailure { part })
}

// ---------------------------------------------------------------------------
// Decrypted
// ---------------------------------------------------------------------------

/// Plaintext that has not yet been checked against the ledger.
#[derive(Debug, Clone)]
pub struct DecryptedProposal {
    payload: ProposalPayload,
    recomputed: Commitments,
    recorded: Commitments,
}

impl DecryptedProposal {
    pub fn recomputed(&self) -> &Commitments {
        &self.recomputed
    }

    /// Compare recomputed and recorded commitments field by field.
    pub fn verify(self) -> Result<VerifiedProposal, VerifyError> {
        if let Err(field) = self.recomputed.check_against(&self.recorded) {
            return Err(mismatch(field, &self.recorded, &self.recomputed));
        }
        info!(
            actions = self.payload.actions().len(),
            "proposal matches recorded commitments"
        );
        Ok(VerifiedProposal {
            payload: self.payload,
            commitments: self.recorded,
        })
    }
}

/// Metadata-only counterpart of [`DecryptedProposal`].
#[derive(Debug, Clone)]
pub struct DecryptedMetadata {
    metadata: CanonicalValue,
    recomputed: [u8; 32],
    recorded: Commitments,
}

impl DecryptedMetadata {
    /// Check only `publicMetadataHash`.
    pub fn verify(self) -> Result<VerifiedMetadata, VerifyError> {
        if self.recomputed != self.recorded.public_metadata_hash {
            let mut recomputed = self.recorded;
            recomputed.public_metadata_hash = self.recomputed;
            return Err(mismatch(
                CommitmentField::PublicMetadataHash,
                &self.recorded,
                &recomputed,
            ));
        }
        Ok(VerifiedMetadata {
            metadata: self.metadata,
            commitments: self.recorded,
        })
    }
}

fn mismatch(field: CommitmentField, recorded: &Commitments, recomputed: &Commitments) -> VerifyError {
    warn!(%field, "decrypted content does not match recorded commitment");
    VerifyError::CommitmentMismatch {
        field,
        recorded: hex::encode(recorded.get(field)),
        recomputed: hex::encode(recomputed.get(field)),
    }
}

// ---------------------------------------------------------------------------
// Verified
// ---------------------------------------------------------------------------

/// A proposal whose content matches the recorded commitments exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedProposal {
    payload: ProposalPayload,
    commitments: Commitments,
}

impl VerifiedProposal {
    pub fn metadata(&self) -> &CanonicalValue {
        self.payload.metadata()
    }

    pub fn actions(&self) -> &[ProposalAction] {
        self.payload.actions()
    }

    pub fn commitments(&self) -> &Commitments {
        &self.commitments
    }

    pub fn into_payload(self) -> ProposalPayload {
        self.payload
    }
}

/// Metadata whose digest matches `publicMetadataHash`. The actions are
/// still unverified and unread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedMetadata {
    metadata: CanonicalValue,
    commitments: Commitments,
}

impl VerifiedMetadata {
    pub fn metadata(&self) -> &CanonicalValue {
        &self.metadata
    }

    pub fn commitments(&self) -> &Commitments {
        &self.commitments
    }
}

// ---------------------------------------------------------------------------
// One-shot helpers
// ---------------------------------------------------------------------------

/// Run the whole pipeline for one reviewer.
pub fn open_envelope(
    envelope: EncryptedEnvelope,
    recorded: Commitments,
    identity: &Address,
    keypair: &CouncilKeypair,
) -> Result<VerifiedProposal, VerifyError> {
    FetchedEnvelope::new(envelope, recorded)
        .unwrap_for(identity, keypair)?
        .decrypt()?
        .verify()
}

/// Run the metadata-only pipeline for one reviewer.
pub fn preview_metadata(
    envelope: EncryptedEnvelope,
    recorded: Commitments,
    identity: &Address,
    keypair: &CouncilKeypair,
) -> Result<VerifiedMetadata, VerifyError> {
    FetchedEnvelope::new(envelope, recorded)
        .unwrap_for(identity, keypair)?
        .decrypt_metadata()?
        .verify()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::wrap_key;
    use crate::proposal::canonical::EncodingError;
    use crate::proposal::error::VerificationStage;
    use crate::proposal::seal::{seal_proposal, SealedProposal};
    use crate::proposal::types::Recipient;
    use serde_json::json;

    fn addr(byte: u8) -> Address {
        Address::from_bytes([byte; 20])
    }

    fn payload() -> ProposalPayload {
        ProposalPayload::new(
            &json!({ "title": "Test", "severity": "critical" }),
            vec![
                ProposalAction::transfer(addr(0xaa), 5),
                ProposalAction::new(addr(0xbb), 0, vec![0x84, 0x56, 0xcb, 0x59]),
            ],
        )
        .unwrap()
    }

    fn sealed_for(member: &CouncilKeypair) -> SealedProposal {
        seal_proposal(&payload(), &[Recipient::with_key(addr(1), member.public_key())]).unwrap()
    }

    #[test]
    fn test_full_pipeline() {
        let member = CouncilKeypair::generate();
        let sealed = sealed_for(&member);

        let verified =
            open_envelope(sealed.envelope, sealed.commitments, &addr(1), &member).unwrap();
        assert_eq!(verified.metadata().get("title").and_then(|v| v.as_str()), Some("Test"));
        assert_eq!(verified.actions(), payload().actions());
        assert_eq!(verified.commitments(), &sealed.commitments);
    }

    #[test]
    fn test_not_a_recipient() {
        let member = CouncilKeypair::generate();
        let sealed = sealed_for(&member);
        let err = open_envelope(sealed.envelope, sealed.commitments, &addr(9), &member)
            .unwrap_err();
        assert!(matches!(err, VerifyError::NotARecipient { identity } if identity == addr(9)));
        assert_eq!(err.stage(), VerificationStage::Unwrap);
    }

    #[test]
    fn test_wrong_private_key() {
        let member = CouncilKeypair::generate();
        let impostor = CouncilKeypair::generate();
        let sealed = sealed_for(&member);
        let err = open_envelope(sealed.envelope, sealed.commitments, &addr(1), &impostor)
            .unwrap_err();
        assert!(matches!(err, VerifyError::UnwrapFailed(_)));
    }

    #[test]
    fn test_relabelled_entry_fails_to_unwrap() {
        // Move member 1's entry under another identity. Same keypair, but
        // the identity is bound into the wrap.
        let member = CouncilKeypair::generate();
        let mut sealed = sealed_for(&member);
        sealed.envelope.wrapped_keys[0].identity = addr(2);
        let err = open_envelope(sealed.envelope, sealed.commitments, &addr(2), &member)
            .unwrap_err();
        assert!(matches!(err, VerifyError::UnwrapFailed(_)));
    }

    #[test]
    fn test_bit_flip_in_actions_is_integrity_failure() {
        let member = CouncilKeypair::generate();
        let mut sealed = sealed_for(&member);
        sealed.envelope.encrypted_actions.ciphertext[0] ^= 0x01;
        let err = open_envelope(sealed.envelope, sealed.commitments, &addr(1), &member)
            .unwrap_err();
        assert!(matches!(
            err,
            VerifyError::IntegrityFailure {
                part: PayloadPart::Actions
            }
        ));
        assert!(err.is_trust_failure());
    }

    #[test]
    fn test_swapped_parts_are_integrity_failure() {
        let member = CouncilKeypair::generate();
        let mut sealed = sealed_for(&member);
        std::mem::swap(
            &mut sealed.envelope.encrypted_metadata,
            &mut sealed.envelope.encrypted_actions,
        );
        let err = open_envelope(sealed.envelope, sealed.commitments, &addr(1), &member)
            .unwrap_err();
        assert!(matches!(
            err,
            VerifyError::IntegrityFailure {
                part: PayloadPart::Metadata
            }
        ));
    }

    #[test]
    fn test_substituted_envelope_is_commitment_mismatch() {
        // A fully valid envelope for different actions, checked against the
        // original commitments.
        let member = CouncilKeypair::generate();
        let original = sealed_for(&member);
        let substitute = seal_proposal(
            &ProposalPayload::new(
                &json!({ "title": "Test", "severity": "critical" }),
                vec![ProposalAction::transfer(addr(0xcc), 5_000_000)],
            )
            .unwrap(),
            &[Recipient::with_key(addr(1), member.public_key())],
        )
        .unwrap();

        let err = open_envelope(substitute.envelope, original.commitments, &addr(1), &member)
            .unwrap_err();
        match err {
            VerifyError::CommitmentMismatch { field, .. } => {
                assert_eq!(field, CommitmentField::DestinationActionsHash)
            }
            other => panic!("expected CommitmentMismatch, got {other:?}"),
        }
    }

    /// Encrypt arbitrary plaintexts under a fresh key wrapped for `member`,
    /// keeping the commitments of the honest proposal.
    fn resealed_with(
        member: &CouncilKeypair,
        metadata_plain: &[u8],
        actions_plain: &[u8],
    ) -> SealedProposal {
        let mut sealed = sealed_for(member);
        let key = SymmetricKey::generate();
        let version = sealed.envelope.version;
        for (part, plain) in [
            (PayloadPart::Metadata, metadata_plain),
            (PayloadPart::Actions, actions_plain),
        ] {
            let (nonce, ciphertext) = crate::crypto::encryption::encrypt_with_aad(
                key.as_bytes(),
                plain,
                &part_aad(part, version),
            )
            .unwrap();
            let sealed_part = match part {
                PayloadPart::Metadata => &mut sealed.envelope.encrypted_metadata,
                PayloadPart::Actions => &mut sealed.envelope.encrypted_actions,
            };
            sealed_part.nonce = nonce;
            sealed_part.ciphertext = ciphertext;
        }
        sealed.envelope.wrapped_keys[0].wrapped_key =
            wrap_key(&key, &member.public_key(), &wrap_aad(&addr(1))).unwrap();
        sealed
    }

    #[test]
    fn test_garbage_plaintext_is_malformed_payload() {
        // Actions decrypt fine but are not a canonical action list.
        let member = CouncilKeypair::generate();
        let metadata_plain = encode_metadata(payload().metadata()).unwrap();
        let sealed = resealed_with(&member, &metadata_plain, b"\xff\xff");

        let err = open_envelope(sealed.envelope, sealed.commitments, &addr(1), &member)
            .unwrap_err();
        assert!(matches!(
            err,
            VerifyError::MalformedPayload {
                part: PayloadPart::Actions,
                ..
            }
        ));
    }

    #[test]
    fn test_deeply_nested_metadata_is_malformed_payload() {
        // 200k single-element lists fit well under the size limit; decoding
        // them recursively would exhaust the stack.
        let mut metadata_plain = Vec::with_capacity(200_000 * 12 + 4);
        for _ in 0..200_000 {
            metadata_plain.extend_from_slice(&5u32.to_le_bytes());
            metadata_plain.extend_from_slice(&1u64.to_le_bytes());
        }
        metadata_plain.extend_from_slice(&0u32.to_le_bytes());
        let actions_plain = encode_actions(payload().actions()).unwrap();
        let member = CouncilKeypair::generate();
        let sealed = resealed_with(&member, &metadata_plain, &actions_plain);

        let err = open_envelope(
            sealed.envelope.clone(),
            sealed.commitments,
            &addr(1),
            &member,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            VerifyError::MalformedPayload {
                part: PayloadPart::Metadata,
                source: EncodingError::TooDeep { .. },
            }
        ));
        assert_eq!(err.stage(), VerificationStage::Decrypt);

        let err = preview_metadata(sealed.envelope, sealed.commitments, &addr(1), &member)
            .unwrap_err();
        assert!(matches!(
            err,
            VerifyError::MalformedPayload {
                part: PayloadPart::Metadata,
                ..
            }
        ));
    }

    #[test]
    fn test_metadata_preview_ignores_actions() {
        let member = CouncilKeypair::generate();
        let mut sealed = sealed_for(&member);
        // Corrupt the actions: the preview must not notice.
        sealed.envelope.encrypted_actions.ciphertext.clear();

        let preview =
            preview_metadata(sealed.envelope, sealed.commitments, &addr(1), &member).unwrap();
        assert_eq!(preview.metadata().get("severity").and_then(|v| v.as_str()), Some("critical"));
    }

    #[test]
    fn test_metadata_preview_checks_metadata_digest() {
        let member = CouncilKeypair::generate();
        let sealed = sealed_for(&member);
        let mut recorded = sealed.commitments;
        recorded.public_metadata_hash[0] ^= 0xff;

        let err = preview_metadata(sealed.envelope, recorded, &addr(1), &member).unwrap_err();
        assert!(matches!(
            err,
            VerifyError::CommitmentMismatch {
                field: CommitmentField::PublicMetadataHash,
                ..
            }
        ));
    }

    #[test]
    fn test_stepwise_recomputed_matches_recorded() {
        let member = CouncilKeypair::generate();
        let sealed = sealed_for(&member);
        let decrypted = FetchedEnvelope::new(sealed.envelope, sealed.commitments)
            .unwrap_for(&addr(1), &member)
            .unwrap()
            .decrypt()
            .unwrap();
        assert_eq!(decrypted.recomputed(), &sealed.commitments);
    }
}
