//! # Envelope Encryption Engine
//!
//! Turns a [`ProposalPayload`] and a recipient list into an
//! [`EncryptedEnvelope`] plus the [`Commitments`] to record elsewhere.
//!
//! ## Order of operations
//!
//! ```text
//! encode metadata, encode actions        (EncodingError: nothing generated yet)
//!   -> hash both                         (commitments)
//!   -> pick valid recipients             (NoValidRecipients: still no key)
//!   -> generate content key
//!   -> AES-256-GCM(metadata), AES-256-GCM(actions)
//!   -> wrap the key once per recipient
//!   -> drop the key
//! ```
//!
//! Everything here is synchronous. The content key lives on this stack
//! frame only: it is never returned, never logged, and never crosses an
//! `.await` or a thread boundary.

use std::collections::HashSet;
use tracing::{debug, info, warn};

use super::canonical::{encode_actions, encode_metadata};
use super::commitment::{compute_commitments, Commitments};
use super::envelope::{part_aad, wrap_aad, EncryptedEnvelope, PayloadPart, SealedPart, WrappedKey};
use super::error::SealError;
use super::types::{Address, ProposalPayload, Recipient};
use crate::config::ENVELOPE_VERSION;
use crate::crypto::encryption::encrypt_with_aad;
use crate::crypto::{wrap_key, RecipientPublicKey, SymmetricKey, WrapError};

/// Output of a successful seal.
#[derive(Clone, Debug)]
pub struct SealedProposal {
    /// Goes to the content-addressed store.
    pub envelope: EncryptedEnvelope,
    /// Goes to the commitment ledger.
    pub commitments: Commitments,
    /// Recipients that were offered but received no wrapped key.
    pub skipped: Vec<Address>,
}

/// Seal `payload` for every recipient with a usable public key.
///
/// Recipients without a key, or with a key that fails key agreement, are
/// skipped with a warning. Duplicate identities are wrapped once; the first
/// occurrence wins. Fails with [`SealError::NoValidRecipients`] if nobody is
/// left, in which case no envelope or commitments exist.
pub fn seal_proposal(
    payload: &ProposalPayload,
    recipients: &[Recipient],
) -> Result<SealedProposal, SealError> {
    let metadata_bytes = encode_metadata(payload.metadata())?;
    let actions_bytes = encode_actions(payload.actions())?;
    let commitments = compute_commitments(&metadata_bytes, &actions_bytes);

    let (targets, mut skipped) = select_targets(recipients);
    if targets.is_empty() {
        return Err(SealError::NoValidRecipients {
            considered: recipients.len(),
        });
    }

    let key = SymmetricKey::generate();
    let encrypted_metadata = seal_part(&key, PayloadPart::Metadata, &metadata_bytes)?;
    let encrypted_actions = seal_part(&key, PayloadPart::Actions, &actions_bytes)?;

    let mut wrapped_keys = Vec::with_capacity(targets.len());
    for (identity, public_key) in targets {
        match wrap_key(&key, &public_key, &wrap_aad(&identity)) {
            Ok(wrapped_key) => wrapped_keys.push(WrappedKey {
                identity,
                wrapped_key,
            }),
            Err(WrapError::NonContributoryKey) => {
                warn!(%identity, "published key is unusable for key agreement, skipping recipient");
                skipped.push(identity);
            }
            Err(e) => return Err(e.into()),
        }
    }
    drop(key);

    if wrapped_keys.is_empty() {
        return Err(SealError::NoValidRecipients {
            considered: recipients.len(),
        });
    }

    info!(
        recipients = wrapped_keys.len(),
        skipped = skipped.len(),
        metadata_bytes = metadata_bytes.len(),
        actions = payload.actions().len(),
        "proposal sealed"
    );

    Ok(SealedProposal {
        envelope: EncryptedEnvelope {
            version: ENVELOPE_VERSION,
            encrypted_metadata,
            encrypted_actions,
            wrapped_keys,
        },
        commitments,
        skipped,
    })
}

fn seal_part(key: &SymmetricKey, part: PayloadPart, plaintext: &[u8]) -> Result<SealedPart, SealError> {
    let (nonce, ciphertext) =
        encrypt_with_aad(key.as_bytes(), plaintext, &part_aad(part, ENVELOPE_VERSION))?;
    Ok(SealedPart { nonce, ciphertext })
}

/// Valid, de-duplicated recipients in input order, plus the skipped ones.
fn select_targets(recipients: &[Recipient]) -> (Vec<(Address, RecipientPublicKey)>, Vec<Address>) {
    let mut seen = HashSet::with_capacity(recipients.len());
    let mut targets = Vec::with_capacity(recipients.len());
    let mut skipped = Vec::new();

    for recipient in recipients {
        if !seen.insert(recipient.identity) {
            debug!(identity = %recipient.identity, "duplicate recipient ignored");
            continue;
        }
        match recipient.public_key {
            Some(public_key) => targets.push((recipient.identity, public_key)),
            None => {
                warn!(identity = %recipient.identity, "recipient has no published key, skipping");
                skipped.push(recipient.identity);
            }
        }
    }
    (targets, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AES_TAG_LENGTH, WRAPPED_KEY_LENGTH};
    use crate::crypto::{unwrap_key, CouncilKeypair};
    use crate::proposal::types::ProposalAction;
    use serde_json::json;

    fn addr(byte: u8) -> Address {
        Address::from_bytes([byte; 20])
    }

    fn payload() -> ProposalPayload {
        ProposalPayload::new(
            &json!({ "title": "Pause bridge" }),
            vec![ProposalAction::transfer(addr(0xee), 1_000)],
        )
        .unwrap()
    }

    #[test]
    fn test_one_entry_per_valid_recipient() {
        let a = CouncilKeypair::generate();
        let b = CouncilKeypair::generate();
        let recipients = vec![
            Recipient::with_key(addr(1), a.public_key()),
            Recipient::without_key(addr(2)),
            Recipient::with_key(addr(3), b.public_key()),
        ];

        let sealed = seal_proposal(&payload(), &recipients).unwrap();
        let identities: Vec<_> = sealed.envelope.recipients().copied().collect();
        assert_eq!(identities, vec![addr(1), addr(3)]);
        assert_eq!(sealed.skipped, vec![addr(2)]);
        for entry in &sealed.envelope.wrapped_keys {
            assert_eq!(entry.wrapped_key.len(), WRAPPED_KEY_LENGTH);
        }
    }

    #[test]
    fn test_every_wrap_recovers_the_same_key() {
        let members: Vec<_> = (0..3).map(|_| CouncilKeypair::generate()).collect();
        let recipients: Vec<_> = members
            .iter()
            .enumerate()
            .map(|(i, kp)| Recipient::with_key(addr(i as u8 + 1), kp.public_key()))
            .collect();

        let sealed = seal_proposal(&payload(), &recipients).unwrap();
        let keys: Vec<_> = sealed
            .envelope
            .wrapped_keys
            .iter()
            .zip(&members)
            .map(|(entry, kp)| {
                unwrap_key(&entry.wrapped_key, kp, &wrap_aad(&entry.identity))
                    .unwrap()
                    .as_bytes()
                    .to_vec()
            })
            .collect();
        assert!(keys.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_no_recipients_fails_closed() {
        let err = seal_proposal(&payload(), &[]).unwrap_err();
        assert!(matches!(err, SealError::NoValidRecipients { considered: 0 }));

        let keyless = vec![Recipient::without_key(addr(1)), Recipient::without_key(addr(2))];
        let err = seal_proposal(&payload(), &keyless).unwrap_err();
        assert!(matches!(err, SealError::NoValidRecipients { considered: 2 }));
    }

    #[test]
    fn test_low_order_only_fails_closed() {
        let mut identity_point = [0u8; 32];
        identity_point[0] = 1;
        let key = RecipientPublicKey::from_published(Some(&identity_point[..]))
            .unwrap()
            .unwrap();
        let err = seal_proposal(&payload(), &[Recipient::with_key(addr(1), key)]).unwrap_err();
        assert!(matches!(err, SealError::NoValidRecipients { considered: 1 }));
    }

    #[test]
    fn test_duplicates_wrapped_once() {
        let kp = CouncilKeypair::generate();
        let recipients = vec![
            Recipient::with_key(addr(1), kp.public_key()),
            Recipient::with_key(addr(1), kp.public_key()),
        ];
        let sealed = seal_proposal(&payload(), &recipients).unwrap();
        assert_eq!(sealed.envelope.wrapped_keys.len(), 1);
        assert!(sealed.skipped.is_empty());
    }

    #[test]
    fn test_oversized_metadata_is_an_encoding_error() {
        let kp = CouncilKeypair::generate();
        let huge = "x".repeat(5 * 1024 * 1024);
        let payload = ProposalPayload::new(&json!({ "title": huge }), vec![]).unwrap();
        let err = seal_proposal(&payload, &[Recipient::with_key(addr(1), kp.public_key())])
            .unwrap_err();
        assert!(matches!(err, SealError::Encoding(_)));
    }

    #[test]
    fn test_commitments_independent_of_randomness() {
        let kp = CouncilKeypair::generate();
        let recipients = vec![Recipient::with_key(addr(1), kp.public_key())];
        let first = seal_proposal(&payload(), &recipients).unwrap();
        let second = seal_proposal(&payload(), &recipients).unwrap();

        assert_eq!(first.commitments, second.commitments);
        assert_ne!(
            first.envelope.encrypted_actions.ciphertext,
            second.envelope.encrypted_actions.ciphertext
        );
    }

    #[test]
    fn test_nonces_differ_between_parts() {
        let kp = CouncilKeypair::generate();
        let sealed = seal_proposal(&payload(), &[Recipient::with_key(addr(1), kp.public_key())])
            .unwrap();
        assert_ne!(
            sealed.envelope.encrypted_metadata.nonce,
            sealed.envelope.encrypted_actions.nonce
        );
        let actions_len = encode_actions(payload().actions()).unwrap().len();
        assert_eq!(
            sealed.envelope.encrypted_actions.ciphertext.len(),
            actions_len + AES_TAG_LENGTH
        );
    }
}
