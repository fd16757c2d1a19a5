//! # Per-Recipient Key Wrapping
//!
//! Sealed-box style (ECIES) wrapping of a proposal's [`SymmetricKey`] under a
//! council member's published X25519 key.
//!
//! ## Construction
//!
//! For every recipient, independently:
//!
//! 1. Generate a fresh ephemeral X25519 keypair.
//! 2. `shared = X25519(ephemeral_secret, recipient_pub)`; reject the
//!    recipient if the result is non-contributory (low-order public key).
//! 3. Derive the wrapping key:
//!
//!    ```text
//!    kek = BLAKE3-derive-key(
//!      context = "council-seal v1 recipient key wrap",
//!      input   = shared || ephemeral_pub || recipient_pub
//!    )
//!    ```
//!
//! 4. `AES-256-GCM(kek, random nonce, key, aad = caller context)`.
//!
//! The wrapped entry is `ephemeral_pub (32) || nonce (12) || ct+tag (48)`.
//!
//! Each wrap uses its own ephemeral secret, so entries share nothing but the
//! plaintext. Holding one member's secret says nothing about another
//! member's entry. The ephemeral secret is consumed by the DH call and
//! cannot be reused.

use rand::rngs::OsRng;
use thiserror::Error;
use x25519_dalek::{EphemeralSecret, PublicKey};
use zeroize::Zeroizing;

use super::encryption::{decrypt_with_aad, encrypt_with_aad, EncryptionError, SymmetricKey};
use super::hash::derive_key_from_parts;
use super::keys::{CouncilKeypair, RecipientPublicKey};
use crate::config::{
    AES_KEY_LENGTH, AES_NONCE_LENGTH, WRAPPED_KEY_LENGTH, WRAP_KDF_CONTEXT, X25519_KEY_LENGTH,
};

/// Errors from wrapping or unwrapping a content key.
#[derive(Debug, Error)]
pub enum WrapError {
    /// The recipient key is a low-order point; DH output would be
    /// predictable. Treated as "no usable key".
    #[error("recipient public key is not usable for key agreement")]
    NonContributoryKey,

    #[error("wrapped key has wrong length: expected {WRAPPED_KEY_LENGTH} bytes, got {0}")]
    MalformedWrappedKey(usize),

    /// Wrong private key, corrupted entry, or wrong context. We don't say which.
    #[error("key unwrap failed")]
    UnwrapFailed,

    #[error(transparent)]
    Encryption(#[from] EncryptionError),
}

/// Wrap `key` so that only the holder of `recipient`'s secret can recover it.
///
/// `context` is bound as associated data and must be presented again on
/// unwrap. Callers pass the recipient identity so an entry cannot be
/// relabelled to another member.
pub fn wrap_key(
    key: &SymmetricKey,
    recipient: &RecipientPublicKey,
    context: &[u8],
) -> Result<Vec<u8>, WrapError> {
    let ephemeral = EphemeralSecret::random_from_rng(OsRng);
    let ephemeral_pub = PublicKey::from(&ephemeral);
    let shared = ephemeral.diffie_hellman(&recipient.to_dalek());
    if !shared.was_contributory() {
        return Err(WrapError::NonContributoryKey);
    }

    let kek = derive_wrapping_key(
        shared.as_bytes(),
        ephemeral_pub.as_bytes(),
        recipient.as_bytes(),
    );
    let (nonce, ciphertext) = encrypt_with_aad(&kek, key.as_bytes(), context)?;

    let mut out = Vec::with_capacity(WRAPPED_KEY_LENGTH);
    out.extend_from_slice(ephemeral_pub.as_bytes());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Recover a content key from a wrapped entry with the member's keypair.
pub fn unwrap_key(
    wrapped: &[u8],
    keypair: &CouncilKeypair,
    context: &[u8],
) -> Result<SymmetricKey, WrapError> {
    if wrapped.len() != WRAPPED_KEY_LENGTH {
        return Err(WrapError::MalformedWrappedKey(wrapped.len()));
    }
    let (ephemeral_bytes, rest) = wrapped.split_at(X25519_KEY_LENGTH);
    let (nonce_bytes, ciphertext) = rest.split_at(AES_NONCE_LENGTH);

    let ephemeral_pub: [u8; X25519_KEY_LENGTH] = ephemeral_bytes
        .try_into()
        .map_err(|_| WrapError::MalformedWrappedKey(wrapped.len()))?;
    let nonce: [u8; AES_NONCE_LENGTH] = nonce_bytes
        .try_into()
        .map_err(|_| WrapError::MalformedWrappedKey(wrapped.len()))?;

    let shared = keypair
        .secret()
        .diffie_hellman(&PublicKey::from(ephemeral_pub));
    if !shared.was_contributory() {
        return Err(WrapError::UnwrapFailed);
    }

    let kek = derive_wrapping_key(
        shared.as_bytes(),
        &ephemeral_pub,
        keypair.public_key().as_bytes(),
    );
    let recovered = decrypt_with_aad(&kek, &nonce, ciphertext, context)
        .map_err(|_| WrapError::UnwrapFailed)?;

    SymmetricKey::from_recovered(recovered).map_err(|_| WrapError::UnwrapFailed)
}

/// All three inputs are fixed-length, so plain concatenation is unambiguous.
fn derive_wrapping_key(
    shared_secret: &[u8; 32],
    ephemeral_pub: &[u8; X25519_KEY_LENGTH],
    recipient_pub: &[u8; X25519_KEY_LENGTH],
) -> Zeroizing<[u8; AES_KEY_LENGTH]> {
    Zeroizing::new(derive_key_from_parts(
        WRAP_KDF_CONTEXT,
        &[shared_secret, ephemeral_pub, recipient_pub],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_unwrap_roundtrip() {
        let member = CouncilKeypair::generate();
        let key = SymmetricKey::generate();

        let wrapped = wrap_key(&key, &member.public_key(), b"member-1").unwrap();
        assert_eq!(wrapped.len(), WRAPPED_KEY_LENGTH);

        let recovered = unwrap_key(&wrapped, &member, b"member-1").unwrap();
        assert_eq!(recovered.as_bytes(), key.as_bytes());
    }

    #[test]
    fn test_wrong_keypair_cannot_unwrap() {
        let member = CouncilKeypair::generate();
        let outsider = CouncilKeypair::generate();
        let key = SymmetricKey::generate();

        let wrapped = wrap_key(&key, &member.public_key(), b"ctx").unwrap();
        assert!(matches!(
            unwrap_key(&wrapped, &outsider, b"ctx"),
            Err(WrapError::UnwrapFailed)
        ));
    }

    #[test]
    fn test_context_is_bound() {
        let member = CouncilKeypair::generate();
        let key = SymmetricKey::generate();
        let wrapped = wrap_key(&key, &member.public_key(), b"alice").unwrap();
        assert!(unwrap_key(&wrapped, &member, b"mallory").is_err());
    }

    #[test]
    fn test_corrupted_entry_fails() {
        let member = CouncilKeypair::generate();
        let key = SymmetricKey::generate();
        let mut wrapped = wrap_key(&key, &member.public_key(), b"ctx").unwrap();
        let last = wrapped.len() - 1;
        wrapped[last] ^= 0x80;
        assert!(matches!(
            unwrap_key(&wrapped, &member, b"ctx"),
            Err(WrapError::UnwrapFailed)
        ));
    }

    #[test]
    fn test_truncated_entry_is_malformed() {
        let member = CouncilKeypair::generate();
        assert!(matches!(
            unwrap_key(&[0u8; 40], &member, b"ctx"),
            Err(WrapError::MalformedWrappedKey(40))
        ));
    }

    #[test]
    fn test_wraps_are_independent() {
        // Same key, same recipient, two wraps: fresh ephemeral keys mean the
        // entries share no bytes worth mentioning.
        let member = CouncilKeypair::generate();
        let key = SymmetricKey::generate();
        let a = wrap_key(&key, &member.public_key(), b"ctx").unwrap();
        let b = wrap_key(&key, &member.public_key(), b"ctx").unwrap();
        assert_ne!(a[..X25519_KEY_LENGTH], b[..X25519_KEY_LENGTH]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_low_order_key_rejected() {
        // The identity point. Every DH with it yields all zeroes.
        let mut low_order = [0u8; 32];
        low_order[0] = 1;
        let recipient = RecipientPublicKey::from_published(Some(&low_order[..]))
            .unwrap()
            .unwrap();
        let key = SymmetricKey::generate();
        assert!(matches!(
            wrap_key(&key, &recipient, b"ctx"),
            Err(WrapError::NonContributoryKey)
        ));
    }
}
