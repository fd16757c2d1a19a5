//! # AES-256-GCM Encryption
//!
//! Authenticated encryption for sealed proposals. Both payload parts (the
//! metadata and the action list) and every per-recipient key wrap go through
//! here.
//!
//! We use AES-256-GCM because it's an AEAD cipher: the ciphertext carries a
//! 16-byte tag, and any bit flip in the nonce, ciphertext or associated data
//! makes decryption fail outright. There is no "corrupted but accepted"
//! outcome. That property is what the whole verifier leans on.
//!
//! ## Nonce management
//!
//! GCM is notoriously unforgiving about nonce reuse. Our strategy: random
//! 96-bit nonces from `OsRng` for every single encryption. A proposal key
//! encrypts exactly two messages, so the birthday bound is a non-issue.
//!
//! ## The ephemeral key
//!
//! [`SymmetricKey`] is the one-shot content key of a proposal. It cannot be
//! cloned, serialized or printed, and its bytes are zeroized on drop.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use std::fmt;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::config::{AES_KEY_LENGTH, AES_NONCE_LENGTH};

/// Errors that can occur during encryption/decryption.
///
/// We intentionally keep these vague. The difference between "wrong key"
/// and "corrupted ciphertext" is none of an attacker's business.
#[derive(Debug, Error)]
pub enum EncryptionError {
    #[error("encryption failed")]
    EncryptFailed,

    #[error("decryption failed -- wrong key or corrupted ciphertext")]
    DecryptFailed,

    #[error("invalid key length: expected {AES_KEY_LENGTH} bytes")]
    InvalidKeyLength,
}

/// A single-use 256-bit content key.
///
/// Generated fresh for every proposal, used for the two payload encryptions
/// and the recipient wraps of the same operation, then dropped.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey {
    bytes: [u8; AES_KEY_LENGTH],
}

impl SymmetricKey {
    /// Draw a fresh key from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; AES_KEY_LENGTH];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Rebuild a key recovered from a wrapped entry.
    ///
    /// Takes ownership of the buffer and wipes it after copying.
    pub(crate) fn from_recovered(mut recovered: Vec<u8>) -> Result<Self, EncryptionError> {
        if recovered.len() != AES_KEY_LENGTH {
            recovered.zeroize();
            return Err(EncryptionError::InvalidKeyLength);
        }
        let mut bytes = [0u8; AES_KEY_LENGTH];
        bytes.copy_from_slice(&recovered);
        recovered.zeroize();
        Ok(Self { bytes })
    }

    pub(crate) fn as_bytes(&self) -> &[u8; AES_KEY_LENGTH] {
        &self.bytes
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SymmetricKey([REDACTED])")
    }
}

/// Encrypt with Additional Authenticated Data (AAD).
///
/// The AAD is authenticated but NOT encrypted. Returns `(nonce, ciphertext)`
/// where the nonce is 12 random bytes and the ciphertext includes the
/// 16-byte auth tag.
///
/// The caller MUST provide the same AAD at decryption time.
///
/// # Example
///
/// ```
/// use council_seal::crypto::encryption::{decrypt_with_aad, encrypt_with_aad};
///
/// let key = [0x42u8; 32];
/// let (nonce, sealed) = encrypt_with_aad(&key, b"pause the bridge", b"actions").unwrap();
/// let opened = decrypt_with_aad(&key, &nonce, &sealed, b"actions").unwrap();
/// assert_eq!(opened, b"pause the bridge");
/// ```
pub fn encrypt_with_aad(
    key: &[u8; AES_KEY_LENGTH],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<([u8; AES_NONCE_LENGTH], Vec<u8>), EncryptionError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| EncryptionError::EncryptFailed)?;

    let mut nonce_bytes = [0u8; AES_NONCE_LENGTH];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let payload = Payload {
        msg: plaintext,
        aad,
    };

    let ciphertext = cipher
        .encrypt(nonce, payload)
        .map_err(|_| EncryptionError::EncryptFailed)?;

    Ok((nonce_bytes, ciphertext))
}

/// Decrypt ciphertext that was encrypted with [`encrypt_with_aad`].
///
/// The nonce and AAD must match the values used during encryption, or
/// decryption fails with [`EncryptionError::DecryptFailed`].
pub fn decrypt_with_aad(
    key: &[u8; AES_KEY_LENGTH],
    nonce: &[u8; AES_NONCE_LENGTH],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, EncryptionError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| EncryptionError::DecryptFailed)?;
    let nonce = Nonce::from_slice(nonce);

    let payload = Payload {
        msg: ciphertext,
        aad,
    };

    cipher
        .decrypt(nonce, payload)
        .map_err(|_| EncryptionError::DecryptFailed)
}
