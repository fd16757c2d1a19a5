//! # Council Encryption Keys
//!
//! X25519 keypairs for Security Council members.
//!
//! Each committee member publishes the public half of a [`CouncilKeypair`]
//! to the key directory. Proposal creators wrap the content key under those
//! published keys; members recover it with their secret half.
//!
//! ## Security considerations
//!
//! - Secret scalars are zeroized on drop (thanks, x25519-dalek).
//! - We use `OsRng` for key generation.
//! - Key bytes are never logged. `Debug` prints the public half only.
//! - `CouncilKeypair` does NOT implement `Serialize`/`Deserialize`.
//!   Exporting a secret should be a deliberate act: use
//!   [`CouncilKeypair::secret_key_hex`].

use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::config::X25519_KEY_LENGTH;

/// Errors that can occur during key parsing.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid secret key bytes: expected {X25519_KEY_LENGTH} bytes of hex")]
    InvalidSecretKey,

    #[error("invalid public key bytes: expected {X25519_KEY_LENGTH} bytes, got {0}")]
    InvalidPublicKeyLength(usize),

    #[error("invalid public key encoding: {0}")]
    InvalidPublicKeyEncoding(String),
}

/// A council member's long-term X25519 keypair.
///
/// # Examples
///
/// ```
/// use council_seal::crypto::CouncilKeypair;
///
/// let kp = CouncilKeypair::generate();
/// let restored = CouncilKeypair::from_hex(&kp.secret_key_hex()).unwrap();
/// assert_eq!(kp.public_key(), restored.public_key());
/// ```
pub struct CouncilKeypair {
    secret: StaticSecret,
    public: PublicKey,
}

impl CouncilKeypair {
    /// Generate a fresh keypair from the OS CSPRNG.
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Rebuild a keypair from raw secret bytes.
    pub fn from_secret_bytes(bytes: [u8; X25519_KEY_LENGTH]) -> Self {
        let secret = StaticSecret::from(bytes);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Rebuild a keypair from a hex-encoded secret (with or without `0x`).
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let bytes = crate::serde_hex::decode_prefixed(hex_str.trim())
            .map_err(|_| KeyError::InvalidSecretKey)?;
        let arr: [u8; X25519_KEY_LENGTH] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::InvalidSecretKey)?;
        Ok(Self::from_secret_bytes(arr))
    }

    /// The public half, safe to publish.
    pub fn public_key(&self) -> RecipientPublicKey {
        RecipientPublicKey {
            bytes: self.public.to_bytes(),
        }
    }

    /// Exports the secret as hex. **Handle with extreme care.**
    pub fn secret_key_hex(&self) -> String {
        hex::encode(self.secret.to_bytes())
    }

    pub(crate) fn secret(&self) -> &StaticSecret {
        &self.secret
    }
}

impl fmt::Debug for CouncilKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CouncilKeypair(pub={})", self.public_key().to_hex())
    }
}

// ---------------------------------------------------------------------------
// RecipientPublicKey
// ---------------------------------------------------------------------------

/// A published X25519 public key that proposal keys get wrapped under.
///
/// There is no "empty" or "zero" instance of this type. A
/// directory entry that is missing, empty or all zeroes means "no key", and
/// [`RecipientPublicKey::from_published`] turns it into `None` at the
/// boundary instead of letting a sentinel leak into the wrap code.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipientPublicKey {
    #[serde(with = "crate::serde_hex::array")]
    bytes: [u8; X25519_KEY_LENGTH],
}

impl RecipientPublicKey {
    /// Interpret raw bytes read from a key directory.
    ///
    /// - `None`, empty or all-zero → `Ok(None)` (member has no key).
    /// - Wrong length → `Err`, that's a broken directory, not an absence.
    pub fn from_published(raw: Option<&[u8]>) -> Result<Option<Self>, KeyError> {
        let raw = match raw {
            None => return Ok(None),
            Some(raw) if raw.is_empty() || raw.iter().all(|b| *b == 0) => return Ok(None),
            Some(raw) => raw,
        };
        let bytes: [u8; X25519_KEY_LENGTH] = raw
            .try_into()
            .map_err(|_| KeyError::InvalidPublicKeyLength(raw.len()))?;
        Ok(Some(Self { bytes }))
    }

    /// Parse a hex-encoded public key (with or without `0x`).
    ///
    /// An all-zero key parses to `None`, same as [`Self::from_published`].
    pub fn from_hex(s: &str) -> Result<Option<Self>, KeyError> {
        let bytes = crate::serde_hex::decode_prefixed(s.trim())
            .map_err(|e| KeyError::InvalidPublicKeyEncoding(e.to_string()))?;
        Self::from_published(Some(bytes.as_slice()))
    }

    pub fn as_bytes(&self) -> &[u8; X25519_KEY_LENGTH] {
        &self.bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    pub(crate) fn to_dalek(self) -> PublicKey {
        PublicKey::from(self.bytes)
    }
}

impl fmt::Display for RecipientPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for RecipientPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecipientPublicKey({})", &self.to_hex()[..16])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_keypairs_differ() {
        let a = CouncilKeypair::generate();
        let b = CouncilKeypair::generate();
        assert_ne!(a.public_key(), b.public_key());
    }

    #[test]
    fn test_secret_hex_roundtrip() {
        let kp = CouncilKeypair::generate();
        let restored = CouncilKeypair::from_hex(&format!("0x{}", kp.secret_key_hex())).unwrap();
        assert_eq!(kp.public_key(), restored.public_key());
    }

    #[test]
    fn test_invalid_secret_hex_rejected() {
        assert!(CouncilKeypair::from_hex("deadbeef").is_err());
        assert!(CouncilKeypair::from_hex("not-hex-at-all").is_err());
    }

    #[test]
    fn test_absent_and_zero_keys_are_none() {
        assert!(RecipientPublicKey::from_published(None).unwrap().is_none());
        assert!(RecipientPublicKey::from_published(Some(&[0u8; 0][..]))
            .unwrap()
            .is_none());
        assert!(RecipientPublicKey::from_published(Some(&[0u8; 32][..]))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_wrong_length_is_an_error_not_absence() {
        assert!(matches!(
            RecipientPublicKey::from_published(Some(&[7u8; 31][..])),
            Err(KeyError::InvalidPublicKeyLength(31))
        ));
    }

    #[test]
    fn test_public_key_hex_roundtrip() {
        let pk = CouncilKeypair::generate().public_key();
        let parsed = RecipientPublicKey::from_hex(&pk.to_hex()).unwrap();
        assert_eq!(parsed, Some(pk));
    }

    #[test]
    fn test_public_key_json_is_hex() {
        let pk = CouncilKeypair::generate().public_key();
        let json = serde_json::to_string(&pk).unwrap();
        assert_eq!(json, format!("\"0x{}\"", pk.to_hex()));
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let kp = CouncilKeypair::generate();
        let debug_str = format!("{:?}", kp);
        assert!(debug_str.starts_with("CouncilKeypair(pub="));
        assert!(!debug_str.contains(&kp.secret_key_hex()));
    }
}
