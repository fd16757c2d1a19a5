//! # Hashing Utilities
//!
//! Two hash functions, two jobs:
//!
//! - **SHA-256**: commitments. The digests leave this crate and get
//!   recorded by an external ledger, so we use the hash the rest of the
//!   world already has a precompile for.
//!
//! - **BLAKE3**: key derivation. Internal to the wrap construction and
//!   never seen by anyone else, so we use the faster hash with a proper
//!   `derive_key` mode for domain separation.

use sha2::{Digest, Sha256};

use crate::config::DIGEST_LENGTH;

/// Compute the SHA-256 hash of the input data as a fixed-size array.
///
/// # Example
///
/// ```
/// use council_seal::crypto::sha256_array;
///
/// let digest = sha256_array(b"emergency");
/// assert_eq!(digest.len(), 32);
/// ```
pub fn sha256_array(data: &[u8]) -> [u8; DIGEST_LENGTH] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; DIGEST_LENGTH];
    output.copy_from_slice(&result);
    output
}

/// Derive 32 bytes of key material from several inputs under a context.
///
/// Uses BLAKE3's `derive_key` mode, which picks a different internal IV per
/// context string, so outputs for different contexts can never collide.
/// Parts are fed sequentially; callers must only pass fixed-length parts,
/// otherwise `["ab", "c"]` and `["a", "bc"]` derive the same key.
pub fn derive_key_from_parts(context: &str, parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    for part in parts {
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}
