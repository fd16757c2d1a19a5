//! # Cryptographic Primitives for Sealed Proposals
//!
//! Every encrypted byte and every commitment digest in the crate flows
//! through here:
//!
//! - **AES-256-GCM** for payload encryption and key wrapping.
//! - **X25519** for per-recipient key agreement.
//! - **BLAKE3** `derive_key` for the wrapping KDF.
//! - **SHA-256** for commitments.
//!
//! Everything here is a thin, type-safe wrapper around audited
//! implementations.

pub mod encryption;
pub mod hash;
pub mod keys;
pub mod wrap;

pub use encryption::{EncryptionError, SymmetricKey};
pub use hash::sha256_array;
pub use keys::{CouncilKeypair, KeyError, RecipientPublicKey};
pub use wrap::{unwrap_key, wrap_key, WrapError};
