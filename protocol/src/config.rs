//! # Sealing Configuration & Constants
//!
//! Every magic number in the sealing subsystem lives here. If you're
//! hardcoding a length or a context string somewhere else, you're doing it
//! wrong and you owe the team coffee.
//!
//! Most of these values are baked into envelopes that sit in a
//! content-addressed store forever. Changing them after the first emergency
//! proposal ships means bumping [`ENVELOPE_VERSION`] and keeping the old
//! code path alive. Choose wisely.

// ---------------------------------------------------------------------------
// Envelope Format
// ---------------------------------------------------------------------------

/// Wire format version of [`EncryptedEnvelope`](crate::proposal::EncryptedEnvelope).
///
/// Mixed into the associated data of both payload ciphertexts, so an
/// envelope cannot be replayed under a different version's parsing rules.
pub const ENVELOPE_VERSION: u16 = 1;

/// Associated-data label for the metadata ciphertext.
pub const METADATA_PART_LABEL: &str = "council-seal/v1/metadata";

/// Associated-data label for the actions ciphertext.
pub const ACTIONS_PART_LABEL: &str = "council-seal/v1/actions";

/// Upper bound on a single canonical encoding (metadata or actions).
///
/// Emergency proposals are a title, a description and a handful of calls.
/// Anything near this size is a bug or an attack.
pub const MAX_CANONICAL_PAYLOAD_BYTES: u64 = 4 * 1024 * 1024;

/// Maximum number of non-empty lists and maps a metadata value may sit
/// inside. Enforced when lowering at seal time and before decoding at
/// review time.
pub const MAX_CANONICAL_DEPTH: usize = 64;

// ---------------------------------------------------------------------------
// Cryptographic Parameters
// ---------------------------------------------------------------------------

/// Symmetric payload encryption. 256-bit keys, 96-bit nonces, 128-bit tags.
pub const SYMMETRIC_ALGORITHM: &str = "AES-256-GCM";

/// Key agreement used for per-recipient key wrapping.
pub const KEY_AGREEMENT_ALGORITHM: &str = "X25519";

/// Hash used for commitments recorded outside the envelope. SHA-256 because
/// the ledger on the other side speaks it natively.
pub const COMMITMENT_HASH_FUNCTION: &str = "SHA-256";

/// AES-256-GCM key length in bytes.
pub const AES_KEY_LENGTH: usize = 32;

/// AES-256-GCM nonce length in bytes. Twelve. Not 16. Not 8.
pub const AES_NONCE_LENGTH: usize = 12;

/// AES-256-GCM authentication tag length in bytes.
pub const AES_TAG_LENGTH: usize = 16;

/// X25519 public and secret key length in bytes.
pub const X25519_KEY_LENGTH: usize = 32;

/// Commitment digest length in bytes.
pub const DIGEST_LENGTH: usize = 32;

/// Committee-member and action-target address length in bytes.
pub const ADDRESS_LENGTH: usize = 20;

/// BLAKE3 `derive_key` context for the per-recipient wrapping key.
///
/// Never reuse this string for anything else. Domain separation only works
/// if every context is unique.
pub const WRAP_KDF_CONTEXT: &str = "council-seal v1 recipient key wrap";

/// Length of a wrapped key entry:
/// `ephemeral_pub (32) || nonce (12) || encrypted key (32) || tag (16)`.
pub const WRAPPED_KEY_LENGTH: usize =
    X25519_KEY_LENGTH + AES_NONCE_LENGTH + AES_KEY_LENGTH + AES_TAG_LENGTH;

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// Default number of public-key lookups in flight at once during creation.
///
/// Committees are small (a dozen members, give or take), so this usually
/// means "all of them at once".
pub const DEFAULT_MAX_CONCURRENT_LOOKUPS: usize = 16;

/// Runtime knobs for [`EmergencyProposals`](crate::workflow::EmergencyProposals).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowConfig {
    /// Upper bound on concurrent key-directory reads while resolving the
    /// recipient set. Zero is treated as one.
    pub max_concurrent_lookups: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_concurrent_lookups: DEFAULT_MAX_CONCURRENT_LOOKUPS,
        }
    }
}

impl WorkflowConfig {
    /// Returns the effective concurrency, never less than one.
    pub fn lookup_concurrency(&self) -> usize {
        self.max_concurrent_lookups.max(1)
    }
}
