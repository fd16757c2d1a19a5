//! # External Collaborators
//!
//! The three services a sealed proposal depends on but does not own:
//!
//! - [`KeyDirectory`]: where members publish their X25519 keys.
//! - [`ContentStore`]: where envelopes are uploaded, addressed by hash.
//! - [`CommitmentLedger`]: where commitments are recorded, write-once.
//!
//! Each is an async trait with in-process implementations good enough for
//! tests and the CLI. Production deployments plug in their own.

pub mod directory;
pub mod ledger;
pub mod store;

pub use directory::{
    resolve_recipients, DirectoryError, InMemoryKeyRegistry, KeyDirectory, KeyLookup, LookupCache,
};
pub use ledger::{
    CommitmentLedger, InMemoryLedger, JsonFileLedger, LedgerError, ProposalId, ProposalRecord,
};
pub use store::{ContentId, ContentStore, FsContentStore, InMemoryContentStore, StorageError};
