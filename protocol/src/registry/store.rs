//! # Content-Addressed Store
//!
//! Where sealed envelopes live. An envelope is addressed by the SHA-256 of
//! its own bytes, written `sha256:<hex>`, so `put` is naturally idempotent:
//! uploading the same bytes twice yields the same id and changes nothing.
//!
//! Two implementations:
//!
//! - [`InMemoryContentStore`] for tests and single-process use.
//! - [`FsContentStore`], one file per id under a root directory.
//!
//! Both check on `get` that the bytes still hash to the requested id.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

use crate::config::DIGEST_LENGTH;
use crate::crypto::sha256_array;

const CONTENT_ID_PREFIX: &str = "sha256:";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("content not found: {0}")]
    NotFound(ContentId),

    #[error("invalid content id: {0}")]
    InvalidContentId(String),

    /// The bytes on hand do not hash to the id they were stored under.
    #[error("stored content does not match its id {0}")]
    Corrupted(ContentId),

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

// ---------------------------------------------------------------------------
// Content id
// ---------------------------------------------------------------------------

/// `sha256:<64 hex chars>`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentId([u8; DIGEST_LENGTH]);

impl ContentId {
    /// The id `bytes` would be stored under.
    pub fn for_bytes(bytes: &[u8]) -> Self {
        Self(sha256_array(bytes))
    }

    pub fn digest(&self) -> &[u8; DIGEST_LENGTH] {
        &self.0
    }

    fn matches(&self, bytes: &[u8]) -> bool {
        Self::for_bytes(bytes) == *self
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", CONTENT_ID_PREFIX, hex::encode(self.0))
    }
}

impl fmt::Debug for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentId({})", self)
    }
}

impl FromStr for ContentId {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || StorageError::InvalidContentId(s.to_string());
        let digest_hex = s.trim().strip_prefix(CONTENT_ID_PREFIX).ok_or_else(invalid)?;
        let bytes = hex::decode(digest_hex).map_err(|_| invalid())?;
        let digest: [u8; DIGEST_LENGTH] = bytes.try_into().map_err(|_| invalid())?;
        Ok(Self(digest))
    }
}

impl Serialize for ContentId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ContentId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Content-addressed blob storage.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store `bytes` and return their id. Storing the same bytes again is a
    /// no-op returning the same id.
    async fn put(&self, bytes: &[u8]) -> StorageResult<ContentId>;

    /// Fetch the bytes stored under `id`, or [`StorageError::NotFound`].
    async fn get(&self, id: &ContentId) -> StorageResult<Vec<u8>>;
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct InMemoryContentStore {
    blobs: RwLock<HashMap<ContentId, Vec<u8>>>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }

    /// Overwrite whatever is stored under `id`. Test hook for simulating a
    /// misbehaving store.
    pub fn replace_unchecked(&self, id: ContentId, bytes: Vec<u8>) {
        self.blobs.write().insert(id, bytes);
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn put(&self, bytes: &[u8]) -> StorageResult<ContentId> {
        let id = ContentId::for_bytes(bytes);
        self.blobs
            .write()
            .entry(id)
            .or_insert_with(|| bytes.to_vec());
        Ok(id)
    }

    async fn get(&self, id: &ContentId) -> StorageResult<Vec<u8>> {
        let bytes = self
            .blobs
            .read()
            .get(id)
            .cloned()
            .ok_or(StorageError::NotFound(*id))?;
        if !id.matches(&bytes) {
            return Err(StorageError::Corrupted(*id));
        }
        Ok(bytes)
    }
}

// ---------------------------------------------------------------------------
// Filesystem
// ---------------------------------------------------------------------------

/// One file per envelope, named by the hex digest.
///
/// Writes go to a temporary file first and are renamed into place, so a
/// crashed `put` never leaves a truncated blob under a valid name.
#[derive(Debug, Clone)]
pub struct FsContentStore {
    root: PathBuf,
}

impl FsContentStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub async fn open<P: AsRef<Path>>(root: P) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: &ContentId) -> PathBuf {
        self.root.join(hex::encode(id.digest()))
    }
}

#[async_trait]
impl ContentStore for FsContentStore {
    async fn put(&self, bytes: &[u8]) -> StorageResult<ContentId> {
        let id = ContentId::for_bytes(bytes);
        let path = self.path_for(&id);
        if tokio::fs::try_exists(&path).await? {
            debug!(content_id = %id, "content already stored");
            return Ok(id);
        }

        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(content_id = %id, len = bytes.len(), "content stored");
        Ok(id)
    }

    async fn get(&self, id: &ContentId) -> StorageResult<Vec<u8>> {
        let bytes = match tokio::fs::read(self.path_for(id)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(StorageError::NotFound(*id)),
            Err(e) => return Err(e.into()),
        };
        if !id.matches(&bytes) {
            return Err(StorageError::Corrupted(*id));
        }
        Ok(bytes)
    }
}
