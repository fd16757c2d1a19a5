//! # Key Directory
//!
//! Where committee members' published X25519 keys come from, and how a
//! creator turns a list of identities into a list of [`Recipient`]s.
//!
//! A directory answer is one of three things, kept apart on purpose:
//!
//! | Directory says                    | We return                        |
//! |-----------------------------------|----------------------------------|
//! | a 32-byte non-zero key            | `Ok(KeyLookup::Published(key))`  |
//! | nothing / empty / all zeroes      | `Ok(KeyLookup::Absent)`          |
//! | wrong length, or the read failed  | `Err(DirectoryError)`            |
//!
//! Absence is an expected answer and only costs that member their wrapped
//! entry. A directory error is a genuine fault and aborts creation.

use async_trait::async_trait;
use dashmap::DashMap;
use futures::stream::{self, StreamExt, TryStreamExt};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

use crate::crypto::{KeyError, RecipientPublicKey};
use crate::proposal::{Address, Recipient};

// ---------------------------------------------------------------------------
// Errors & lookup result
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The directory holds bytes for this identity that are not a key.
    #[error("malformed public key published for {identity}: {source}")]
    MalformedKey {
        identity: Address,
        #[source]
        source: KeyError,
    },

    /// The directory could not be read at all.
    #[error("key directory unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of a single public-key lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyLookup {
    Published(RecipientPublicKey),
    Absent,
}

impl KeyLookup {
    /// Classify raw published bytes for `identity`.
    pub fn from_published(identity: Address, raw: Option<&[u8]>) -> Result<Self, DirectoryError> {
        match RecipientPublicKey::from_published(raw) {
            Ok(Some(key)) => Ok(Self::Published(key)),
            Ok(None) => Ok(Self::Absent),
            Err(source) => Err(DirectoryError::MalformedKey { identity, source }),
        }
    }

    pub fn into_option(self) -> Option<RecipientPublicKey> {
        match self {
            Self::Published(key) => Some(key),
            Self::Absent => None,
        }
    }
}

/// Read access to published committee keys.
#[async_trait]
pub trait KeyDirectory: Send + Sync {
    /// The key `identity` has published, if any.
    async fn public_key(&self, identity: &Address) -> Result<KeyLookup, DirectoryError>;
}

// ---------------------------------------------------------------------------
// In-memory registry
// ---------------------------------------------------------------------------

/// Raw bytes as published, hex in JSON.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
struct PublishedBytes(#[serde(with = "crate::serde_hex::bytes")] Vec<u8>);

/// On-disk shape of an [`InMemoryKeyRegistry`].
#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistrySnapshot {
    keys: BTreeMap<Address, PublishedBytes>,
}

/// A directory backed by a map of raw published bytes.
///
/// Stores exactly what was published, zero keys included, so it behaves
/// like a real registry contract: a revoked member's entry reads back as
/// zeroes and the lookup classifies it as absent.
#[derive(Debug, Default)]
pub struct InMemoryKeyRegistry {
    keys: RwLock<BTreeMap<Address, Vec<u8>>>,
}

impl InMemoryKeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish (or replace) `identity`'s key.
    pub fn publish(&self, identity: Address, key: &RecipientPublicKey) {
        self.publish_raw(identity, key.as_bytes().to_vec());
    }

    /// Store arbitrary bytes for `identity`, as an on-chain registry would
    /// accept them.
    pub fn publish_raw(&self, identity: Address, bytes: Vec<u8>) {
        self.keys.write().insert(identity, bytes);
    }

    /// Overwrite `identity`'s key with zeroes. The identity stays
    /// registered.
    pub fn revoke(&self, identity: &Address) -> bool {
        match self.keys.write().get_mut(identity) {
            Some(bytes) => {
                bytes.iter_mut().for_each(|b| *b = 0);
                true
            }
            None => false,
        }
    }

    /// Every identity that has ever published, in address order.
    pub fn registered(&self) -> Vec<Address> {
        self.keys.read().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.read().is_empty()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let snapshot = RegistrySnapshot {
            keys: self
                .keys
                .read()
                .iter()
                .map(|(identity, bytes)| (*identity, PublishedBytes(bytes.clone())))
                .collect(),
        };
        serde_json::to_string_pretty(&snapshot)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let snapshot: RegistrySnapshot = serde_json::from_str(json)?;
        Ok(Self {
            keys: RwLock::new(
                snapshot
                    .keys
                    .into_iter()
                    .map(|(identity, bytes)| (identity, bytes.0))
                    .collect(),
            ),
        })
    }
}

#[async_trait]
impl KeyDirectory for InMemoryKeyRegistry {
    async fn public_key(&self, identity: &Address) -> Result<KeyLookup, DirectoryError> {
        let keys = self.keys.read();
        KeyLookup::from_published(*identity, keys.get(identity).map(Vec::as_slice))
    }
}

// ---------------------------------------------------------------------------
// Lookup cache & recipient resolution
// ---------------------------------------------------------------------------

/// Operation-scoped memo of directory answers.
///
/// Passed in explicitly by whoever owns the operation. Only successful
/// answers are cached; errors are retried on the next lookup.
#[derive(Debug, Default)]
pub struct LookupCache {
    entries: DashMap<Address, Option<RecipientPublicKey>>,
}

impl LookupCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Some(answer)` if `identity` was already looked up.
    pub fn get(&self, identity: &Address) -> Option<Option<RecipientPublicKey>> {
        self.entries.get(identity).map(|entry| *entry.value())
    }

    pub fn insert(&self, identity: Address, key: Option<RecipientPublicKey>) {
        self.entries.insert(identity, key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

/// Look up every identity's key, at most `concurrency` at a time.
///
/// The output has one [`Recipient`] per input identity, in input order,
/// each carrying its own lookup result.
pub async fn resolve_recipients<D>(
    directory: &D,
    identities: &[Address],
    cache: &LookupCache,
    concurrency: usize,
) -> Result<Vec<Recipient>, DirectoryError>
where
    D: KeyDirectory + ?Sized,
{
    let lookups = identities
        .iter()
        .map(|identity| lookup_one(directory, *identity, cache));

    stream::iter(lookups)
        .buffered(concurrency.max(1))
        .try_collect()
        .await
}

async fn lookup_one<D>(
    directory: &D,
    identity: Address,
    cache: &LookupCache,
) -> Result<Recipient, DirectoryError>
where
    D: KeyDirectory + ?Sized,
{
    if let Some(cached) = cache.get(&identity) {
        return Ok(Recipient::new(identity, cached));
    }
    let key = directory.public_key(&identity).await?.into_option();
    debug!(%identity, published = key.is_some(), "public key looked up");
    cache.insert(identity, key);
    Ok(Recipient::new(identity, key))
}
