//! # Commitment Ledger
//!
//! The authoritative, append-only record of what each emergency proposal
//! committed to. In production this is the on-chain proposal record; here
//! it is a trait with an in-memory and a JSON-file implementation.
//!
//! Records are write-once. Recording a second set of commitments for an
//! existing proposal id fails with [`LedgerError::AlreadyRecorded`] instead
//! of overwriting, since silently replacing a commitment would defeat the
//! point of having one.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

use super::store::ContentId;
use crate::proposal::Commitments;

/// Proposal identifiers are plain integers, as on chain.
pub type ProposalId = u64;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("commitments already recorded for proposal {0}")]
    AlreadyRecorded(ProposalId),

    #[error("ledger file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("ledger I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// One recorded proposal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalRecord {
    pub proposal_id: ProposalId,
    /// Where the sealed envelope lives.
    pub content_id: ContentId,
    pub commitments: Commitments,
    pub recorded_at: DateTime<Utc>,
}

#[async_trait]
pub trait CommitmentLedger: Send + Sync {
    /// Record commitments for a new proposal. Write-once.
    async fn record_commitments(
        &self,
        proposal_id: ProposalId,
        content_id: ContentId,
        commitments: Commitments,
    ) -> LedgerResult<ProposalRecord>;

    /// The record for `proposal_id`, if one exists.
    async fn commitments(&self, proposal_id: ProposalId) -> LedgerResult<Option<ProposalRecord>>;
}

fn new_record(
    proposal_id: ProposalId,
    content_id: ContentId,
    commitments: Commitments,
) -> ProposalRecord {
    ProposalRecord {
        proposal_id,
        content_id,
        commitments,
        recorded_at: Utc::now(),
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct InMemoryLedger {
    records: RwLock<BTreeMap<ProposalId, ProposalRecord>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl CommitmentLedger for InMemoryLedger {
    async fn record_commitments(
        &self,
        proposal_id: ProposalId,
        content_id: ContentId,
        commitments: Commitments,
    ) -> LedgerResult<ProposalRecord> {
        let mut records = self.records.write();
        if records.contains_key(&proposal_id) {
            return Err(LedgerError::AlreadyRecorded(proposal_id));
        }
        let record = new_record(proposal_id, content_id, commitments);
        records.insert(proposal_id, record.clone());
        Ok(record)
    }

    async fn commitments(&self, proposal_id: ProposalId) -> LedgerResult<Option<ProposalRecord>> {
        Ok(self.records.read().get(&proposal_id).cloned())
    }
}

// ---------------------------------------------------------------------------
// JSON file
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerFile {
    records: Vec<ProposalRecord>,
}

/// A ledger persisted as a single pretty-printed JSON file.
///
/// Every write rereads the file and replaces it via rename while holding an
/// async mutex (recorders in this process) and an exclusive `flock` on a
/// sibling `.lock` file (recorders in other processes, e.g. two CLI `seal`
/// runs). Neither can lose the other's records.
#[derive(Debug)]
pub struct JsonFileLedger {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileLedger {
    /// Use `path` as the ledger file. It is created on first write.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every record, in proposal-id order.
    pub async fn records(&self) -> LedgerResult<Vec<ProposalRecord>> {
        Ok(self.load().await?.into_values().collect())
    }

    async fn load(&self) -> LedgerResult<BTreeMap<ProposalId, ProposalRecord>> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        let file: LedgerFile = serde_json::from_slice(&raw)?;
        Ok(file
            .records
            .into_iter()
            .map(|record| (record.proposal_id, record))
            .collect())
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }

    async fn ensure_parent(&self) -> LedgerResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        Ok(())
    }

    async fn save(&self, records: &BTreeMap<ProposalId, ProposalRecord>) -> LedgerResult<()> {
        let file = LedgerFile {
            records: records.values().cloned().collect(),
        };
        let json = serde_json::to_vec_pretty(&file)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl CommitmentLedger for JsonFileLedger {
    async fn record_commitments(
        &self,
        proposal_id: ProposalId,
        content_id: ContentId,
        commitments: Commitments,
    ) -> LedgerResult<ProposalRecord> {
        let _guard = self.write_lock.lock().await;
        self.ensure_parent().await?;
        let _file_lock = FileLock::acquire(self.lock_path()).await?;
        let mut records = self.load().await?;
        if records.contains_key(&proposal_id) {
            return Err(LedgerError::AlreadyRecorded(proposal_id));
        }
        let record = new_record(proposal_id, content_id, commitments);
        records.insert(proposal_id, record.clone());
        self.save(&records).await?;
        info!(proposal_id, content_id = %content_id, path = %self.path.display(), "commitments recorded");
        Ok(record)
    }

    async fn commitments(&self, proposal_id: ProposalId) -> LedgerResult<Option<ProposalRecord>> {
        Ok(self.load().await?.remove(&proposal_id))
    }
}

/// Exclusive advisory lock on a file, released when dropped.
struct FileLock {
    _file: std::fs::File,
}

impl FileLock {
    async fn acquire(path: PathBuf) -> LedgerResult<Self> {
        let file = tokio::task::spawn_blocking(move || -> std::io::Result<std::fs::File> {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&path)?;
            lock_exclusive(&file)?;
            Ok(file)
        })
        .await
        .map_err(|e| std::io::Error::new(ErrorKind::Other, e))??;
        Ok(Self { _file: file })
    }
}

#[cfg(unix)]
fn lock_exclusive(file: &std::fs::File) -> std::io::Result<()> {
    use std::os::unix::io::AsRawFd;
    loop {
        // SAFETY: `file` owns a valid descriptor for the duration of the call.
        let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
        if result == 0 {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        if err.kind() != ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

// TODO: use LockFileEx on Windows; other platforms only get the in-process mutex.
#[cfg(not(unix))]
fn lock_exclusive(_file: &std::fs::File) -> std::io::Result<()> {
    Ok(())
}
