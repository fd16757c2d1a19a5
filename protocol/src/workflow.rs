//! # Emergency Proposal Workflow
//!
//! Glues the sealing core to its three collaborators.
//!
//! ## Creation
//!
//! ```text
//! ledger: id unused?  ──▶  directory: resolve keys (concurrent)
//!                                │
//!                                ▼
//!                     seal (sync, key never leaves)
//!                                │
//!                                ▼
//!                     store: put envelope  ──▶  ledger: record commitments
//! ```
//!
//! Nothing is recorded unless every earlier step succeeded. A failure
//! between `put` and the ledger write can leave an unreferenced envelope in
//! the store; that is harmless, since `put` is idempotent and nothing points
//! at it.
//!
//! ## Review
//!
//! Ledger record → envelope bytes → verifier pipeline. Each reviewer works
//! alone with their own keypair; there is no shared state between reviews.

use tracing::{info, warn};

use crate::config::WorkflowConfig;
use crate::crypto::CouncilKeypair;
use crate::proposal::{
    open_envelope, preview_metadata, seal_proposal, Address, EncryptedEnvelope, ProposalPayload,
    SealError, VerifiedMetadata, VerifiedProposal, VerifyError,
};
use crate::registry::{
    resolve_recipients, CommitmentLedger, ContentStore, KeyDirectory, LedgerError, LookupCache,
    ProposalId, ProposalRecord,
};

/// Result of a successful [`EmergencyProposals::create`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreatedProposal {
    /// What went into the ledger.
    pub record: ProposalRecord,
    /// Members that received a wrapped key, in wrap order.
    pub recipients: Vec<Address>,
    /// Members that were asked for but have no usable key.
    pub skipped: Vec<Address>,
}

/// Creates and reviews sealed emergency proposals.
#[derive(Debug)]
pub struct EmergencyProposals<D, S, L> {
    directory: D,
    store: S,
    ledger: L,
    config: WorkflowConfig,
}

impl<D, S, L> EmergencyProposals<D, S, L>
where
    D: KeyDirectory,
    S: ContentStore,
    L: CommitmentLedger,
{
    pub fn new(directory: D, store: S, ledger: L, config: WorkflowConfig) -> Self {
        Self {
            directory,
            store,
            ledger,
            config,
        }
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Seal `payload` for `members`, upload it and record its commitments.
    pub async fn create(
        &self,
        proposal_id: ProposalId,
        payload: &ProposalPayload,
        members: &[Address],
    ) -> Result<CreatedProposal, SealError> {
        self.create_with_cache(proposal_id, payload, members, &LookupCache::new())
            .await
    }

    /// Like [`Self::create`], reusing directory answers from `cache`.
    pub async fn create_with_cache(
        &self,
        proposal_id: ProposalId,
        payload: &ProposalPayload,
        members: &[Address],
        cache: &LookupCache,
    ) -> Result<CreatedProposal, SealError> {
        if self.ledger.commitments(proposal_id).await?.is_some() {
            return Err(LedgerError::AlreadyRecorded(proposal_id).into());
        }

        let recipients = resolve_recipients(
            &self.directory,
            members,
            cache,
            self.config.lookup_concurrency(),
        )
        .await?;

        let sealed = seal_proposal(payload, &recipients)?;
        let recipients: Vec<Address> = sealed.envelope.recipients().copied().collect();

        let bytes = sealed.envelope.to_bytes()?;
        let content_id = self.store.put(&bytes).await?;
        let record = self
            .ledger
            .record_commitments(proposal_id, content_id, sealed.commitments)
            .await?;

        info!(
            proposal_id,
            content_id = %content_id,
            recipients = recipients.len(),
            skipped = sealed.skipped.len(),
            "emergency proposal created"
        );

        Ok(CreatedProposal {
            record,
            recipients,
            skipped: sealed.skipped,
        })
    }

    /// Fetch, decrypt and verify a proposal as `identity`.
    pub async fn review(
        &self,
        proposal_id: ProposalId,
        identity: &Address,
        keypair: &CouncilKeypair,
    ) -> Result<VerifiedProposal, VerifyError> {
        let (record, envelope) = self.fetch(proposal_id).await?;
        open_envelope(envelope, record.commitments, identity, keypair)
            .map_err(|e| log_rejection(proposal_id, identity, e))
    }

    /// Metadata-only review. Never decrypts the actions.
    pub async fn preview(
        &self,
        proposal_id: ProposalId,
        identity: &Address,
        keypair: &CouncilKeypair,
    ) -> Result<VerifiedMetadata, VerifyError> {
        let (record, envelope) = self.fetch(proposal_id).await?;
        preview_metadata(envelope, record.commitments, identity, keypair)
            .map_err(|e| log_rejection(proposal_id, identity, e))
    }

    /// The ledger record and parsed envelope for `proposal_id`.
    pub async fn fetch(
        &self,
        proposal_id: ProposalId,
    ) -> Result<(ProposalRecord, EncryptedEnvelope), VerifyError> {
        let record = self
            .ledger
            .commitments(proposal_id)
            .await?
            .ok_or(VerifyError::UnknownProposal(proposal_id))?;
        let bytes = self.store.get(&record.content_id).await?;
        let envelope = EncryptedEnvelope::from_bytes(&bytes)?;
        Ok((record, envelope))
    }
}

fn log_rejection(proposal_id: ProposalId, identity: &Address, error: VerifyError) -> VerifyError {
    warn!(
        proposal_id,
        %identity,
        stage = %error.stage(),
        trust_failure = error.is_trust_failure(),
        "proposal review rejected: {}",
        error
    );
    error
}
