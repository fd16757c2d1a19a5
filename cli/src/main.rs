// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Council Seal CLI
//!
//! Entry point for the `council-seal` binary. Parses arguments, initializes
//! logging, and runs one subcommand against a file-backed key registry,
//! content store and commitment ledger.
//!
//! - `keygen` : generate a member keypair
//! - `publish`: publish a member's public key
//! - `seal`   : seal, upload and record a proposal
//! - `open`   : decrypt and verify a proposal
//! - `inspect`: list an envelope's recipients
//! - `version`: print build version information

mod cli;
mod files;
mod logging;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::json;

use council_seal::config::{WorkflowConfig, ENVELOPE_VERSION};
use council_seal::crypto::CouncilKeypair;
use council_seal::proposal::{EncryptedEnvelope, VerifyError};
use council_seal::registry::{
    ContentStore, FsContentStore, InMemoryKeyRegistry, JsonFileLedger,
};
use council_seal::EmergencyProposals;

use cli::{Commands, CouncilSealCli, StateArgs};

type FileBackedFlow = EmergencyProposals<InMemoryKeyRegistry, FsContentStore, JsonFileLedger>;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CouncilSealCli::parse();
    logging::init_logging(&cli.log_level, cli.log_format);

    match cli.command {
        Commands::Keygen(args) => keygen(args),
        Commands::Publish(args) => publish(args),
        Commands::Seal(args) => seal(args).await,
        Commands::Open(args) => open(args).await,
        Commands::Inspect(args) => inspect(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

fn keygen(args: cli::KeygenArgs) -> Result<()> {
    let keypair = CouncilKeypair::generate();
    files::write_key_file(&args.out, args.identity, &keypair, args.force)?;

    tracing::info!(
        identity = %args.identity,
        key_path = %args.out.display(),
        "council keypair generated"
    );

    println!("Key file   : {}", args.out.display());
    println!("Identity   : {}", args.identity);
    println!("Public key : {}", keypair.public_key());
    Ok(())
}

fn publish(args: cli::PublishArgs) -> Result<()> {
    let (identity, keypair) = files::read_key_file(&args.key)?;
    let registry = files::load_registry(&args.state.registry)?;
    registry.publish(identity, &keypair.public_key());
    files::save_registry(&args.state.registry, &registry)?;

    tracing::info!(
        %identity,
        registry = %args.state.registry.display(),
        "public key published"
    );
    println!("Published {} for {}", keypair.public_key(), identity);
    Ok(())
}

async fn open_flow(state: &StateArgs, config: WorkflowConfig) -> Result<FileBackedFlow> {
    let registry = files::load_registry(&state.registry)?;
    let store = FsContentStore::open(&state.store_dir)
        .await
        .with_context(|| format!("failed to open store {}", state.store_dir.display()))?;
    let ledger = JsonFileLedger::new(&state.ledger);
    Ok(EmergencyProposals::new(registry, store, ledger, config))
}

async fn seal(args: cli::SealArgs) -> Result<()> {
    let payload = files::read_proposal(&args.proposal)?;
    let config = WorkflowConfig {
        max_concurrent_lookups: args.max_concurrent_lookups,
    };
    let flow = open_flow(&args.state, config).await?;

    let members = match args.members {
        Some(members) => members,
        None => flow.directory().registered(),
    };
    if members.is_empty() {
        bail!("no council members given and none registered");
    }

    let created = flow
        .create(args.proposal_id, &payload, &members)
        .await
        .with_context(|| format!("failed to seal proposal {}", args.proposal_id))?;

    let output = json!({
        "proposalId": created.record.proposal_id,
        "contentId": created.record.content_id,
        "commitments": created.record.commitments,
        "recipients": created.recipients,
        "skipped": created.skipped,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn open(args: cli::OpenArgs) -> Result<()> {
    let (identity, keypair) = files::read_key_file(&args.key)?;
    let flow = open_flow(&args.state, WorkflowConfig::default()).await?;

    let output = if args.metadata_only {
        let verified = flow
            .preview(args.proposal_id, &identity, &keypair)
            .await
            .map_err(|e| rejection(args.proposal_id, e))?;
        json!({
            "proposalId": args.proposal_id,
            "metadata": verified.metadata().to_json(),
            "commitments": verified.commitments(),
        })
    } else {
        let verified = flow
            .review(args.proposal_id, &identity, &keypair)
            .await
            .map_err(|e| rejection(args.proposal_id, e))?;
        json!({
            "proposalId": args.proposal_id,
            "metadata": verified.metadata().to_json(),
            "actions": verified.actions(),
            "commitments": verified.commitments(),
        })
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Turn a review failure into a message that tells the user what to do.
fn rejection(proposal_id: u64, error: VerifyError) -> anyhow::Error {
    let advice = rejection_advice(&error);
    anyhow::Error::new(error).context(format!("proposal {proposal_id} rejected: {advice}"))
}

fn rejection_advice(error: &VerifyError) -> &'static str {
    match error {
        VerifyError::NotARecipient { .. } => {
            "this key was not included when the proposal was sealed"
        }
        VerifyError::UnwrapFailed(_) => "the key file does not match the wrapped entry",
        VerifyError::UnknownProposal(_) => "no commitments are recorded under this id",
        e if e.is_trust_failure() => "DO NOT APPROVE: the proposal content cannot be trusted",
        _ => "the proposal could not be loaded",
    }
}

async fn inspect(args: cli::InspectArgs) -> Result<()> {
    let store = FsContentStore::open(&args.store_dir).await?;
    let bytes = store
        .get(&args.content_id)
        .await
        .with_context(|| format!("failed to fetch {}", args.content_id))?;
    let envelope = EncryptedEnvelope::from_bytes(&bytes)?;
    let recipients: Vec<_> = envelope.recipients().collect();

    let output = json!({
        "contentId": args.content_id,
        "version": envelope.version,
        "recipients": recipients,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn print_version() {
    println!("council-seal {}", env!("CARGO_PKG_VERSION"));
    println!("envelope     v{}", ENVELOPE_VERSION);
    println!("rustc        {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}
