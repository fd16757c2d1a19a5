//! # CLI Interface
//!
//! Argument structure for `council-seal`, via `clap` derive. Every path and
//! knob can also come from a `COUNCIL_SEAL_*` environment variable.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use council_seal::config::DEFAULT_MAX_CONCURRENT_LOOKUPS;
use council_seal::proposal::Address;
use council_seal::registry::{ContentId, ProposalId};

use crate::logging::{LogFormat, DEFAULT_LOG_FILTER};

/// Seal and review confidential emergency proposals.
///
/// Proposals are encrypted once and the key is wrapped for every council
/// member with a published X25519 key. Commitments to the plaintext are
/// recorded in a ledger so reviewers can prove what they decrypted is what
/// was sealed.
#[derive(Parser, Debug)]
#[command(
    name = "council-seal",
    about = "Confidential emergency proposals for security councils",
    version,
    propagate_version = true
)]
pub struct CouncilSealCli {
    /// Log output format.
    #[arg(long, global = true, value_enum, env = "COUNCIL_SEAL_LOG_FORMAT", default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Log filter when `RUST_LOG` is unset, e.g. `warn,council_seal=debug`.
    #[arg(long, global = true, env = "COUNCIL_SEAL_LOG_LEVEL", default_value = DEFAULT_LOG_FILTER)]
    pub log_level: String,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a council member keypair and write it to a key file.
    Keygen(KeygenArgs),
    /// Publish the public half of a key file to the key registry.
    Publish(PublishArgs),
    /// Seal a proposal, upload the envelope and record its commitments.
    Seal(SealArgs),
    /// Decrypt and verify a proposal as a council member.
    Open(OpenArgs),
    /// Show an envelope's version and recipients without decrypting.
    Inspect(InspectArgs),
    /// Print version information and exit.
    Version,
}

/// Where the registry, store and ledger live.
#[derive(Args, Debug, Clone)]
pub struct StateArgs {
    /// Key registry file (JSON).
    #[arg(long, env = "COUNCIL_SEAL_REGISTRY", default_value = "council-seal/registry.json")]
    pub registry: PathBuf,

    /// Content store directory.
    #[arg(long, env = "COUNCIL_SEAL_STORE_DIR", default_value = "council-seal/store")]
    pub store_dir: PathBuf,

    /// Commitment ledger file (JSON).
    #[arg(long, env = "COUNCIL_SEAL_LEDGER", default_value = "council-seal/ledger.json")]
    pub ledger: PathBuf,
}

/// Arguments for `keygen`.
#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Council member address the key belongs to.
    #[arg(long)]
    pub identity: Address,

    /// Where to write the key file. Created with mode 0600 on Unix.
    #[arg(long, short = 'o')]
    pub out: PathBuf,

    /// Overwrite an existing key file.
    #[arg(long)]
    pub force: bool,
}

/// Arguments for `publish`.
#[derive(Args, Debug)]
pub struct PublishArgs {
    /// Key file produced by `keygen`.
    #[arg(long, short = 'k', env = "COUNCIL_SEAL_KEY")]
    pub key: PathBuf,

    #[command(flatten)]
    pub state: StateArgs,
}

/// Arguments for `seal`.
#[derive(Args, Debug)]
pub struct SealArgs {
    /// Proposal id to record the commitments under.
    #[arg(long)]
    pub proposal_id: ProposalId,

    /// Proposal file: `{ "metadata": {...}, "actions": [{ "to", "value", "data" }] }`.
    #[arg(long, short = 'p')]
    pub proposal: PathBuf,

    /// Council members to seal for. Defaults to every registered identity.
    #[arg(long, value_delimiter = ',')]
    pub members: Option<Vec<Address>>,

    /// Concurrent key-registry lookups.
    #[arg(long, env = "COUNCIL_SEAL_MAX_CONCURRENT_LOOKUPS", default_value_t = DEFAULT_MAX_CONCURRENT_LOOKUPS)]
    pub max_concurrent_lookups: usize,

    #[command(flatten)]
    pub state: StateArgs,
}

/// Arguments for `open`.
#[derive(Args, Debug)]
pub struct OpenArgs {
    /// Proposal id to review.
    #[arg(long)]
    pub proposal_id: ProposalId,

    /// Your key file.
    #[arg(long, short = 'k', env = "COUNCIL_SEAL_KEY")]
    pub key: PathBuf,

    /// Decrypt and verify only the metadata.
    #[arg(long)]
    pub metadata_only: bool,

    #[command(flatten)]
    pub state: StateArgs,
}

/// Arguments for `inspect`.
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Content id (`sha256:<hex>`) of the envelope.
    #[arg(long)]
    pub content_id: ContentId,

    /// Content store directory.
    #[arg(long, env = "COUNCIL_SEAL_STORE_DIR", default_value = "council-seal/store")]
    pub store_dir: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        CouncilSealCli::command().debug_assert();
    }

    #[test]
    fn parses_member_list() {
        let a = format!("0x{}", "11".repeat(20));
        let b = format!("0x{}", "22".repeat(20));
        let cli = CouncilSealCli::try_parse_from([
            "council-seal",
            "seal",
            "--proposal-id",
            "7",
            "--proposal",
            "p.json",
            "--members",
            &format!("{a},{b}"),
        ])
        .unwrap();

        match cli.command {
            Commands::Seal(args) => {
                assert_eq!(args.proposal_id, 7);
                assert_eq!(args.members.unwrap().len(), 2);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_bad_address() {
        let result = CouncilSealCli::try_parse_from([
            "council-seal",
            "keygen",
            "--identity",
            "0x1234",
            "--out",
            "k.json",
        ]);
        assert!(result.is_err());
    }
}
