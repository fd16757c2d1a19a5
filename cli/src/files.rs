//! On-disk formats the CLI reads and writes: key files, the key registry,
//! and proposal input files. All JSON.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use council_seal::crypto::{CouncilKeypair, RecipientPublicKey};
use council_seal::proposal::{Address, ProposalAction, ProposalPayload};
use council_seal::registry::InMemoryKeyRegistry;

// ---------------------------------------------------------------------------
// Key files
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyFile {
    identity: Address,
    public_key: RecipientPublicKey,
    secret_key: String,
}

/// Write a member key file. Refuses to overwrite unless `force`.
pub fn write_key_file(
    path: &Path,
    identity: Address,
    keypair: &CouncilKeypair,
    force: bool,
) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists (pass --force to overwrite)",
            path.display()
        );
    }
    ensure_parent(path)?;

    let file = KeyFile {
        identity,
        public_key: keypair.public_key(),
        secret_key: keypair.secret_key_hex(),
    };
    let json = serde_json::to_string_pretty(&file)?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write key file {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

/// Read a member key file, checking that its public key matches its secret.
pub fn read_key_file(path: &Path) -> Result<(Address, CouncilKeypair)> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read key file {}", path.display()))?;
    let file: KeyFile = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a valid key file", path.display()))?;
    let keypair = CouncilKeypair::from_hex(&file.secret_key)
        .with_context(|| format!("{} holds an invalid secret key", path.display()))?;
    if keypair.public_key() != file.public_key {
        bail!(
            "{}: public key does not match secret key",
            path.display()
        );
    }
    Ok((file.identity, keypair))
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Load the key registry, or an empty one if the file does not exist yet.
pub fn load_registry(path: &Path) -> Result<InMemoryKeyRegistry> {
    if !path.exists() {
        return Ok(InMemoryKeyRegistry::new());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read registry {}", path.display()))?;
    InMemoryKeyRegistry::from_json(&raw)
        .with_context(|| format!("{} is not a valid registry file", path.display()))
}

pub fn save_registry(path: &Path, registry: &InMemoryKeyRegistry) -> Result<()> {
    ensure_parent(path)?;
    std::fs::write(path, registry.to_json()?)
        .with_context(|| format!("failed to write registry {}", path.display()))
}

// ---------------------------------------------------------------------------
// Proposal input
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ProposalFile {
    metadata: serde_json::Value,
    #[serde(default)]
    actions: Vec<ProposalAction>,
}

/// Parse a proposal input file into a payload.
pub fn read_proposal(path: &Path) -> Result<ProposalPayload> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read proposal {}", path.display()))?;
    let file: ProposalFile = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a valid proposal file", path.display()))?;
    ProposalPayload::new(&file.metadata, file.actions)
        .with_context(|| format!("{} has metadata with no canonical form", path.display()))
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    Ok(())
}
