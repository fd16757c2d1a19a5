// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Council Seal Core Library
//!
//! Sealed emergency proposals for on-chain governance. A proposal that
//! pauses a bridge or rotates a compromised signer cannot be published in
//! the clear before the security council acts on it, but it still has to be
//! provably the same proposal the council approved afterwards.
//!
//! Council Seal does three things:
//!
//! 1. Encrypts the proposal once, under a fresh AES-256-GCM key.
//! 2. Wraps that key separately for every council member's X25519 key, so
//!    any one member can open it alone.
//! 3. Commits to the plaintext with two SHA-256 digests that live in the
//!    ledger, outside the envelope, so a swapped or corrupted envelope is
//!    caught at review time.
//!
//! ## Architecture
//!
//! - **config**: Constants and the workflow knobs.
//! - **crypto**: AES-GCM, X25519 key wrapping, hashing.
//! - **proposal**: Canonical encoding, sealing, commitments, verification.
//! - **registry**: The key directory, content store and commitment ledger
//!   the core talks to, as traits plus in-process implementations.
//! - **workflow**: Async create/review glue over the above.
//!
//! ## Quick tour
//!
//! ```
//! use council_seal::crypto::CouncilKeypair;
//! use council_seal::proposal::{
//!     open_envelope, seal_proposal, Address, ProposalAction, ProposalPayload, Recipient,
//! };
//!
//! let member = CouncilKeypair::generate();
//! let identity: Address = "0x1111111111111111111111111111111111111111".parse().unwrap();
//!
//! let payload = ProposalPayload::new(
//!     &serde_json::json!({ "title": "Pause bridge" }),
//!     vec![ProposalAction::transfer(identity, 0)],
//! )
//! .unwrap();
//!
//! let sealed = seal_proposal(&payload, &[Recipient::with_key(identity, member.public_key())]).unwrap();
//! let verified = open_envelope(sealed.envelope, sealed.commitments, &identity, &member).unwrap();
//! assert_eq!(verified.actions(), payload.actions());
//! ```

pub mod config;
pub mod crypto;
pub mod proposal;
pub mod registry;
pub mod workflow;

mod serde_hex;

pub use config::WorkflowConfig;
pub use workflow::{CreatedProposal, EmergencyProposals};
