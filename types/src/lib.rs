//! Fundamental types for the Lumina governance gate.
//!
//! This crate defines the entities shared by every other crate in the
//! workspace: identifiers, timestamps, action payloads, transactions,
//! attestations, policy decisions and coherence samples.

pub mod action;
pub mod attestation;
pub mod coherence;
pub mod decision;
pub mod error;
pub mod id;
pub mod state;
pub mod time;
pub mod transaction;

pub use action::{
    ActionKind, ActionPayload, GovernanceVote, PolicyCreate, TokenMint, TreasuryMove, VoteChoice,
};
pub use attestation::Attestation;
pub use coherence::CoherenceSample;
pub use decision::{AnchorMetadata, PolicyDecision};
pub use error::PayloadError;
pub use id::{AttestationId, DecisionId, Identity, SampleId, TransactionId};
pub use state::{AttestationStatus, CoherenceLevel, Decision, TransactionState};
pub use time::{Clock, SystemClock, Timestamp};
pub use transaction::Transaction;
