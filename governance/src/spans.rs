//! Pre-built [`tracing::Span`] constructors for governance operations.
//!
//! Consistent span names and fields make it easy to correlate a transaction
//! from proposal through execution.

use tracing::{info_span, Span};

/// Span covering a proposal, including policy evaluation.
pub fn propose_span(kind: &str, proposer: &str) -> Span {
    info_span!("propose", kind = %kind, proposer = %proposer)
}

/// Span covering a single approval.
pub fn approve_span(tx: &str, approver: &str) -> Span {
    info_span!("approve", tx = %tx, approver = %approver)
}

/// Span covering execution of an approved transaction.
pub fn execute_span(tx: &str, executor: &str) -> Span {
    info_span!("execute", tx = %tx, executor = %executor)
}

/// Span covering an attestation review.
pub fn review_span(attestation: &str, reviewer: &str) -> Span {
    info_span!("review_attestation", attestation = %attestation, reviewer = %reviewer)
}

/// Span covering the anchoring of one policy decision.
pub fn anchor_span(decision: &str) -> Span {
    info_span!("anchor", decision = %decision)
}
