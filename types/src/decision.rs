//! Recorded policy decisions and their anchoring metadata.

use crate::id::{AttestationId, DecisionId, TransactionId};
use crate::state::Decision;
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};

/// Where and when a decision was anchored to the external ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorMetadata {
    pub anchor_id: String,
    /// Ledger / chain the record lives on.
    pub chain: String,
    /// Ledger-side reference to the anchoring record.
    pub anchor_tx: String,
    pub anchored_at: Timestamp,
}

/// The admit/deny verdict recorded for an action under a named policy.
///
/// The policy gate creates decisions; only the truth anchor sets `anchor`.
/// Once anchored, `policy`, `decision` and `context` never change.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub id: DecisionId,
    pub policy: String,
    pub decision: Decision,
    pub reason: String,
    pub score: f64,
    #[serde(default)]
    pub violations: Vec<String>,
    /// Snapshot of the evaluation inputs.
    pub context: serde_json::Value,
    #[serde(default)]
    pub attestations: Vec<AttestationId>,
    /// The transaction this decision admitted, if any.
    pub transaction: Option<TransactionId>,
    pub created_at: Timestamp,
    pub executed_at: Option<Timestamp>,
    pub anchor: Option<AnchorMetadata>,
}

impl PolicyDecision {
    pub fn is_anchored(&self) -> bool {
        self.anchor.is_some()
    }

    pub fn is_allow(&self) -> bool {
        self.decision == Decision::Allow
    }
}
