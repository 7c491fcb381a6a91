//! The governance transaction entity.

use crate::action::{ActionKind, ActionPayload};
use crate::id::{AttestationId, DecisionId, Identity, TransactionId};
use crate::state::TransactionState;
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};

/// A proposed action awaiting or undergoing governance.
///
/// Only the lifecycle engine mutates a transaction. Terminal transactions are
/// kept for audit and never deleted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub kind: ActionKind,
    /// Captured at proposal time; execution always runs against this copy.
    pub payload: ActionPayload,
    pub state: TransactionState,
    pub proposed_by: Identity,
    /// Distinct approvers, in arrival order.
    pub approved_by: Vec<Identity>,
    /// Attestations supplied with the proposal.
    #[serde(default)]
    pub attestations: Vec<AttestationId>,
    /// The allow decision that admitted this transaction.
    pub decision: Option<DecisionId>,
    pub created_at: Timestamp,
    pub executed_at: Option<Timestamp>,
    pub executed_by: Option<Identity>,
    /// Handler result, set on commit.
    pub result: Option<serde_json::Value>,
    /// Handler error, set on failure.
    pub error: Option<String>,
    /// Bumped by the store on every persisted update; used for compare-and-swap.
    pub revision: u64,
}

impl Transaction {
    /// A freshly proposed transaction.
    pub fn proposed(
        id: TransactionId,
        payload: ActionPayload,
        proposed_by: Identity,
        attestations: Vec<AttestationId>,
        decision: Option<DecisionId>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            kind: payload.kind(),
            payload,
            state: TransactionState::Proposed,
            proposed_by,
            approved_by: Vec::new(),
            attestations,
            decision,
            created_at,
            executed_at: None,
            executed_by: None,
            result: None,
            error: None,
            revision: 0,
        }
    }

    pub fn has_approved(&self, identity: &Identity) -> bool {
        self.approved_by.iter().any(|a| a == identity)
    }

    pub fn approval_count(&self) -> u32 {
        self.approved_by.len() as u32
    }
}
