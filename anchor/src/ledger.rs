//! The external ledger boundary.

use crate::digest::{anchor_id, decision_digest};
use crate::error::LedgerError;
use async_trait::async_trait;
use lumina_types::{Decision, DecisionId, PolicyDecision, Timestamp, TransactionId};
use serde::{Deserialize, Serialize};

/// What gets written to the ledger for one decision.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorRecord {
    /// Derived from `digest`; identical across retries of the same decision.
    pub anchor_id: String,
    pub chain: String,
    pub decision_id: DecisionId,
    pub policy: String,
    pub decision: Decision,
    /// Hex Blake2b-256 digest of the decision's core fields.
    pub digest: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<TransactionId>,
    pub decided_at: Timestamp,
}

impl AnchorRecord {
    pub fn for_decision(decision: &PolicyDecision, chain: &str) -> Result<Self, serde_json::Error> {
        let digest = decision_digest(decision)?;
        Ok(Self {
            anchor_id: anchor_id(&digest),
            chain: chain.to_string(),
            decision_id: decision.id.clone(),
            policy: decision.policy.clone(),
            decision: decision.decision,
            digest: hex::encode(digest),
            transaction: decision.transaction.clone(),
            decided_at: decision.created_at,
        })
    }
}

/// Submits anchor records to an external ledger.
///
/// May fail transiently. A client should treat a resubmitted `anchor_id` as
/// the same record.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Returns the ledger's reference for the written record.
    async fn submit(&self, record: &AnchorRecord) -> Result<String, LedgerError>;
}
