//! Idempotent anchoring of policy decisions.

use crate::error::AnchorError;
use crate::ledger::{AnchorRecord, LedgerClient};
use lumina_governance::spans::anchor_span;
use lumina_governance::KeyedLocks;
use lumina_store::{DecisionStore, StoreError};
use lumina_types::{AnchorMetadata, Clock, DecisionId, Timestamp};
use serde::Serialize;
use std::sync::Arc;
use tracing::Instrument;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AnchorReceipt {
    pub anchor_id: String,
    pub chain_ref: String,
    pub tx_ref: String,
    pub anchored_at: Timestamp,
}

impl From<&AnchorMetadata> for AnchorReceipt {
    fn from(meta: &AnchorMetadata) -> Self {
        Self {
            anchor_id: meta.anchor_id.clone(),
            chain_ref: meta.chain.clone(),
            tx_ref: meta.anchor_tx.clone(),
            anchored_at: meta.anchored_at,
        }
    }
}

/// Writes policy decisions to the external ledger at most once each.
///
/// The only component allowed to set a decision's anchoring metadata.
pub struct TruthAnchor {
    store: Arc<dyn DecisionStore>,
    ledger: Arc<dyn LedgerClient>,
    clock: Arc<dyn Clock>,
    chain: String,
    locks: KeyedLocks,
}

impl TruthAnchor {
    pub fn new(
        store: Arc<dyn DecisionStore>,
        ledger: Arc<dyn LedgerClient>,
        clock: Arc<dyn Clock>,
        chain: impl Into<String>,
    ) -> Self {
        Self {
            store,
            ledger,
            clock,
            chain: chain.into(),
            locks: KeyedLocks::new(),
        }
    }

    pub fn chain(&self) -> &str {
        &self.chain
    }

    pub(crate) fn store(&self) -> &Arc<dyn DecisionStore> {
        &self.store
    }

    /// Anchor a decision, or return its existing receipt if it is already
    /// anchored.
    pub async fn anchor_decision(&self, id: &DecisionId) -> Result<AnchorReceipt, AnchorError> {
        self.anchor_tracked(id).await.map(|(receipt, _)| receipt)
    }

    /// Like [`Self::anchor_decision`], also reporting whether this call wrote
    /// the anchor.
    pub(crate) async fn anchor_tracked(
        &self,
        id: &DecisionId,
    ) -> Result<(AnchorReceipt, bool), AnchorError> {
        self.anchor_inner(id).instrument(anchor_span(id.as_str())).await
    }

    async fn anchor_inner(&self, id: &DecisionId) -> Result<(AnchorReceipt, bool), AnchorError> {
        let _guard = self.locks.lock(id.as_str()).await;

        let decision = self.store.get_decision(id)?;
        if let Some(existing) = &decision.anchor {
            tracing::debug!(anchor = %existing.anchor_id, "decision already anchored");
            return Ok((existing.into(), false));
        }

        let record = AnchorRecord::for_decision(&decision, &self.chain)?;
        let tx_ref = self.ledger.submit(&record).await?;
        let metadata = AnchorMetadata {
            anchor_id: record.anchor_id,
            chain: self.chain.clone(),
            anchor_tx: tx_ref,
            anchored_at: self.clock.now(),
        };

        match self.store.set_decision_anchor(id, &metadata) {
            Ok(_) => {
                tracing::info!(anchor = %metadata.anchor_id, tx_ref = %metadata.anchor_tx, "decision anchored");
                Ok(((&metadata).into(), true))
            }
            // Anchored elsewhere while we were submitting; the stored receipt wins.
            Err(StoreError::Conflict { .. }) => {
                let stored = self.store.get_decision(id)?;
                match &stored.anchor {
                    Some(existing) => Ok((existing.into(), false)),
                    None => Err(StoreError::Conflict {
                        id: id.to_string(),
                        reason: "anchor conflict without stored anchor".into(),
                    }
                    .into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }
}
