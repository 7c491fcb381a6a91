//! Thread-safe in-memory storage backend.
//!
//! Implements every store trait behind `std::sync::Mutex`es. Conditional
//! updates are checked and applied under a single lock acquisition, which is
//! what makes them atomic.

use crate::attestation::AttestationStore;
use crate::coherence::CoherenceStore;
use crate::decision::DecisionStore;
use crate::query::{AttestationFilter, DecisionFilter, Order, Page, PageResult, TransactionFilter};
use crate::transaction::TransactionStore;
use crate::StoreError;
use lumina_types::{
    AnchorMetadata, Attestation, AttestationId, AttestationStatus, CoherenceSample, DecisionId,
    PolicyDecision, Timestamp, Transaction, TransactionId,
};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
pub struct MemoryStore {
    transactions: Mutex<HashMap<TransactionId, Transaction>>,
    attestations: Mutex<HashMap<AttestationId, Attestation>>,
    decisions: Mutex<HashMap<DecisionId, PolicyDecision>>,
    samples: Mutex<Vec<CoherenceSample>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StoreError> {
    mutex
        .lock()
        .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))
}

/// Newest first, ties broken by id so pages are stable.
fn newest_first<T, K: Ord>(items: &mut [T], key: impl Fn(&T) -> (Timestamp, K)) {
    items.sort_by(|a, b| {
        let (ta, ia) = key(a);
        let (tb, ib) = key(b);
        tb.cmp(&ta).then(ib.cmp(&ia))
    });
}

impl TransactionStore for MemoryStore {
    fn insert_transaction(&self, tx: &Transaction) -> Result<(), StoreError> {
        let mut txs = lock(&self.transactions)?;
        if txs.contains_key(&tx.id) {
            return Err(StoreError::Duplicate(tx.id.to_string()));
        }
        txs.insert(tx.id.clone(), tx.clone());
        Ok(())
    }

    fn get_transaction(&self, id: &TransactionId) -> Result<Transaction, StoreError> {
        lock(&self.transactions)?
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn update_transaction(&self, tx: &Transaction) -> Result<Transaction, StoreError> {
        let mut txs = lock(&self.transactions)?;
        let stored = txs
            .get_mut(&tx.id)
            .ok_or_else(|| StoreError::NotFound(tx.id.to_string()))?;
        if stored.revision != tx.revision {
            return Err(StoreError::Conflict {
                id: tx.id.to_string(),
                reason: format!(
                    "expected revision {}, found {}",
                    tx.revision, stored.revision
                ),
            });
        }
        if stored.state != tx.state && !stored.state.can_transition_to(tx.state) {
            return Err(StoreError::IllegalTransition {
                id: tx.id.to_string(),
                from: stored.state,
                to: tx.state,
            });
        }
        let mut next = tx.clone();
        next.revision = tx.revision + 1;
        *stored = next.clone();
        Ok(next)
    }

    fn query_transactions(
        &self,
        filter: &TransactionFilter,
        page: Page,
    ) -> Result<PageResult<Transaction>, StoreError> {
        let mut matches: Vec<Transaction> = lock(&self.transactions)?
            .values()
            .filter(|tx| filter.state.map_or(true, |s| tx.state == s))
            .filter(|tx| filter.proposed_by.as_ref().map_or(true, |p| &tx.proposed_by == p))
            .cloned()
            .collect();
        newest_first(&mut matches, |tx| (tx.created_at, tx.id.clone()));
        Ok(page.apply(matches))
    }
}

impl AttestationStore for MemoryStore {
    fn insert_attestation(&self, attestation: &Attestation) -> Result<(), StoreError> {
        let mut all = lock(&self.attestations)?;
        if all.contains_key(&attestation.id) {
            return Err(StoreError::Duplicate(attestation.id.to_string()));
        }
        all.insert(attestation.id.clone(), attestation.clone());
        Ok(())
    }

    fn get_attestation(&self, id: &AttestationId) -> Result<Attestation, StoreError> {
        lock(&self.attestations)?
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn update_attestation_status(
        &self,
        id: &AttestationId,
        expected: AttestationStatus,
        status: AttestationStatus,
    ) -> Result<Attestation, StoreError> {
        let mut all = lock(&self.attestations)?;
        let stored = all
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if stored.status != expected {
            return Err(StoreError::Conflict {
                id: id.to_string(),
                reason: format!("expected status {:?}, found {:?}", expected, stored.status),
            });
        }
        stored.status = status;
        Ok(stored.clone())
    }

    fn query_attestations(
        &self,
        filter: &AttestationFilter,
        page: Page,
    ) -> Result<PageResult<Attestation>, StoreError> {
        let mut matches: Vec<Attestation> = lock(&self.attestations)?
            .values()
            .filter(|a| filter.status.map_or(true, |s| a.status == s))
            .filter(|a| filter.attestor.as_ref().map_or(true, |p| &a.attestor == p))
            .filter(|a| filter.kind.as_ref().map_or(true, |k| &a.kind == k))
            .cloned()
            .collect();
        newest_first(&mut matches, |a| (a.created_at, a.id.clone()));
        Ok(page.apply(matches))
    }
}

impl DecisionStore for MemoryStore {
    fn insert_decision(&self, decision: &PolicyDecision) -> Result<(), StoreError> {
        let mut all = lock(&self.decisions)?;
        if all.contains_key(&decision.id) {
            return Err(StoreError::Duplicate(decision.id.to_string()));
        }
        all.insert(decision.id.clone(), decision.clone());
        Ok(())
    }

    fn get_decision(&self, id: &DecisionId) -> Result<PolicyDecision, StoreError> {
        lock(&self.decisions)?
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn mark_decision_executed(
        &self,
        id: &DecisionId,
        executed_at: Timestamp,
    ) -> Result<PolicyDecision, StoreError> {
        let mut all = lock(&self.decisions)?;
        let stored = all
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        stored.executed_at.get_or_insert(executed_at);
        Ok(stored.clone())
    }

    fn set_decision_anchor(
        &self,
        id: &DecisionId,
        anchor: &AnchorMetadata,
    ) -> Result<PolicyDecision, StoreError> {
        let mut all = lock(&self.decisions)?;
        let stored = all
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if stored.anchor.is_some() {
            return Err(StoreError::Conflict {
                id: id.to_string(),
                reason: "decision is already anchored".into(),
            });
        }
        stored.anchor = Some(anchor.clone());
        Ok(stored.clone())
    }

    fn query_decisions(
        &self,
        filter: &DecisionFilter,
        page: Page,
    ) -> Result<PageResult<PolicyDecision>, StoreError> {
        let mut matches: Vec<PolicyDecision> = lock(&self.decisions)?
            .values()
            .filter(|d| filter.policy.as_ref().map_or(true, |p| &d.policy == p))
            .filter(|d| filter.decision.map_or(true, |v| d.decision == v))
            .filter(|d| filter.anchored.map_or(true, |a| d.is_anchored() == a))
            .filter(|d| filter.executed.map_or(true, |e| d.executed_at.is_some() == e))
            .filter(|d| {
                filter
                    .transaction
                    .as_ref()
                    .map_or(true, |t| d.transaction.as_ref() == Some(t))
            })
            .cloned()
            .collect();
        newest_first(&mut matches, |d| (d.created_at, d.id.clone()));
        if filter.order == Order::OldestFirst {
            matches.reverse();
        }
        Ok(page.apply(matches))
    }
}

impl CoherenceStore for MemoryStore {
    fn append_sample(&self, sample: &CoherenceSample) -> Result<(), StoreError> {
        lock(&self.samples)?.push(sample.clone());
        Ok(())
    }

    fn latest_sample(&self) -> Result<Option<CoherenceSample>, StoreError> {
        Ok(lock(&self.samples)?.last().cloned())
    }

    fn samples_since(&self, since: Timestamp) -> Result<Vec<CoherenceSample>, StoreError> {
        Ok(lock(&self.samples)?
            .iter()
            .rev()
            .filter(|s| s.timestamp >= since)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumina_types::{
        ActionPayload, Decision, GovernanceVote, Identity, TransactionState, VoteChoice,
    };

    fn tx(id: &str, created: u64) -> Transaction {
        Transaction::proposed(
            TransactionId::new(id),
            ActionPayload::GovernanceVote(GovernanceVote {
                subject: "dao-1".into(),
                choice: VoteChoice::Yea,
            }),
            Identity::new("did:web:alice"),
            Vec::new(),
            None,
            Timestamp::new(created),
        )
    }

    fn decision(id: &str) -> PolicyDecision {
        decision_at(id, Decision::Allow, 10)
    }

    fn decision_at(id: &str, outcome: Decision, created: u64) -> PolicyDecision {
        PolicyDecision {
            id: DecisionId::new(id),
            policy: "gov.governance-vote".into(),
            decision: outcome,
            reason: "ok".into(),
            score: 0.7,
            violations: Vec::new(),
            context: serde_json::json!({"k": "v"}),
            attestations: Vec::new(),
            transaction: None,
            created_at: Timestamp::new(created),
            executed_at: None,
            anchor: None,
        }
    }

    fn anchor(id: &str) -> AnchorMetadata {
        AnchorMetadata {
            anchor_id: id.into(),
            chain: "test-chain".into(),
            anchor_tx: "0x01".into(),
            anchored_at: Timestamp::new(20),
        }
    }

    #[test]
    fn insert_rejects_duplicates() {
        let store = MemoryStore::new();
        store.insert_transaction(&tx("tx_1", 1)).unwrap();
        assert!(matches!(
            store.insert_transaction(&tx("tx_1", 1)),
            Err(StoreError::Duplicate(_))
        ));
    }

    #[test]
    fn update_bumps_revision_and_rejects_stale_writes() {
        let store = MemoryStore::new();
        let original = tx("tx_1", 1);
        store.insert_transaction(&original).unwrap();

        let mut first = original.clone();
        first.approved_by.push(Identity::new("did:web:bob"));
        let stored = store.update_transaction(&first).unwrap();
        assert_eq!(stored.revision, 1);

        let mut stale = original.clone();
        stale.state = TransactionState::Approved;
        let err = store.update_transaction(&stale).unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
        assert_eq!(
            store.get_transaction(&original.id).unwrap().approved_by,
            vec![Identity::new("did:web:bob")]
        );
    }

    #[test]
    fn update_refuses_transitions_outside_the_lifecycle() {
        let store = MemoryStore::new();
        let original = tx("tx_1", 1);
        store.insert_transaction(&original).unwrap();

        let mut skip = original.clone();
        skip.state = TransactionState::Committed;
        assert!(matches!(
            store.update_transaction(&skip),
            Err(StoreError::IllegalTransition {
                from: TransactionState::Proposed,
                to: TransactionState::Committed,
                ..
            })
        ));
        assert_eq!(store.get_transaction(&original.id).unwrap().revision, 0);

        let mut approve = original.clone();
        approve.state = TransactionState::Approved;
        let approved = store.update_transaction(&approve).unwrap();

        let mut back = approved.clone();
        back.state = TransactionState::Proposed;
        assert!(matches!(
            store.update_transaction(&back),
            Err(StoreError::IllegalTransition { .. })
        ));
    }

    #[test]
    fn query_filters_and_orders_newest_first() {
        let store = MemoryStore::new();
        store.insert_transaction(&tx("tx_a", 1)).unwrap();
        store.insert_transaction(&tx("tx_b", 3)).unwrap();
        let mut approved = tx("tx_c", 2);
        approved.state = TransactionState::Approved;
        store.insert_transaction(&approved).unwrap();

        let all = store
            .query_transactions(&TransactionFilter::default(), Page::default())
            .unwrap();
        let ids: Vec<_> = all.items.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["tx_b", "tx_c", "tx_a"]);

        let proposed = store
            .query_transactions(
                &TransactionFilter {
                    state: Some(TransactionState::Proposed),
                    ..Default::default()
                },
                Page::default(),
            )
            .unwrap();
        assert_eq!(proposed.total, 2);
    }

    #[test]
    fn anchor_can_only_be_set_once() {
        let store = MemoryStore::new();
        store.insert_decision(&decision("dec_1")).unwrap();
        store
            .set_decision_anchor(&DecisionId::new("dec_1"), &anchor("anchor_a"))
            .unwrap();
        let err = store
            .set_decision_anchor(&DecisionId::new("dec_1"), &anchor("anchor_b"))
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
        let stored = store.get_decision(&DecisionId::new("dec_1")).unwrap();
        assert_eq!(stored.anchor.unwrap().anchor_id, "anchor_a");
        assert_eq!(stored.context, serde_json::json!({"k": "v"}));
    }

    #[test]
    fn executed_time_keeps_first_stamp() {
        let store = MemoryStore::new();
        store.insert_decision(&decision("dec_1")).unwrap();
        let id = DecisionId::new("dec_1");
        store.mark_decision_executed(&id, Timestamp::new(50)).unwrap();
        let again = store.mark_decision_executed(&id, Timestamp::new(60)).unwrap();
        assert_eq!(again.executed_at, Some(Timestamp::new(50)));
    }

    #[test]
    fn decision_query_filters_execution_and_orders_oldest_first() {
        let store = MemoryStore::new();
        store.insert_decision(&decision_at("dec_a", Decision::Allow, 30)).unwrap();
        store.insert_decision(&decision_at("dec_b", Decision::Deny, 20)).unwrap();
        store.insert_decision(&decision_at("dec_c", Decision::Allow, 10)).unwrap();
        store.insert_decision(&decision_at("dec_d", Decision::Allow, 40)).unwrap();
        store
            .mark_decision_executed(&DecisionId::new("dec_a"), Timestamp::new(35))
            .unwrap();

        let allowed = store
            .query_decisions(
                &DecisionFilter {
                    decision: Some(Decision::Allow),
                    order: Order::OldestFirst,
                    ..Default::default()
                },
                Page::new(1, 2),
            )
            .unwrap();
        let ids: Vec<_> = allowed.items.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["dec_c", "dec_a"]);
        assert_eq!(allowed.total, 3);

        let pending = store
            .query_decisions(
                &DecisionFilter {
                    executed: Some(false),
                    ..Default::default()
                },
                Page::default(),
            )
            .unwrap();
        let ids: Vec<_> = pending.items.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["dec_d", "dec_b", "dec_c"]);
    }

    #[test]
    fn attestation_status_update_is_conditional() {
        let store = MemoryStore::new();
        let attestation = Attestation {
            id: AttestationId::new("att_1"),
            kind: "gov.values-check".into(),
            attestor: Identity::new("did:web:auditor"),
            data: serde_json::Value::Null,
            signature: String::new(),
            status: AttestationStatus::Pending,
            created_at: Timestamp::new(1),
            expires_at: None,
        };
        store.insert_attestation(&attestation).unwrap();
        store
            .update_attestation_status(
                &attestation.id,
                AttestationStatus::Pending,
                AttestationStatus::Approved,
            )
            .unwrap();
        assert!(store
            .update_attestation_status(
                &attestation.id,
                AttestationStatus::Pending,
                AttestationStatus::Rejected,
            )
            .is_err());
    }

    #[test]
    fn samples_are_append_only_and_windowed() {
        let store = MemoryStore::new();
        assert!(store.latest_sample().unwrap().is_none());
        for (i, value) in [0.5, 0.7, 0.9].iter().enumerate() {
            store
                .append_sample(&CoherenceSample::derive(
                    *value,
                    900,
                    0.62,
                    Timestamp::new(100 + i as u64 * 10),
                ))
                .unwrap();
        }
        assert_eq!(store.latest_sample().unwrap().unwrap().value, 0.9);
        let recent = store.samples_since(Timestamp::new(110)).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].value, 0.9);
    }
}
