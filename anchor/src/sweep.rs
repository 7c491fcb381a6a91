//! Periodic anchoring of decisions that have not reached the ledger yet.

use crate::anchor::TruthAnchor;
use crate::error::AnchorError;
use lumina_store::{DecisionFilter, Order, Page};
use lumina_types::{Decision, DecisionId, PolicyDecision, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// Which decisions the sweep anchors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnchorTrigger {
    /// Any recorded allow decision.
    DecisionAllowed,
    /// Any decision whose transaction has finished executing.
    TransactionExecuted,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorConfig {
    pub enabled: bool,
    pub chain: String,
    pub sweep_interval_secs: u64,
    /// Upper bound on the delay between sweeps after repeated ledger failures.
    pub max_backoff_secs: u64,
    pub triggers: BTreeSet<AnchorTrigger>,
    /// Decisions examined per sweep.
    pub batch_size: u32,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            chain: "goldie-truth-chain".to_string(),
            sweep_interval_secs: 300,
            max_backoff_secs: 3600,
            triggers: [AnchorTrigger::DecisionAllowed, AnchorTrigger::TransactionExecuted]
                .into_iter()
                .collect(),
            batch_size: 100,
        }
    }
}

impl AnchorConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            self.sweep_interval(),
            Duration::from_secs(self.max_backoff_secs.max(self.sweep_interval_secs)),
        )
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub anchored: Vec<DecisionId>,
    pub already_anchored: usize,
    pub failed: Vec<(DecisionId, String)>,
    /// Candidates skipped because the ledger became unavailable mid-sweep.
    pub deferred: usize,
}

impl SweepReport {
    /// True when the sweep stopped on a transient ledger failure.
    pub fn ledger_unavailable(&self) -> bool {
        self.deferred > 0
    }
}

/// Exponential backoff between sweeps: the delay doubles per consecutive
/// failure and is capped at `max`.
#[derive(Clone, Debug)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    failures: u32,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            failures: 0,
        }
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn record_success(&mut self) {
        self.failures = 0;
    }

    pub fn record_failure(&mut self) {
        self.failures = self.failures.saturating_add(1);
    }

    pub fn delay(&self) -> Duration {
        let factor = 1u32.checked_shl(self.failures.min(31)).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }
}

impl AnchorTrigger {
    fn filter(self) -> DecisionFilter {
        let base = DecisionFilter {
            anchored: Some(false),
            order: Order::OldestFirst,
            ..DecisionFilter::default()
        };
        match self {
            AnchorTrigger::DecisionAllowed => DecisionFilter {
                decision: Some(Decision::Allow),
                ..base
            },
            AnchorTrigger::TransactionExecuted => DecisionFilter {
                executed: Some(true),
                ..base
            },
        }
    }
}

impl TruthAnchor {
    /// Up to `want` unanchored decisions matching `filter`, oldest first.
    fn oldest_unanchored(
        &self,
        filter: DecisionFilter,
        want: usize,
    ) -> Result<Vec<PolicyDecision>, AnchorError> {
        let mut found = Vec::new();
        let mut page = 1;
        while found.len() < want {
            let result = self
                .store()
                .query_decisions(&filter, Page::new(page, Page::MAX_LIMIT))?;
            let exhausted = result.items.len() < result.limit as usize;
            found.extend(result.items);
            if exhausted {
                break;
            }
            page += 1;
        }
        found.truncate(want);
        Ok(found)
    }

    /// Anchor every unanchored decision matching `triggers`, oldest first.
    ///
    /// Stops at the first transient ledger failure; remaining candidates are
    /// counted as deferred and picked up by the next sweep.
    pub async fn sweep(
        &self,
        triggers: &BTreeSet<AnchorTrigger>,
        batch_size: u32,
    ) -> Result<SweepReport, AnchorError> {
        let mut report = SweepReport::default();
        if triggers.is_empty() {
            return Ok(report);
        }

        let want = batch_size.max(1) as usize;
        // Each trigger yields its own oldest `want`; the merged set is ordered
        // by creation time so the oldest `want` overall come first.
        let mut oldest: BTreeSet<(Timestamp, DecisionId)> = BTreeSet::new();
        for trigger in triggers {
            for decision in self.oldest_unanchored(trigger.filter(), want)? {
                oldest.insert((decision.created_at, decision.id));
            }
        }
        let candidates: Vec<DecisionId> = oldest.into_iter().take(want).map(|(_, id)| id).collect();

        let total = candidates.len();
        for (index, id) in candidates.into_iter().enumerate() {
            match self.anchor_tracked(&id).await {
                Ok((_, true)) => report.anchored.push(id),
                Ok((_, false)) => report.already_anchored += 1,
                Err(e) if e.is_transient() => {
                    tracing::warn!(decision = %id, error = %e, "anchoring unavailable, deferring rest of sweep");
                    report.deferred = total - index;
                    break;
                }
                Err(e) => {
                    tracing::error!(decision = %id, error = %e, "failed to anchor decision");
                    report.failed.push((id, e.to_string()));
                }
            }
        }

        if !report.anchored.is_empty() || !report.failed.is_empty() {
            tracing::info!(
                anchored = report.anchored.len(),
                failed = report.failed.len(),
                deferred = report.deferred,
                "anchor sweep finished"
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use crate::ledger::{AnchorRecord, LedgerClient};
    use async_trait::async_trait;
    use lumina_store::{DecisionStore, MemoryStore};
    use lumina_types::Clock;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct FlakyLedger {
        offline: AtomicBool,
        records: Mutex<Vec<AnchorRecord>>,
    }

    #[async_trait]
    impl LedgerClient for FlakyLedger {
        async fn submit(&self, record: &AnchorRecord) -> Result<String, LedgerError> {
            if self.offline.load(Ordering::SeqCst) {
                return Err(LedgerError::Unavailable("connection refused".into()));
            }
            self.records.lock().unwrap().push(record.clone());
            Ok(format!("0x{}", &record.digest[..8]))
        }
    }

    struct FixedClock;

    impl Clock for FixedClock {
        fn now(&self) -> Timestamp {
            Timestamp::new(1_000)
        }
    }

    fn decision(id: &str, outcome: Decision, created: u64, executed: bool) -> PolicyDecision {
        PolicyDecision {
            id: DecisionId::new(id),
            policy: "governance.treasury-move".into(),
            decision: outcome,
            reason: "test".into(),
            score: 0.7,
            violations: vec![],
            context: serde_json::json!({ "id": id }),
            attestations: vec![],
            transaction: None,
            created_at: Timestamp::new(created),
            executed_at: executed.then(|| Timestamp::new(created + 1)),
            anchor: None,
        }
    }

    fn setup() -> (TruthAnchor, Arc<MemoryStore>, Arc<FlakyLedger>) {
        let store = Arc::new(MemoryStore::default());
        store.insert_decision(&decision("dec_a", Decision::Allow, 10, false)).unwrap();
        store.insert_decision(&decision("dec_b", Decision::Deny, 20, false)).unwrap();
        store.insert_decision(&decision("dec_c", Decision::Allow, 30, true)).unwrap();
        let ledger = Arc::new(FlakyLedger::default());
        let anchor = TruthAnchor::new(store.clone(), ledger.clone(), Arc::new(FixedClock), "test-chain");
        (anchor, store, ledger)
    }

    fn all_triggers() -> BTreeSet<AnchorTrigger> {
        AnchorConfig::default().triggers
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let mut backoff = Backoff::new(Duration::from_secs(300), Duration::from_secs(3600));
        assert_eq!(backoff.delay(), Duration::from_secs(300));
        backoff.record_failure();
        assert_eq!(backoff.delay(), Duration::from_secs(600));
        backoff.record_failure();
        backoff.record_failure();
        assert_eq!(backoff.delay(), Duration::from_secs(2400));
        backoff.record_failure();
        assert_eq!(backoff.delay(), Duration::from_secs(3600));
        for _ in 0..64 {
            backoff.record_failure();
        }
        assert_eq!(backoff.delay(), Duration::from_secs(3600));
        backoff.record_success();
        assert_eq!(backoff.failures(), 0);
        assert_eq!(backoff.delay(), Duration::from_secs(300));
    }

    #[test]
    fn config_parses_kebab_case_triggers() {
        let config: AnchorConfig =
            serde_json::from_str(r#"{ "triggers": ["transaction-executed"], "batch_size": 5 }"#)
                .unwrap();
        assert_eq!(config.triggers.len(), 1);
        assert!(config.triggers.contains(&AnchorTrigger::TransactionExecuted));
        assert_eq!(config.chain, "goldie-truth-chain");
        assert_eq!(config.batch_size, 5);
    }

    #[tokio::test]
    async fn sweep_anchors_allowed_decisions_oldest_first() {
        let (anchor, store, ledger) = setup();
        let report = anchor.sweep(&all_triggers(), 100).await.unwrap();

        assert_eq!(
            report.anchored,
            vec![DecisionId::new("dec_a"), DecisionId::new("dec_c")]
        );
        assert!(!report.ledger_unavailable());
        assert!(!store.get_decision(&DecisionId::new("dec_b")).unwrap().is_anchored());
        assert_eq!(ledger.records.lock().unwrap().len(), 2);

        let again = anchor.sweep(&all_triggers(), 100).await.unwrap();
        assert!(again.anchored.is_empty());
        assert_eq!(ledger.records.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn executed_trigger_alone_skips_pending_allows() {
        let (anchor, _, _) = setup();
        let triggers = [AnchorTrigger::TransactionExecuted].into_iter().collect();
        let report = anchor.sweep(&triggers, 100).await.unwrap();
        assert_eq!(report.anchored, vec![DecisionId::new("dec_c")]);
    }

    #[tokio::test]
    async fn sweep_defers_when_ledger_is_down() {
        let (anchor, store, ledger) = setup();
        ledger.offline.store(true, Ordering::SeqCst);

        let report = anchor.sweep(&all_triggers(), 100).await.unwrap();
        assert!(report.anchored.is_empty());
        assert_eq!(report.deferred, 2);
        assert!(!store.get_decision(&DecisionId::new("dec_a")).unwrap().is_anchored());

        ledger.offline.store(false, Ordering::SeqCst);
        let report = anchor.sweep(&all_triggers(), 100).await.unwrap();
        assert_eq!(report.anchored.len(), 2);
    }

    #[tokio::test]
    async fn denial_backlog_never_hides_an_allowed_decision() {
        let store = Arc::new(MemoryStore::default());
        store
            .insert_decision(&decision("dec_allowed", Decision::Allow, 5, true))
            .unwrap();
        for i in 0..600 {
            store
                .insert_decision(&decision(&format!("dec_deny_{i:03}"), Decision::Deny, 100 + i, false))
                .unwrap();
        }
        let ledger = Arc::new(FlakyLedger::default());
        let anchor = TruthAnchor::new(store.clone(), ledger.clone(), Arc::new(FixedClock), "test-chain");

        let report = anchor.sweep(&all_triggers(), 100).await.unwrap();
        assert_eq!(report.anchored, vec![DecisionId::new("dec_allowed")]);
        assert!(store.get_decision(&DecisionId::new("dec_allowed")).unwrap().is_anchored());
        assert_eq!(ledger.records.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn large_backlog_is_anchored_oldest_first() {
        let store = Arc::new(MemoryStore::default());
        for i in 0..700u64 {
            store
                .insert_decision(&decision(&format!("dec_{i:03}"), Decision::Allow, 1_000 - i, false))
                .unwrap();
        }
        let ledger = Arc::new(FlakyLedger::default());
        let anchor = TruthAnchor::new(store, ledger, Arc::new(FixedClock), "test-chain");

        let report = anchor.sweep(&all_triggers(), 2).await.unwrap();
        assert_eq!(
            report.anchored,
            vec![DecisionId::new("dec_699"), DecisionId::new("dec_698")]
        );

        let report = anchor.sweep(&all_triggers(), 650).await.unwrap();
        assert_eq!(report.anchored.len(), 650);
        assert_eq!(report.anchored[0], DecisionId::new("dec_697"));
    }

    #[tokio::test]
    async fn batch_size_bounds_one_sweep() {
        let (anchor, _, _) = setup();
        let report = anchor.sweep(&all_triggers(), 1).await.unwrap();
        assert_eq!(report.anchored, vec![DecisionId::new("dec_a")]);
    }
}
