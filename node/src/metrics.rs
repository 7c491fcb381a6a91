//! Prometheus metrics for the gate.
//!
//! [`GovernanceMetrics`] owns a dedicated [`Registry`]. Lifecycle counters are
//! driven by governance events off the bus; the anchor sweep and coherence
//! sampler update their own metrics directly.

use lumina_anchor::SweepReport;
use lumina_messages::{EventBus, GovernanceEvent, Topic};
use lumina_types::Decision;
use prometheus::{
    register_gauge_with_registry, register_int_counter_with_registry, Encoder, Gauge, IntCounter,
    Opts, Registry, TextEncoder,
};
use std::sync::Arc;

pub struct GovernanceMetrics {
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Transactions admitted by the policy gate.
    pub proposals: IntCounter,
    /// Proposals the policy gate denied.
    pub denials: IntCounter,
    /// Transactions that reached quorum.
    pub approvals: IntCounter,
    pub commits: IntCounter,
    /// Executions that finished in the failed state.
    pub failures: IntCounter,
    pub attestations: IntCounter,
    pub anchors: IntCounter,
    pub anchor_failures: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    /// Most recent coherence sample value; -1 before the first sample.
    pub coherence: Gauge,
}

impl GovernanceMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let proposals = register_int_counter_with_registry!(
            Opts::new("lumina_proposals_total", "Transactions admitted by the policy gate"),
            registry
        )?;
        let denials = register_int_counter_with_registry!(
            Opts::new("lumina_policy_denials_total", "Proposals denied by the policy gate"),
            registry
        )?;
        let approvals = register_int_counter_with_registry!(
            Opts::new("lumina_quorum_reached_total", "Transactions that reached quorum"),
            registry
        )?;
        let commits = register_int_counter_with_registry!(
            Opts::new("lumina_commits_total", "Transactions committed successfully"),
            registry
        )?;
        let failures = register_int_counter_with_registry!(
            Opts::new("lumina_execution_failures_total", "Transactions whose execution failed"),
            registry
        )?;
        let attestations = register_int_counter_with_registry!(
            Opts::new("lumina_attestations_total", "Attestations created"),
            registry
        )?;
        let anchors = register_int_counter_with_registry!(
            Opts::new("lumina_anchors_total", "Policy decisions anchored to the ledger"),
            registry
        )?;
        let anchor_failures = register_int_counter_with_registry!(
            Opts::new("lumina_anchor_failures_total", "Failed or deferred anchoring attempts"),
            registry
        )?;

        let coherence = register_gauge_with_registry!(
            Opts::new("lumina_coherence", "Most recent coherence sample value"),
            registry
        )?;
        coherence.set(-1.0);

        Ok(Self {
            registry,
            proposals,
            denials,
            approvals,
            commits,
            failures,
            attestations,
            anchors,
            anchor_failures,
            coherence,
        })
    }

    /// Update counters for one governance event.
    pub fn observe(&self, event: &GovernanceEvent) {
        match event {
            GovernanceEvent::TransactionProposed { .. } => self.proposals.inc(),
            GovernanceEvent::TransactionApproved { .. } => self.approvals.inc(),
            GovernanceEvent::TransactionCommitted { success: true, .. } => self.commits.inc(),
            GovernanceEvent::TransactionCommitted { success: false, .. } => self.failures.inc(),
            GovernanceEvent::AttestationCreated { .. } => self.attestations.inc(),
            GovernanceEvent::PolicyDecisionRecorded { decision, .. } => {
                if *decision == Decision::Deny {
                    self.denials.inc();
                }
            }
        }
    }

    pub fn observe_sweep(&self, report: &SweepReport) {
        self.anchors.inc_by(report.anchored.len() as u64);
        self.anchor_failures
            .inc_by((report.failed.len() + report.deferred) as u64);
    }

    /// Subscribe to every produced topic on `bus`.
    pub fn attach(self: &Arc<Self>, bus: &dyn EventBus) -> Result<(), lumina_messages::BusError> {
        for topic in Topic::PRODUCED {
            let metrics = Arc::clone(self);
            bus.subscribe(
                topic,
                Arc::new(move |payload: &[u8]| match GovernanceEvent::decode(payload) {
                    Ok(event) => metrics.observe(&event),
                    Err(e) => tracing::debug!(topic = %topic, error = %e, "undecodable event payload"),
                }),
            )?;
        }
        Ok(())
    }

    /// Encode every metric in the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumina_messages::InProcessBus;
    use lumina_types::{DecisionId, Identity, Timestamp, TransactionId};

    #[test]
    fn events_drive_counters() {
        let metrics = Arc::new(GovernanceMetrics::new().unwrap());
        let bus = InProcessBus::new();
        metrics.attach(&bus).unwrap();
        let bus: &dyn EventBus = &bus;

        bus.publish_event(&GovernanceEvent::PolicyDecisionRecorded {
            id: DecisionId::new("dec_1"),
            policy: "governance.treasury-move".into(),
            decision: Decision::Deny,
            transaction: None,
            timestamp: Timestamp::new(1),
        })
        .unwrap();
        bus.publish_event(&GovernanceEvent::TransactionCommitted {
            id: TransactionId::new("tx_1"),
            success: false,
            result: None,
            error: Some("boom".into()),
            timestamp: Timestamp::new(2),
        })
        .unwrap();
        bus.publish_event(&GovernanceEvent::TransactionApproved {
            id: TransactionId::new("tx_2"),
            approved_by: vec![Identity::new("did:web:a")],
            timestamp: Timestamp::new(3),
        })
        .unwrap();

        assert_eq!(metrics.denials.get(), 1);
        assert_eq!(metrics.failures.get(), 1);
        assert_eq!(metrics.commits.get(), 0);
        assert_eq!(metrics.approvals.get(), 1);
    }

    #[test]
    fn sweep_report_counts_anchors_and_failures() {
        let metrics = GovernanceMetrics::new().unwrap();
        metrics.observe_sweep(&SweepReport {
            anchored: vec![DecisionId::new("dec_1"), DecisionId::new("dec_2")],
            already_anchored: 0,
            failed: vec![],
            deferred: 3,
        });
        assert_eq!(metrics.anchors.get(), 2);
        assert_eq!(metrics.anchor_failures.get(), 3);
    }

    #[test]
    fn encodes_text_format() {
        let metrics = GovernanceMetrics::new().unwrap();
        metrics.proposals.inc();
        let text = metrics.encode().unwrap();
        assert!(text.contains("lumina_proposals_total 1"));
        assert!(text.contains("lumina_coherence -1"));
    }
}
