//! The policy gate: values scoring plus compliance rules, folded into one
//! admit/deny verdict.

use super::compliance::{standard_rules, ComplianceContext, ComplianceRule};
use super::values::ValuesTable;
use crate::coherence::CoherenceStatus;
use crate::params::GovernanceParams;
use crate::quorum::{QuorumTracker, QUORUM_TOLERANCE};
use lumina_types::{
    ActionKind, ActionPayload, Attestation, Decision, DecisionId, Identity, PolicyDecision,
    Timestamp, TransactionId,
};
use serde::Serialize;
use serde_json::json;

/// Everything one evaluation depends on.
pub struct Evaluation<'a> {
    pub payload: &'a ActionPayload,
    pub requester: &'a Identity,
    pub attestations: &'a [Attestation],
    pub coherence: CoherenceStatus,
    pub now: Timestamp,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PolicyVerdict {
    pub admitted: bool,
    pub score: f64,
    /// Compliance rule failures only.
    pub violations: Vec<String>,
    /// Every reason for denial: low score, violations, suspended coherence,
    /// unreachable quorum.
    pub reasons: Vec<String>,
}

pub struct PolicyGate {
    values: ValuesTable,
    threshold: f64,
    rules: Vec<Box<dyn ComplianceRule>>,
}

impl PolicyGate {
    pub fn new(values: ValuesTable, threshold: f64, rules: Vec<Box<dyn ComplianceRule>>) -> Self {
        Self {
            values,
            threshold,
            rules,
        }
    }

    pub fn from_params(params: &GovernanceParams) -> Self {
        Self::new(
            ValuesTable::from_named(&params.values),
            params.values_threshold,
            standard_rules(params),
        )
    }

    /// Add a rule after the standard set.
    pub fn with_rule(mut self, rule: Box<dyn ComplianceRule>) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn policy_name(kind: ActionKind) -> String {
        format!("governance.{kind}")
    }

    /// Evaluate a proposal. Pure: the same input always yields the same
    /// verdict.
    pub fn evaluate(&self, input: &Evaluation<'_>, quorum: &QuorumTracker) -> PolicyVerdict {
        let kind = input.payload.kind();
        let score = self.values.score(kind);
        let mut reasons = Vec::new();

        if score + QUORUM_TOLERANCE < self.threshold {
            reasons.push(format!(
                "values alignment score {score:.2} is below threshold {:.2}",
                self.threshold
            ));
        }

        let ctx = ComplianceContext {
            payload: input.payload,
            requester: input.requester,
            attestations: input.attestations,
            now: input.now,
        };
        let violations: Vec<String> = self.rules.iter().flat_map(|rule| rule.check(&ctx)).collect();
        reasons.extend(violations.iter().cloned());

        if let Some(reason) = input.coherence.suspension_reason() {
            reasons.push(reason);
        }
        if let Err(reason) = quorum.precondition(kind) {
            reasons.push(reason);
        }

        PolicyVerdict {
            admitted: reasons.is_empty(),
            score,
            violations,
            reasons,
        }
    }

    /// Build the decision record for a verdict. `transaction` is the id the
    /// admitted transaction will carry.
    pub fn decision_record(
        &self,
        input: &Evaluation<'_>,
        verdict: &PolicyVerdict,
        transaction: Option<TransactionId>,
    ) -> PolicyDecision {
        let kind = input.payload.kind();
        let (decision, reason) = if verdict.admitted {
            (
                Decision::Allow,
                format!("admitted with values score {:.2}", verdict.score),
            )
        } else {
            (Decision::Deny, verdict.reasons.join("; "))
        };
        PolicyDecision {
            id: DecisionId::generate(),
            policy: Self::policy_name(kind),
            decision,
            reason,
            score: verdict.score,
            violations: verdict.violations.clone(),
            context: json!({
                "action": kind,
                "payload": input.payload,
                "requester": input.requester,
                "coherence": {
                    "value": input.coherence.value,
                    "minimum": input.coherence.minimum,
                    "permitted": input.coherence.permitted,
                },
                "evaluated_at": input.now,
            }),
            attestations: input.attestations.iter().map(|a| a.id.clone()).collect(),
            transaction,
            created_at: input.now,
            executed_at: None,
            anchor: None,
        }
    }
}
