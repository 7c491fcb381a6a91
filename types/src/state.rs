//! State enums for transactions, attestations, decisions and coherence samples.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The lifecycle state of a governance transaction.
///
/// `Proposed → Approved → Executing → {Committed | Failed}`; nothing leaves a
/// terminal state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionState {
    /// Admitted by the policy gate; collecting approvals.
    Proposed,
    /// Quorum reached; waiting for an executor.
    Approved,
    /// The action handler is running.
    Executing,
    /// The handler succeeded.
    Committed,
    /// The handler failed (or timed out).
    Failed,
}

impl TransactionState {
    /// Whether the state machine permits moving from `self` to `next`.
    pub fn can_transition_to(&self, next: TransactionState) -> bool {
        matches!(
            (self, next),
            (Self::Proposed, Self::Approved)
                | (Self::Approved, Self::Executing)
                | (Self::Executing, Self::Committed)
                | (Self::Executing, Self::Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Committed | Self::Failed)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Proposed => "proposed",
            Self::Approved => "approved",
            Self::Executing => "executing",
            Self::Committed => "committed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Review status of an attestation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttestationStatus {
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for AttestationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        })
    }
}

/// Outcome recorded in a policy decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Allow,
    Deny,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
        })
    }
}

/// Status of a coherence sample relative to the configured minimum.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoherenceLevel {
    AboveThreshold,
    BelowThreshold,
}

impl CoherenceLevel {
    /// Derive the level for `value` against `minimum`. A value equal to the
    /// minimum counts as above.
    pub fn classify(value: f64, minimum: f64) -> Self {
        if value >= minimum {
            Self::AboveThreshold
        } else {
            Self::BelowThreshold
        }
    }

    pub fn permits_governance(&self) -> bool {
        matches!(self, Self::AboveThreshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TransactionState::*;

    #[test]
    fn only_forward_transitions_are_allowed() {
        assert!(Proposed.can_transition_to(Approved));
        assert!(Approved.can_transition_to(Executing));
        assert!(Executing.can_transition_to(Committed));
        assert!(Executing.can_transition_to(Failed));

        assert!(!Proposed.can_transition_to(Executing));
        assert!(!Approved.can_transition_to(Proposed));
        assert!(!Committed.can_transition_to(Approved));
        assert!(!Failed.can_transition_to(Proposed));
    }

    #[test]
    fn terminal_states_have_no_successors() {
        for terminal in [Committed, Failed] {
            assert!(terminal.is_terminal());
            for next in [Proposed, Approved, Executing, Committed, Failed] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn coherence_minimum_is_inclusive() {
        assert_eq!(CoherenceLevel::classify(0.62, 0.62), CoherenceLevel::AboveThreshold);
        assert_eq!(CoherenceLevel::classify(0.61, 0.62), CoherenceLevel::BelowThreshold);
    }
}
