//! Quorum tracking.
//!
//! The denominator is always the configured eligible population for the
//! action kind, never the number of approvals collected so far.

use lumina_types::{ActionKind, Identity};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// Absolute tolerance for the `approvals / eligible >= fraction` comparison.
pub const QUORUM_TOLERANCE: f64 = 1e-9;

/// Result of a quorum check, with a diagnostic reason.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QuorumOutcome {
    pub met: bool,
    pub approvals: u32,
    pub eligible: Option<u32>,
    pub required_fraction: f64,
    pub reason: String,
}

/// Whether `approvals` out of `eligible` satisfies `fraction`.
///
/// A zero or unknown population never meets quorum, nor does a fraction
/// outside `(0, 1]`.
pub fn is_quorum_met(approvals: u32, eligible: Option<u32>, fraction: f64) -> QuorumOutcome {
    let outcome = |met: bool, reason: String| QuorumOutcome {
        met,
        approvals,
        eligible,
        required_fraction: fraction,
        reason,
    };

    if !fraction.is_finite() || fraction <= 0.0 || fraction > 1.0 + QUORUM_TOLERANCE {
        return outcome(false, format!("quorum fraction {fraction} is not attainable"));
    }
    let eligible_count = match eligible {
        None => return outcome(false, "eligible approver population is unknown".into()),
        Some(0) => return outcome(false, "eligible approver population is empty".into()),
        Some(n) => n,
    };

    let ratio = f64::from(approvals) / f64::from(eligible_count);
    if ratio + QUORUM_TOLERANCE >= fraction {
        outcome(
            true,
            format!("{approvals}/{eligible_count} approvals meets quorum {fraction}"),
        )
    } else {
        outcome(
            false,
            format!("{approvals}/{eligible_count} approvals is below quorum {fraction}"),
        )
    }
}

/// Quorum configuration: the required fraction and a fixed eligible
/// population per action kind.
#[derive(Clone, Debug)]
pub struct QuorumTracker {
    fraction: f64,
    populations: HashMap<ActionKind, BTreeSet<Identity>>,
}

impl QuorumTracker {
    pub fn new(fraction: f64) -> Self {
        Self {
            fraction,
            populations: HashMap::new(),
        }
    }

    pub fn with_population(
        mut self,
        kind: ActionKind,
        approvers: impl IntoIterator<Item = Identity>,
    ) -> Self {
        self.populations
            .insert(kind, approvers.into_iter().collect());
        self
    }

    pub fn fraction(&self) -> f64 {
        self.fraction
    }

    /// Size of the eligible population, if one is configured.
    pub fn eligible(&self, kind: ActionKind) -> Option<u32> {
        self.populations.get(&kind).map(|p| p.len() as u32)
    }

    /// `None` when no population is configured for `kind`.
    pub fn is_eligible(&self, kind: ActionKind, identity: &Identity) -> Option<bool> {
        self.populations.get(&kind).map(|p| p.contains(identity))
    }

    pub fn evaluate(&self, kind: ActionKind, approvals: u32) -> QuorumOutcome {
        is_quorum_met(approvals, self.eligible(kind), self.fraction)
    }

    /// Whether quorum is reachable at all for `kind`: a non-empty population
    /// and an attainable fraction. Returns the reason when it is not.
    pub fn precondition(&self, kind: ActionKind) -> Result<(), String> {
        let unanimous = is_quorum_met(
            self.eligible(kind).unwrap_or(0),
            self.eligible(kind),
            self.fraction,
        );
        if unanimous.met {
            Ok(())
        } else {
            Err(format!("quorum unreachable for {kind}: {}", unanimous.reason))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_of_three_does_not_meet_point_six_seven() {
        let outcome = is_quorum_met(2, Some(3), 0.67);
        assert!(!outcome.met, "{}", outcome.reason);
    }

    #[test]
    fn two_of_three_meets_exact_two_thirds() {
        assert!(is_quorum_met(2, Some(3), 2.0 / 3.0).met);
    }

    #[test]
    fn exact_ratio_is_inclusive() {
        assert!(is_quorum_met(3, Some(4), 0.75).met);
        assert!(!is_quorum_met(2, Some(4), 0.75).met);
    }

    #[test]
    fn unknown_or_empty_population_never_meets() {
        let unknown = is_quorum_met(5, None, 0.5);
        assert!(!unknown.met);
        assert!(unknown.reason.contains("unknown"));

        let empty = is_quorum_met(0, Some(0), 0.5);
        assert!(!empty.met);
        assert!(empty.reason.contains("empty"));
    }

    #[test]
    fn unattainable_fraction_never_meets() {
        assert!(!is_quorum_met(3, Some(3), 1.5).met);
        assert!(!is_quorum_met(3, Some(3), 0.0).met);
        assert!(!is_quorum_met(3, Some(3), f64::NAN).met);
        assert!(is_quorum_met(3, Some(3), 1.0).met);
    }

    #[test]
    fn tracker_uses_configured_population() {
        let tracker = QuorumTracker::new(0.5).with_population(
            ActionKind::TokenMint,
            ["a", "b", "c", "d"].map(Identity::new),
        );
        assert_eq!(tracker.eligible(ActionKind::TokenMint), Some(4));
        assert_eq!(tracker.eligible(ActionKind::TreasuryMove), None);
        assert!(!tracker.evaluate(ActionKind::TokenMint, 1).met);
        assert!(tracker.evaluate(ActionKind::TokenMint, 2).met);
        assert_eq!(
            tracker.is_eligible(ActionKind::TokenMint, &Identity::new("z")),
            Some(false)
        );
        assert_eq!(
            tracker.is_eligible(ActionKind::PolicyCreate, &Identity::new("z")),
            None
        );
    }

    #[test]
    fn precondition_requires_population_and_attainable_fraction() {
        let tracker = QuorumTracker::new(0.72)
            .with_population(ActionKind::TokenMint, [Identity::new("a")]);
        assert!(tracker.precondition(ActionKind::TokenMint).is_ok());
        assert!(tracker.precondition(ActionKind::TreasuryMove).is_err());

        let unattainable = QuorumTracker::new(1.2)
            .with_population(ActionKind::TokenMint, [Identity::new("a")]);
        assert!(unattainable.precondition(ActionKind::TokenMint).is_err());
    }
}
