//! Governance parameters.
//!
//! Every value here is loaded from the `[governance]` section of the node
//! configuration. Maps are keyed by plain strings (action kind names and
//! identities) so they read naturally in TOML; typed accessors resolve them.

use crate::error::GovernanceError;
use crate::policy::values::ValueWeights;
use lumina_types::{ActionKind, Identity};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use std::time::Duration;

/// A capability held by a requester, checked by the compliance rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Authority {
    /// May propose token mints.
    Mint,
    /// May propose new policies.
    PolicyCreate,
    /// May move restricted assets above their per-asset limit.
    RestrictedAssets,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GovernanceParams {
    /// Fraction of the eligible population that must approve, in (0, 1].
    #[serde(default = "default_quorum_fraction")]
    pub quorum_fraction: f64,

    /// Eligible approvers per action kind name.
    #[serde(default)]
    pub approvers: BTreeMap<String, Vec<Identity>>,

    /// Minimum values-alignment score for admission.
    #[serde(default = "default_values_threshold")]
    pub values_threshold: f64,

    /// Value weights per action kind name.
    #[serde(default = "default_values")]
    pub values: BTreeMap<String, ValueWeights>,

    /// Authorities held per identity.
    #[serde(default)]
    pub authorities: BTreeMap<String, BTreeSet<Authority>>,

    /// Treasury moves at or above this amount are "large value".
    #[serde(default = "default_large_value_threshold")]
    pub large_value_threshold: u64,

    #[serde(default = "default_timelock_enabled")]
    pub timelock_enabled: bool,

    /// Minimum lock period for large-value treasury moves.
    #[serde(default = "default_timelock_secs")]
    pub timelock_secs: u64,

    /// Per-asset move limit above which [`Authority::RestrictedAssets`] is required.
    #[serde(default = "default_restricted_assets")]
    pub restricted_assets: BTreeMap<String, u64>,

    /// Hard ceiling on the amount per action kind name.
    #[serde(default)]
    pub amount_ceilings: BTreeMap<String, u64>,

    /// Attestation kinds that must be supplied (approved, unexpired) per action kind name.
    #[serde(default)]
    pub required_attestations: BTreeMap<String, Vec<String>>,

    #[serde(default = "default_handler_timeout_secs")]
    pub handler_timeout_secs: u64,
}

fn default_quorum_fraction() -> f64 {
    0.72
}
fn default_values_threshold() -> f64 {
    0.6
}
fn default_values() -> BTreeMap<String, ValueWeights> {
    ActionKind::ALL
        .iter()
        .map(|kind| (kind.name().to_string(), ValueWeights::builtin(*kind)))
        .collect()
}
fn default_large_value_threshold() -> u64 {
    100_000
}
fn default_timelock_enabled() -> bool {
    true
}
fn default_timelock_secs() -> u64 {
    86_400
}
fn default_restricted_assets() -> BTreeMap<String, u64> {
    BTreeMap::from([("CASA".to_string(), 100_000)])
}
fn default_handler_timeout_secs() -> u64 {
    30
}

impl Default for GovernanceParams {
    fn default() -> Self {
        Self {
            quorum_fraction: default_quorum_fraction(),
            approvers: BTreeMap::new(),
            values_threshold: default_values_threshold(),
            values: default_values(),
            authorities: BTreeMap::new(),
            large_value_threshold: default_large_value_threshold(),
            timelock_enabled: default_timelock_enabled(),
            timelock_secs: default_timelock_secs(),
            restricted_assets: default_restricted_assets(),
            amount_ceilings: BTreeMap::new(),
            required_attestations: BTreeMap::new(),
            handler_timeout_secs: default_handler_timeout_secs(),
        }
    }
}

impl GovernanceParams {
    pub fn approvers_for(&self, kind: ActionKind) -> &[Identity] {
        self.approvers
            .get(kind.name())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn set_approvers(&mut self, kind: ActionKind, approvers: Vec<Identity>) {
        self.approvers.insert(kind.name().to_string(), approvers);
    }

    pub fn grant(&mut self, identity: &Identity, authority: Authority) {
        self.authorities
            .entry(identity.as_str().to_string())
            .or_default()
            .insert(authority);
    }

    pub fn handler_timeout(&self) -> Duration {
        Duration::from_secs(self.handler_timeout_secs)
    }

    /// Reject parameter sets the engine cannot operate with.
    pub fn validate(&self) -> Result<(), GovernanceError> {
        if !self.quorum_fraction.is_finite() || self.quorum_fraction <= 0.0 {
            return Err(GovernanceError::Config(format!(
                "quorum_fraction must be positive, got {}",
                self.quorum_fraction
            )));
        }
        if !(0.0..=1.0).contains(&self.values_threshold) {
            return Err(GovernanceError::Config(format!(
                "values_threshold must be within [0, 1], got {}",
                self.values_threshold
            )));
        }
        if self.handler_timeout_secs == 0 {
            return Err(GovernanceError::Config(
                "handler_timeout_secs must be at least 1".into(),
            ));
        }
        let keyed = self
            .approvers
            .keys()
            .chain(self.values.keys())
            .chain(self.amount_ceilings.keys())
            .chain(self.required_attestations.keys());
        for key in keyed {
            ActionKind::from_str(key)
                .map_err(|_| GovernanceError::Config(format!("unknown action kind {key:?}")))?;
        }
        for (kind, weights) in &self.values {
            weights
                .check()
                .map_err(|reason| GovernanceError::Config(format!("values.{kind}: {reason}")))?;
        }
        Ok(())
    }
}
