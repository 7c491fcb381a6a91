//! Pluggable compliance rules.
//!
//! Each rule inspects a proposal independently and reports zero or more
//! human-readable violations. The gate admits only when every rule is clean.

use crate::params::{Authority, GovernanceParams};
use lumina_types::{ActionKind, ActionPayload, Attestation, Identity, Timestamp};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::str::FromStr;

/// Everything a rule may look at. `now` is explicit so evaluation stays
/// deterministic.
pub struct ComplianceContext<'a> {
    pub payload: &'a ActionPayload,
    pub requester: &'a Identity,
    pub attestations: &'a [Attestation],
    pub now: Timestamp,
}

pub trait ComplianceRule: Send + Sync {
    fn name(&self) -> &'static str;

    fn check(&self, ctx: &ComplianceContext<'_>) -> Vec<String>;
}

/// Authorities held per identity.
#[derive(Clone, Debug, Default)]
pub struct AuthorityRegistry {
    granted: HashMap<Identity, BTreeSet<Authority>>,
}

impl AuthorityRegistry {
    pub fn from_params(params: &GovernanceParams) -> Self {
        Self {
            granted: params
                .authorities
                .iter()
                .map(|(id, set)| (Identity::new(id.as_str()), set.clone()))
                .collect(),
        }
    }

    pub fn holds(&self, identity: &Identity, authority: Authority) -> bool {
        self.granted
            .get(identity)
            .is_some_and(|set| set.contains(&authority))
    }
}

/// Large-value treasury moves must carry a time-lock of at least the
/// configured period.
pub struct TimelockRule {
    pub threshold: u64,
    pub lock_secs: u64,
}

impl ComplianceRule for TimelockRule {
    fn name(&self) -> &'static str {
        "treasury-timelock"
    }

    fn check(&self, ctx: &ComplianceContext<'_>) -> Vec<String> {
        let ActionPayload::TreasuryMove(mv) = ctx.payload else {
            return Vec::new();
        };
        if mv.amount < self.threshold {
            return Vec::new();
        }
        let earliest = ctx.now.plus_secs(self.lock_secs);
        match mv.timelock_until {
            Some(until) if until >= earliest => Vec::new(),
            _ => vec!["Timelock requirement not met for large treasury move".into()],
        }
    }
}

/// Moving a restricted asset at or above its limit requires
/// [`Authority::RestrictedAssets`].
pub struct RestrictedAssetRule {
    pub limits: BTreeMap<String, u64>,
    pub authorities: AuthorityRegistry,
}

impl ComplianceRule for RestrictedAssetRule {
    fn name(&self) -> &'static str {
        "restricted-assets"
    }

    fn check(&self, ctx: &ComplianceContext<'_>) -> Vec<String> {
        let ActionPayload::TreasuryMove(mv) = ctx.payload else {
            return Vec::new();
        };
        match self.limits.get(&mv.asset) {
            Some(limit)
                if mv.amount >= *limit
                    && !self.authorities.holds(ctx.requester, Authority::RestrictedAssets) =>
            {
                vec![format!(
                    "{} asset move exceeds limit without proper authorization",
                    mv.asset
                )]
            }
            _ => Vec::new(),
        }
    }
}

/// Token mints and policy creation need the matching authority.
pub struct AuthorityRule {
    pub authorities: AuthorityRegistry,
}

impl ComplianceRule for AuthorityRule {
    fn name(&self) -> &'static str {
        "requester-authority"
    }

    fn check(&self, ctx: &ComplianceContext<'_>) -> Vec<String> {
        let (authority, what) = match ctx.payload {
            ActionPayload::TokenMint(_) => (Authority::Mint, "token minting"),
            ActionPayload::PolicyCreate(_) => (Authority::PolicyCreate, "policy creation"),
            _ => return Vec::new(),
        };
        if self.authorities.holds(ctx.requester, authority) {
            Vec::new()
        } else {
            vec![format!("Insufficient authority for {what}")]
        }
    }
}

/// Per-kind hard ceiling on amounts.
pub struct AmountCeilingRule {
    pub ceilings: HashMap<ActionKind, u64>,
}

impl ComplianceRule for AmountCeilingRule {
    fn name(&self) -> &'static str {
        "amount-ceiling"
    }

    fn check(&self, ctx: &ComplianceContext<'_>) -> Vec<String> {
        let kind = ctx.payload.kind();
        match (ctx.payload.amount(), self.ceilings.get(&kind)) {
            (Some(amount), Some(ceiling)) if amount > *ceiling => {
                vec![format!("{kind} amount {amount} exceeds ceiling {ceiling}")]
            }
            _ => Vec::new(),
        }
    }
}

/// Required attestation kinds must be present, approved and unexpired.
pub struct AttestationRule {
    pub required: HashMap<ActionKind, Vec<String>>,
}

impl ComplianceRule for AttestationRule {
    fn name(&self) -> &'static str {
        "attestations"
    }

    fn check(&self, ctx: &ComplianceContext<'_>) -> Vec<String> {
        let Some(kinds) = self.required.get(&ctx.payload.kind()) else {
            return Vec::new();
        };
        kinds
            .iter()
            .filter(|kind| !ctx.attestations.iter().any(|a| a.satisfies(kind, ctx.now)))
            .map(|kind| format!("Missing valid attestation: {kind}"))
            .collect()
    }
}

/// The standard rule set configured from governance parameters.
pub fn standard_rules(params: &GovernanceParams) -> Vec<Box<dyn ComplianceRule>> {
    let authorities = AuthorityRegistry::from_params(params);

    let mut rules: Vec<Box<dyn ComplianceRule>> = Vec::new();
    if params.timelock_enabled {
        rules.push(Box::new(TimelockRule {
            threshold: params.large_value_threshold,
            lock_secs: params.timelock_secs,
        }));
    }
    rules.push(Box::new(RestrictedAssetRule {
        limits: params.restricted_assets.clone(),
        authorities: authorities.clone(),
    }));
    rules.push(Box::new(AuthorityRule { authorities }));
    rules.push(Box::new(AmountCeilingRule {
        ceilings: by_kind(&params.amount_ceilings),
    }));
    rules.push(Box::new(AttestationRule {
        required: by_kind(&params.required_attestations),
    }));
    rules
}

fn by_kind<V: Clone>(map: &BTreeMap<String, V>) -> HashMap<ActionKind, V> {
    map.iter()
        .filter_map(|(name, v)| ActionKind::from_str(name).ok().map(|k| (k, v.clone())))
        .collect()
}
