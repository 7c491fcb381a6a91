pub mod compliance;
pub mod gate;
pub mod values;

pub use compliance::{
    standard_rules, AmountCeilingRule, AttestationRule, AuthorityRegistry, AuthorityRule,
    ComplianceContext, ComplianceRule, RestrictedAssetRule, TimelockRule,
};
pub use gate::{Evaluation, PolicyGate, PolicyVerdict};
pub use values::{ValueDimension, ValueWeights, ValuesTable};
