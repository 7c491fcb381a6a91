//! Values-alignment scoring.
//!
//! Each action kind carries weights over ten value dimensions. The score is
//! the arithmetic mean over all ten; dimensions a kind does not touch count
//! as zero.

use lumina_types::ActionKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueDimension {
    Love,
    Wisdom,
    Truth,
    Justice,
    Freedom,
    Unity,
    Harmony,
    Creativity,
    Compassion,
    Integrity,
}

impl ValueDimension {
    pub const ALL: [ValueDimension; 10] = [
        Self::Love,
        Self::Wisdom,
        Self::Truth,
        Self::Justice,
        Self::Freedom,
        Self::Unity,
        Self::Harmony,
        Self::Creativity,
        Self::Compassion,
        Self::Integrity,
    ];
}

/// Weights in `[0, 1]` over the ten value dimensions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValueWeights {
    pub love: f64,
    pub wisdom: f64,
    pub truth: f64,
    pub justice: f64,
    pub freedom: f64,
    pub unity: f64,
    pub harmony: f64,
    pub creativity: f64,
    pub compassion: f64,
    pub integrity: f64,
}

impl ValueWeights {
    /// Low-weight mapping used for kinds missing from the configured table.
    pub const FALLBACK: ValueWeights = ValueWeights {
        love: 0.0,
        wisdom: 0.0,
        truth: 0.5,
        justice: 0.0,
        freedom: 0.0,
        unity: 0.0,
        harmony: 0.0,
        creativity: 0.0,
        compassion: 0.0,
        integrity: 0.5,
    };

    /// The shipped weights for each action kind.
    pub fn builtin(kind: ActionKind) -> Self {
        match kind {
            ActionKind::TreasuryMove => Self {
                love: 0.4,
                wisdom: 0.8,
                truth: 0.8,
                justice: 0.9,
                freedom: 0.5,
                unity: 0.6,
                harmony: 0.6,
                creativity: 0.3,
                compassion: 0.5,
                integrity: 0.9,
            },
            ActionKind::TokenMint => Self {
                love: 0.4,
                wisdom: 0.6,
                truth: 0.6,
                justice: 0.6,
                freedom: 0.6,
                unity: 0.8,
                harmony: 0.7,
                creativity: 0.8,
                compassion: 0.5,
                integrity: 0.7,
            },
            ActionKind::PolicyCreate => Self {
                love: 0.4,
                wisdom: 0.9,
                truth: 0.8,
                justice: 0.8,
                freedom: 0.6,
                unity: 0.6,
                harmony: 0.6,
                creativity: 0.5,
                compassion: 0.5,
                integrity: 0.8,
            },
            ActionKind::GovernanceVote => Self {
                love: 0.7,
                wisdom: 0.6,
                truth: 0.7,
                justice: 0.7,
                freedom: 0.9,
                unity: 0.8,
                harmony: 0.6,
                creativity: 0.3,
                compassion: 0.6,
                integrity: 0.7,
            },
        }
    }

    pub fn get(&self, dimension: ValueDimension) -> f64 {
        match dimension {
            ValueDimension::Love => self.love,
            ValueDimension::Wisdom => self.wisdom,
            ValueDimension::Truth => self.truth,
            ValueDimension::Justice => self.justice,
            ValueDimension::Freedom => self.freedom,
            ValueDimension::Unity => self.unity,
            ValueDimension::Harmony => self.harmony,
            ValueDimension::Creativity => self.creativity,
            ValueDimension::Compassion => self.compassion,
            ValueDimension::Integrity => self.integrity,
        }
    }

    /// Mean weight across all ten dimensions.
    pub fn score(&self) -> f64 {
        let total: f64 = ValueDimension::ALL.iter().map(|d| self.get(*d)).sum();
        total / ValueDimension::ALL.len() as f64
    }

    pub(crate) fn check(&self) -> Result<(), String> {
        for dimension in ValueDimension::ALL {
            let weight = self.get(dimension);
            if !(0.0..=1.0).contains(&weight) {
                return Err(format!("{dimension} weight {weight} is outside [0, 1]"));
            }
        }
        Ok(())
    }
}

impl fmt::Display for ValueDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Love => "love",
            Self::Wisdom => "wisdom",
            Self::Truth => "truth",
            Self::Justice => "justice",
            Self::Freedom => "freedom",
            Self::Unity => "unity",
            Self::Harmony => "harmony",
            Self::Creativity => "creativity",
            Self::Compassion => "compassion",
            Self::Integrity => "integrity",
        };
        f.write_str(name)
    }
}

/// Resolved weights per action kind.
#[derive(Clone, Debug, Default)]
pub struct ValuesTable {
    weights: HashMap<ActionKind, ValueWeights>,
}

impl ValuesTable {
    pub fn builtin() -> Self {
        Self {
            weights: ActionKind::ALL
                .iter()
                .map(|kind| (*kind, ValueWeights::builtin(*kind)))
                .collect(),
        }
    }

    /// Build from a name-keyed table. Unknown names are skipped; validate the
    /// parameters first to reject them.
    pub fn from_named<'a>(named: impl IntoIterator<Item = (&'a String, &'a ValueWeights)>) -> Self {
        Self {
            weights: named
                .into_iter()
                .filter_map(|(name, w)| ActionKind::from_str(name).ok().map(|k| (k, *w)))
                .collect(),
        }
    }

    pub fn weights(&self, kind: ActionKind) -> &ValueWeights {
        self.weights.get(&kind).unwrap_or(&ValueWeights::FALLBACK)
    }

    pub fn score(&self, kind: ActionKind) -> f64 {
        self.weights(kind).score()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_kinds_clear_default_threshold() {
        let table = ValuesTable::builtin();
        for kind in ActionKind::ALL {
            assert!(table.score(kind) >= 0.6 - 1e-9, "{kind} scored {}", table.score(kind));
        }
    }

    #[test]
    fn token_mint_scores_point_six_three() {
        let score = ValuesTable::builtin().score(ActionKind::TokenMint);
        assert!((score - 0.63).abs() < 1e-9);
    }

    #[test]
    fn missing_kind_uses_fallback() {
        let table = ValuesTable::default();
        assert!((table.score(ActionKind::TreasuryMove) - 0.1).abs() < 1e-9);
    }

    #[test]
    fn out_of_range_weight_fails_check() {
        let weights = ValueWeights {
            justice: 1.5,
            ..ValueWeights::default()
        };
        assert!(weights.check().unwrap_err().contains("justice"));
    }
}
