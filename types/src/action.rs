//! Governed action kinds and their typed payloads.
//!
//! Every proposal carries an [`ActionPayload`] variant whose shape is checked
//! once, at proposal time. The policy gate and the execution handlers share
//! this typed contract instead of probing an untyped map.

use crate::error::PayloadError;
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The kinds of sensitive action that must pass the governance gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    TreasuryMove,
    TokenMint,
    PolicyCreate,
    GovernanceVote,
}

impl ActionKind {
    pub const ALL: [ActionKind; 4] = [
        Self::TreasuryMove,
        Self::TokenMint,
        Self::PolicyCreate,
        Self::GovernanceVote,
    ];

    /// Canonical wire name, e.g. `treasury-move`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::TreasuryMove => "treasury-move",
            Self::TokenMint => "token-mint",
            Self::PolicyCreate => "policy-create",
            Self::GovernanceVote => "governance-vote",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ActionKind {
    type Err = PayloadError;

    /// Accepts the kebab-case name and the older dotted form (`treasury.move`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "treasury-move" | "treasury.move" => Ok(Self::TreasuryMove),
            "token-mint" | "token.mint" => Ok(Self::TokenMint),
            "policy-create" | "policy.create" => Ok(Self::PolicyCreate),
            "governance-vote" | "governance.vote" => Ok(Self::GovernanceVote),
            other => Err(PayloadError::UnknownAction(other.to_string())),
        }
    }
}

/// Move an amount of an asset between two treasury accounts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreasuryMove {
    pub asset: String,
    pub amount: u64,
    pub from: String,
    pub to: String,
    /// Earliest time the move may execute. Required for large-value moves
    /// when time-locks are enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timelock_until: Option<Timestamp>,
}

/// Mint new units of a token to a recipient.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMint {
    pub token: String,
    pub amount: u64,
    pub recipient: String,
}

/// Create (or version) a named governance policy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyCreate {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub rules: Vec<String>,
}

/// A vote choice on a governance subject.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteChoice {
    Yea,
    Nay,
    Abstain,
}

/// Cast the organisation's vote on an external governance subject.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceVote {
    pub subject: String,
    pub choice: VoteChoice,
}

/// Typed payload, one variant per [`ActionKind`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum ActionPayload {
    TreasuryMove(TreasuryMove),
    TokenMint(TokenMint),
    PolicyCreate(PolicyCreate),
    GovernanceVote(GovernanceVote),
}

impl ActionPayload {
    /// Build a payload from a raw action name and an untyped JSON body.
    ///
    /// Fails on an unrecognised action name, a body that does not match the
    /// action's shape, or a shape that fails validation.
    pub fn from_parts(action: &str, body: serde_json::Value) -> Result<Self, PayloadError> {
        let kind = ActionKind::from_str(action)?;
        let malformed = |e: serde_json::Error| PayloadError::Malformed {
            kind,
            reason: e.to_string(),
        };
        let payload = match kind {
            ActionKind::TreasuryMove => Self::TreasuryMove(serde_json::from_value(body).map_err(malformed)?),
            ActionKind::TokenMint => Self::TokenMint(serde_json::from_value(body).map_err(malformed)?),
            ActionKind::PolicyCreate => Self::PolicyCreate(serde_json::from_value(body).map_err(malformed)?),
            ActionKind::GovernanceVote => {
                Self::GovernanceVote(serde_json::from_value(body).map_err(malformed)?)
            }
        };
        payload.validate()?;
        Ok(payload)
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Self::TreasuryMove(_) => ActionKind::TreasuryMove,
            Self::TokenMint(_) => ActionKind::TokenMint,
            Self::PolicyCreate(_) => ActionKind::PolicyCreate,
            Self::GovernanceVote(_) => ActionKind::GovernanceVote,
        }
    }

    /// The monetary amount moved or minted, if the action has one.
    pub fn amount(&self) -> Option<u64> {
        match self {
            Self::TreasuryMove(m) => Some(m.amount),
            Self::TokenMint(m) => Some(m.amount),
            Self::PolicyCreate(_) | Self::GovernanceVote(_) => None,
        }
    }

    /// Action-specific shape checks.
    pub fn validate(&self) -> Result<(), PayloadError> {
        let kind = self.kind();
        match self {
            Self::TreasuryMove(m) => {
                require_text(kind, "asset", &m.asset)?;
                require_text(kind, "from", &m.from)?;
                require_text(kind, "to", &m.to)?;
                require_positive(kind, "amount", m.amount)?;
                if m.from == m.to {
                    return Err(PayloadError::invalid(kind, "to", "must differ from source account"));
                }
            }
            Self::TokenMint(m) => {
                require_text(kind, "token", &m.token)?;
                require_text(kind, "recipient", &m.recipient)?;
                require_positive(kind, "amount", m.amount)?;
            }
            Self::PolicyCreate(p) => {
                require_text(kind, "name", &p.name)?;
                require_text(kind, "version", &p.version)?;
                if p.rules.iter().any(|r| r.trim().is_empty()) {
                    return Err(PayloadError::invalid(kind, "rules", "must not contain blank rules"));
                }
            }
            Self::GovernanceVote(v) => {
                require_text(kind, "subject", &v.subject)?;
            }
        }
        Ok(())
    }
}

fn require_text(kind: ActionKind, field: &'static str, value: &str) -> Result<(), PayloadError> {
    if value.trim().is_empty() {
        Err(PayloadError::invalid(kind, field, "must not be blank"))
    } else {
        Ok(())
    }
}

fn require_positive(kind: ActionKind, field: &'static str, value: u64) -> Result<(), PayloadError> {
    if value == 0 {
        Err(PayloadError::invalid(kind, field, "must be greater than zero"))
    } else {
        Ok(())
    }
}
