//! Payload validation errors.

use crate::action::ActionKind;
use thiserror::Error;

/// Why a proposed action payload was rejected at proposal time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("unrecognized action kind: {0:?}")]
    UnknownAction(String),

    #[error("payload is for {found}, but the proposal names {expected}")]
    KindMismatch {
        expected: ActionKind,
        found: ActionKind,
    },

    #[error("malformed {kind} payload: {reason}")]
    Malformed { kind: ActionKind, reason: String },

    #[error("invalid {kind} payload: {field} {reason}")]
    Invalid {
        kind: ActionKind,
        field: &'static str,
        reason: &'static str,
    },
}

impl PayloadError {
    pub(crate) fn invalid(kind: ActionKind, field: &'static str, reason: &'static str) -> Self {
        Self::Invalid { kind, field, reason }
    }
}
