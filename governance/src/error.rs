use lumina_store::StoreError;
use lumina_types::{
    ActionKind, AttestationId, AttestationStatus, DecisionId, Identity, PayloadError, Timestamp,
    TransactionId, TransactionState,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GovernanceError {
    #[error("invalid proposal: {0}")]
    Validation(#[from] PayloadError),

    #[error("{role} identity must not be blank")]
    InvalidIdentity { role: &'static str },

    #[error("invalid attestation: {0}")]
    InvalidAttestation(&'static str),

    #[error("invalid coherence reading {0}: must be a finite value in [0, 1]")]
    InvalidReading(f64),

    #[error("{0} not found")]
    NotFound(String),

    #[error("transaction {id} is {state}, expected {expected}")]
    InvalidState {
        id: TransactionId,
        state: TransactionState,
        expected: TransactionState,
    },

    #[error("transaction {id} cannot move from {from} to {to}")]
    IllegalTransition {
        id: TransactionId,
        from: TransactionState,
        to: TransactionState,
    },

    #[error("{approver} has already approved transaction {id}")]
    DuplicateApproval { id: TransactionId, approver: Identity },

    #[error("{approver} is not an eligible approver for transaction {id}")]
    IneligibleApprover { id: TransactionId, approver: Identity },

    #[error("attestation {id} is {status}, only pending attestations can be reviewed")]
    AttestationNotPending {
        id: AttestationId,
        status: AttestationStatus,
    },

    #[error("governance suspended: {reason}")]
    CoherenceTooLow { reason: String },

    #[error("policy denied ({decision}): {}", violations.join("; "))]
    PolicyDenied {
        decision: DecisionId,
        violations: Vec<String>,
    },

    #[error("transaction {id} is time-locked until {until}")]
    TimelockActive { id: TransactionId, until: Timestamp },

    #[error("no execution handler registered for {0}")]
    HandlerMissing(ActionKind),

    #[error("invalid governance parameters: {0}")]
    Config(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("storage error: {0}")]
    Storage(StoreError),
}

impl GovernanceError {
    /// Whether the same call may succeed if retried later.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::CoherenceTooLow { .. }
            | Self::TimelockActive { .. }
            | Self::Unavailable(_)
            | Self::DeadlineExceeded => true,
            Self::Storage(e) => e.is_transient(),
            _ => false,
        }
    }
}

impl From<StoreError> for GovernanceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => Self::NotFound(what),
            StoreError::Unavailable(reason) => Self::Unavailable(reason),
            StoreError::IllegalTransition { id, from, to } => Self::IllegalTransition {
                id: TransactionId::new(id),
                from,
                to,
            },
            other => Self::Storage(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_caller_facing_kinds() {
        let e: GovernanceError = StoreError::NotFound("transaction tx_1".into()).into();
        assert!(matches!(e, GovernanceError::NotFound(_)));
        assert!(!e.is_retryable());

        let e: GovernanceError = StoreError::Unavailable("backend down".into()).into();
        assert!(matches!(e, GovernanceError::Unavailable(_)));
        assert!(e.is_retryable());

        let e: GovernanceError = StoreError::Conflict {
            id: "tx_1".into(),
            reason: "revision moved".into(),
        }
        .into();
        assert!(e.is_retryable());
    }

    #[test]
    fn validation_and_denial_are_final() {
        let e = GovernanceError::from(PayloadError::UnknownAction("teleport".into()));
        assert!(!e.is_retryable());
        let e = GovernanceError::PolicyDenied {
            decision: DecisionId::new("dec_1"),
            violations: vec!["a".into(), "b".into()],
        };
        assert!(!e.is_retryable());
        assert!(e.to_string().ends_with("a; b"));
    }
}
