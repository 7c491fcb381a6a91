use lumina_types::TransactionState;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("key not found: {0}")]
    NotFound(String),

    #[error("duplicate key: {0}")]
    Duplicate(String),

    /// A conditional update lost against a concurrent writer.
    #[error("conditional update on {id} rejected: {reason}")]
    Conflict { id: String, reason: String },

    /// The update would move a transaction along an edge the lifecycle
    /// does not have.
    #[error("transaction {id} cannot move from {from} to {to}")]
    IllegalTransition {
        id: String,
        from: TransactionState,
        to: TransactionState,
    },

    /// The backend could not be reached; the operation may be retried.
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Whether retrying the same operation later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Conflict { .. })
    }
}
