use lumina_store::StoreError;
use thiserror::Error;

/// Failure reported by an external ledger client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The ledger could not be reached; retry on a later sweep.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    /// The ledger refused the record.
    #[error("ledger rejected record: {0}")]
    Rejected(String),
}

impl LedgerError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

#[derive(Debug, Error)]
pub enum AnchorError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("failed to encode anchor record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("ledger journal I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AnchorError {
    /// Whether a later sweep may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Ledger(e) => e.is_transient(),
            Self::Store(e) => e.is_transient(),
            Self::Io(_) => true,
            Self::Encode(_) => false,
        }
    }
}
