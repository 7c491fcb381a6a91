use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("governance error: {0}")]
    Governance(#[from] lumina_governance::GovernanceError),

    #[error("anchor error: {0}")]
    Anchor(#[from] lumina_anchor::AnchorError),

    #[error("ledger error: {0}")]
    Ledger(#[from] lumina_anchor::LedgerError),

    #[error("store error: {0}")]
    Store(#[from] lumina_store::StoreError),

    #[error("event bus error: {0}")]
    Bus(#[from] lumina_messages::BusError),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("node already started")]
    AlreadyStarted,

    #[error("shutdown timeout: {} still running", .0.join(", "))]
    ShutdownTimeout(Vec<&'static str>),
}
