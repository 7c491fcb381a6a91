//! Execution handlers, keyed by action kind.
//!
//! The registry is built once at start-up and handed to the engine.

use async_trait::async_trait;
use lumina_types::{ActionKind, ActionPayload};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Failure reported by an execution handler. Recorded verbatim as the
/// transaction's terminal error.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Performs an approved action.
#[async_trait]
pub trait ExecutionHandler: Send + Sync {
    async fn execute(&self, payload: &ActionPayload) -> Result<serde_json::Value, HandlerError>;
}

#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<ActionKind, Arc<dyn ExecutionHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `kind`, replacing any previous one.
    pub fn register(&mut self, kind: ActionKind, handler: Arc<dyn ExecutionHandler>) {
        if self.handlers.insert(kind, handler).is_some() {
            tracing::warn!(%kind, "replacing execution handler");
        }
    }

    pub fn with(mut self, kind: ActionKind, handler: Arc<dyn ExecutionHandler>) -> Self {
        self.register(kind, handler);
        self
    }

    pub fn get(&self, kind: ActionKind) -> Option<Arc<dyn ExecutionHandler>> {
        self.handlers.get(&kind).cloned()
    }

    pub fn contains(&self, kind: ActionKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    pub fn kinds(&self) -> Vec<ActionKind> {
        let mut kinds: Vec<_> = self.handlers.keys().copied().collect();
        kinds.sort();
        kinds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumina_types::{GovernanceVote, VoteChoice};

    struct Echo;

    #[async_trait]
    impl ExecutionHandler for Echo {
        async fn execute(&self, payload: &ActionPayload) -> Result<serde_json::Value, HandlerError> {
            Ok(serde_json::json!({ "kind": payload.kind() }))
        }
    }

    #[tokio::test]
    async fn lookup_by_kind() {
        let registry = HandlerRegistry::new().with(ActionKind::GovernanceVote, Arc::new(Echo));
        assert!(registry.contains(ActionKind::GovernanceVote));
        assert!(registry.get(ActionKind::TokenMint).is_none());
        assert_eq!(registry.kinds(), vec![ActionKind::GovernanceVote]);

        let payload = ActionPayload::GovernanceVote(GovernanceVote {
            subject: "prop-7".into(),
            choice: VoteChoice::Yea,
        });
        let handler = registry.get(ActionKind::GovernanceVote).unwrap();
        let result = handler.execute(&payload).await.unwrap();
        assert_eq!(result["kind"], "governance-vote");
    }
}
