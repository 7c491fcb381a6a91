//! Built-in execution handlers.
//!
//! These do not touch any external system: each validates nothing further
//! and returns a structured receipt describing what it would have done.
//! Deployments replace them with real integrations per action kind.

use async_trait::async_trait;
use lumina_governance::{ExecutionHandler, HandlerError, HandlerRegistry};
use lumina_types::{ActionKind, ActionPayload};
use serde_json::json;
use std::sync::Arc;

/// Handles every action kind with a simulated receipt.
#[derive(Debug, Default)]
pub struct SimulatedHandler;

fn receipt_hash() -> String {
    format!("0x{}", uuid::Uuid::new_v4().simple())
}

#[async_trait]
impl ExecutionHandler for SimulatedHandler {
    async fn execute(&self, payload: &ActionPayload) -> Result<serde_json::Value, HandlerError> {
        let result = match payload {
            ActionPayload::TreasuryMove(m) => json!({
                "tx_hash": receipt_hash(),
                "asset": m.asset,
                "amount": m.amount,
                "from": m.from,
                "to": m.to,
            }),
            ActionPayload::TokenMint(m) => json!({
                "tx_hash": receipt_hash(),
                "token": m.token,
                "minted": m.amount,
                "recipient": m.recipient,
            }),
            ActionPayload::PolicyCreate(p) => json!({
                "policy": p.name,
                "version": p.version,
                "rules": p.rules.len(),
                "active": true,
            }),
            ActionPayload::GovernanceVote(v) => json!({
                "subject": v.subject,
                "choice": v.choice,
                "recorded": true,
            }),
        };
        tracing::debug!(kind = %payload.kind(), "simulated execution");
        Ok(result)
    }
}

/// A registry with [`SimulatedHandler`] for every action kind.
pub fn builtin_handlers() -> HandlerRegistry {
    let handler: Arc<dyn ExecutionHandler> = Arc::new(SimulatedHandler);
    ActionKind::ALL
        .iter()
        .fold(HandlerRegistry::new(), |registry, kind| {
            registry.with(*kind, Arc::clone(&handler))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumina_types::{TokenMint, TreasuryMove};

    #[test]
    fn covers_every_kind() {
        let registry = builtin_handlers();
        for kind in ActionKind::ALL {
            assert!(registry.contains(kind));
        }
    }

    #[tokio::test]
    async fn treasury_receipt_echoes_move() {
        let payload = ActionPayload::TreasuryMove(TreasuryMove {
            asset: "USDC".into(),
            amount: 500,
            from: "ops".into(),
            to: "grants".into(),
            timelock_until: None,
        });
        let result = SimulatedHandler.execute(&payload).await.unwrap();
        assert_eq!(result["amount"], 500);
        assert!(result["tx_hash"].as_str().unwrap().starts_with("0x"));
    }

    #[tokio::test]
    async fn mint_receipts_are_distinct() {
        let payload = ActionPayload::TokenMint(TokenMint {
            token: "LUM".into(),
            amount: 10,
            recipient: "did:web:r".into(),
        });
        let a = SimulatedHandler.execute(&payload).await.unwrap();
        let b = SimulatedHandler.execute(&payload).await.unwrap();
        assert_ne!(a["tx_hash"], b["tx_hash"]);
    }
}
