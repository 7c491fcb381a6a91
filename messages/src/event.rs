//! Event payloads and topic names.

use lumina_types::{
    ActionKind, AttestationId, Decision, DecisionId, Identity, Timestamp, TransactionId,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bus topics produced or consumed by the governance gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Topic {
    TransactionProposed,
    TransactionApproved,
    TransactionCommitted,
    AttestationCreated,
    PolicyDecisionRecorded,
    /// Inbound: raw coherence readings from external reporters.
    CoherenceReading,
}

impl Topic {
    /// Every topic the engine itself publishes.
    pub const PRODUCED: [Topic; 5] = [
        Self::TransactionProposed,
        Self::TransactionApproved,
        Self::TransactionCommitted,
        Self::AttestationCreated,
        Self::PolicyDecisionRecorded,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::TransactionProposed => "transaction-proposed",
            Self::TransactionApproved => "transaction-approved",
            Self::TransactionCommitted => "transaction-committed",
            Self::AttestationCreated => "attestation-created",
            Self::PolicyDecisionRecorded => "policy-decision-recorded",
            Self::CoherenceReading => "coherence-reading",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Events emitted by the lifecycle engine, the policy gate and the
/// attestation service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum GovernanceEvent {
    TransactionProposed {
        id: TransactionId,
        kind: ActionKind,
        proposed_by: Identity,
        timestamp: Timestamp,
    },
    TransactionApproved {
        id: TransactionId,
        approved_by: Vec<Identity>,
        timestamp: Timestamp,
    },
    /// Emitted exactly once per executed transaction, on success or failure.
    TransactionCommitted {
        id: TransactionId,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<serde_json::Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        timestamp: Timestamp,
    },
    AttestationCreated {
        id: AttestationId,
        kind: String,
        attestor: Identity,
        timestamp: Timestamp,
    },
    PolicyDecisionRecorded {
        id: DecisionId,
        policy: String,
        decision: Decision,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        transaction: Option<TransactionId>,
        timestamp: Timestamp,
    },
}

impl GovernanceEvent {
    pub fn topic(&self) -> Topic {
        match self {
            Self::TransactionProposed { .. } => Topic::TransactionProposed,
            Self::TransactionApproved { .. } => Topic::TransactionApproved,
            Self::TransactionCommitted { .. } => Topic::TransactionCommitted,
            Self::AttestationCreated { .. } => Topic::AttestationCreated,
            Self::PolicyDecisionRecorded { .. } => Topic::PolicyDecisionRecorded,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// A raw coherence reading published on [`Topic::CoherenceReading`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoherenceReading {
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
}
