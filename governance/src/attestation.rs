//! Attestation intake and review.

use crate::error::GovernanceError;
use crate::spans::review_span;
use lumina_messages::{EventBus, GovernanceEvent};
use lumina_store::{AttestationFilter, AttestationStore, Page, PageResult, StoreError};
use lumina_types::{Attestation, AttestationId, AttestationStatus, Clock, Identity, Timestamp};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A new attestation as submitted by an attestor. The signature is stored
/// but never verified.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewAttestation {
    pub kind: String,
    pub attestor: Identity,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub expires_at: Option<Timestamp>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewVerdict {
    Approve,
    Reject,
}

impl ReviewVerdict {
    fn status(self) -> AttestationStatus {
        match self {
            Self::Approve => AttestationStatus::Approved,
            Self::Reject => AttestationStatus::Rejected,
        }
    }
}

pub struct AttestationService {
    store: Arc<dyn AttestationStore>,
    bus: Arc<dyn EventBus>,
    clock: Arc<dyn Clock>,
}

impl AttestationService {
    pub fn new(store: Arc<dyn AttestationStore>, bus: Arc<dyn EventBus>, clock: Arc<dyn Clock>) -> Self {
        Self { store, bus, clock }
    }

    /// Store a new attestation as `pending`.
    pub fn create(&self, request: NewAttestation) -> Result<Attestation, GovernanceError> {
        if request.kind.trim().is_empty() {
            return Err(GovernanceError::InvalidAttestation("kind must not be blank"));
        }
        if !request.attestor.is_valid() {
            return Err(GovernanceError::InvalidIdentity { role: "attestor" });
        }
        let now = self.clock.now();
        if request.expires_at.is_some_and(|expiry| expiry <= now) {
            return Err(GovernanceError::InvalidAttestation("expiry must be in the future"));
        }

        let attestation = Attestation {
            id: AttestationId::generate(),
            kind: request.kind,
            attestor: request.attestor,
            data: request.data,
            signature: request.signature,
            status: AttestationStatus::Pending,
            created_at: now,
            expires_at: request.expires_at,
        };
        self.store.insert_attestation(&attestation)?;

        let event = GovernanceEvent::AttestationCreated {
            id: attestation.id.clone(),
            kind: attestation.kind.clone(),
            attestor: attestation.attestor.clone(),
            timestamp: now,
        };
        if let Err(e) = self.bus.publish_event(&event) {
            tracing::warn!(topic = %event.topic(), error = %e, "failed to publish event");
        }
        tracing::info!(attestation = %attestation.id, kind = %attestation.kind, "attestation created");
        Ok(attestation)
    }

    /// Move a pending attestation to approved or rejected.
    pub fn review(
        &self,
        id: &AttestationId,
        verdict: ReviewVerdict,
        reviewer: &Identity,
    ) -> Result<Attestation, GovernanceError> {
        let _span = review_span(id.as_str(), reviewer.as_str()).entered();
        if !reviewer.is_valid() {
            return Err(GovernanceError::InvalidIdentity { role: "reviewer" });
        }
        let current = self.store.get_attestation(id)?;
        if current.status != AttestationStatus::Pending {
            return Err(GovernanceError::AttestationNotPending {
                id: id.clone(),
                status: current.status,
            });
        }
        match self
            .store
            .update_attestation_status(id, AttestationStatus::Pending, verdict.status())
        {
            Ok(updated) => {
                tracing::info!(status = %updated.status, "attestation reviewed");
                Ok(updated)
            }
            // Another reviewer got there first.
            Err(StoreError::Conflict { .. }) => {
                let raced = self.store.get_attestation(id)?;
                Err(GovernanceError::AttestationNotPending {
                    id: id.clone(),
                    status: raced.status,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn get(&self, id: &AttestationId) -> Result<Attestation, GovernanceError> {
        Ok(self.store.get_attestation(id)?)
    }

    pub fn list(
        &self,
        filter: &AttestationFilter,
        page: Page,
    ) -> Result<PageResult<Attestation>, GovernanceError> {
        Ok(self.store.query_attestations(filter, page)?)
    }
}
