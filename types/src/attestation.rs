//! Attestations: claims made by a party about a subject.

use crate::id::{AttestationId, Identity};
use crate::state::AttestationStatus;
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};

/// A claim by an attestor, used as evidence during policy evaluation.
///
/// The signature is carried opaquely and never verified here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Attestation {
    pub id: AttestationId,
    /// What is being attested, e.g. `gov.values-check`.
    pub kind: String,
    pub attestor: Identity,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub signature: String,
    pub status: AttestationStatus,
    pub created_at: Timestamp,
    pub expires_at: Option<Timestamp>,
}

impl Attestation {
    /// Expired once `now` is strictly past the expiry.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|expiry| now > expiry)
    }

    /// Whether this attestation can satisfy a requirement for `kind` at `now`.
    pub fn satisfies(&self, kind: &str, now: Timestamp) -> bool {
        self.kind == kind && self.status == AttestationStatus::Approved && !self.is_expired(now)
    }
}
