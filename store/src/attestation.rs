//! Attestation storage trait.

use crate::query::{AttestationFilter, Page, PageResult};
use crate::StoreError;
use lumina_types::{Attestation, AttestationId, AttestationStatus};

pub trait AttestationStore: Send + Sync {
    fn insert_attestation(&self, attestation: &Attestation) -> Result<(), StoreError>;

    fn get_attestation(&self, id: &AttestationId) -> Result<Attestation, StoreError>;

    /// Change the status only if it currently equals `expected`.
    fn update_attestation_status(
        &self,
        id: &AttestationId,
        expected: AttestationStatus,
        status: AttestationStatus,
    ) -> Result<Attestation, StoreError>;

    fn query_attestations(
        &self,
        filter: &AttestationFilter,
        page: Page,
    ) -> Result<PageResult<Attestation>, StoreError>;

    /// Fetch several attestations; unknown ids are skipped.
    fn get_attestations(&self, ids: &[AttestationId]) -> Result<Vec<Attestation>, StoreError> {
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            match self.get_attestation(id) {
                Ok(a) => found.push(a),
                Err(StoreError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(found)
    }
}
