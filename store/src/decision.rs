//! Policy decision storage trait.
//!
//! Once written, only the execution time and the anchoring metadata of a
//! decision can change.

use crate::query::{DecisionFilter, Page, PageResult};
use crate::StoreError;
use lumina_types::{AnchorMetadata, DecisionId, PolicyDecision, Timestamp};

pub trait DecisionStore: Send + Sync {
    fn insert_decision(&self, decision: &PolicyDecision) -> Result<(), StoreError>;

    fn get_decision(&self, id: &DecisionId) -> Result<PolicyDecision, StoreError>;

    /// Stamp the execution time. A decision already stamped keeps its first time.
    fn mark_decision_executed(
        &self,
        id: &DecisionId,
        executed_at: Timestamp,
    ) -> Result<PolicyDecision, StoreError>;

    /// Attach anchoring metadata. Fails with [`StoreError::Conflict`] if the
    /// decision is already anchored.
    fn set_decision_anchor(
        &self,
        id: &DecisionId,
        anchor: &AnchorMetadata,
    ) -> Result<PolicyDecision, StoreError>;

    fn query_decisions(
        &self,
        filter: &DecisionFilter,
        page: Page,
    ) -> Result<PageResult<PolicyDecision>, StoreError>;
}
