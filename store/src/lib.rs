//! Storage traits for the Lumina governance gate.
//!
//! Every storage backend implements these traits; the rest of the codebase
//! depends only on the traits. [`MemoryStore`] is the in-process backend used
//! by the daemon and the tests.

pub mod attestation;
pub mod coherence;
pub mod decision;
pub mod error;
pub mod memory;
pub mod query;
pub mod transaction;

pub use attestation::AttestationStore;
pub use coherence::CoherenceStore;
pub use decision::DecisionStore;
pub use error::StoreError;
pub use memory::MemoryStore;
pub use query::{AttestationFilter, DecisionFilter, Order, Page, PageResult, TransactionFilter};
pub use transaction::TransactionStore;

use std::sync::Arc;

/// Everything the governance engine persists, behind one object.
///
/// The `as_*` methods hand out the narrower views that individual services
/// are built on.
pub trait GovernanceStore:
    TransactionStore + AttestationStore + DecisionStore + CoherenceStore
{
    fn as_attestation_store(self: Arc<Self>) -> Arc<dyn AttestationStore>;
    fn as_decision_store(self: Arc<Self>) -> Arc<dyn DecisionStore>;
    fn as_coherence_store(self: Arc<Self>) -> Arc<dyn CoherenceStore>;
}

impl<T> GovernanceStore for T
where
    T: TransactionStore + AttestationStore + DecisionStore + CoherenceStore + 'static,
{
    fn as_attestation_store(self: Arc<Self>) -> Arc<dyn AttestationStore> {
        self
    }

    fn as_decision_store(self: Arc<Self>) -> Arc<dyn DecisionStore> {
        self
    }

    fn as_coherence_store(self: Arc<Self>) -> Arc<dyn CoherenceStore> {
        self
    }
}
