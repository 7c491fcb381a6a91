//! Transaction storage trait.

use crate::query::{Page, PageResult, TransactionFilter};
use crate::StoreError;
use lumina_types::{Transaction, TransactionId};

/// Trait for governance transaction storage.
pub trait TransactionStore: Send + Sync {
    /// Store a new transaction. Fails with [`StoreError::Duplicate`] if the id exists.
    fn insert_transaction(&self, tx: &Transaction) -> Result<(), StoreError>;

    /// Retrieve a transaction by id.
    fn get_transaction(&self, id: &TransactionId) -> Result<Transaction, StoreError>;

    /// Atomically replace a transaction if the stored revision still equals
    /// `tx.revision`. The stored copy gets `revision + 1` and is returned.
    ///
    /// Every state transition and approval goes through this call, so a
    /// transition is always guarded by the exact prior state it was computed
    /// from. Returns [`StoreError::Conflict`] when another writer got there
    /// first, and [`StoreError::IllegalTransition`] when the new state is not
    /// reachable from the stored one.
    fn update_transaction(&self, tx: &Transaction) -> Result<Transaction, StoreError>;

    /// List transactions matching `filter`, newest first.
    fn query_transactions(
        &self,
        filter: &TransactionFilter,
        page: Page,
    ) -> Result<PageResult<Transaction>, StoreError>;
}
