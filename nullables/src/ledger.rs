//! Nullable ledger: records every submission in memory.

use async_trait::async_trait;
use lumina_anchor::{AnchorRecord, LedgerClient, LedgerError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// An in-memory ledger for testing.
///
/// Every submission is recorded, including resubmissions of the same anchor
/// id, so tests can assert how often the ledger was actually written.
#[derive(Debug, Default)]
pub struct NullLedger {
    records: Mutex<Vec<AnchorRecord>>,
    offline: AtomicBool,
    rejecting: AtomicBool,
}

impl NullLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline, submissions fail with [`LedgerError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// While rejecting, submissions fail with [`LedgerError::Rejected`].
    pub fn set_rejecting(&self, rejecting: bool) {
        self.rejecting.store(rejecting, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<AnchorRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn submission_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait]
impl LedgerClient for NullLedger {
    async fn submit(&self, record: &AnchorRecord) -> Result<String, LedgerError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("null ledger offline".into()));
        }
        if self.rejecting.load(Ordering::SeqCst) {
            return Err(LedgerError::Rejected("null ledger rejecting".into()));
        }
        let mut records = self.records.lock().unwrap();
        records.push(record.clone());
        Ok(format!("null-tx-{}", records.len()))
    }
}
