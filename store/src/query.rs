//! Filters and pagination for list queries.
//!
//! List queries return newest-first (by creation time, ties broken by id)
//! unless a filter asks for [`Order::OldestFirst`].

use lumina_types::{AttestationStatus, Decision, Identity, TransactionId, TransactionState};
use serde::{Deserialize, Serialize};

/// A 1-based page request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Page {
    pub const DEFAULT_LIMIT: u32 = 20;
    pub const MAX_LIMIT: u32 = 500;

    /// Normalises out-of-range values: page 0 becomes 1, limit is clamped to
    /// `1..=MAX_LIMIT`.
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, Self::MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> usize {
        (self.page.max(1) as usize - 1) * self.limit as usize
    }

    /// Slice one page out of an already ordered result set.
    pub fn apply<T>(&self, items: Vec<T>) -> PageResult<T> {
        let total = items.len() as u64;
        let items = items
            .into_iter()
            .skip(self.offset())
            .take(self.limit as usize)
            .collect();
        PageResult {
            items,
            total,
            page: self.page,
            limit: self.limit,
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(1, Self::DEFAULT_LIMIT)
    }
}

/// One page of results plus the total match count.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PageResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Order {
    #[default]
    NewestFirst,
    OldestFirst,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionFilter {
    pub state: Option<TransactionState>,
    pub proposed_by: Option<Identity>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationFilter {
    pub status: Option<AttestationStatus>,
    pub attestor: Option<Identity>,
    pub kind: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionFilter {
    pub policy: Option<String>,
    pub decision: Option<Decision>,
    pub anchored: Option<bool>,
    /// Whether the admitted transaction has finished executing.
    pub executed: Option<bool>,
    pub transaction: Option<TransactionId>,
    #[serde(default)]
    pub order: Order,
}
