//! Coherence sample storage trait (append-only).

use crate::StoreError;
use lumina_types::{CoherenceSample, Timestamp};

pub trait CoherenceStore: Send + Sync {
    fn append_sample(&self, sample: &CoherenceSample) -> Result<(), StoreError>;

    /// The most recently recorded sample, if any.
    fn latest_sample(&self) -> Result<Option<CoherenceSample>, StoreError>;

    /// Samples with `timestamp >= since`, newest first.
    fn samples_since(&self, since: Timestamp) -> Result<Vec<CoherenceSample>, StoreError>;
}
