//! Coherence samples: the periodic governance health signal.

use crate::id::SampleId;
use crate::state::CoherenceLevel;
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};

/// A timestamped coherence reading with its derived level.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoherenceSample {
    pub id: SampleId,
    pub timestamp: Timestamp,
    pub value: f64,
    /// Averaging window (seconds) the value was computed over.
    pub window_secs: u64,
    pub status: CoherenceLevel,
}

impl CoherenceSample {
    /// Build a sample, deriving its level from `minimum` at creation time.
    pub fn derive(value: f64, window_secs: u64, minimum: f64, timestamp: Timestamp) -> Self {
        Self {
            id: SampleId::generate(),
            timestamp,
            value,
            window_secs,
            status: CoherenceLevel::classify(value, minimum),
        }
    }
}
