//! Nullable coherence source.

use async_trait::async_trait;
use lumina_governance::CoherenceSource;
use std::sync::Mutex;

/// Reports whatever value it was last given. `None` means no reading.
#[derive(Debug, Default)]
pub struct NullCoherenceSource {
    value: Mutex<Option<f64>>,
}

impl NullCoherenceSource {
    pub fn new(value: Option<f64>) -> Self {
        Self {
            value: Mutex::new(value),
        }
    }

    pub fn set(&self, value: Option<f64>) {
        *self.value.lock().unwrap() = value;
    }
}

#[async_trait]
impl CoherenceSource for NullCoherenceSource {
    async fn measure(&self, _window_secs: u64) -> Option<f64> {
        *self.value.lock().unwrap()
    }
}
