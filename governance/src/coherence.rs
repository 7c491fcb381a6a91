//! Coherence monitor.
//!
//! Holds the most recent coherence sample behind a `watch` channel: one
//! writer (the sampler) and any number of readers, none of which block each
//! other for longer than a copy. Every recorded sample is appended to the
//! store before it becomes current.

use crate::error::GovernanceError;
use async_trait::async_trait;
use lumina_store::CoherenceStore;
use lumina_types::{Clock, CoherenceLevel, CoherenceSample, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoherenceConfig {
    /// Readings strictly below this suspend governance.
    #[serde(default = "default_minimum")]
    pub minimum: f64,

    /// Averaging window for a sample.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// How often the sampler runs.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// A current sample older than this no longer permits governance.
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,
}

fn default_minimum() -> f64 {
    0.62
}
fn default_window_secs() -> u64 {
    900
}
fn default_interval_secs() -> u64 {
    30
}
fn default_max_age_secs() -> u64 {
    300
}

impl Default for CoherenceConfig {
    fn default() -> Self {
        Self {
            minimum: default_minimum(),
            window_secs: default_window_secs(),
            interval_secs: default_interval_secs(),
            max_age_secs: default_max_age_secs(),
        }
    }
}

/// What readers see: the current value and whether governance may proceed.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CoherenceStatus {
    pub value: Option<f64>,
    pub minimum: f64,
    pub permitted: bool,
    pub sampled_at: Option<Timestamp>,
    /// The sample is older than the configured maximum age.
    pub stale: bool,
}

impl CoherenceStatus {
    /// Status before any sample exists. Never permitted.
    pub fn unsampled(minimum: f64) -> Self {
        Self {
            value: None,
            minimum,
            permitted: false,
            sampled_at: None,
            stale: false,
        }
    }

    fn from_sample(sample: &CoherenceSample, minimum: f64) -> Self {
        Self {
            value: Some(sample.value),
            minimum,
            permitted: sample.status.permits_governance(),
            sampled_at: Some(sample.timestamp),
            stale: false,
        }
    }

    /// This status as seen at `now`: a sample older than `max_age_secs`
    /// is stale and never permits governance.
    pub fn aged(mut self, now: Timestamp, max_age_secs: u64) -> Self {
        if let Some(at) = self.sampled_at {
            if at.elapsed_since(now) > max_age_secs {
                self.stale = true;
                self.permitted = false;
            }
        }
        self
    }

    /// Why governance is suspended, if it is.
    pub fn suspension_reason(&self) -> Option<String> {
        match self.value {
            _ if self.permitted => None,
            None => Some("no coherence sample recorded yet".into()),
            Some(_) if self.stale => Some(match self.sampled_at {
                Some(at) => format!("coherence sample is stale (taken at {at})"),
                None => "coherence sample is stale".into(),
            }),
            Some(value) => Some(format!(
                "coherence {value:.3} is below minimum {:.3}",
                self.minimum
            )),
        }
    }
}

/// Summary of the samples recorded within a window.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CoherenceHistory {
    pub current: Option<f64>,
    pub average: Option<f64>,
    pub threshold: f64,
    pub window_secs: u64,
    pub data_points: usize,
    /// Newest first.
    pub samples: Vec<CoherenceSample>,
}

/// Where raw coherence readings come from.
#[async_trait]
pub trait CoherenceSource: Send + Sync {
    /// The aggregated reading over the trailing `window_secs`, or `None`
    /// when there is nothing to report.
    async fn measure(&self, window_secs: u64) -> Option<f64>;
}

/// Averages readings pushed by external reporters over a trailing window.
pub struct RollingReadings {
    clock: Arc<dyn Clock>,
    readings: Mutex<VecDeque<(Timestamp, f64)>>,
    retain_secs: u64,
}

impl RollingReadings {
    pub fn new(clock: Arc<dyn Clock>, retain_secs: u64) -> Self {
        Self {
            clock,
            readings: Mutex::new(VecDeque::new()),
            retain_secs,
        }
    }

    /// Record a raw reading. Non-finite values are dropped.
    pub fn push(&self, value: f64, at: Option<Timestamp>) {
        if !value.is_finite() {
            tracing::warn!(value, "dropping non-finite coherence reading");
            return;
        }
        let now = self.clock.now();
        let at = at.unwrap_or(now);
        let Ok(mut readings) = self.readings.lock() else {
            return;
        };
        readings.push_back((at, value));
        let cutoff = now.minus_secs(self.retain_secs);
        while readings.front().is_some_and(|(t, _)| *t < cutoff) {
            readings.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.readings.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CoherenceSource for RollingReadings {
    async fn measure(&self, window_secs: u64) -> Option<f64> {
        let cutoff = self.clock.now().minus_secs(window_secs);
        let readings = self.readings.lock().ok()?;
        let (sum, count) = readings
            .iter()
            .filter(|(t, _)| *t >= cutoff)
            .fold((0.0, 0u32), |(sum, n), (_, v)| (sum + v, n + 1));
        (count > 0).then(|| sum / f64::from(count))
    }
}

pub struct CoherenceMonitor {
    config: CoherenceConfig,
    store: Arc<dyn CoherenceStore>,
    clock: Arc<dyn Clock>,
    current: watch::Sender<CoherenceStatus>,
    writer: tokio::sync::Mutex<()>,
}

impl CoherenceMonitor {
    pub fn new(config: CoherenceConfig, store: Arc<dyn CoherenceStore>, clock: Arc<dyn Clock>) -> Self {
        let (current, _) = watch::channel(CoherenceStatus::unsampled(config.minimum));
        Self {
            config,
            store,
            clock,
            current,
            writer: tokio::sync::Mutex::new(()),
        }
    }

    pub fn config(&self) -> &CoherenceConfig {
        &self.config
    }

    /// Load the latest persisted sample so a restart does not reset the
    /// status to "not permitted".
    pub async fn restore_latest(&self) -> Result<Option<CoherenceSample>, GovernanceError> {
        let _writer = self.writer.lock().await;
        let latest = self.store.latest_sample()?;
        if let Some(sample) = &latest {
            self.current
                .send_replace(CoherenceStatus::from_sample(sample, self.config.minimum));
            tracing::info!(value = sample.value, at = %sample.timestamp, "restored coherence sample");
        }
        Ok(latest)
    }

    /// Append a sample and make it current.
    pub async fn record_sample(
        &self,
        value: f64,
        window_secs: u64,
    ) -> Result<CoherenceSample, GovernanceError> {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(GovernanceError::InvalidReading(value));
        }
        let _writer = self.writer.lock().await;
        let sample = CoherenceSample::derive(value, window_secs, self.config.minimum, self.clock.now());
        self.store.append_sample(&sample)?;
        let previous = self
            .current
            .send_replace(CoherenceStatus::from_sample(&sample, self.config.minimum));

        if previous.permitted != sample.status.permits_governance() {
            match sample.status {
                CoherenceLevel::AboveThreshold => {
                    tracing::info!(value, minimum = self.config.minimum, "governance resumed")
                }
                CoherenceLevel::BelowThreshold => {
                    tracing::warn!(value, minimum = self.config.minimum, "governance suspended: coherence below minimum")
                }
            }
        } else {
            tracing::debug!(value, status = ?sample.status, "coherence sample recorded");
        }
        Ok(sample)
    }

    /// Measure `source` over the configured window and record the result.
    /// Returns `None` when the source had nothing to report.
    pub async fn sample_from(
        &self,
        source: &dyn CoherenceSource,
    ) -> Result<Option<CoherenceSample>, GovernanceError> {
        match source.measure(self.config.window_secs).await {
            Some(value) => self.record_sample(value, self.config.window_secs).await.map(Some),
            None => {
                tracing::debug!("coherence source had no readings");
                Ok(None)
            }
        }
    }

    /// The most recent sample, suspended once it is older than
    /// `max_age_secs`.
    pub fn current_status(&self) -> CoherenceStatus {
        let status = *self.current.borrow();
        status.aged(self.clock.now(), self.config.max_age_secs)
    }

    /// Receivers see each sample as recorded; apply [`CoherenceStatus::aged`]
    /// to judge freshness.
    pub fn subscribe(&self) -> watch::Receiver<CoherenceStatus> {
        self.current.subscribe()
    }

    pub fn history(&self, window_secs: u64) -> Result<CoherenceHistory, GovernanceError> {
        let since = self.clock.now().minus_secs(window_secs);
        let samples = self.store.samples_since(since)?;
        let average = (!samples.is_empty())
            .then(|| samples.iter().map(|s| s.value).sum::<f64>() / samples.len() as f64);
        Ok(CoherenceHistory {
            current: self.current_status().value,
            average,
            threshold: self.config.minimum,
            window_secs,
            data_points: samples.len(),
            samples,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumina_store::MemoryStore;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct TestClock(AtomicU64);

    impl Clock for TestClock {
        fn now(&self) -> Timestamp {
            Timestamp::new(self.0.load(Ordering::SeqCst))
        }
    }

    fn monitor_at(secs: u64) -> (CoherenceMonitor, Arc<TestClock>, Arc<MemoryStore>) {
        let clock = Arc::new(TestClock(AtomicU64::new(secs)));
        let store = Arc::new(MemoryStore::default());
        let monitor = CoherenceMonitor::new(CoherenceConfig::default(), store.clone(), clock.clone());
        (monitor, clock, store)
    }

    #[tokio::test]
    async fn not_permitted_before_first_sample() {
        let (monitor, _, _) = monitor_at(1_000);
        let status = monitor.current_status();
        assert!(!status.permitted);
        assert!(status.value.is_none());
        assert!(status.suspension_reason().unwrap().contains("no coherence sample"));
    }

    #[tokio::test]
    async fn sample_above_minimum_permits() {
        let (monitor, _, _) = monitor_at(1_000);
        let sample = monitor.record_sample(0.8, 900).await.unwrap();
        assert_eq!(sample.status, CoherenceLevel::AboveThreshold);
        let status = monitor.current_status();
        assert!(status.permitted);
        assert_eq!(status.value, Some(0.8));
        assert!(status.suspension_reason().is_none());
    }

    #[tokio::test]
    async fn sample_below_minimum_suspends() {
        let (monitor, _, _) = monitor_at(1_000);
        monitor.record_sample(0.8, 900).await.unwrap();
        monitor.record_sample(0.4, 900).await.unwrap();
        let status = monitor.current_status();
        assert!(!status.permitted);
        assert!(status.suspension_reason().unwrap().contains("below minimum"));
    }

    #[tokio::test]
    async fn minimum_itself_is_permitted() {
        let (monitor, _, _) = monitor_at(1_000);
        monitor.record_sample(0.62, 900).await.unwrap();
        assert!(monitor.current_status().permitted);
    }

    #[tokio::test]
    async fn out_of_range_reading_is_rejected() {
        let (monitor, _, store) = monitor_at(1_000);
        assert!(matches!(
            monitor.record_sample(f64::NAN, 900).await,
            Err(GovernanceError::InvalidReading(_))
        ));
        assert!(monitor.record_sample(1.5, 900).await.is_err());
        assert!(store.latest_sample().unwrap().is_none());
    }

    #[tokio::test]
    async fn restore_latest_reloads_persisted_status() {
        let (monitor, clock, store) = monitor_at(1_000);
        monitor.record_sample(0.9, 900).await.unwrap();

        let restarted = CoherenceMonitor::new(CoherenceConfig::default(), store, clock);
        assert!(!restarted.current_status().permitted);
        restarted.restore_latest().await.unwrap();
        assert_eq!(restarted.current_status().value, Some(0.9));
        assert!(restarted.current_status().permitted);
    }

    #[tokio::test]
    async fn silent_source_lets_the_sample_go_stale() {
        let clock = Arc::new(TestClock(AtomicU64::new(10_000)));
        let store = Arc::new(MemoryStore::default());
        let monitor = CoherenceMonitor::new(CoherenceConfig::default(), store, clock.clone());
        let readings = RollingReadings::new(clock.clone(), 900);
        readings.push(0.8, None);
        assert!(monitor.sample_from(&readings).await.unwrap().is_some());

        clock.0.store(10_300, Ordering::SeqCst);
        assert!(monitor.current_status().permitted);

        clock.0.store(10_000 + 30 * 86_400, Ordering::SeqCst);
        assert!(monitor.sample_from(&readings).await.unwrap().is_none());
        let status = monitor.current_status();
        assert!(status.stale);
        assert!(!status.permitted);
        assert_eq!(status.value, Some(0.8));
        assert!(status.suspension_reason().unwrap().contains("stale"));

        readings.push(0.7, None);
        monitor.sample_from(&readings).await.unwrap();
        let status = monitor.current_status();
        assert!(status.permitted);
        assert!(!status.stale);
    }

    #[tokio::test]
    async fn history_summarises_window() {
        let (monitor, clock, _) = monitor_at(1_000);
        monitor.record_sample(0.5, 900).await.unwrap();
        clock.0.store(2_000, Ordering::SeqCst);
        monitor.record_sample(0.7, 900).await.unwrap();
        clock.0.store(2_100, Ordering::SeqCst);
        monitor.record_sample(0.9, 900).await.unwrap();

        let history = monitor.history(600).unwrap();
        assert_eq!(history.data_points, 2);
        assert_eq!(history.current, Some(0.9));
        assert!((history.average.unwrap() - 0.8).abs() < 1e-9);
        assert_eq!(history.threshold, 0.62);
        assert_eq!(history.samples[0].value, 0.9);
    }

    #[tokio::test]
    async fn subscribers_observe_new_samples() {
        let (monitor, _, _) = monitor_at(1_000);
        let mut rx = monitor.subscribe();
        monitor.record_sample(0.75, 900).await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().value, Some(0.75));
    }

    #[tokio::test]
    async fn rolling_readings_average_window() {
        let clock = Arc::new(TestClock(AtomicU64::new(10_000)));
        let readings = RollingReadings::new(clock.clone(), 3_600);
        assert_eq!(readings.measure(900).await, None);

        readings.push(0.2, Some(Timestamp::new(8_000)));
        readings.push(0.6, Some(Timestamp::new(9_500)));
        readings.push(0.8, None);
        readings.push(f64::INFINITY, None);
        assert_eq!(readings.len(), 3);

        let avg = readings.measure(900).await.unwrap();
        assert!((avg - 0.7).abs() < 1e-9);
    }

    #[tokio::test]
    async fn sample_from_source_records_measurement() {
        let clock = Arc::new(TestClock(AtomicU64::new(10_000)));
        let store = Arc::new(MemoryStore::default());
        let monitor = CoherenceMonitor::new(CoherenceConfig::default(), store, clock.clone());
        let readings = RollingReadings::new(clock, 3_600);

        assert!(monitor.sample_from(&readings).await.unwrap().is_none());
        readings.push(0.7, None);
        let sample = monitor.sample_from(&readings).await.unwrap().unwrap();
        assert_eq!(sample.value, 0.7);
        assert_eq!(sample.window_secs, 900);
        assert!(monitor.current_status().permitted);
    }
}
