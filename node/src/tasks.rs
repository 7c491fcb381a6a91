//! Background tasks: coherence sampling, anchor sweeps, and the inbound
//! coherence-reading subscription.
//!
//! Each loop talks to the rest of the node only through the component it
//! drives and exits on the shutdown broadcast.

use crate::metrics::GovernanceMetrics;
use lumina_anchor::{AnchorConfig, TruthAnchor};
use lumina_governance::{CoherenceMonitor, CoherenceSource, LifecycleEngine, RollingReadings};
use lumina_messages::{BusError, CoherenceReading, EventBus, Topic};
use lumina_utils::format_duration;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Sample `source` every `interval` and record the result on `monitor`.
pub fn spawn_coherence_sampler(
    monitor: Arc<CoherenceMonitor>,
    source: Arc<dyn CoherenceSource>,
    metrics: Arc<GovernanceMetrics>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::info!("coherence sampler shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    match monitor.sample_from(source.as_ref()).await {
                        Ok(Some(sample)) => metrics.coherence.set(sample.value),
                        Ok(None) => {
                            let status = monitor.current_status();
                            if status.stale {
                                tracing::warn!(
                                    sampled_at = ?status.sampled_at,
                                    "coherence source is silent and the last sample is stale"
                                );
                            }
                        }
                        Err(e) => tracing::warn!(error = %e, "coherence sample failed"),
                    }
                }
            }
        }
    })
}

/// Sweep unanchored decisions on the configured interval, backing off
/// exponentially while the ledger is failing.
///
/// The first sweep runs immediately.
pub fn spawn_anchor_sweeper(
    anchor: Arc<TruthAnchor>,
    config: AnchorConfig,
    metrics: Arc<GovernanceMetrics>,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut backoff = config.backoff();
        let mut delay = Duration::ZERO;
        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::info!("anchor sweeper shutting down");
                    break;
                }
                _ = tokio::time::sleep(delay) => {
                    match anchor.sweep(&config.triggers, config.batch_size).await {
                        Ok(report) => {
                            metrics.observe_sweep(&report);
                            if report.ledger_unavailable() {
                                backoff.record_failure();
                            } else {
                                backoff.record_success();
                            }
                        }
                        Err(e) => {
                            metrics.anchor_failures.inc();
                            tracing::warn!(error = %e, transient = e.is_transient(), "anchor sweep failed");
                            backoff.record_failure();
                        }
                    }
                    delay = backoff.delay();
                    if backoff.failures() > 0 {
                        tracing::info!(
                            failures = backoff.failures(),
                            next_sweep_in = %format_duration(delay),
                            "anchor sweep backing off"
                        );
                    }
                }
            }
        }
    })
}

/// Periodically retry execution outcomes the store refused to record.
pub fn spawn_outcome_reconciler(
    engine: LifecycleEngine,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::info!("outcome reconciler shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if engine.unrecorded_outcomes() > 0 {
                        engine.reconcile_outcomes().await;
                    }
                }
            }
        }
    })
}

/// Feed raw readings published on [`Topic::CoherenceReading`] into `readings`.
pub fn attach_coherence_readings(
    bus: &dyn EventBus,
    readings: Arc<RollingReadings>,
) -> Result<(), BusError> {
    bus.subscribe(
        Topic::CoherenceReading,
        Arc::new(move |payload: &[u8]| {
            match serde_json::from_slice::<CoherenceReading>(payload) {
                Ok(reading) => readings.push(reading.value, reading.timestamp),
                Err(e) => tracing::warn!(error = %e, "dropping malformed coherence reading"),
            }
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown::ShutdownController;
    use lumina_governance::CoherenceConfig;
    use lumina_messages::InProcessBus;
    use lumina_store::MemoryStore;
    use lumina_types::{Clock, SystemClock};

    fn monitor() -> Arc<CoherenceMonitor> {
        Arc::new(CoherenceMonitor::new(
            CoherenceConfig::default(),
            Arc::new(MemoryStore::new()),
            Arc::new(SystemClock),
        ))
    }

    #[tokio::test]
    async fn sampler_records_bus_readings_and_stops() {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let readings = Arc::new(RollingReadings::new(clock, 900));
        let bus = InProcessBus::new();
        attach_coherence_readings(&bus, Arc::clone(&readings)).unwrap();
        bus.publish(Topic::CoherenceReading, br#"{"value":0.8}"#).unwrap();
        bus.publish(Topic::CoherenceReading, b"garbage").unwrap();
        assert_eq!(readings.len(), 1);

        let monitor = monitor();
        let mut status = monitor.subscribe();
        let metrics = Arc::new(GovernanceMetrics::new().unwrap());
        let shutdown = ShutdownController::new();
        let handle = spawn_coherence_sampler(
            Arc::clone(&monitor),
            readings,
            Arc::clone(&metrics),
            Duration::from_secs(60),
            shutdown.subscribe(),
        );

        tokio::time::timeout(Duration::from_secs(5), status.changed())
            .await
            .expect("sampler should record a sample")
            .unwrap();
        assert!(monitor.current_status().permitted);

        shutdown.shutdown();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("sampler should stop on shutdown")
            .unwrap();
        assert!((metrics.coherence.get() - 0.8).abs() < 1e-9);
    }
}
