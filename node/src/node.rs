//! Node assembly: builds every component from a [`NodeConfig`] and owns the
//! background tasks.

use crate::config::NodeConfig;
use crate::handlers::builtin_handlers;
use crate::metrics::GovernanceMetrics;
use crate::shutdown::{NodeTask, ShutdownController};
use crate::tasks::{
    attach_coherence_readings, spawn_anchor_sweeper, spawn_coherence_sampler,
    spawn_outcome_reconciler,
};
use crate::NodeError;
use lumina_anchor::{JournalLedger, LedgerClient, TruthAnchor};
use lumina_governance::{
    AttestationService, CoherenceMonitor, CoherenceSource, EngineParts, HandlerRegistry,
    LifecycleEngine, RollingReadings,
};
use lumina_messages::{EventBus, InProcessBus};
use lumina_store::{GovernanceStore, MemoryStore};
use lumina_types::{Clock, SystemClock};
use std::sync::Arc;
use std::time::Duration;

/// External collaborators the node is built around.
pub struct NodeDeps {
    pub clock: Arc<dyn Clock>,
    pub store: Arc<dyn GovernanceStore>,
    pub bus: Arc<dyn EventBus>,
    pub ledger: Arc<dyn LedgerClient>,
    pub handlers: HandlerRegistry,
    /// Where coherence samples come from. When unset, readings published on
    /// the `coherence-reading` topic are averaged over the sample window.
    pub coherence_source: Option<Arc<dyn CoherenceSource>>,
}

pub struct GovernanceNode {
    pub config: NodeConfig,
    pub store: Arc<dyn GovernanceStore>,
    pub bus: Arc<dyn EventBus>,
    pub engine: LifecycleEngine,
    pub attestations: Arc<AttestationService>,
    pub coherence: Arc<CoherenceMonitor>,
    pub anchor: Arc<TruthAnchor>,
    pub metrics: Arc<GovernanceMetrics>,
    /// Owns the background tasks started by [`GovernanceNode::start`].
    pub shutdown: ShutdownController,
    coherence_source: Arc<dyn CoherenceSource>,
}

impl GovernanceNode {
    /// Build a node with the production collaborators: in-memory storage,
    /// the in-process bus, the journal ledger and the built-in handlers.
    pub async fn open(config: NodeConfig) -> Result<Self, NodeError> {
        Self::open_with_store(config, Arc::new(MemoryStore::new())).await
    }

    /// Like [`GovernanceNode::open`] over a caller-supplied storage backend.
    /// A backend that keeps its data across restarts lets `start` resume
    /// from the last coherence sample.
    pub async fn open_with_store(
        config: NodeConfig,
        store: Arc<dyn GovernanceStore>,
    ) -> Result<Self, NodeError> {
        let ledger = JournalLedger::open(&config.journal_path).await?;
        tracing::info!(journal = %config.journal_path.display(), "anchor journal ready");
        let deps = NodeDeps {
            clock: Arc::new(SystemClock),
            store,
            bus: Arc::new(InProcessBus::new()),
            ledger: Arc::new(ledger),
            handlers: builtin_handlers(),
            coherence_source: None,
        };
        Self::new(config, deps)
    }

    pub fn new(config: NodeConfig, deps: NodeDeps) -> Result<Self, NodeError> {
        config.validate()?;

        let metrics = Arc::new(GovernanceMetrics::new()?);
        metrics.attach(deps.bus.as_ref())?;

        let coherence_source: Arc<dyn CoherenceSource> = match deps.coherence_source {
            Some(source) => source,
            None => {
                let readings = Arc::new(RollingReadings::new(
                    Arc::clone(&deps.clock),
                    config.coherence.window_secs,
                ));
                attach_coherence_readings(deps.bus.as_ref(), Arc::clone(&readings))?;
                readings
            }
        };

        let coherence = Arc::new(CoherenceMonitor::new(
            config.coherence.clone(),
            Arc::clone(&deps.store).as_coherence_store(),
            Arc::clone(&deps.clock),
        ));

        let engine = LifecycleEngine::new(
            EngineParts {
                store: Arc::clone(&deps.store),
                bus: Arc::clone(&deps.bus),
                clock: Arc::clone(&deps.clock),
                coherence: Arc::clone(&coherence),
                handlers: deps.handlers,
            },
            &config.governance,
        )?;

        let attestations = Arc::new(AttestationService::new(
            Arc::clone(&deps.store).as_attestation_store(),
            Arc::clone(&deps.bus),
            Arc::clone(&deps.clock),
        ));

        let anchor = Arc::new(TruthAnchor::new(
            Arc::clone(&deps.store).as_decision_store(),
            deps.ledger,
            Arc::clone(&deps.clock),
            config.anchor.chain.clone(),
        ));

        Ok(Self {
            config,
            store: deps.store,
            bus: deps.bus,
            engine,
            attestations,
            coherence,
            anchor,
            metrics,
            shutdown: ShutdownController::new(),
            coherence_source,
        })
    }

    /// Restore the latest coherence sample and start the background tasks.
    pub async fn start(&mut self) -> Result<(), NodeError> {
        if self.is_running() {
            return Err(NodeError::AlreadyStarted);
        }
        tracing::info!(
            quorum_fraction = self.config.governance.quorum_fraction,
            coherence_minimum = self.config.coherence.minimum,
            anchoring = self.config.anchor.enabled,
            "Lumina gate starting"
        );

        if let Some(sample) = self.coherence.restore_latest().await? {
            self.metrics.coherence.set(sample.value);
        }

        self.shutdown.track(
            NodeTask::CoherenceSampler,
            spawn_coherence_sampler(
                Arc::clone(&self.coherence),
                Arc::clone(&self.coherence_source),
                Arc::clone(&self.metrics),
                Duration::from_secs(self.config.coherence.interval_secs),
                self.shutdown.subscribe(),
            ),
        );

        self.shutdown.track(
            NodeTask::OutcomeReconciler,
            spawn_outcome_reconciler(
                self.engine.clone(),
                self.config.reconcile_interval(),
                self.shutdown.subscribe(),
            ),
        );

        if self.config.anchor.enabled {
            self.shutdown.track(
                NodeTask::AnchorSweeper,
                spawn_anchor_sweeper(
                    Arc::clone(&self.anchor),
                    self.config.anchor.clone(),
                    Arc::clone(&self.metrics),
                    self.shutdown.subscribe(),
                ),
            );
        } else {
            tracing::info!("anchoring disabled");
        }
        Ok(())
    }

    /// Signal every background task and wait for them to finish.
    ///
    /// Detached executions already in flight are not awaited; they finish on
    /// their own and persist their outcome.
    pub async fn stop(&mut self) -> Result<(), NodeError> {
        tracing::info!(tasks = ?self.shutdown.running(), "Lumina gate stopping");
        match self.shutdown.drain(self.config.shutdown_timeout()).await {
            Ok(()) => {
                tracing::info!("Lumina gate stopped");
                Ok(())
            }
            Err(stuck) => Err(NodeError::ShutdownTimeout(
                stuck.into_iter().map(NodeTask::as_str).collect(),
            )),
        }
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.running().is_empty()
    }
}
