//! Ownership of the gate's background tasks and their shutdown.
//!
//! Every loop the node spawns is registered here under its [`NodeTask`]
//! name. [`ShutdownController::drain`] broadcasts the stop signal, joins each
//! task against a shared deadline and aborts whatever is still running when
//! it passes, reporting those tasks by name.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::signal;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// The node's background loops.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeTask {
    CoherenceSampler,
    OutcomeReconciler,
    AnchorSweeper,
}

impl NodeTask {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeTask::CoherenceSampler => "coherence-sampler",
            NodeTask::OutcomeReconciler => "outcome-reconciler",
            NodeTask::AnchorSweeper => "anchor-sweeper",
        }
    }
}

impl fmt::Display for NodeTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type Tracked = Vec<(NodeTask, JoinHandle<()>)>;

/// Stop signal plus the handles of every registered task. Clones share both,
/// so a clone waiting on OS signals stops the same task set.
#[derive(Clone)]
pub struct ShutdownController {
    tx: broadcast::Sender<()>,
    tasks: Arc<Mutex<Tracked>>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            tasks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn tasks(&self) -> MutexGuard<'_, Tracked> {
        // Only push and take happen under the lock.
        self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Receiver for the stop signal. Subscribe before spawning the task that
    /// listens on it.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Hand a spawned task to the controller so `drain` stops it.
    pub fn track(&self, task: NodeTask, handle: JoinHandle<()>) {
        tracing::debug!(task = %task, "background task started");
        self.tasks().push((task, handle));
    }

    /// Tasks registered and not yet drained.
    pub fn running(&self) -> Vec<NodeTask> {
        self.tasks().iter().map(|(task, _)| *task).collect()
    }

    /// Broadcast the stop signal without waiting.
    pub fn shutdown(&self) {
        let _ = self.tx.send(());
    }

    /// Signal every tracked task and join them within `timeout`.
    ///
    /// Tasks still running at the deadline are aborted and returned as the
    /// error. The tracked set is empty afterwards either way.
    pub async fn drain(&self, timeout: Duration) -> Result<(), Vec<NodeTask>> {
        self.shutdown();
        let tracked = std::mem::take(&mut *self.tasks());
        let deadline = tokio::time::Instant::now() + timeout;

        let mut stuck = Vec::new();
        for (task, mut handle) in tracked {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => tracing::debug!(task = %task, "background task stopped"),
                Ok(Err(e)) => {
                    tracing::warn!(task = %task, error = %e, "background task ended abnormally")
                }
                Err(_) => {
                    tracing::warn!(task = %task, "background task did not stop in time, aborting");
                    handle.abort();
                    stuck.push(task);
                }
            }
        }

        if stuck.is_empty() {
            Ok(())
        } else {
            Err(stuck)
        }
    }

    /// Wait for SIGTERM or SIGINT, then broadcast the stop signal.
    pub async fn wait_for_signal(&self) {
        let ctrl_c = signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => { tracing::info!(signal = "SIGINT", "stopping gate"); }
            _ = terminate => { tracing::info!(signal = "SIGTERM", "stopping gate"); }
        }

        self.shutdown();
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listener(controller: &ShutdownController) -> JoinHandle<()> {
        let mut rx = controller.subscribe();
        tokio::spawn(async move {
            let _ = rx.recv().await;
        })
    }

    #[tokio::test]
    async fn drain_stops_every_tracked_task() {
        let controller = ShutdownController::new();
        controller.track(NodeTask::CoherenceSampler, listener(&controller));
        controller.track(NodeTask::OutcomeReconciler, listener(&controller));
        assert_eq!(
            controller.running(),
            vec![NodeTask::CoherenceSampler, NodeTask::OutcomeReconciler]
        );

        controller.drain(Duration::from_secs(5)).await.unwrap();
        assert!(controller.running().is_empty());
    }

    #[tokio::test]
    async fn drain_names_and_aborts_tasks_that_ignore_the_signal() {
        let controller = ShutdownController::new();
        controller.track(NodeTask::CoherenceSampler, listener(&controller));
        let deaf = tokio::spawn(std::future::pending::<()>());
        let deaf_abort = deaf.abort_handle();
        controller.track(NodeTask::AnchorSweeper, deaf);

        let stuck = controller.drain(Duration::from_millis(50)).await.unwrap_err();
        assert_eq!(stuck, vec![NodeTask::AnchorSweeper]);
        assert!(controller.running().is_empty());

        tokio::time::timeout(Duration::from_secs(1), async {
            while !deaf_abort.is_finished() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("aborted task should finish");
    }

    #[tokio::test]
    async fn clones_share_tasks_and_signal() {
        let controller = ShutdownController::new();
        let handle = controller.clone();
        handle.track(NodeTask::OutcomeReconciler, listener(&controller));
        assert_eq!(controller.running(), vec![NodeTask::OutcomeReconciler]);

        controller.drain(Duration::from_secs(5)).await.unwrap();
        assert!(handle.running().is_empty());
    }

    #[test]
    fn shutdown_without_subscribers_is_harmless() {
        ShutdownController::default().shutdown();
    }

    #[test]
    fn task_names_are_stable() {
        assert_eq!(NodeTask::AnchorSweeper.to_string(), "anchor-sweeper");
        assert_eq!(NodeTask::CoherenceSampler.as_str(), "coherence-sampler");
    }
}
