//! Transaction lifecycle engine.
//!
//! Owns every transaction mutation: proposal through the policy gate,
//! approval collection, and execution. Mutations on one transaction are
//! serialized by a per-transaction lock and persisted with compare-and-swap
//! on the revision. Once a transaction is durably `executing`, the handler
//! and the final transition run on a detached task, so dropping the caller's
//! future cannot strand it.

use crate::coherence::CoherenceMonitor;
use crate::error::GovernanceError;
use crate::locks::KeyedLocks;
use crate::params::GovernanceParams;
use crate::policy::{Evaluation, PolicyGate, PolicyVerdict};
use crate::quorum::{QuorumOutcome, QuorumTracker};
use crate::registry::{ExecutionHandler, HandlerRegistry};
use crate::spans::{approve_span, execute_span, propose_span};
use lumina_messages::{EventBus, GovernanceEvent};
use lumina_store::{
    DecisionFilter, GovernanceStore, Page, PageResult, StoreError, TransactionFilter,
};
use lumina_types::{
    ActionKind, ActionPayload, AttestationId, Clock, DecisionId, Identity, PayloadError,
    PolicyDecision, Timestamp, Transaction, TransactionId, TransactionState,
};
use std::collections::HashMap;
use std::future::Future;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::Instrument;

/// Attempts at a compare-and-swap before giving up on a conflict.
const MAX_CAS_ATTEMPTS: u32 = 3;

/// Attempts at recording an execution outcome when storage is unavailable.
const FINALIZE_ATTEMPTS: u32 = 5;
const FINALIZE_BACKOFF: Duration = Duration::from_millis(50);

/// What a handler returned: its result, or the error text.
type Outcome = Result<serde_json::Value, String>;

/// An execution outcome whose final write failed.
#[derive(Clone, Debug)]
struct ParkedOutcome {
    at: Timestamp,
    outcome: Outcome,
}

/// Collaborators the engine is wired with.
pub struct EngineParts {
    pub store: Arc<dyn GovernanceStore>,
    pub bus: Arc<dyn EventBus>,
    pub clock: Arc<dyn Clock>,
    pub coherence: Arc<CoherenceMonitor>,
    pub handlers: HandlerRegistry,
}

/// A request to propose an action.
#[derive(Clone, Debug, PartialEq)]
pub struct ProposeRequest {
    pub action: ActionKind,
    pub payload: ActionPayload,
    pub proposer: Identity,
    pub attestations: Vec<AttestationId>,
}

impl ProposeRequest {
    pub fn new(payload: ActionPayload, proposer: impl Into<Identity>) -> Self {
        Self {
            action: payload.kind(),
            payload,
            proposer: proposer.into(),
            attestations: Vec::new(),
        }
    }

    /// Parse an untyped request: an action name and a JSON body.
    pub fn from_json(
        action: &str,
        body: serde_json::Value,
        proposer: impl Into<Identity>,
    ) -> Result<Self, GovernanceError> {
        let kind = ActionKind::from_str(action)?;
        let payload = ActionPayload::from_parts(action, body)?;
        Ok(Self {
            action: kind,
            payload,
            proposer: proposer.into(),
            attestations: Vec::new(),
        })
    }

    pub fn with_attestations(mut self, ids: impl IntoIterator<Item = AttestationId>) -> Self {
        self.attestations.extend(ids);
        self
    }
}

/// Result of a successful approval.
#[derive(Clone, Debug, PartialEq)]
pub struct ApprovalOutcome {
    pub transaction: Transaction,
    pub quorum: QuorumOutcome,
}

impl ApprovalOutcome {
    /// Whether this approval moved the transaction to `approved`.
    pub fn reached_quorum(&self) -> bool {
        self.transaction.state == TransactionState::Approved
    }
}

/// Handle to the lifecycle engine. Cheap to clone.
#[derive(Clone)]
pub struct LifecycleEngine {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn GovernanceStore>,
    bus: Arc<dyn EventBus>,
    clock: Arc<dyn Clock>,
    coherence: Arc<CoherenceMonitor>,
    handlers: HandlerRegistry,
    gate: PolicyGate,
    quorum: QuorumTracker,
    locks: KeyedLocks,
    handler_timeout: Duration,
    unrecorded: Mutex<HashMap<TransactionId, ParkedOutcome>>,
}

impl LifecycleEngine {
    pub fn new(parts: EngineParts, params: &GovernanceParams) -> Result<Self, GovernanceError> {
        let gate = PolicyGate::from_params(params);
        Self::with_gate(parts, params, gate)
    }

    /// Like [`LifecycleEngine::new`] with a caller-assembled policy gate.
    pub fn with_gate(
        parts: EngineParts,
        params: &GovernanceParams,
        gate: PolicyGate,
    ) -> Result<Self, GovernanceError> {
        params.validate()?;
        let quorum = ActionKind::ALL
            .iter()
            .filter(|kind| params.approvers.contains_key(kind.name()))
            .fold(QuorumTracker::new(params.quorum_fraction), |q, kind| {
                q.with_population(*kind, params.approvers_for(*kind).iter().cloned())
            });
        for kind in ActionKind::ALL {
            if !parts.handlers.contains(kind) {
                tracing::warn!(%kind, "no execution handler registered");
            }
        }
        Ok(Self {
            inner: Arc::new(Inner {
                store: parts.store,
                bus: parts.bus,
                clock: parts.clock,
                coherence: parts.coherence,
                handlers: parts.handlers,
                gate,
                quorum,
                locks: KeyedLocks::new(),
                handler_timeout: params.handler_timeout(),
                unrecorded: Mutex::new(HashMap::new()),
            }),
        })
    }

    pub fn coherence(&self) -> &Arc<CoherenceMonitor> {
        &self.inner.coherence
    }

    pub fn quorum(&self) -> &QuorumTracker {
        &self.inner.quorum
    }

    /// Evaluate a request against the policy gate without recording anything.
    pub fn evaluate(&self, request: &ProposeRequest) -> Result<PolicyVerdict, GovernanceError> {
        let attestations = self.inner.store.get_attestations(&request.attestations)?;
        let input = Evaluation {
            payload: &request.payload,
            requester: &request.proposer,
            attestations: &attestations,
            coherence: self.inner.coherence.current_status(),
            now: self.inner.clock.now(),
        };
        Ok(self.inner.gate.evaluate(&input, &self.inner.quorum))
    }

    /// Run the policy gate and, if admitted, create a `proposed` transaction.
    ///
    /// A denial records a deny decision and fails with
    /// [`GovernanceError::PolicyDenied`]; no transaction is created.
    pub async fn propose(&self, request: ProposeRequest) -> Result<Transaction, GovernanceError> {
        let span = propose_span(request.action.name(), request.proposer.as_str());
        self.inner.propose(request).instrument(span).await
    }

    /// Record an approval. Moves the transaction to `approved` once quorum
    /// is met over the merged approver set.
    pub async fn approve(
        &self,
        id: &TransactionId,
        approver: &Identity,
    ) -> Result<ApprovalOutcome, GovernanceError> {
        let span = approve_span(id.as_str(), approver.as_str());
        self.inner.approve(id, approver).instrument(span).await
    }

    /// Execute an approved transaction and wait for the outcome.
    ///
    /// Handler failure is not an error here: the returned transaction is
    /// `failed` with the handler's error recorded.
    pub async fn execute(
        &self,
        id: &TransactionId,
        executor: &Identity,
    ) -> Result<Transaction, GovernanceError> {
        let span = execute_span(id.as_str(), executor.as_str());
        let task = Arc::clone(&self.inner)
            .begin_execution(id, executor)
            .instrument(span)
            .await?;
        task.await
            .map_err(|e| GovernanceError::Unavailable(format!("execution task lost: {e}")))?
    }

    /// Retry writing execution outcomes that storage refused earlier.
    /// Returns how many were recorded.
    pub async fn reconcile_outcomes(&self) -> usize {
        self.inner.reconcile_outcomes().await
    }

    /// Execution outcomes waiting for [`LifecycleEngine::reconcile_outcomes`].
    pub fn unrecorded_outcomes(&self) -> usize {
        self.inner.unrecorded().len()
    }

    pub fn get_transaction(&self, id: &TransactionId) -> Result<Transaction, GovernanceError> {
        Ok(self.inner.store.get_transaction(id)?)
    }

    /// Newest first.
    pub fn list_transactions(
        &self,
        filter: &TransactionFilter,
        page: Page,
    ) -> Result<PageResult<Transaction>, GovernanceError> {
        Ok(self.inner.store.query_transactions(filter, page)?)
    }

    pub fn get_decision(&self, id: &DecisionId) -> Result<PolicyDecision, GovernanceError> {
        Ok(self.inner.store.get_decision(id)?)
    }

    pub fn list_decisions(
        &self,
        filter: &DecisionFilter,
        page: Page,
    ) -> Result<PageResult<PolicyDecision>, GovernanceError> {
        Ok(self.inner.store.query_decisions(filter, page)?)
    }
}

impl Inner {
    async fn propose(&self, request: ProposeRequest) -> Result<Transaction, GovernanceError> {
        require_identity(&request.proposer, "proposer")?;
        if request.payload.kind() != request.action {
            return Err(PayloadError::KindMismatch {
                expected: request.action,
                found: request.payload.kind(),
            }
            .into());
        }
        request.payload.validate()?;

        let now = self.clock.now();
        let attestations = self.store.get_attestations(&request.attestations)?;
        let input = Evaluation {
            payload: &request.payload,
            requester: &request.proposer,
            attestations: &attestations,
            coherence: self.coherence.current_status(),
            now,
        };
        let verdict = self.gate.evaluate(&input, &self.quorum);
        let tx_id = TransactionId::generate();
        let decision =
            self.gate
                .decision_record(&input, &verdict, verdict.admitted.then(|| tx_id.clone()));

        self.store.insert_decision(&decision)?;
        self.emit(GovernanceEvent::PolicyDecisionRecorded {
            id: decision.id.clone(),
            policy: decision.policy.clone(),
            decision: decision.decision,
            transaction: decision.transaction.clone(),
            timestamp: now,
        });

        if !verdict.admitted {
            tracing::info!(
                decision = %decision.id,
                score = verdict.score,
                reasons = ?verdict.reasons,
                "proposal denied by policy gate"
            );
            return Err(GovernanceError::PolicyDenied {
                decision: decision.id,
                violations: verdict.reasons,
            });
        }

        let tx = Transaction::proposed(
            tx_id,
            request.payload,
            request.proposer,
            request.attestations,
            Some(decision.id),
            now,
        );
        self.store.insert_transaction(&tx)?;
        self.emit(GovernanceEvent::TransactionProposed {
            id: tx.id.clone(),
            kind: tx.kind,
            proposed_by: tx.proposed_by.clone(),
            timestamp: now,
        });
        tracing::info!(tx = %tx.id, score = verdict.score, "transaction proposed");
        Ok(tx)
    }

    async fn approve(
        &self,
        id: &TransactionId,
        approver: &Identity,
    ) -> Result<ApprovalOutcome, GovernanceError> {
        require_identity(approver, "approver")?;

        let tx = self
            .mutate(id, |tx| {
                expect_state(tx, TransactionState::Proposed)?;
                if tx.has_approved(approver) {
                    return Err(GovernanceError::DuplicateApproval {
                        id: tx.id.clone(),
                        approver: approver.clone(),
                    });
                }
                if self.quorum.is_eligible(tx.kind, approver) == Some(false) {
                    return Err(GovernanceError::IneligibleApprover {
                        id: tx.id.clone(),
                        approver: approver.clone(),
                    });
                }
                tx.approved_by.push(approver.clone());
                if self.quorum.evaluate(tx.kind, tx.approval_count()).met {
                    tx.state = TransactionState::Approved;
                }
                Ok(())
            })
            .await?;

        let quorum = self.quorum.evaluate(tx.kind, tx.approval_count());
        let outcome = ApprovalOutcome {
            transaction: tx,
            quorum,
        };
        if outcome.reached_quorum() {
            self.emit(GovernanceEvent::TransactionApproved {
                id: outcome.transaction.id.clone(),
                approved_by: outcome.transaction.approved_by.clone(),
                timestamp: self.clock.now(),
            });
            tracing::info!(reason = %outcome.quorum.reason, "quorum reached");
        } else {
            tracing::debug!(reason = %outcome.quorum.reason, "approval recorded");
        }
        Ok(outcome)
    }

    /// Move an approved transaction to `executing` and spawn the handler.
    async fn begin_execution(
        self: Arc<Self>,
        id: &TransactionId,
        executor: &Identity,
    ) -> Result<JoinHandle<Result<Transaction, GovernanceError>>, GovernanceError> {
        require_identity(executor, "executor")?;

        let mut handler: Option<Arc<dyn ExecutionHandler>> = None;
        let tx = self
            .mutate(id, |tx| {
                expect_state(tx, TransactionState::Approved)?;
                handler = Some(
                    self.handlers
                        .get(tx.kind)
                        .ok_or(GovernanceError::HandlerMissing(tx.kind))?,
                );
                if let ActionPayload::TreasuryMove(mv) = &tx.payload {
                    if let Some(until) = mv.timelock_until {
                        if self.clock.now() < until {
                            return Err(GovernanceError::TimelockActive {
                                id: tx.id.clone(),
                                until,
                            });
                        }
                    }
                }
                let coherence = self.coherence.current_status();
                if let Some(reason) = coherence.suspension_reason() {
                    return Err(GovernanceError::CoherenceTooLow { reason });
                }
                tx.state = TransactionState::Executing;
                tx.executed_by = Some(executor.clone());
                Ok(())
            })
            .await?;
        let handler = handler.ok_or(GovernanceError::HandlerMissing(tx.kind))?;
        tracing::info!(kind = %tx.kind, "execution started");

        let inner = Arc::clone(&self);
        let task = async move {
            let outcome = run_handler(handler, tx.payload.clone(), inner.handler_timeout).await;
            inner.finish_execution(&tx.id, outcome).await
        };
        Ok(tokio::spawn(task.in_current_span()))
    }

    /// Record the handler outcome. Storage outages are retried with backoff;
    /// an outcome that still cannot be written is parked for
    /// [`LifecycleEngine::reconcile_outcomes`].
    async fn finish_execution(
        &self,
        id: &TransactionId,
        outcome: Outcome,
    ) -> Result<Transaction, GovernanceError> {
        let at = self.clock.now();
        let mut attempt = 0;
        loop {
            match self.write_outcome(id, at, &outcome).await {
                Ok(tx) => return Ok(self.announce_outcome(tx, at)),
                Err(e) if e.is_retryable() && attempt + 1 < FINALIZE_ATTEMPTS => {
                    attempt += 1;
                    let delay = FINALIZE_BACKOFF * 2u32.pow(attempt);
                    tracing::warn!(tx = %id, attempt, error = %e, "retrying execution outcome write");
                    tokio::time::sleep(delay).await;
                }
                Err(e) if e.is_retryable() => {
                    tracing::error!(
                        tx = %id,
                        error = %e,
                        outcome = ?outcome,
                        "execution outcome not recorded, parked for reconciliation"
                    );
                    self.unrecorded().insert(id.clone(), ParkedOutcome { at, outcome });
                    return Err(e);
                }
                Err(e) => {
                    tracing::error!(tx = %id, error = %e, outcome = ?outcome, "failed to record execution outcome");
                    return Err(e);
                }
            }
        }
    }

    async fn write_outcome(
        &self,
        id: &TransactionId,
        at: Timestamp,
        outcome: &Outcome,
    ) -> Result<Transaction, GovernanceError> {
        self.mutate(id, |tx| {
            expect_state(tx, TransactionState::Executing)?;
            tx.executed_at = Some(at);
            match outcome {
                Ok(value) => {
                    tx.state = TransactionState::Committed;
                    tx.result = Some(value.clone());
                }
                Err(error) => {
                    tx.state = TransactionState::Failed;
                    tx.error = Some(error.clone());
                }
            }
            Ok(())
        })
        .await
    }

    /// Side effects of a durable outcome: stamp the decision and emit
    /// `transaction-committed`.
    fn announce_outcome(&self, tx: Transaction, at: Timestamp) -> Transaction {
        if let Some(decision) = &tx.decision {
            if let Err(e) = self.store.mark_decision_executed(decision, at) {
                tracing::warn!(%decision, error = %e, "failed to stamp decision execution time");
            }
        }
        self.emit(GovernanceEvent::TransactionCommitted {
            id: tx.id.clone(),
            success: tx.state == TransactionState::Committed,
            result: tx.result.clone(),
            error: tx.error.clone(),
            timestamp: at,
        });
        match &tx.error {
            None => tracing::info!(tx = %tx.id, "transaction committed"),
            Some(error) => tracing::warn!(tx = %tx.id, %error, "transaction failed"),
        }
        tx
    }

    fn unrecorded(&self) -> MutexGuard<'_, HashMap<TransactionId, ParkedOutcome>> {
        self.unrecorded
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn reconcile_outcomes(&self) -> usize {
        let parked: Vec<(TransactionId, ParkedOutcome)> = self
            .unrecorded()
            .iter()
            .map(|(id, parked)| (id.clone(), parked.clone()))
            .collect();
        let mut recorded = 0;
        for (id, parked) in parked {
            match self.write_outcome(&id, parked.at, &parked.outcome).await {
                Ok(tx) => {
                    self.unrecorded().remove(&id);
                    self.announce_outcome(tx, parked.at);
                    recorded += 1;
                }
                Err(e) if e.is_retryable() => {
                    tracing::debug!(tx = %id, error = %e, "execution outcome still unwritable");
                }
                Err(e) => {
                    self.unrecorded().remove(&id);
                    tracing::error!(tx = %id, error = %e, outcome = ?parked.outcome, "dropping unrecordable execution outcome");
                }
            }
        }
        if recorded > 0 {
            tracing::info!(recorded, "reconciled parked execution outcomes");
        }
        recorded
    }

    /// Read-modify-write one transaction under its lock, with CAS retry.
    async fn mutate<F>(&self, id: &TransactionId, mut apply: F) -> Result<Transaction, GovernanceError>
    where
        F: FnMut(&mut Transaction) -> Result<(), GovernanceError>,
    {
        let _guard = self.locks.lock(id.as_str()).await;
        let mut attempt = 1;
        loop {
            let mut tx = self.store.get_transaction(id)?;
            let prior = tx.state;
            apply(&mut tx)?;
            if tx.state != prior && !prior.can_transition_to(tx.state) {
                return Err(GovernanceError::IllegalTransition {
                    id: tx.id,
                    from: prior,
                    to: tx.state,
                });
            }
            match self.store.update_transaction(&tx) {
                Ok(saved) => return Ok(saved),
                Err(StoreError::Conflict { reason, .. }) if attempt < MAX_CAS_ATTEMPTS => {
                    tracing::debug!(tx = %id, attempt, %reason, "revision conflict, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn emit(&self, event: GovernanceEvent) {
        if let Err(e) = self.bus.publish_event(&event) {
            tracing::warn!(topic = %event.topic(), error = %e, "failed to publish event");
        }
    }
}

async fn run_handler(
    handler: Arc<dyn ExecutionHandler>,
    payload: ActionPayload,
    timeout: Duration,
) -> Result<serde_json::Value, String> {
    let mut task = tokio::spawn(async move { handler.execute(&payload).await });
    match tokio::time::timeout(timeout, &mut task).await {
        Ok(Ok(Ok(value))) => Ok(value),
        Ok(Ok(Err(e))) => Err(e.to_string()),
        Ok(Err(join)) if join.is_panic() => Err("execution handler panicked".into()),
        Ok(Err(join)) => Err(format!("execution handler aborted: {join}")),
        Err(_) => {
            task.abort();
            Err(format!(
                "execution handler timed out after {}s",
                timeout.as_secs()
            ))
        }
    }
}

fn require_identity(identity: &Identity, role: &'static str) -> Result<(), GovernanceError> {
    if identity.is_valid() {
        Ok(())
    } else {
        Err(GovernanceError::InvalidIdentity { role })
    }
}

fn expect_state(tx: &Transaction, expected: TransactionState) -> Result<(), GovernanceError> {
    if tx.state == expected {
        Ok(())
    } else {
        Err(GovernanceError::InvalidState {
            id: tx.id.clone(),
            state: tx.state,
            expected,
        })
    }
}

/// Bound `fut` by `deadline`. Operations abort before any durable mutation
/// when the deadline fires while they wait on a lock.
pub async fn with_deadline<T>(
    deadline: Duration,
    fut: impl Future<Output = Result<T, GovernanceError>>,
) -> Result<T, GovernanceError> {
    tokio::time::timeout(deadline, fut)
        .await
        .map_err(|_| GovernanceError::DeadlineExceeded)?
}
