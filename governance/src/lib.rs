//! Governance lifecycle engine for the Lumina gate.
//!
//! A proposed action passes the [`PolicyGate`], collects approvals until the
//! [`QuorumTracker`] is satisfied, and is executed by a registered
//! [`ExecutionHandler`] while the [`CoherenceMonitor`] permits governance.

pub mod attestation;
pub mod coherence;
pub mod engine;
pub mod error;
pub mod locks;
pub mod params;
pub mod policy;
pub mod quorum;
pub mod registry;
pub mod spans;

pub use attestation::{AttestationService, NewAttestation, ReviewVerdict};
pub use coherence::{
    CoherenceConfig, CoherenceHistory, CoherenceMonitor, CoherenceSource, CoherenceStatus,
    RollingReadings,
};
pub use engine::{
    with_deadline, ApprovalOutcome, EngineParts, LifecycleEngine, ProposeRequest,
};
pub use error::GovernanceError;
pub use locks::KeyedLocks;
pub use params::{Authority, GovernanceParams};
pub use policy::{ComplianceRule, PolicyGate, PolicyVerdict};
pub use quorum::{is_quorum_met, QuorumOutcome, QuorumTracker, QUORUM_TOLERANCE};
pub use registry::{ExecutionHandler, HandlerError, HandlerRegistry};
