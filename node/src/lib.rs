//! Lumina gate node: assembles the governance components.
//!
//! The node is the central coordinator that:
//! - Loads configuration and validates governance parameters
//! - Wires storage, the event bus, the lifecycle engine and attestations
//! - Samples coherence on a fixed interval
//! - Sweeps unanchored policy decisions onto the external ledger
//! - Exposes Prometheus metrics and shuts down gracefully

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod node;
pub mod shutdown;
pub mod tasks;

pub use config::NodeConfig;
pub use error::NodeError;
pub use handlers::{builtin_handlers, SimulatedHandler};
pub use metrics::GovernanceMetrics;
pub use node::{GovernanceNode, NodeDeps};
pub use shutdown::{NodeTask, ShutdownController};
pub use tasks::{
    attach_coherence_readings, spawn_anchor_sweeper, spawn_coherence_sampler,
    spawn_outcome_reconciler,
};
