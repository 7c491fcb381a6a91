//! Nullable infrastructure for deterministic testing.
//!
//! Every external dependency of the gate (clock, ledger, execution handlers,
//! coherence source, event bus) sits behind a trait. This crate provides
//! test-friendly implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically
//! - Record what was asked of them
//! - Never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod bus;
pub mod clock;
pub mod coherence;
pub mod handler;
pub mod ledger;

pub use bus::RecordingBus;
pub use clock::NullClock;
pub use coherence::NullCoherenceSource;
pub use handler::{HandlerMode, NullHandler};
pub use ledger::NullLedger;
