//! Truth anchor for the Lumina gate.
//!
//! Records policy decisions to an external ledger exactly once each. The
//! ledger itself sits behind [`LedgerClient`]; [`JournalLedger`] is the
//! file-backed client used by single-node deployments.

pub mod anchor;
pub mod digest;
pub mod error;
pub mod journal;
pub mod ledger;
pub mod sweep;

pub use anchor::{AnchorReceipt, TruthAnchor};
pub use digest::{anchor_id, decision_digest};
pub use error::{AnchorError, LedgerError};
pub use journal::{JournalEntry, JournalLedger};
pub use ledger::{AnchorRecord, LedgerClient};
pub use sweep::{AnchorConfig, AnchorTrigger, Backoff, SweepReport};
