//! Governance lifecycle events and the event-bus contract.
//!
//! The engine publishes JSON-encoded [`GovernanceEvent`]s on named
//! [`Topic`]s. Transport is pluggable behind [`EventBus`]; [`InProcessBus`]
//! fans events out to in-process subscribers.

pub mod bus;
pub mod event;

pub use bus::{BusError, EventBus, InProcessBus, Subscriber};
pub use event::{CoherenceReading, GovernanceEvent, Topic};
