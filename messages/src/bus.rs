//! The event-bus capability contract and an in-process implementation.

use crate::event::{GovernanceEvent, Topic};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// A topic subscriber. Invoked with the raw (JSON) payload.
pub type Subscriber = Arc<dyn Fn(&[u8]) + Send + Sync>;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("event bus unavailable: {0}")]
    Unavailable(String),

    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Publish/subscribe transport.
///
/// Publishing is at-least-once. Ordering is best-effort within a topic and
/// not guaranteed across topics.
pub trait EventBus: Send + Sync {
    fn publish(&self, topic: Topic, payload: &[u8]) -> Result<(), BusError>;

    fn subscribe(&self, topic: Topic, subscriber: Subscriber) -> Result<(), BusError>;
}

impl dyn EventBus + '_ {
    /// Encode and publish a governance event on its own topic.
    pub fn publish_event(&self, event: &GovernanceEvent) -> Result<(), BusError> {
        let payload = event.encode()?;
        self.publish(event.topic(), &payload)
    }
}

/// Synchronous fan-out bus.
///
/// Subscribers run inline on the publishing thread; keep them fast.
#[derive(Default)]
pub struct InProcessBus {
    subscribers: RwLock<HashMap<Topic, Vec<Subscriber>>>,
}

impl InProcessBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of subscribers registered on `topic`.
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.subscribers
            .read()
            .map(|subs| subs.get(&topic).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}

impl EventBus for InProcessBus {
    fn publish(&self, topic: Topic, payload: &[u8]) -> Result<(), BusError> {
        // Clone the list so subscribers may themselves subscribe or publish.
        let subscribers = self
            .subscribers
            .read()
            .map_err(|_| BusError::Unavailable("subscriber table poisoned".into()))?
            .get(&topic)
            .cloned()
            .unwrap_or_default();
        tracing::trace!(topic = %topic, subscribers = subscribers.len(), "publishing event");
        for subscriber in subscribers {
            subscriber(payload);
        }
        Ok(())
    }

    fn subscribe(&self, topic: Topic, subscriber: Subscriber) -> Result<(), BusError> {
        self.subscribers
            .write()
            .map_err(|_| BusError::Unavailable("subscriber table poisoned".into()))?
            .entry(topic)
            .or_default()
            .push(subscriber);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumina_types::{Identity, Timestamp, TransactionId};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn publish_reaches_every_subscriber_of_the_topic() {
        let bus = InProcessBus::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let c1 = Arc::clone(&counter);
        bus.subscribe(
            Topic::TransactionProposed,
            Arc::new(move |_| {
                c1.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();
        let c2 = Arc::clone(&counter);
        bus.subscribe(
            Topic::TransactionProposed,
            Arc::new(move |_| {
                c2.fetch_add(10, Ordering::SeqCst);
            }),
        )
        .unwrap();
        let c3 = Arc::clone(&counter);
        bus.subscribe(
            Topic::TransactionApproved,
            Arc::new(move |_| {
                c3.fetch_add(100, Ordering::SeqCst);
            }),
        )
        .unwrap();

        bus.publish(Topic::TransactionProposed, b"{}").unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn publish_without_subscribers_is_noop() {
        let bus = InProcessBus::new();
        bus.publish(Topic::AttestationCreated, b"{}").unwrap();
        assert_eq!(bus.subscriber_count(Topic::AttestationCreated), 0);
    }

    #[test]
    fn publish_event_routes_by_event_topic() {
        let bus: Arc<dyn EventBus> = Arc::new(InProcessBus::new());
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.subscribe(
            Topic::TransactionApproved,
            Arc::new(move |payload| {
                sink.lock().unwrap().push(GovernanceEvent::decode(payload).unwrap());
            }),
        )
        .unwrap();

        let event = GovernanceEvent::TransactionApproved {
            id: TransactionId::new("tx_1"),
            approved_by: vec![Identity::new("did:web:a"), Identity::new("did:web:b")],
            timestamp: Timestamp::new(9),
        };
        bus.publish_event(&event).unwrap();
        assert_eq!(seen.lock().unwrap().as_slice(), &[event]);
    }
}
