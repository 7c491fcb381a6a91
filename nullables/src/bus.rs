//! Nullable event bus: fans out like the in-process bus and keeps a log.

use lumina_messages::{BusError, EventBus, GovernanceEvent, InProcessBus, Subscriber, Topic};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Records every published payload before delivering it.
#[derive(Default)]
pub struct RecordingBus {
    inner: InProcessBus,
    published: Mutex<Vec<(Topic, Vec<u8>)>>,
    offline: AtomicBool,
}

impl RecordingBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline, publishing fails and nothing is recorded.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Decoded governance events in publish order. Non-event payloads
    /// (coherence readings) are skipped.
    pub fn events(&self) -> Vec<GovernanceEvent> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(_, payload)| GovernanceEvent::decode(payload).ok())
            .collect()
    }

    pub fn count(&self, topic: Topic) -> usize {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| *t == topic)
            .count()
    }

    pub fn topics(&self) -> Vec<Topic> {
        self.published.lock().unwrap().iter().map(|(t, _)| *t).collect()
    }
}

impl EventBus for RecordingBus {
    fn publish(&self, topic: Topic, payload: &[u8]) -> Result<(), BusError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(BusError::Unavailable("recording bus offline".into()));
        }
        self.published.lock().unwrap().push((topic, payload.to_vec()));
        self.inner.publish(topic, payload)
    }

    fn subscribe(&self, topic: Topic, subscriber: Subscriber) -> Result<(), BusError> {
        self.inner.subscribe(topic, subscriber)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumina_types::{Identity, Timestamp, TransactionId};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn records_and_delivers() {
        let bus = RecordingBus::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        bus.subscribe(
            Topic::TransactionApproved,
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();

        let event = GovernanceEvent::TransactionApproved {
            id: TransactionId::new("tx_1"),
            approved_by: vec![Identity::new("did:web:a")],
            timestamp: Timestamp::new(1),
        };
        let dyn_bus: &dyn EventBus = &bus;
        dyn_bus.publish_event(&event).unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(bus.events(), vec![event]);
        assert_eq!(bus.count(Topic::TransactionApproved), 1);
    }

    #[test]
    fn offline_bus_rejects_publish() {
        let bus = RecordingBus::new();
        bus.set_offline(true);
        assert!(bus.publish(Topic::TransactionProposed, b"{}").is_err());
        assert!(bus.topics().is_empty());
    }
}
