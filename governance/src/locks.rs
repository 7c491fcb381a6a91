use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Entries = HashMap<String, Arc<AsyncMutex<()>>>;

/// Per-key async locks.
///
/// Work on the same key is serialized; different keys only share the brief
/// synchronous map lookup. An entry lives exactly as long as someone holds
/// or waits on its key.
#[derive(Default)]
pub struct KeyedLocks {
    entries: Mutex<Entries>,
}

/// Exclusive access to one key. Dropping it releases the key and removes
/// the entry once nobody else is waiting.
pub struct KeyGuard<'a> {
    // Field order matters: the mutex is released before the slot is retired.
    _guard: OwnedMutexGuard<()>,
    _slot: Slot<'a>,
}

/// One task's claim on an entry.
struct Slot<'a> {
    locks: &'a KeyedLocks,
    key: String,
    lock: Option<Arc<AsyncMutex<()>>>,
}

impl Drop for Slot<'_> {
    fn drop(&mut self) {
        let mut entries = self.locks.entries();
        drop(self.lock.take());
        if entries
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            entries.remove(&self.key);
        }
    }
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, Entries> {
        // The map only holds Arcs; a panic elsewhere cannot leave it torn.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Wait for exclusive access to `key`. Released when the guard drops.
    pub async fn lock(&self, key: &str) -> KeyGuard<'_> {
        let lock = Arc::clone(
            self.entries()
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        );
        let slot = Slot {
            locks: self,
            key: key.to_string(),
            lock: Some(Arc::clone(&lock)),
        };
        let guard = lock.lock_owned().await;
        KeyGuard {
            _guard: guard,
            _slot: slot,
        }
    }

    /// Number of keys currently held or waited on.
    pub fn active_keys(&self) -> usize {
        self.entries().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn same_key_is_serialized() {
        let locks = Arc::new(KeyedLocks::new());
        let inside = Arc::new(AtomicU64::new(0));
        let max_seen = Arc::new(AtomicU64::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let locks = Arc::clone(&locks);
            let inside = Arc::clone(&inside);
            let max_seen = Arc::clone(&max_seen);
            handles.push(tokio::spawn(async move {
                let _guard = locks.lock("tx_same").await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(locks.active_keys(), 0);
    }

    #[tokio::test]
    async fn different_keys_run_in_parallel() {
        let locks = Arc::new(KeyedLocks::new());
        let start = Instant::now();
        let mut handles = Vec::new();
        for i in 0..4 {
            let locks = Arc::clone(&locks);
            handles.push(tokio::spawn(async move {
                let _guard = locks.lock(&format!("tx_{i}")).await;
                tokio::time::sleep(Duration::from_millis(50)).await;
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        let elapsed = start.elapsed();
        assert!(
            elapsed < Duration::from_millis(180),
            "expected parallel execution, took {elapsed:?}"
        );
    }

    #[tokio::test]
    async fn entries_are_retired_with_their_last_holder() {
        let locks = KeyedLocks::new();
        drop(locks.lock("tx_a").await);
        assert_eq!(locks.active_keys(), 0);

        let held = locks.lock("tx_b").await;
        assert_eq!(locks.active_keys(), 1);
        drop(held);
        assert_eq!(locks.active_keys(), 0);
    }

    #[tokio::test]
    async fn entry_survives_while_a_waiter_is_queued() {
        let locks = Arc::new(KeyedLocks::new());
        let held = locks.lock("tx_a").await;

        let waiter = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.lock("tx_a").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(held);
        waiter.await.unwrap();
        assert_eq!(locks.active_keys(), 0);
    }

    #[tokio::test]
    async fn abandoned_wait_retires_its_entry() {
        let locks = KeyedLocks::new();
        let held = locks.lock("tx_a").await;
        let gave_up = tokio::time::timeout(Duration::from_millis(10), locks.lock("tx_a")).await;
        assert!(gave_up.is_err());
        assert_eq!(locks.active_keys(), 1);
        drop(held);
        assert_eq!(locks.active_keys(), 0);
    }
}
