//! Nullable execution handler with scripted behaviour.

use async_trait::async_trait;
use lumina_governance::{ExecutionHandler, HandlerError};
use lumina_types::ActionPayload;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Clone, Debug)]
pub enum HandlerMode {
    /// Return this value.
    Succeed(serde_json::Value),
    /// Return a handler error with this message.
    Fail(String),
    /// Sleep, then succeed with `{"slept_ms": ..}`.
    Delay(Duration),
    Panic,
}

/// Counts invocations and behaves according to its current [`HandlerMode`].
#[derive(Debug)]
pub struct NullHandler {
    mode: Mutex<HandlerMode>,
    calls: AtomicUsize,
}

impl NullHandler {
    pub fn new(mode: HandlerMode) -> Self {
        Self {
            mode: Mutex::new(mode),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(HandlerMode::Succeed(serde_json::json!({ "ok": true })))
    }

    pub fn set_mode(&self, mode: HandlerMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExecutionHandler for NullHandler {
    async fn execute(&self, _payload: &ActionPayload) -> Result<serde_json::Value, HandlerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mode = self.mode.lock().unwrap().clone();
        match mode {
            HandlerMode::Succeed(value) => Ok(value),
            HandlerMode::Fail(msg) => Err(HandlerError::new(msg)),
            HandlerMode::Delay(delay) => {
                tokio::time::sleep(delay).await;
                Ok(serde_json::json!({ "slept_ms": delay.as_millis() as u64 }))
            }
            HandlerMode::Panic => panic!("null handler scripted to panic"),
        }
    }
}
