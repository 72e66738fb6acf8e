//! Explicit abort signalling
//!
//! Operator stops are carried by an explicit handle threaded into whatever
//! needs to consult one: the step runner when classifying exhausted retries,
//! the session between steps, and the aggregator at finalization. No
//! process-wide state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Cooperative abort flag shared between the harness and a supervisor.
///
/// Raising the signal does not preempt an in-flight browser call; the call
/// either completes or surfaces its own rejection when the browser goes away.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    inner: Arc<AbortInner>,
}

#[derive(Debug, Default)]
struct AbortInner {
    aborted: AtomicBool,
    reason: Mutex<Option<String>>,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flag the run as manually aborted.
    pub fn raise(&self, reason: impl Into<String>) {
        let mut guard = self.inner.reason.lock().unwrap_or_else(|e| e.into_inner());
        if guard.is_none() {
            *guard = Some(reason.into());
        }
        self.inner.aborted.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.inner.aborted.load(Ordering::SeqCst)
    }

    /// The first recorded reason, if any.
    pub fn reason(&self) -> Option<String> {
        self.inner
            .reason
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}
