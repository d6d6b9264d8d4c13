//! Keyed trailing-edge debouncing.
//!
//! Converts a high-frequency stream of "change X to value V" intents into
//! one callback invocation per quiet period, coalesced per key. This is the
//! only place timing logic lives; the store never starts timers directly, so
//! the debounce policy is swappable and testable in isolation.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::trace;

/// A pending timer for one key.
///
/// The generation distinguishes this timer from any later one scheduled for
/// the same key: a timer only fires if it still owns the map entry when it
/// wakes, so superseded and cancelled timers are inert even if their abort
/// signal races the wakeup.
struct PendingTimer {
    generation: u64,
    abort: AbortHandle,
}

/// Trailing-edge debouncer with per-key coalescing.
///
/// Rescheduling a key cancels its pending timer and starts a new one with
/// the latest payload; only the last payload within a quiet window is ever
/// delivered. This is a debounce, not a fixed-rate throttle.
pub struct Debouncer<K> {
    timers: Arc<Mutex<HashMap<K, PendingTimer>>>,
    generation: AtomicU64,
}

impl<K> Debouncer<K>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    /// Create a debouncer with no pending timers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            timers: Arc::new(Mutex::new(HashMap::new())),
            generation: AtomicU64::new(0),
        }
    }

    /// Schedule `callback(payload)` to run after `delay` of quiet time for
    /// `key`.
    ///
    /// If a timer for `key` is already pending, it is invalidated and the
    /// window restarts with the new payload. Once a timer has fired and
    /// claimed its entry, the callback runs to completion; cancellation can
    /// no longer reach it.
    pub fn schedule<P, F, Fut>(&self, key: K, payload: P, delay: Duration, callback: F)
    where
        P: Send + 'static,
        F: FnOnce(P) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let timers = Arc::clone(&self.timers);
        let task_key = key.clone();
        // Anchor the quiet window here, not at the task's first poll, so the
        // deadline is exact no matter when the runtime gets to the task.
        let deadline = Instant::now() + delay;

        // Hold the map lock across spawn + insert so the new task cannot
        // observe the map before its own entry is present.
        let mut guard = self.timers.lock().expect("debounce timer map poisoned");

        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            {
                let mut timers = timers.lock().expect("debounce timer map poisoned");
                match timers.get(&task_key) {
                    // Still the live timer for this key: claim the entry.
                    Some(pending) if pending.generation == generation => {
                        timers.remove(&task_key);
                    }
                    // Superseded by a newer schedule, or cancelled.
                    _ => return,
                }
            }
            callback(payload).await;
        });

        if let Some(previous) = guard.insert(
            key,
            PendingTimer {
                generation,
                abort: handle.abort_handle(),
            },
        ) {
            trace!(generation, "superseding pending debounce timer");
            previous.abort.abort();
        }
    }

    /// Invalidate any pending timer for `key` without invoking its callback.
    ///
    /// Returns true if a timer was pending. Does not touch a callback that
    /// has already claimed its entry and started running.
    pub fn cancel(&self, key: &K) -> bool {
        let removed = self
            .timers
            .lock()
            .expect("debounce timer map poisoned")
            .remove(key);
        if let Some(pending) = removed {
            pending.abort.abort();
            true
        } else {
            false
        }
    }

    /// Invalidate every pending timer.
    pub fn cancel_all(&self) {
        let mut timers = self.timers.lock().expect("debounce timer map poisoned");
        for (_, pending) in timers.drain() {
            pending.abort.abort();
        }
    }

    /// True if a timer is pending for `key`.
    #[must_use]
    pub fn is_pending(&self, key: &K) -> bool {
        self.timers
            .lock()
            .expect("debounce timer map poisoned")
            .contains_key(key)
    }
}

impl<K> Default for Debouncer<K>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
