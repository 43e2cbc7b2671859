//! Single-consumer wake primitive with a terminal "broken" state.
//!
//! Built on [`tokio::sync::Notify`] rather than a condition variable, since
//! this crate runs on tokio's ordinary multi-threaded runtime rather than a
//! single-shard executor. `signal`/`wait` are safe to call from any task.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// Outcome of a [`WakeSignal::wait`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The predicate became true.
    Signaled,
    /// The signal was broken (shutdown in progress); the caller should
    /// treat this as a request to exit.
    Broken,
}

/// A re-armable wake signal with a terminal broken state.
///
/// `wait` re-checks its predicate under the caller-supplied closure after
/// every `notified()` resolution, so callers typically close over the same
/// mutex that guards the state the predicate inspects.
#[derive(Debug, Default)]
pub struct WakeSignal {
    notify: Notify,
    broken: AtomicBool,
}

impl WakeSignal {
    pub fn new() -> Self {
        Self {
            notify: Notify::new(),
            broken: AtomicBool::new(false),
        }
    }

    /// Suspends until `predicate()` returns true or the signal is broken.
    ///
    /// The predicate is checked once before suspending (in case the
    /// condition is already true) and again after every wakeup, since
    /// `Notify` wakeups are not guaranteed to correspond 1:1 with `signal`
    /// calls.
    pub async fn wait(&self, mut predicate: impl FnMut() -> bool) -> WaitOutcome {
        loop {
            if self.broken.load(Ordering::Acquire) {
                return WaitOutcome::Broken;
            }
            if predicate() {
                return WaitOutcome::Signaled;
            }
            // Register for notification before re-checking, to avoid
            // missing a signal that arrives between the predicate check
            // and the await below (Notify buffers one permit).
            let notified = self.notify.notified();
            if self.broken.load(Ordering::Acquire) {
                return WaitOutcome::Broken;
            }
            if predicate() {
                return WaitOutcome::Signaled;
            }
            notified.await;
        }
    }

    /// Wakes a waiter. Idempotent: calling this with no waiter parked simply
    /// arms one permit for the next `wait`.
    pub fn signal(&self) {
        self.notify.notify_one();
    }

    /// Terminally breaks the signal. All current and future `wait` calls
    /// return `WaitOutcome::Broken`.
    pub fn brk(&self) {
        self.broken.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_broken(&self) -> bool {
        self.broken.load(Ordering::Acquire)
    }
}
