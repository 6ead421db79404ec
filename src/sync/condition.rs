//! One-shot, resettable event.

use parking_lot::{Condvar, Mutex};

/// A one-shot event that threads can wait on.
///
/// A `Condition` starts untriggered. [`wait`](Self::wait) blocks until
/// [`trigger`](Self::trigger) fires; once triggered, the current waiters
/// and every future `wait` call return immediately until
/// [`reset`](Self::reset) re-arms the event.
///
/// The trigger is sticky by design: components that hand a `Condition` to
/// another thread (channel wait records, message loop wakeups, fences) must
/// not lose a trigger that lands before the waiter reaches `wait`. Callers
/// are responsible for serializing `reset` against `trigger`; this type
/// does not arbitrate between them.
#[derive(Debug, Default)]
pub struct Condition {
    triggered: Mutex<bool>,
    signal: Condvar,
}

impl Condition {
    /// Creates a new, untriggered condition.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until the condition is triggered.
    ///
    /// Returns immediately if the condition is already triggered.
    pub fn wait(&self) {
        let mut triggered = self.triggered.lock();
        while !*triggered {
            self.signal.wait(&mut triggered);
        }
    }

    /// Triggers the condition, releasing all current and future waiters.
    pub fn trigger(&self) {
        let mut triggered = self.triggered.lock();
        *triggered = true;
        drop(triggered);
        self.signal.notify_all();
    }

    /// Re-arms the condition so subsequent `wait` calls block again.
    pub fn reset(&self) {
        *self.triggered.lock() = false;
    }

    /// Returns true if the condition is currently triggered.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.triggered.lock()
    }
}
