//! Blocking hand-off channel with termination.
//!
//! [`Producer`] accepts items that are pushed into it. A pushed item is
//! either handed directly to a consumer that is already blocked in
//! [`consume`](Producer::consume), or stored in an internal queue for the
//! next consumer. [`end`](Producer::end) closes the channel: remaining
//! items drain to consumers in FIFO order, further pushes fail, and
//! consumers that would otherwise block return `None`.
//!
//! # Hand-off fairness
//!
//! Waiting consumers are served in registration order. A consumer that
//! registered before a push receives that item strictly before any
//! consumer that registers later; a push never overtakes a parked waiter
//! by leaving its item in the queue.
//!
//! # Internal coordination
//!
//! The push/registration race is serialized by an internal [`RwLock`]:
//! `push` and `end` take the write side, a consumer's registration takes
//! the read side, and the message and waiter queues themselves are
//! lock-free. Consumers park on a per-wait [`Condition`] outside the lock.

use parking_lot::Mutex;
use smallvec::SmallVec;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::sync::{Condition, Queue, RwLock};

/// A parked consumer. Filled in and triggered by `push` or `end` while the
/// write side of the channel lock is held.
struct WaitSlot<T> {
    ready: Condition,
    state: Mutex<SlotState<T>>,
}

struct SlotState<T> {
    success: bool,
    item: Option<T>,
}

impl<T> WaitSlot<T> {
    fn new() -> Self {
        Self {
            ready: Condition::new(),
            state: Mutex::new(SlotState {
                success: false,
                item: None,
            }),
        }
    }

    /// Pairs this waiter with the next queued item, if any remain.
    fn fill_from(&self, messages: &Queue<T>) {
        let mut state = self.state.lock();
        if let Some(item) = messages.try_pop() {
            state.item = Some(item);
            state.success = true;
        }
    }
}

/// A blocking producer/consumer channel with waiter-fair hand-off and
/// cooperative termination.
///
/// See the [module documentation](self) for the full contract.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use strand::channel::Producer;
///
/// let channel = Arc::new(Producer::new());
/// let consumer = {
///     let channel = Arc::clone(&channel);
///     std::thread::spawn(move || channel.consume())
/// };
///
/// assert!(channel.push(42));
/// assert_eq!(consumer.join().unwrap(), Some(42));
/// ```
pub struct Producer<T> {
    end_called: AtomicBool,
    gate: RwLock,
    messages: Queue<T>,
    waiters: Queue<Arc<WaitSlot<T>>>,
}

impl<T> Producer<T> {
    /// Creates an open, empty channel.
    #[must_use]
    pub fn new() -> Self {
        Self {
            end_called: AtomicBool::new(false),
            gate: RwLock::new(),
            messages: Queue::new(),
            waiters: Queue::new(),
        }
    }

    /// Pushes an item into the channel.
    ///
    /// If a consumer is blocked in [`consume`](Self::consume), the item is
    /// handed to the longest-waiting one; otherwise it is queued.
    ///
    /// Returns `false` without accepting the item if [`end`](Self::end)
    /// has been called.
    pub fn push(&self, item: T) -> bool {
        if self.end_called.load(Ordering::Acquire) {
            return false;
        }

        let _gate = self.gate.write();
        self.messages.push(item);

        if !self.messages.is_empty() {
            if let Some(slot) = self.waiters.try_pop() {
                slot.fill_from(&self.messages);
                slot.ready.trigger();
            }
        }
        true
    }

    /// Takes an item out of the channel, blocking until one is available
    /// or the channel has ended.
    ///
    /// Returns `None` only when `end` has been called and every item
    /// pushed before it has been consumed.
    #[must_use]
    pub fn consume(&self) -> Option<T> {
        self.get_message(false)
    }

    /// Takes an item out of the channel if one is immediately available.
    ///
    /// Never blocks; returns `None` when the queue is empty, whether or
    /// not the channel has ended.
    #[must_use]
    pub fn try_consume(&self) -> Option<T> {
        self.get_message(true)
    }

    /// Returns true if no items are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Marks the end of production. Idempotent.
    ///
    /// Pushes fail from this point on. Parked consumers are woken in
    /// registration order, each paired with a remaining queued item while
    /// any remain; the rest observe termination and return `None`.
    pub fn end(&self) {
        let woken = {
            let gate = self.gate.write();
            if self.end_called.swap(true, Ordering::AcqRel) {
                return;
            }
            tracing::debug!(queued = self.messages.len(), "producer channel ended");

            let mut woken: SmallVec<[Arc<WaitSlot<T>>; 4]> = SmallVec::new();
            while let Some(slot) = self.waiters.try_pop() {
                slot.fill_from(&self.messages);
                woken.push(slot);
            }
            drop(gate);
            woken
        };

        for slot in woken {
            slot.ready.trigger();
        }
    }

    fn get_message(&self, trying: bool) -> Option<T> {
        let slot = {
            let _gate = self.gate.read();

            if let Some(item) = self.messages.try_pop() {
                return Some(item);
            }
            if trying || self.end_called.load(Ordering::Acquire) {
                return None;
            }

            let slot = Arc::new(WaitSlot::new());
            self.waiters.push(Arc::clone(&slot));
            slot
        };

        slot.ready.wait();

        let mut state = slot.state.lock();
        if state.success {
            state.item.take()
        } else {
            None
        }
    }
}

impl<T> Default for Producer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for Producer<T> {
    fn drop(&mut self) {
        self.end();
    }
}

impl<T> fmt::Debug for Producer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer")
            .field("ended", &self.end_called.load(Ordering::Relaxed))
            .field("queued", &self.messages.len())
            .finish_non_exhaustive()
    }
}
