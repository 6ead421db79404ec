//! Unbounded MPMC FIFO queue.
//!
//! [`Queue`] is the substrate the rest of the crate builds on: waiter
//! lists, scheduler priority buckets, and channel storage are all queues.
//! Operations never block; blocking behavior is layered on top by the
//! callers that need it.
//!
//! Ordering: items pushed from a single thread are popped in push order.
//! The relative order of items pushed from different threads is
//! unspecified.

use crossbeam_queue::SegQueue;

/// An unbounded multi-producer, multi-consumer FIFO queue.
///
/// `push` and `try_pop` are lock-free and may be called from any number of
/// threads concurrently. Elements only need to be movable.
#[derive(Debug)]
pub struct Queue<T> {
    inner: SegQueue<T>,
}

impl<T> Queue<T> {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: SegQueue::new(),
        }
    }

    /// Pushes an item onto the back of the queue.
    pub fn push(&self, item: T) {
        self.inner.push(item);
    }

    /// Pops the item at the front of the queue, if there is one.
    #[must_use]
    pub fn try_pop(&self) -> Option<T> {
        self.inner.pop()
    }

    /// Returns true if the queue has no items.
    ///
    /// The answer is a snapshot; concurrent pushes and pops may have
    /// changed it by the time the caller acts on it.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns the number of items currently in the queue.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}
