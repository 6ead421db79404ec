//! Synchronization primitives.
//!
//! This module provides the building blocks the rest of the crate is
//! assembled from:
//!
//! - [`Queue`]: unbounded MPMC FIFO with non-blocking `push`/`try_pop`
//! - [`Condition`]: one-shot, resettable event
//! - [`RwLock`]: recursive-aware read/write lock with scoped guards
//! - [`ObjectPool`]: blocking, capacity-capped pool of reusable values
//!
//! Blocking behavior is always layered on top of the non-blocking [`Queue`]
//! rather than built into it: waiter lists, priority buckets, and channel
//! storage are all plain queues coordinated by [`Condition`] and [`RwLock`].

mod condition;
mod pool;
mod queue;
mod rwlock;

pub use condition::Condition;
pub use pool::{ObjectPool, PoolItem};
pub use queue::Queue;
pub use rwlock::{ReadGuard, RwLock, WriteGuard};
