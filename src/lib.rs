//! Composable concurrency primitives over an OS worker pool.
//!
//! Strand is a toolkit for building multithreaded applications out of a
//! small set of cooperating primitives:
//!
//! - [`sync::Queue`]: unbounded MPMC FIFO with non-blocking operations
//! - [`sync::Condition`]: one-shot, resettable event
//! - [`sync::RwLock`]: recursive-aware read/write lock with per-thread state
//! - [`channel::Producer`]: blocking hand-off channel with termination
//! - [`sync::ObjectPool`]: capacity-capped pool with scoped borrow handles
//! - [`scheduler::Scheduler`]: multi-priority task dispatch onto an executor
//! - [`message_loop::MessageLoop`]: single-consumer event pump
//! - [`time::Timer`]: periodic and one-shot callbacks
//!
//! Work runs on an [`executor::Executor`]: a worker pool plus a dedicated
//! thread path for long-running tasks. A process-wide default executor and
//! a default [`scheduler::Scheduler`] are created lazily and live for the
//! lifetime of the process.
//!
//! # Termination model
//!
//! Blocking operations have no timeouts and no cancellation. Termination is
//! cooperative: [`channel::Producer::end`] closes a channel and drains its
//! waiters, the scheduler drains outstanding work, and
//! [`message_loop::MessageLoop::stop`] finishes the in-flight queue before
//! joining.
//!
//! # Example
//!
//! ```
//! use strand::sync::ObjectPool;
//!
//! let pool = ObjectPool::new(|| Vec::<u8>::with_capacity(4096), 4);
//! let mut buf = pool.acquire();
//! buf.extend_from_slice(b"scratch");
//! drop(buf); // returned to the pool
//! ```

#![warn(missing_docs)]

pub mod channel;
pub mod executor;
pub mod message_loop;
pub mod scheduler;
pub mod sync;
pub mod time;

pub use channel::Producer;
pub use executor::{Executor, ThreadPoolExecutor, Thunk};
pub use message_loop::{MessageHandler, MessageLoop};
pub use scheduler::{RunState, Scheduler, Task};
pub use sync::{Condition, ObjectPool, PoolItem, Queue, ReadGuard, RwLock, WriteGuard};
pub use time::Timer;
