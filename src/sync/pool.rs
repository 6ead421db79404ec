//! Blocking, capacity-capped object pool with scoped borrow handles.
//!
//! [`ObjectPool`] lends out values of `T`, constructing them lazily up to
//! a hard cap. [`acquire`](ObjectPool::acquire) returns a [`PoolItem`]
//! handle that dereferences to the borrowed value and returns it to the
//! pool when dropped, after applying the pool's reinitializer.
//!
//! When the cap is reached, `acquire` blocks until another borrower
//! returns its value; returns are matched to blocked acquirers in FIFO
//! order through the pool's internal [`Producer`] channel, so no acquirer
//! is starved while borrowers keep returning items.
//!
//! # Capacity accounting
//!
//! A single atomic counter tracks every value in circulation, whether it
//! is resting in the pool or out on loan. The counter is the sole source
//! of truth for capacity and never exceeds the cap, so a returning
//! borrower can trust it when deciding whether its value still belongs in
//! the pool.
//!
//! # Example
//!
//! ```
//! use strand::sync::ObjectPool;
//!
//! let pool = ObjectPool::with_reinit(
//!     || Vec::<u8>::with_capacity(1024),
//!     |buf| buf.clear(),
//!     2,
//! );
//!
//! let mut scratch = pool.acquire();
//! scratch.extend_from_slice(b"payload");
//! drop(scratch); // cleared and pooled for the next borrower
//! ```

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicIsize, Ordering};
use std::sync::Arc;

use crate::channel::Producer;
use crate::executor;

type Constructor<T> = Box<dyn Fn() -> T + Send + Sync>;
type Reinit<T> = Box<dyn Fn(&mut T) + Send + Sync>;

struct PoolInner<T> {
    /// Items at rest, not out on loan.
    idle: Producer<T>,
    construct: Constructor<T>,
    reinit: Reinit<T>,
    max_size: usize,
    /// Items in circulation: idle plus on loan. Signed so a racing
    /// increment past the cap can be backed out without underflow games.
    circulating: AtomicIsize,
}

impl<T: Send> PoolInner<T> {
    fn take_blocking(&self) -> T {
        if let Some(item) = self.idle.try_consume() {
            return item;
        }

        if self.try_reserve_growth() {
            return (self.construct)();
        }

        self.idle
            .consume()
            .expect("pool channel never ends while the pool is alive")
    }

    fn take_now(&self) -> Option<T> {
        if let Some(item) = self.idle.try_consume() {
            return Some(item);
        }
        if self.try_reserve_growth() {
            return Some((self.construct)());
        }
        None
    }

    /// Claims a slot for a freshly constructed item. On success the
    /// circulating count already includes the item about to be built; the
    /// count never overshoots the cap, even transiently.
    fn try_reserve_growth(&self) -> bool {
        let mut current = self.circulating.load(Ordering::Relaxed);
        loop {
            if current >= self.max_size as isize {
                return false;
            }
            match self.circulating.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    tracing::debug!(
                        circulating = current + 1,
                        max = self.max_size,
                        "pool grew"
                    );
                    return true;
                }
                Err(actual) => current = actual,
            }
        }
    }

    fn give_back(&self, mut item: T) {
        if self.circulating.load(Ordering::Acquire) <= self.max_size as isize {
            (self.reinit)(&mut item);
            let accepted = self.idle.push(item);
            debug_assert!(accepted, "pool channel ended with the pool alive");
        } else {
            // The pool shrank while this item was on loan; retire it.
            self.circulating.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

/// A lazily populated pool of reusable values with a hard capacity cap.
///
/// Configuration is fixed at construction: a constructor for new values,
/// an optional reinitializer applied when a value returns to the pool, and
/// the maximum number of values in circulation (`0` means the hardware
/// concurrency of the machine).
///
/// See the [module documentation](self) for the capacity contract.
pub struct ObjectPool<T: Send> {
    inner: Arc<PoolInner<T>>,
}

impl<T: Send> ObjectPool<T> {
    /// Creates a pool whose values are built by `construct` and returned
    /// to the pool unchanged.
    #[must_use]
    pub fn new(construct: impl Fn() -> T + Send + Sync + 'static, max_size: usize) -> Self {
        Self::with_reinit(construct, |_| {}, max_size)
    }

    /// Creates a pool with a reinitializer that runs on every value as it
    /// returns to the pool.
    #[must_use]
    pub fn with_reinit(
        construct: impl Fn() -> T + Send + Sync + 'static,
        reinit: impl Fn(&mut T) + Send + Sync + 'static,
        max_size: usize,
    ) -> Self {
        let max_size = if max_size == 0 {
            executor::hardware_concurrency()
        } else {
            max_size
        };

        Self {
            inner: Arc::new(PoolInner {
                idle: Producer::new(),
                construct: Box::new(construct),
                reinit: Box::new(reinit),
                max_size,
                circulating: AtomicIsize::new(0),
            }),
        }
    }

    /// Borrows a value from the pool, blocking if the pool is saturated.
    ///
    /// Resolution order: an idle pooled value, then a freshly constructed
    /// one while under the cap, then a blocking wait for the next return.
    #[must_use]
    pub fn acquire(&self) -> PoolItem<T> {
        PoolItem {
            item: Some(self.inner.take_blocking()),
            pool: Arc::clone(&self.inner),
        }
    }

    /// Borrows a value without blocking.
    ///
    /// Returns `None` when the pool is empty and already at capacity.
    #[must_use]
    pub fn try_acquire(&self) -> Option<PoolItem<T>> {
        let item = self.inner.take_now()?;
        Some(PoolItem {
            item: Some(item),
            pool: Arc::clone(&self.inner),
        })
    }

    /// The maximum number of values this pool will keep in circulation.
    #[must_use]
    pub fn max_size(&self) -> usize {
        self.inner.max_size
    }

    /// The number of values currently in circulation (idle or on loan).
    #[must_use]
    pub fn circulating(&self) -> usize {
        self.inner.circulating.load(Ordering::Acquire).max(0) as usize
    }
}

impl<T: Send> fmt::Debug for ObjectPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectPool")
            .field("max_size", &self.inner.max_size)
            .field("circulating", &self.circulating())
            .finish_non_exhaustive()
    }
}

/// A scoped borrow of a pooled value.
///
/// Dereferences to the borrowed `T`. Dropping the handle returns the value
/// to its pool (applying the reinitializer) and never blocks; creation via
/// [`ObjectPool::acquire`] is the only point that may block. The handle
/// keeps the pool's shared state alive, so it may outlive the
/// [`ObjectPool`] it came from.
///
/// # Panics
///
/// Dereferencing after [`free`](Self::free) panics.
pub struct PoolItem<T: Send> {
    item: Option<T>,
    pool: Arc<PoolInner<T>>,
}

impl<T: Send> PoolItem<T> {
    /// Returns the value to the pool now instead of at drop.
    ///
    /// After this call the handle is empty and must not be dereferenced.
    /// Calling `free` again is a no-op.
    pub fn free(&mut self) {
        if let Some(item) = self.item.take() {
            self.pool.give_back(item);
        }
    }
}

impl<T: Send> Deref for PoolItem<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.item
            .as_ref()
            .expect("pool item accessed after free()")
    }
}

impl<T: Send> DerefMut for PoolItem<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.item
            .as_mut()
            .expect("pool item accessed after free()")
    }
}

impl<T: Send> Drop for PoolItem<T> {
    fn drop(&mut self) {
        self.free();
    }
}

impl<T: Send + fmt::Debug> fmt::Debug for PoolItem<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PoolItem").field(&self.item).finish()
    }
}
