//! Recursive-aware read/write lock with writer-preference fairness.
//!
//! [`RwLock`] allows multiple readers or a single writer. Unlike the
//! standard library lock it does not protect a value; it protects a
//! critical section, and it tracks per-thread state so that recursive
//! acquisition is safe:
//!
//! | Thread already holds | Request read        | Request write          |
//! |----------------------|---------------------|------------------------|
//! | nothing              | acquires reader     | acquires writer        |
//! | a read guard         | no-op inner guard   | **panics** (deadlock)  |
//! | a write guard        | no-op inner guard   | no-op inner guard      |
//!
//! A "no-op inner guard" leaves ownership with the outermost guard; the
//! inner guard does nothing on drop. Guards must be dropped in reverse
//! order of acquisition on the thread that created them.
//!
//! # Writer preference
//!
//! When a writer is waiting, new read requests block until the writer has
//! acquired and released the lock. Existing readers run to completion.
//! This prevents writer starvation under heavy read load; readers can in
//! turn be starved by a continuous stream of writers.
//!
//! # Failure
//!
//! Requesting a write guard while the thread holds a read guard is a
//! caller logic error that would self-deadlock, so it fails fast with a
//! panic instead of blocking forever.

use parking_lot::{Condvar, Mutex};
use std::cell::RefCell;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

/// What a single thread currently holds on a single lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ThreadState {
    Read,
    Write,
}

thread_local! {
    /// Per-thread lock states, keyed by lock id. Absent means "holds
    /// nothing". Entries are removed when the outermost guard drops.
    static THREAD_STATES: RefCell<HashMap<u64, ThreadState>> = RefCell::new(HashMap::new());
}

static NEXT_LOCK_ID: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Default)]
struct LockState {
    readers: usize,
    writer_active: bool,
    writer_waiters: usize,
}

/// A recursive-aware read/write lock.
///
/// See the [module documentation](self) for the recursion rules and
/// fairness policy.
#[derive(Debug)]
pub struct RwLock {
    id: u64,
    state: Mutex<LockState>,
    readers_wake: Condvar,
    writers_wake: Condvar,
}

impl RwLock {
    /// Creates a new, unlocked lock.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: NEXT_LOCK_ID.fetch_add(1, Ordering::Relaxed),
            state: Mutex::new(LockState::default()),
            readers_wake: Condvar::new(),
            writers_wake: Condvar::new(),
        }
    }

    /// Acquires the lock for reading, blocking while a writer holds it or
    /// is waiting for it.
    ///
    /// If this thread already holds the lock (in either mode) the returned
    /// guard is a no-op sentinel and the call does not block.
    #[must_use]
    pub fn read(&self) -> ReadGuard<'_> {
        if self.current_thread_state().is_some() {
            return ReadGuard {
                lock: self,
                owned: false,
                _not_send: PhantomData,
            };
        }

        self.lock_shared();
        self.set_thread_state(ThreadState::Read);
        ReadGuard {
            lock: self,
            owned: true,
            _not_send: PhantomData,
        }
    }

    /// Acquires the lock for writing, blocking until it is exclusively
    /// held.
    ///
    /// If this thread already holds a write guard the returned guard is a
    /// no-op sentinel.
    ///
    /// # Panics
    ///
    /// Panics if this thread holds a read guard: granting the writer would
    /// deadlock on the thread's own reader.
    #[must_use]
    pub fn write(&self) -> WriteGuard<'_> {
        match self.current_thread_state() {
            Some(ThreadState::Write) => {
                return WriteGuard {
                    lock: self,
                    owned: false,
                    _not_send: PhantomData,
                };
            }
            Some(ThreadState::Read) => {
                panic!("write lock requested while this thread holds a read lock");
            }
            None => {}
        }

        self.lock_exclusive();
        self.set_thread_state(ThreadState::Write);
        WriteGuard {
            lock: self,
            owned: true,
            _not_send: PhantomData,
        }
    }

    /// Acquires the lock for reading without blocking.
    ///
    /// Returns `None` if a writer holds the lock or is waiting for it.
    /// Recursive acquisition succeeds with a no-op guard, as with
    /// [`read`](Self::read).
    #[must_use]
    pub fn try_read(&self) -> Option<ReadGuard<'_>> {
        if self.current_thread_state().is_some() {
            return Some(ReadGuard {
                lock: self,
                owned: false,
                _not_send: PhantomData,
            });
        }

        if !self.try_lock_shared() {
            return None;
        }
        self.set_thread_state(ThreadState::Read);
        Some(ReadGuard {
            lock: self,
            owned: true,
            _not_send: PhantomData,
        })
    }

    /// Acquires the lock for writing without blocking.
    ///
    /// Returns `None` if the lock is held by anyone, or if another writer
    /// is already queued.
    ///
    /// # Panics
    ///
    /// Panics if this thread holds a read guard, as with
    /// [`write`](Self::write).
    #[must_use]
    pub fn try_write(&self) -> Option<WriteGuard<'_>> {
        match self.current_thread_state() {
            Some(ThreadState::Write) => {
                return Some(WriteGuard {
                    lock: self,
                    owned: false,
                    _not_send: PhantomData,
                });
            }
            Some(ThreadState::Read) => {
                panic!("write lock requested while this thread holds a read lock");
            }
            None => {}
        }

        if !self.try_lock_exclusive() {
            return None;
        }
        self.set_thread_state(ThreadState::Write);
        Some(WriteGuard {
            lock: self,
            owned: true,
            _not_send: PhantomData,
        })
    }

    fn current_thread_state(&self) -> Option<ThreadState> {
        THREAD_STATES.with(|states| states.borrow().get(&self.id).copied())
    }

    fn set_thread_state(&self, state: ThreadState) {
        THREAD_STATES.with(|states| {
            states.borrow_mut().insert(self.id, state);
        });
    }

    fn clear_thread_state(&self) {
        THREAD_STATES.with(|states| {
            states.borrow_mut().remove(&self.id);
        });
    }

    fn lock_shared(&self) {
        let mut state = self.state.lock();
        while state.writer_active || state.writer_waiters > 0 {
            self.readers_wake.wait(&mut state);
        }
        state.readers += 1;
    }

    fn try_lock_shared(&self) -> bool {
        let mut state = self.state.lock();
        if state.writer_active || state.writer_waiters > 0 {
            return false;
        }
        state.readers += 1;
        true
    }

    fn lock_exclusive(&self) {
        let mut state = self.state.lock();
        state.writer_waiters += 1;
        while state.writer_active || state.readers > 0 {
            self.writers_wake.wait(&mut state);
        }
        state.writer_waiters -= 1;
        state.writer_active = true;
    }

    fn try_lock_exclusive(&self) -> bool {
        let mut state = self.state.lock();
        // Queued writers keep their place; try_write does not jump them.
        if state.writer_active || state.readers > 0 || state.writer_waiters > 0 {
            return false;
        }
        state.writer_active = true;
        true
    }

    fn unlock_shared(&self) {
        let wake_writer = {
            let mut state = self.state.lock();
            state.readers -= 1;
            state.readers == 0 && state.writer_waiters > 0
        };
        if wake_writer {
            self.writers_wake.notify_one();
        }
    }

    fn unlock_exclusive(&self) {
        let wake_writer = {
            let mut state = self.state.lock();
            state.writer_active = false;
            state.writer_waiters > 0
        };
        if wake_writer {
            self.writers_wake.notify_one();
        } else {
            self.readers_wake.notify_all();
        }
    }
}

impl Default for RwLock {
    fn default() -> Self {
        Self::new()
    }
}

/// Scoped read ownership of an [`RwLock`].
///
/// The outermost guard on a thread releases the lock when dropped; guards
/// produced by recursive acquisition do nothing. Guards cannot be sent to
/// another thread.
#[must_use = "the lock is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ReadGuard<'a> {
    lock: &'a RwLock,
    owned: bool,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        if self.owned {
            self.lock.clear_thread_state();
            self.lock.unlock_shared();
        }
    }
}

/// Scoped write ownership of an [`RwLock`].
///
/// The outermost guard on a thread releases the lock when dropped; guards
/// produced by recursive acquisition do nothing. Guards cannot be sent to
/// another thread.
#[must_use = "the lock is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct WriteGuard<'a> {
    lock: &'a RwLock,
    owned: bool,
    _not_send: PhantomData<*const ()>,
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        if self.owned {
            self.lock.clear_thread_state();
            self.lock.unlock_exclusive();
        }
    }
}
