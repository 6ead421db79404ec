//! Worker-pool execution of thunks.
//!
//! [`Executor`] is the contract the scheduler runs on: submit a thunk to a
//! pool worker, or run a thunk on a dedicated OS thread for long-running
//! work that would otherwise starve the pool. No ordering is guaranteed
//! across `submit` calls and none may be relied on.
//!
//! [`ThreadPoolExecutor`] is the default implementation: a fixed set of
//! worker threads draining a shared queue. The process-wide instance
//! returned by [`default_executor`] is created on first use with one
//! worker per hardware thread and lives for the life of the process.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;

/// A unit of work: a nullary closure run for its side effects.
pub type Thunk = Box<dyn FnOnce() + Send + 'static>;

/// The execution substrate the scheduler dispatches onto.
pub trait Executor: Send + Sync {
    /// Schedules a thunk to run on a pool worker. Never blocks.
    fn submit(&self, thunk: Thunk);

    /// Runs a thunk on a dedicated OS thread, bypassing the worker pool.
    /// Never blocks. Intended for long-running or blocking work.
    fn run_on_thread(&self, thunk: Thunk);

    /// The number of hardware threads available to this executor.
    fn hardware_concurrency(&self) -> usize {
        hardware_concurrency()
    }
}

/// The number of hardware threads on this machine (at least 1).
#[must_use]
pub fn hardware_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1)
}

/// Returns the process-wide default executor, creating it on first use.
///
/// The default pool has one worker per hardware thread and is never torn
/// down.
#[must_use]
pub fn default_executor() -> Arc<dyn Executor> {
    static DEFAULT: OnceLock<Arc<ThreadPoolExecutor>> = OnceLock::new();
    Arc::clone(DEFAULT.get_or_init(|| Arc::new(ThreadPoolExecutor::new(0)))) as Arc<dyn Executor>
}

struct PoolShared {
    queue: Mutex<VecDeque<Thunk>>,
    work_ready: Condvar,
    shutdown: AtomicBool,
}

/// A fixed-size worker pool draining a shared FIFO of thunks.
///
/// Submitted thunks run in submission order on whichever worker frees up
/// first; a panicking thunk is caught and logged so it cannot take a
/// worker down. Dropping the executor finishes all queued work, then joins
/// the workers.
pub struct ThreadPoolExecutor {
    shared: Arc<PoolShared>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPoolExecutor {
    /// Creates a pool with `workers` threads (`0` means one per hardware
    /// thread).
    #[must_use]
    pub fn new(workers: usize) -> Self {
        let workers = if workers == 0 {
            hardware_concurrency()
        } else {
            workers
        };

        let shared = Arc::new(PoolShared {
            queue: Mutex::new(VecDeque::new()),
            work_ready: Condvar::new(),
            shutdown: AtomicBool::new(false),
        });

        let handles = (0..workers)
            .map(|index| {
                let shared = Arc::clone(&shared);
                std::thread::Builder::new()
                    .name(format!("strand-worker-{index}"))
                    .spawn(move || worker_loop(&shared))
                    .expect("failed to spawn pool worker thread")
            })
            .collect();

        Self {
            shared,
            workers: handles,
        }
    }

    /// The number of worker threads in this pool.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers.len()
    }
}

fn worker_loop(shared: &PoolShared) {
    loop {
        let thunk = {
            let mut queue = shared.queue.lock();
            loop {
                if let Some(thunk) = queue.pop_front() {
                    break Some(thunk);
                }
                if shared.shutdown.load(Ordering::Acquire) {
                    break None;
                }
                shared.work_ready.wait(&mut queue);
            }
        };

        let Some(thunk) = thunk else { return };
        run_guarded(thunk);
    }
}

/// Runs a thunk, containing any panic so the calling worker survives.
fn run_guarded(thunk: Thunk) {
    if catch_unwind(AssertUnwindSafe(thunk)).is_err() {
        tracing::error!("executor thunk panicked; worker continues");
    }
}

impl Executor for ThreadPoolExecutor {
    fn submit(&self, thunk: Thunk) {
        self.shared.queue.lock().push_back(thunk);
        self.shared.work_ready.notify_one();
    }

    fn run_on_thread(&self, thunk: Thunk) {
        std::thread::Builder::new()
            .name("strand-dedicated".to_owned())
            .spawn(move || run_guarded(thunk))
            .expect("failed to spawn dedicated thread");
    }
}

impl Drop for ThreadPoolExecutor {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        self.shared.work_ready.notify_all();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                tracing::error!("pool worker panicked during shutdown");
            }
        }
    }
}

impl fmt::Debug for ThreadPoolExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPoolExecutor")
            .field("workers", &self.workers.len())
            .field("queued", &self.shared.queue.lock().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn hardware_concurrency_is_positive() {
        assert!(hardware_concurrency() >= 1);
    }

    #[test]
    fn submit_runs_thunks() {
        let pool = ThreadPoolExecutor::new(2);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..16 {
            let counter = Arc::clone(&counter);
            pool.submit(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }

        drop(pool); // drains the queue before joining
        assert_eq!(counter.load(Ordering::SeqCst), 16);
    }

    #[test]
    fn run_on_thread_uses_a_fresh_thread() {
        let pool = ThreadPoolExecutor::new(1);
        let (tx, rx) = mpsc::channel();

        pool.run_on_thread(Box::new(move || {
            tx.send(std::thread::current().name().map(str::to_owned))
                .expect("receiver alive");
        }));

        let name = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("dedicated thunk ran");
        assert_eq!(name.as_deref(), Some("strand-dedicated"));
    }

    #[test]
    fn panicking_thunk_does_not_kill_the_worker() {
        let pool = ThreadPoolExecutor::new(1);
        let (tx, rx) = mpsc::channel();

        pool.submit(Box::new(|| panic!("boom")));
        pool.submit(Box::new(move || {
            tx.send(()).expect("receiver alive");
        }));

        rx.recv_timeout(Duration::from_secs(5))
            .expect("worker survived the panic");
    }

    #[test]
    fn zero_workers_defaults_to_hardware_concurrency() {
        let pool = ThreadPoolExecutor::new(0);
        assert_eq!(pool.workers(), hardware_concurrency());
    }
}
