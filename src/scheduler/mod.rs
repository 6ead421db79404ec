//! Multi-priority task dispatch onto an executor.
//!
//! A [`Scheduler`] owns a distinguished high-priority bucket plus one FIFO
//! bucket per normal priority level `0..=max_priority`. Enqueueing work
//! pushes a record into a bucket and submits one runner stub to the
//! [`Executor`]; the stub dequeues whatever record is most urgent at the
//! moment it runs. The executor never sees priorities, and no ordering is
//! required of it: per-enqueue stub submission keeps stubs and records in
//! one-to-one balance.
//!
//! # Dispatch order
//!
//! A runner drains the high-priority bucket first, then scans the normal
//! buckets from the highest priority number down to zero. Within a bucket,
//! records dispatch FIFO. Higher priorities preempt lower-priority
//! *dispatch* only; running work is never preempted.
//!
//! # Lifetime
//!
//! Every in-flight record holds a strong reference to the scheduler's
//! shared state, so dropping the last [`Scheduler`] handle while work is
//! queued is safe: the state lives until the last record has run.
//!
//! A process-wide default scheduler (one normal priority level, backed by
//! the default executor) is created on first use and lives for the life of
//! the process.

mod task;

pub use task::{RunState, Task};

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};

use crate::executor::{self, Executor, Thunk};
use crate::sync::Queue;

/// An enqueued unit of work. Consumed exactly once by a runner stub.
struct TaskRecord {
    thunk: Thunk,
    /// Back-pointer for releasing the scheduler hold after the run.
    parent: Option<Task>,
    /// Keeps the scheduler alive while this record is in flight.
    _scheduler: Arc<SchedulerInner>,
}

struct SchedulerInner {
    high_priority: Queue<TaskRecord>,
    /// One FIFO bucket per normal priority level, indexed by priority.
    buckets: Vec<Queue<TaskRecord>>,
    executor: Arc<dyn Executor>,
}

impl SchedulerInner {
    /// Runs one enqueued record: the high-priority bucket first, then the
    /// normal buckets scanned from the highest priority number downward.
    fn run_one(&self) {
        let record = self
            .high_priority
            .try_pop()
            .or_else(|| (0..self.buckets.len()).rev().find_map(|i| self.buckets[i].try_pop()));

        // One stub is submitted per record, so a record is always here;
        // tolerate the miss rather than trust the balance.
        let Some(record) = record else { return };

        let TaskRecord { thunk, parent, _scheduler } = record;
        let outcome = catch_unwind(AssertUnwindSafe(thunk));
        if let Some(task) = parent {
            task.scheduler_release();
        }
        if outcome.is_err() {
            tracing::error!("scheduled thunk panicked");
        }
    }
}

/// A handle to a multi-priority scheduler over a shared [`Executor`].
///
/// Cloning the handle shares the same buckets and executor. See the
/// [module documentation](self) for dispatch order and lifetime rules.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl Scheduler {
    /// Creates a scheduler with normal priority levels `0..=max_priority`
    /// over the process-default executor.
    #[must_use]
    pub fn new(max_priority: u32) -> Self {
        Self::with_executor(max_priority, executor::default_executor())
    }

    /// Creates a scheduler over a caller-supplied executor.
    #[must_use]
    pub fn with_executor(max_priority: u32, executor: Arc<dyn Executor>) -> Self {
        let buckets = (0..=max_priority).map(|_| Queue::new()).collect();
        Self {
            inner: Arc::new(SchedulerInner {
                high_priority: Queue::new(),
                buckets,
                executor,
            }),
        }
    }

    /// The process-wide default scheduler: a single normal priority level
    /// over the default executor.
    #[must_use]
    pub fn default_ref() -> &'static Scheduler {
        static DEFAULT: OnceLock<Scheduler> = OnceLock::new();
        DEFAULT.get_or_init(|| Scheduler::new(0))
    }

    /// Enqueues a thunk at the given priority.
    ///
    /// Negative priorities go to the high-priority bucket, which always
    /// dispatches first. Others are clamped to `0..=max_priority`.
    pub fn add(&self, thunk: impl FnOnce() + Send + 'static, priority: i32) {
        self.enqueue(
            TaskRecord {
                thunk: Box::new(thunk),
                parent: None,
                _scheduler: Arc::clone(&self.inner),
            },
            priority,
        );
    }

    /// Enqueues a task at the given priority.
    ///
    /// The task transitions to `Scheduled`; its [`Task::wait`] returns
    /// once the thunk has run and the hold taken here is released.
    ///
    /// # Panics
    ///
    /// Panics if the task is already scheduled or running, or has no
    /// thunk.
    pub fn add_task(&self, task: &Task, priority: i32) {
        task.scheduler_acquire();
        let runner = {
            let task = task.clone();
            move || task.do_run()
        };
        self.enqueue(
            TaskRecord {
                thunk: Box::new(runner),
                parent: Some(task.clone()),
                _scheduler: Arc::clone(&self.inner),
            },
            priority,
        );
    }

    /// Runs a task on the calling thread and joins it before returning.
    ///
    /// # Panics
    ///
    /// As for [`add_task`](Self::add_task).
    pub fn run_inline(&self, task: &Task) {
        task.scheduler_acquire();
        task.do_run();
        task.scheduler_release();
        task.wait();
    }

    /// Runs a task on a dedicated OS thread, bypassing the worker pool.
    ///
    /// For long-running or blocking tasks that would otherwise occupy a
    /// pool worker. Returns immediately; join with [`Task::wait`].
    ///
    /// # Panics
    ///
    /// As for [`add_task`](Self::add_task).
    pub fn run_as_thread(&self, task: &Task) {
        task.scheduler_acquire();
        let task = task.clone();
        self.inner.executor.run_on_thread(Box::new(move || {
            task.do_run();
            task.scheduler_release();
        }));
    }

    /// Enqueues a thunk on the default scheduler at priority 0.
    pub fn run_async(thunk: impl FnOnce() + Send + 'static) {
        Self::default_ref().add(thunk, 0);
    }

    /// Enqueues a task on the default scheduler at priority 0.
    pub fn run_async_task(task: &Task) {
        Self::default_ref().add_task(task, 0);
    }

    /// The highest normal priority level this scheduler dispatches.
    #[must_use]
    pub fn max_priority(&self) -> u32 {
        (self.inner.buckets.len() - 1) as u32
    }

    fn enqueue(&self, record: TaskRecord, priority: i32) {
        if priority < 0 {
            self.inner.high_priority.push(record);
        } else {
            let bucket = (priority as usize).min(self.inner.buckets.len() - 1);
            self.inner.buckets[bucket].push(record);
        }
        tracing::trace!(priority, "record enqueued");

        // One runner stub per record keeps dispatch balanced without the
        // executor knowing anything about priorities.
        let inner = Arc::clone(&self.inner);
        self.inner
            .executor
            .submit(Box::new(move || inner.run_one()));
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("max_priority", &self.max_priority())
            .field("high_priority_pending", &self.inner.high_priority.len())
            .finish_non_exhaustive()
    }
}
