//! Units of work with a joinable lifecycle.

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::executor::Thunk;
use crate::sync::Condition;

/// Where a [`Task`] is in its lifecycle.
///
/// A task moves `Idle → Scheduled → Running → Done` for each schedule; it
/// runs exactly once per schedule. `Done` tasks can be re-armed with
/// [`Task::set_thunk`] and scheduled again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Holds a thunk, not yet handed to a scheduler.
    Idle,
    /// Enqueued; a runner will pick it up.
    Scheduled,
    /// The thunk is executing on some thread.
    Running,
    /// The thunk has returned and every scheduler hold is released.
    Done,
}

pub(crate) struct TaskInner {
    state: Mutex<RunState>,
    /// Outstanding scheduler holds. The task does not transition to
    /// `Done` (and `wait` does not return) until the last hold drops.
    holds: AtomicUsize,
    thunk: Mutex<Option<Thunk>>,
    done: Condition,
}

/// A schedulable unit of work with a joinable completion event.
///
/// Cloning a `Task` clones the handle, not the work: all clones observe
/// the same lifecycle. This is what lets a scheduler hold a back-pointer
/// to the task while the caller keeps a handle to [`wait`](Self::wait) on.
///
/// # Failure
///
/// Scheduling a task that is already `Scheduled` or `Running`, and
/// scheduling one whose thunk has already been consumed, are caller logic
/// errors and panic.
#[derive(Clone)]
pub struct Task {
    inner: Arc<TaskInner>,
}

impl Task {
    /// Creates an idle task that will run `thunk` when scheduled.
    #[must_use]
    pub fn new(thunk: impl FnOnce() + Send + 'static) -> Self {
        Self {
            inner: Arc::new(TaskInner {
                state: Mutex::new(RunState::Idle),
                holds: AtomicUsize::new(0),
                thunk: Mutex::new(Some(Box::new(thunk))),
                done: Condition::new(),
            }),
        }
    }

    /// Replaces the task's thunk and re-arms it for another schedule.
    ///
    /// # Panics
    ///
    /// Panics if the task is currently scheduled or running.
    pub fn set_thunk(&self, thunk: impl FnOnce() + Send + 'static) {
        let mut state = self.inner.state.lock();
        match *state {
            RunState::Scheduled | RunState::Running => {
                panic!("task thunk replaced while the task is scheduled or running");
            }
            RunState::Idle | RunState::Done => {}
        }
        *self.inner.thunk.lock() = Some(Box::new(thunk));
        *state = RunState::Idle;
        self.inner.done.reset();
    }

    /// The task's current lifecycle state.
    #[must_use]
    pub fn state(&self) -> RunState {
        *self.inner.state.lock()
    }

    /// True while the task is scheduled or executing.
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self.state(), RunState::Scheduled | RunState::Running)
    }

    /// Blocks until the task's thunk has returned and the scheduler has
    /// released its hold.
    ///
    /// A task that is never scheduled never completes; `wait` on it blocks
    /// indefinitely.
    pub fn wait(&self) {
        self.inner.done.wait();
    }

    /// Takes a scheduler hold, transitioning the task to `Scheduled`.
    ///
    /// Every acquire is paired with exactly one
    /// [`scheduler_release`](Self::scheduler_release) by whichever party
    /// completes the run.
    pub(crate) fn scheduler_acquire(&self) {
        let mut state = self.inner.state.lock();
        match *state {
            RunState::Running => panic!("task re-enqueued while running"),
            RunState::Scheduled => panic!("task is already scheduled"),
            RunState::Idle | RunState::Done => {}
        }
        assert!(
            self.inner.thunk.lock().is_some(),
            "task has no thunk; call set_thunk before rescheduling"
        );
        self.inner.done.reset();
        *state = RunState::Scheduled;
        self.inner.holds.fetch_add(1, Ordering::AcqRel);
    }

    /// Runs the thunk on the calling thread. Called exactly once per
    /// schedule, by the runner that dequeued the task's record.
    pub(crate) fn do_run(&self) {
        {
            let mut state = self.inner.state.lock();
            debug_assert_eq!(*state, RunState::Scheduled);
            *state = RunState::Running;
        }

        let thunk = self
            .inner
            .thunk
            .lock()
            .take()
            .expect("scheduled task holds a thunk");
        thunk();
    }

    /// Drops one scheduler hold. The last hold transitions the task to
    /// `Done` and releases waiters.
    pub(crate) fn scheduler_release(&self) {
        if self.inner.holds.fetch_sub(1, Ordering::AcqRel) == 1 {
            *self.inner.state.lock() = RunState::Done;
            self.inner.done.trigger();
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("state", &self.state())
            .field("holds", &self.inner.holds.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
