//! Shared helpers for the integration suites.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

use strand::executor::{Executor, Thunk};

/// A step-driven executor for deterministic scheduler tests.
///
/// `submit` only records the thunk; nothing runs until the test calls
/// [`run_next`](Self::run_next) or [`run_all`](Self::run_all), so a test
/// can enqueue a whole workload before the first dispatch happens.
#[derive(Default)]
pub struct ManualExecutor {
    pending: Mutex<VecDeque<Thunk>>,
}

impl ManualExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Runs the oldest submitted thunk on the calling thread.
    pub fn run_next(&self) -> bool {
        let thunk = self.pending.lock().pop_front();
        match thunk {
            Some(thunk) => {
                thunk();
                true
            }
            None => false,
        }
    }

    /// Runs submitted thunks (including ones they submit) until none
    /// remain.
    pub fn run_all(&self) {
        while self.run_next() {}
    }

    /// The number of submitted thunks that have not run yet.
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }
}

impl Executor for ManualExecutor {
    fn submit(&self, thunk: Thunk) {
        self.pending.lock().push_back(thunk);
    }

    fn run_on_thread(&self, thunk: Thunk) {
        std::thread::spawn(move || thunk());
    }

    fn hardware_concurrency(&self) -> usize {
        1
    }
}
