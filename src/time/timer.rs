//! Periodic and one-shot timers.

use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

type Handler = Arc<dyn Fn() + Send + Sync + 'static>;

struct TimerState {
    handler: Option<Handler>,
    interval: Duration,
    repeat: bool,
    /// Bumped whenever the timer is re-armed, stopped, or cleared; a
    /// worker thread exits as soon as its generation is stale.
    generation: u64,
    armed: bool,
}

struct TimerInner {
    state: Mutex<TimerState>,
    cancel: Condvar,
}

/// Invokes a handler after an interval, once or repeatedly.
///
/// The handler runs on the timer's own thread. [`stop`](Timer::stop)
/// pauses the timer but keeps its configuration, so
/// [`restart`](Timer::restart) can re-arm it; [`clear`](Timer::clear)
/// drops handler and interval entirely. Dropping the timer clears it.
///
/// A stopped timer never fires again with its old arming: `stop` wins any
/// race with an interval that is just expiring, except when the handler
/// has already begun executing.
pub struct Timer {
    inner: Arc<TimerInner>,
}

impl Timer {
    /// Creates an unarmed timer with no handler.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TimerInner {
                state: Mutex::new(TimerState {
                    handler: None,
                    interval: Duration::ZERO,
                    repeat: false,
                    generation: 0,
                    armed: false,
                }),
                cancel: Condvar::new(),
            }),
        }
    }

    /// Arms the timer to invoke `handler` every `interval`, starting one
    /// `interval` from now. Replaces any previous configuration.
    pub fn start(&self, handler: impl Fn() + Send + Sync + 'static, interval: Duration) {
        self.configure(Some(Arc::new(handler)), interval, true);
    }

    /// Arms the timer to invoke `handler` once, one `interval` from now.
    /// Replaces any previous configuration.
    pub fn one_shot(&self, handler: impl Fn() + Send + Sync + 'static, interval: Duration) {
        self.configure(Some(Arc::new(handler)), interval, false);
    }

    /// Re-arms the timer with its existing handler, interval, and repeat
    /// mode.
    ///
    /// # Panics
    ///
    /// Panics if the timer has no handler (never armed, or cleared).
    pub fn restart(&self) {
        let state = self.inner.state.lock();
        assert!(
            state.handler.is_some(),
            "timer restarted without a handler"
        );
        let repeat = state.repeat;
        drop(state);
        self.configure(None, Duration::ZERO, repeat);
    }

    /// Stops the timer without discarding its configuration.
    pub fn stop(&self) {
        let mut state = self.inner.state.lock();
        state.generation += 1;
        state.armed = false;
        drop(state);
        self.inner.cancel.notify_all();
    }

    /// Stops the timer and drops its handler and interval.
    pub fn clear(&self) {
        let mut state = self.inner.state.lock();
        state.generation += 1;
        state.armed = false;
        state.handler = None;
        state.interval = Duration::ZERO;
        drop(state);
        self.inner.cancel.notify_all();
    }

    /// True while the timer is waiting to fire (or between repeats).
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.inner.state.lock().armed
    }

    /// Applies new configuration (any `None` field keeps its current
    /// value) and launches a worker for the new generation.
    fn configure(&self, handler: Option<Handler>, interval: Duration, repeat: bool) {
        let (generation, handler, interval) = {
            let mut state = self.inner.state.lock();
            state.generation += 1;
            if let Some(handler) = handler {
                state.handler = Some(handler);
                state.interval = interval;
            }
            state.repeat = repeat;
            state.armed = true;

            let handler = state
                .handler
                .clone()
                .expect("timer armed without a handler");
            (state.generation, handler, state.interval)
        };
        // Wake any previous worker so it can notice its stale generation.
        self.inner.cancel.notify_all();

        tracing::debug!(?interval, repeat, "timer armed");
        let inner = Arc::clone(&self.inner);
        std::thread::Builder::new()
            .name("strand-timer".to_owned())
            .spawn(move || timer_loop(&inner, generation, &handler, interval, repeat))
            .expect("failed to spawn timer thread");
    }
}

fn timer_loop(
    inner: &TimerInner,
    generation: u64,
    handler: &Handler,
    interval: Duration,
    repeat: bool,
) {
    loop {
        let deadline = Instant::now() + interval;
        {
            let mut state = inner.state.lock();
            while state.generation == generation {
                if inner.cancel.wait_until(&mut state, deadline).timed_out() {
                    break;
                }
            }
            if state.generation != generation || !state.armed {
                return;
            }
            if !repeat {
                state.armed = false;
            }
        }

        handler();

        if !repeat {
            return;
        }
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.clear();
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Timer")
            .field("armed", &state.armed)
            .field("interval", &state.interval)
            .field("repeat", &state.repeat)
            .finish_non_exhaustive()
    }
}
