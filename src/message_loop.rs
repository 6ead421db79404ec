//! Single-consumer event pump driven by a scheduler task.
//!
//! A [`MessageLoop`] owns a queue of messages and one [`Task`] that drains
//! it. Producers on any thread [`push`](MessageLoop::push) messages; the
//! loop delivers them, strictly in FIFO order, to a [`MessageHandler`] on
//! the loop's thread. [`fence`](MessageLoop::fence) inserts a barrier:
//! it returns once every message pushed before it has been delivered.
//!
//! [`stop`](MessageLoop::stop) is cooperative: it clears the continue
//! flag, wakes the loop, and joins. Messages already queued when `stop` is
//! called are still delivered before the loop finishes.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::scheduler::{Scheduler, Task};
use crate::sync::{Condition, Queue};

/// Receives the messages a [`MessageLoop`] delivers.
///
/// All three methods run on the loop's thread: `initialize` before the
/// first message of a run, `finalize` after the last.
pub trait MessageHandler<M>: Send {
    /// Called once when the loop starts, before any message.
    fn initialize(&mut self) {}

    /// Called for each message, in push order.
    fn handle_message(&mut self, msg: M);

    /// Called once when the loop finishes, after the final message.
    fn finalize(&mut self) {}
}

enum Entry<M> {
    Message(M),
    Fence(Arc<Condition>),
}

struct LoopShared<M, H> {
    queue: Queue<Entry<M>>,
    wake: Condition,
    keep_running: AtomicBool,
    /// Only the loop thread locks this for more than a moment; it holds
    /// the handler for the duration of a run.
    handler: Mutex<H>,
}

impl<M, H: MessageHandler<M>> LoopShared<M, H> {
    fn run(&self) {
        let mut handler = self.handler.lock();
        handler.initialize();

        while !self.queue.is_empty() || self.keep_running.load(Ordering::Acquire) {
            self.wake.wait();
            self.wake.reset();

            while let Some(entry) = self.queue.try_pop() {
                match entry {
                    Entry::Message(msg) => handler.handle_message(msg),
                    Entry::Fence(signal) => signal.trigger(),
                }
            }
        }

        handler.finalize();
    }
}

/// A single-consumer message pump bound to one scheduler task.
///
/// See the [module documentation](self) for the delivery and shutdown
/// contract.
///
/// # Example
///
/// ```
/// use strand::message_loop::{MessageHandler, MessageLoop};
///
/// struct Sum(u64);
///
/// impl MessageHandler<u64> for Sum {
///     fn handle_message(&mut self, msg: u64) {
///         self.0 += msg;
///     }
/// }
///
/// let message_loop = MessageLoop::new(Sum(0));
/// message_loop.start(false);
/// message_loop.push_all(1..=10);
/// message_loop.fence(); // all ten delivered
/// message_loop.stop();
/// ```
pub struct MessageLoop<M, H>
where
    M: Send + 'static,
    H: MessageHandler<M> + 'static,
{
    shared: Arc<LoopShared<M, H>>,
    pump: Task,
}

impl<M, H> MessageLoop<M, H>
where
    M: Send + 'static,
    H: MessageHandler<M> + 'static,
{
    /// Creates a stopped loop around `handler`. Call
    /// [`start`](Self::start) to begin delivery.
    #[must_use]
    pub fn new(handler: H) -> Self {
        Self {
            shared: Arc::new(LoopShared {
                queue: Queue::new(),
                wake: Condition::new(),
                keep_running: AtomicBool::new(false),
                handler: Mutex::new(handler),
            }),
            pump: Task::new(|| {}),
        }
    }

    /// Launches the loop's task. A no-op if the loop is already running.
    ///
    /// With `run_as_thread` the loop occupies a dedicated OS thread
    /// instead of a pool worker; use it for loops that live a long time
    /// or block in their handler.
    pub fn start(&self, run_as_thread: bool) {
        if self.pump.is_running() {
            return;
        }

        tracing::debug!(dedicated_thread = run_as_thread, "message loop starting");
        self.shared.keep_running.store(true, Ordering::Release);
        let shared = Arc::clone(&self.shared);
        self.pump.set_thunk(move || shared.run());

        if run_as_thread {
            Scheduler::default_ref().run_as_thread(&self.pump);
        } else {
            Scheduler::run_async_task(&self.pump);
        }
    }

    /// Stops the loop and joins its task. A no-op if not running.
    ///
    /// Messages queued before the loop observes the stop are still
    /// delivered. Must not be called from the handler itself.
    pub fn stop(&self) {
        if !self.pump.is_running() {
            return;
        }

        tracing::debug!("message loop stopping");
        self.shared.keep_running.store(false, Ordering::Release);
        self.shared.wake.trigger();
        self.pump.wait();
    }

    /// Enqueues a message for delivery.
    pub fn push(&self, msg: M) {
        self.shared.queue.push(Entry::Message(msg));
        self.shared.wake.trigger();
    }

    /// Enqueues a batch of messages, waking the loop once at the end.
    pub fn push_all(&self, msgs: impl IntoIterator<Item = M>) {
        for msg in msgs {
            self.shared.queue.push(Entry::Message(msg));
        }
        self.shared.wake.trigger();
    }

    /// Blocks until every message pushed before this call has been
    /// delivered.
    pub fn fence(&self) {
        let signal = Arc::new(Condition::new());
        self.shared.queue.push(Entry::Fence(Arc::clone(&signal)));
        self.shared.wake.trigger();
        signal.wait();
    }

    /// Non-blocking fence: `signal` is reset now and triggered when the
    /// loop reaches this point in the queue.
    pub fn fence_with(&self, signal: &Arc<Condition>) {
        signal.reset();
        self.shared.queue.push(Entry::Fence(Arc::clone(signal)));
        self.shared.wake.trigger();
    }
}

impl<M, H> Drop for MessageLoop<M, H>
where
    M: Send + 'static,
    H: MessageHandler<M> + 'static,
{
    fn drop(&mut self) {
        self.stop();
    }
}
