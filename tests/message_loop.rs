//! Delivery order, fencing, and lifecycle behavior of the message loop.

use std::sync::Arc;

use parking_lot::Mutex;
use strand::message_loop::{MessageHandler, MessageLoop};
use strand::sync::Condition;

#[derive(Default)]
struct Journal {
    messages: Vec<u32>,
    initialized: usize,
    finalized: usize,
}

struct Recorder {
    journal: Arc<Mutex<Journal>>,
}

impl MessageHandler<u32> for Recorder {
    fn initialize(&mut self) {
        self.journal.lock().initialized += 1;
    }

    fn handle_message(&mut self, msg: u32) {
        self.journal.lock().messages.push(msg);
    }

    fn finalize(&mut self) {
        self.journal.lock().finalized += 1;
    }
}

fn recording_loop() -> (MessageLoop<u32, Recorder>, Arc<Mutex<Journal>>) {
    let journal = Arc::new(Mutex::new(Journal::default()));
    let message_loop = MessageLoop::new(Recorder {
        journal: Arc::clone(&journal),
    });
    (message_loop, journal)
}

/// After `fence()` returns, every message pushed before it has been
/// delivered, in push order.
#[test]
fn fence_observes_all_prior_messages() {
    let (message_loop, journal) = recording_loop();
    message_loop.start(false);

    for i in 1..=100 {
        message_loop.push(i);
    }
    message_loop.fence();

    assert_eq!(journal.lock().messages, (1..=100).collect::<Vec<_>>());
    message_loop.stop();
}

/// A fence on an idle loop completes rather than deadlocking.
#[test]
fn fence_on_idle_loop_returns() {
    let (message_loop, _journal) = recording_loop();
    message_loop.start(false);
    message_loop.fence();
    message_loop.stop();
}

/// Messages queued before `stop` are still delivered, and the lifecycle
/// hooks run exactly once per run, on the loop thread.
#[test]
fn stop_drains_queued_messages() {
    let (message_loop, journal) = recording_loop();
    message_loop.start(false);

    message_loop.push_all([1, 2, 3]);
    message_loop.stop();

    let journal = journal.lock();
    assert_eq!(journal.messages, vec![1, 2, 3]);
    assert_eq!(journal.initialized, 1);
    assert_eq!(journal.finalized, 1);
}

/// A stopped loop can be started again; each run gets its own
/// initialize/finalize pair.
#[test]
fn loop_restarts_after_stop() {
    let (message_loop, journal) = recording_loop();

    message_loop.start(false);
    message_loop.push(1);
    message_loop.stop();

    message_loop.start(false);
    message_loop.push(2);
    message_loop.stop();

    let journal = journal.lock();
    assert_eq!(journal.messages, vec![1, 2]);
    assert_eq!(journal.initialized, 2);
    assert_eq!(journal.finalized, 2);
}

/// The dedicated-thread path delivers identically to the pool path.
#[test]
fn dedicated_thread_loop_delivers_in_order() {
    let (message_loop, journal) = recording_loop();
    message_loop.start(true);

    for i in 0..50 {
        message_loop.push(i);
    }
    message_loop.fence();

    assert_eq!(journal.lock().messages, (0..50).collect::<Vec<_>>());
    message_loop.stop();
}

/// The non-blocking fence variant triggers its condition once the queue
/// ahead of it has drained.
#[test]
fn fence_with_external_condition() {
    let (message_loop, journal) = recording_loop();
    message_loop.start(false);

    message_loop.push_all(0..10);
    let signal = Arc::new(Condition::new());
    message_loop.fence_with(&signal);

    signal.wait();
    assert_eq!(journal.lock().messages, (0..10).collect::<Vec<_>>());
    message_loop.stop();
}

/// Fences respect queue position: messages pushed after a fence are not
/// observed by it.
#[test]
fn fence_does_not_wait_for_later_pushes() {
    let (message_loop, journal) = recording_loop();
    message_loop.start(false);

    message_loop.push_all(0..5);
    message_loop.fence();
    let seen_at_fence = journal.lock().messages.len();
    assert_eq!(seen_at_fence, 5);

    message_loop.push(99);
    message_loop.stop();
    assert_eq!(journal.lock().messages.last(), Some(&99));
}
