//! Cross-thread behavior of the producer/consumer channel: hand-off,
//! termination, and FIFO exactly-once delivery.

use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

use strand::channel::Producer;

/// A blocked consumer receives a pushed item directly; nothing is left in
/// the queue afterwards.
#[test]
fn handoff_to_blocked_consumer() {
    let channel = Arc::new(Producer::new());

    let consumer = {
        let channel = Arc::clone(&channel);
        std::thread::spawn(move || channel.consume())
    };

    // Let the consumer park before the push arrives.
    std::thread::sleep(Duration::from_millis(30));
    assert!(channel.push(42));

    assert_eq!(consumer.join().expect("consumer panicked"), Some(42));
    assert!(channel.is_empty());
    assert_eq!(channel.try_consume(), None);
}

/// Ending the channel releases a blocked consumer empty-handed, and
/// rejects later pushes.
#[test]
fn end_releases_blocked_consumer() {
    let channel: Arc<Producer<u32>> = Arc::new(Producer::new());

    let consumer = {
        let channel = Arc::clone(&channel);
        std::thread::spawn(move || channel.consume())
    };

    std::thread::sleep(Duration::from_millis(30));
    channel.end();

    assert_eq!(consumer.join().expect("consumer panicked"), None);
    assert!(!channel.push(1));
}

/// Waiters registered earlier are served earlier: with two parked
/// consumers, two pushes unblock both, and each item goes to exactly one.
#[test]
fn each_item_is_delivered_exactly_once() {
    let channel = Arc::new(Producer::new());

    let consumers: Vec<_> = (0..2)
        .map(|_| {
            let channel = Arc::clone(&channel);
            std::thread::spawn(move || channel.consume())
        })
        .collect();

    std::thread::sleep(Duration::from_millis(30));
    assert!(channel.push(1));
    assert!(channel.push(2));

    let mut received: Vec<_> = consumers
        .into_iter()
        .map(|consumer| consumer.join().expect("consumer panicked"))
        .collect();
    received.sort();

    assert_eq!(received, vec![Some(1), Some(2)]);
    assert!(channel.is_empty());
}

/// Items pushed before `end` drain to consumers in FIFO order; consumers
/// then observe termination.
#[test]
fn end_drains_then_terminates() {
    let channel = Arc::new(Producer::new());
    for i in 0..100 {
        assert!(channel.push(i));
    }
    channel.end();

    let drained: Vec<_> = std::iter::from_fn(|| channel.consume()).collect();
    assert_eq!(drained, (0..100).collect::<Vec<_>>());
    assert_eq!(channel.consume(), None);
}

/// A hand-off immediately before `end` still reaches the parked consumer;
/// termination does not race it away.
#[test]
fn handoff_just_before_end_is_not_lost() {
    let channel = Arc::new(Producer::new());

    let consumer = {
        let channel = Arc::clone(&channel);
        std::thread::spawn(move || channel.consume())
    };
    std::thread::sleep(Duration::from_millis(30));

    // The push hands off to the parked consumer; end then finds no
    // waiters left.
    assert!(channel.push(7u32));
    channel.end();

    assert_eq!(consumer.join().expect("consumer panicked"), Some(7));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// FIFO exactly-once: any number of concurrent consumers drain a
    /// single producer's items with no loss, no duplication, and each
    /// consumer observing push order.
    #[test]
    fn fifo_exactly_once(
        items in prop::collection::vec(any::<u32>(), 1..200),
        consumers in 1usize..4,
    ) {
        let channel = Arc::new(Producer::new());

        let drains: Vec<_> = (0..consumers)
            .map(|_| {
                let channel = Arc::clone(&channel);
                std::thread::spawn(move || {
                    let mut seen = Vec::new();
                    while let Some(indexed) = channel.consume() {
                        seen.push(indexed);
                    }
                    seen
                })
            })
            .collect();

        for (index, item) in items.iter().enumerate() {
            prop_assert!(channel.push((index, *item)));
        }
        channel.end();

        let mut all = Vec::new();
        for drain in drains {
            let seen = drain.join().expect("consumer panicked");
            // Per-consumer order follows push order.
            for pair in seen.windows(2) {
                prop_assert!(pair[0].0 < pair[1].0);
            }
            all.extend(seen);
        }

        // Union across consumers is every item exactly once.
        all.sort_by_key(|&(index, _)| index);
        let delivered: Vec<_> = all.into_iter().map(|(_, item)| item).collect();
        prop_assert_eq!(delivered, items);
    }
}
