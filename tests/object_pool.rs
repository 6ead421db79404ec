//! Capacity, blocking, and round-trip behavior of the object pool.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use strand::sync::ObjectPool;

/// Pool saturation: with the cap reached, an acquirer blocks until a
/// return unblocks it, and the reinitializer runs on every return.
#[test]
fn saturated_acquire_blocks_until_a_return() {
    let pool = Arc::new(ObjectPool::with_reinit(
        || 0u32,
        |value| *value += 1,
        2,
    ));

    let mut first = pool.acquire();
    let second = pool.acquire();
    assert_eq!(*first, 0);
    assert_eq!(*second, 0);

    let (tx, rx) = mpsc::channel();
    let blocked = {
        let pool = Arc::clone(&pool);
        std::thread::spawn(move || {
            tx.send(()).expect("receiver alive");
            let third = pool.acquire();
            *third
        })
    };

    rx.recv().expect("acquirer started");
    // The third acquirer has nothing to take and must be parked.
    std::thread::sleep(Duration::from_millis(30));
    assert!(!blocked.is_finished());

    first.free();
    let third_value = blocked.join().expect("acquirer panicked");
    assert_eq!(third_value, 1, "returned value was reinitialized");

    drop(second);
    // Both items are back: reinit counts 1 (from `second`) and 2 (the
    // handed-off item, reinitialized again on its own return).
    let mut drained = [
        *pool.try_acquire().expect("first pooled item"),
        *pool.try_acquire().expect("second pooled item"),
    ];
    drained.sort_unstable();
    assert_eq!(drained, [1, 2]);
}

/// With K acquirers and a cap of M, at most M borrows are live at once,
/// no construction beyond M ever happens, and every borrow pairs with a
/// return.
#[test]
fn concurrency_never_exceeds_the_cap() {
    const CAP: usize = 3;
    const THREADS: usize = 8;
    const ROUNDS: usize = 20;

    let built = Arc::new(AtomicUsize::new(0));
    let live = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let pool = {
        let built = Arc::clone(&built);
        Arc::new(ObjectPool::new(
            move || {
                built.fetch_add(1, Ordering::SeqCst);
            },
            CAP,
        ))
    };

    let workers: Vec<_> = (0..THREADS)
        .map(|_| {
            let pool = Arc::clone(&pool);
            let live = Arc::clone(&live);
            let peak = Arc::clone(&peak);
            std::thread::spawn(move || {
                for _ in 0..ROUNDS {
                    let item = pool.acquire();
                    let now = live.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    assert!(now <= CAP, "{now} borrows live with cap {CAP}");

                    std::thread::yield_now();

                    live.fetch_sub(1, Ordering::SeqCst);
                    drop(item);
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().expect("worker panicked");
    }

    assert!(peak.load(Ordering::SeqCst) <= CAP);
    assert!(built.load(Ordering::SeqCst) <= CAP);
    assert_eq!(pool.circulating(), built.load(Ordering::SeqCst));
    assert_eq!(live.load(Ordering::SeqCst), 0);
}

/// Each return unblocks exactly one parked acquirer, in FIFO order.
#[test]
fn returns_unblock_waiters_one_for_one() {
    let pool = Arc::new(ObjectPool::new(|| (), 1));

    let held = pool.acquire();

    let (tx, rx) = mpsc::channel();
    let waiters: Vec<_> = (0..3)
        .map(|id| {
            let pool = Arc::clone(&pool);
            let tx = tx.clone();
            std::thread::spawn(move || {
                let item = pool.acquire();
                tx.send(id).expect("receiver alive");
                drop(item);
            })
        })
        .collect();

    std::thread::sleep(Duration::from_millis(30));
    drop(held);

    // Every waiter eventually gets a turn off the single item.
    let mut served = Vec::new();
    for _ in 0..3 {
        served.push(
            rx.recv_timeout(Duration::from_secs(5))
                .expect("a waiter was unblocked"),
        );
    }
    served.sort_unstable();
    assert_eq!(served, vec![0, 1, 2]);

    for waiter in waiters {
        waiter.join().expect("waiter panicked");
    }
}

/// try_acquire never blocks: it grows under the cap and fails cleanly at
/// it.
#[test]
fn try_acquire_observes_the_cap() {
    let pool = ObjectPool::new(|| 0u8, 2);

    let first = pool.try_acquire().expect("grows under cap");
    let second = pool.try_acquire().expect("grows to cap");
    assert!(pool.try_acquire().is_none());

    drop(first);
    assert!(pool.try_acquire().is_some());
    drop(second);
}
