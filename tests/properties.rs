//! Cross-cutting liveness and conservation properties, run against each
//! blocking queue variant as a black box through its public API.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use syncqueue::{ArrayBlockingQueue, BlockingQueue, Context, Error, LinkedBlockingQueue};

/// Property 1 (FIFO per producer): a single producer's serial enqueues are
/// observed by a single consumer in the same order.
#[test]
fn fifo_per_producer_array_blocking_queue() {
    let q = ArrayBlockingQueue::new(200);
    let ctx = Context::background();
    for v in 0..200 {
        q.enqueue(&ctx, v).unwrap();
    }
    for v in 0..200 {
        assert_eq!(q.dequeue(&ctx).unwrap(), v);
    }
}

#[test]
fn fifo_per_producer_linked_blocking_queue() {
    let q = LinkedBlockingQueue::unbounded();
    let ctx = Context::background();
    for v in 0..200 {
        q.enqueue(&ctx, v).unwrap();
    }
    for v in 0..200 {
        assert_eq!(q.dequeue(&ctx).unwrap(), v);
    }
}

/// Property 2 (conservation): successful enqueues minus successful dequeues
/// equals the final length, even with concurrent producers and consumers.
#[test]
fn conservation_under_concurrent_producers_and_consumers() {
    const PRODUCERS: usize = 4;
    const CONSUMERS: usize = 4;
    const PER_PRODUCER: usize = 500;

    let _ = env_logger::try_init();

    let q = Arc::new(ArrayBlockingQueue::new(32));

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|_| {
            let q = q.clone();
            thread::spawn(move || {
                let ctx = Context::background();
                for v in 0..PER_PRODUCER {
                    q.enqueue(&ctx, v).unwrap();
                }
            })
        })
        .collect();

    let consumed = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let consumers: Vec<_> = (0..CONSUMERS)
        .map(|_| {
            let q = q.clone();
            let consumed = consumed.clone();
            thread::spawn(move || {
                let (ctx, _cancel) =
                    Context::with_timeout(&Context::background(), Duration::from_secs(5));
                loop {
                    match q.dequeue(&ctx) {
                        Ok(_) => {
                            consumed.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                        }
                        Err(_) => break,
                    }
                    if consumed.load(std::sync::atomic::Ordering::Relaxed)
                        >= PRODUCERS * PER_PRODUCER
                    {
                        break;
                    }
                }
            })
        })
        .collect();

    for p in producers {
        p.join().unwrap();
    }
    for c in consumers {
        c.join().unwrap();
    }

    assert_eq!(consumed.load(std::sync::atomic::Ordering::Relaxed), PRODUCERS * PER_PRODUCER);
    assert_eq!(q.len(), 0);
}

/// Property 3 (no ghost elements): a cancelled or deadline-failed operation
/// never changes queue length.
#[test]
fn no_ghost_elements_on_cancelled_enqueue_or_dequeue() {
    let q: ArrayBlockingQueue<i32> = ArrayBlockingQueue::new(1);
    let ctx = Context::background();
    q.enqueue(&ctx, 1).unwrap();

    let (full_ctx, _cancel) = Context::with_timeout(&ctx, Duration::from_millis(30));
    assert!(q.enqueue(&full_ctx, 2).is_err());
    assert_eq!(q.len(), 1);

    assert_eq!(q.dequeue(&ctx).unwrap(), 1);

    let (empty_ctx, cancel) = Context::with_cancel(&ctx);
    cancel.cancel();
    assert_eq!(q.dequeue(&empty_ctx).unwrap_err(), Error::Cancelled);
    assert_eq!(q.len(), 0);
}

/// Property 4 (no lost wake-ups): a waiter registered before a broadcast is
/// always released by it, even when the broadcaster and waiter race.
#[test]
fn no_lost_wakeups_across_many_rounds() {
    let _ = env_logger::try_init();

    let q = Arc::new(ArrayBlockingQueue::new(1));
    let ctx = Context::background();
    q.enqueue(&ctx, 0).unwrap();

    for round in 0..200 {
        let consumer_q = q.clone();
        let consumer = thread::spawn(move || {
            let (ctx, _cancel) =
                Context::with_timeout(&Context::background(), Duration::from_secs(2));
            consumer_q.dequeue(&ctx).unwrap()
        });

        // Give the consumer a chance to register as a waiter before we
        // produce the value it is waiting for.
        thread::sleep(Duration::from_millis(1));
        q.enqueue(&ctx, round + 1).unwrap();

        assert_eq!(consumer.join().unwrap(), round);
    }
}

/// Property 6 (bounded capacity): len never exceeds capacity, even under
/// concurrent contention.
#[test]
fn bounded_capacity_never_exceeded() {
    const CAPACITY: usize = 8;
    let q = Arc::new(ArrayBlockingQueue::new(CAPACITY));

    let producers: Vec<_> = (0..16)
        .map(|_| {
            let q = q.clone();
            thread::spawn(move || {
                let (ctx, _cancel) =
                    Context::with_timeout(&Context::background(), Duration::from_secs(2));
                for v in 0..50 {
                    q.enqueue(&ctx, v).unwrap();
                    assert!(q.len() <= CAPACITY);
                }
            })
        })
        .collect();

    let draining = {
        let q = q.clone();
        thread::spawn(move || {
            let (ctx, _cancel) =
                Context::with_timeout(&Context::background(), Duration::from_secs(3));
            for _ in 0..(16 * 50) {
                q.dequeue(&ctx).unwrap();
                assert!(q.len() <= CAPACITY);
            }
        })
    };

    for p in producers {
        p.join().unwrap();
    }
    draining.join().unwrap();
    assert_eq!(q.len(), 0);
}
