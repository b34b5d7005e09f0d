//! Bounded-or-unbounded blocking queue backed by a singly linked list.
//!
//! Grounded on the same "one mutex, two `BroadcastCond`s" shape as
//! [`crate::array_blocking_queue::ArrayBlockingQueue`], over a linked list
//! instead of a ring buffer so an unbounded queue never has to pre-size a
//! backing array.

use std::sync::{Arc, Mutex};

use crate::cond::BroadcastCond;
use crate::context::Context;
use crate::error::{EnqueueError, Error};
use crate::traits::BlockingQueue;

struct Node<T> {
    item: Option<T>,
    next: Option<Box<Node<T>>>,
}

impl<T> Node<T> {
    fn sentinel() -> Node<T> {
        Node { item: None, next: None }
    }
}

struct State<T> {
    head: Box<Node<T>>,
    tail: *mut Node<T>,
    len: usize,
}

// `tail` always points at a node owned by `head`'s chain (either `head`
// itself or one of its `next` descendants), never dangling. Every access
// goes through `State`, which is itself behind a `Mutex` guarded by the
// surrounding `Inner`.
unsafe impl<T: Send> Send for State<T> {}

impl<T> State<T> {
    fn new() -> State<T> {
        let mut head = Box::new(Node::sentinel());
        let tail: *mut Node<T> = &mut *head;
        State { head, tail, len: 0 }
    }

    fn push(&mut self, value: T) {
        let mut node = Box::new(Node { item: Some(value), next: None });
        let new_tail: *mut Node<T> = &mut *node;
        unsafe {
            (*self.tail).next = Some(node);
        }
        self.tail = new_tail;
        self.len += 1;
    }

    fn pop(&mut self) -> T {
        let mut next = self.head.next.take().expect("pop called on empty list");
        std::mem::swap(&mut self.head, &mut next);
        if self.len == 1 {
            self.tail = &mut *self.head;
        }
        self.len -= 1;
        self.head.item.take().expect("dequeued node carried no item")
    }
}

struct Inner<T> {
    capacity: Option<usize>,
    state: Mutex<State<T>>,
    not_full: BroadcastCond,
    not_empty: BroadcastCond,
}

impl<T> Inner<T> {
    fn is_full(&self, len: usize) -> bool {
        self.capacity.is_some_and(|c| len == c)
    }
}

/// A blocking queue backed by a singly linked list, optionally bounded.
///
/// Cloning a `LinkedBlockingQueue` shares the same underlying queue.
pub struct LinkedBlockingQueue<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for LinkedBlockingQueue<T> {
    fn clone(&self) -> Self {
        LinkedBlockingQueue { inner: self.inner.clone() }
    }
}

impl<T> LinkedBlockingQueue<T> {
    /// Creates an unbounded queue.
    pub fn unbounded() -> LinkedBlockingQueue<T> {
        LinkedBlockingQueue {
            inner: Arc::new(Inner {
                capacity: None,
                state: Mutex::new(State::new()),
                not_full: BroadcastCond::new(),
                not_empty: BroadcastCond::new(),
            }),
        }
    }

    /// Creates a queue bounded at `capacity` elements.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero; use [`LinkedBlockingQueue::unbounded`]
    /// for no bound.
    pub fn bounded(capacity: usize) -> LinkedBlockingQueue<T> {
        assert!(capacity > 0, "LinkedBlockingQueue bounded capacity must be positive");
        LinkedBlockingQueue {
            inner: Arc::new(Inner {
                capacity: Some(capacity),
                state: Mutex::new(State::new()),
                not_full: BroadcastCond::new(),
                not_empty: BroadcastCond::new(),
            }),
        }
    }

    /// This queue's capacity, or `None` if unbounded.
    pub fn capacity(&self) -> Option<usize> {
        self.inner.capacity
    }
}

impl<T> BlockingQueue<T> for LinkedBlockingQueue<T> {
    fn enqueue(&self, ctx: &Context, value: T) -> Result<(), EnqueueError<T>> {
        if let Some(err) = ctx.err() {
            return Err(EnqueueError::Ctx(value, err));
        }

        let mut guard = self.inner.state.lock().unwrap();
        while self.inner.is_full(guard.len) {
            guard = match self.inner.not_full.wait_with(&self.inner.state, guard, ctx) {
                Ok(guard) => guard,
                Err(err) => return Err(EnqueueError::Ctx(value, err)),
            };
        }

        guard.push(value);
        log::trace!("linked_blocking_queue: enqueued, len={}", guard.len);

        self.inner.not_empty.broadcast(guard);
        Ok(())
    }

    fn dequeue(&self, ctx: &Context) -> Result<T, Error> {
        if let Some(err) = ctx.err() {
            return Err(err);
        }

        let mut guard = self.inner.state.lock().unwrap();
        while guard.len == 0 {
            guard = self.inner.not_empty.wait_with(&self.inner.state, guard, ctx)?;
        }

        let value = guard.pop();
        log::trace!("linked_blocking_queue: dequeued, len={}", guard.len);

        self.inner.not_full.broadcast(guard);
        Ok(value)
    }

    fn len(&self) -> usize {
        self.inner.state.lock().unwrap().len
    }

    fn is_full(&self) -> bool {
        let guard = self.inner.state.lock().unwrap();
        self.inner.is_full(guard.len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn unbounded_fifo_order() {
        let q = LinkedBlockingQueue::unbounded();
        let ctx = Context::background();
        for v in 0..100 {
            q.enqueue(&ctx, v).unwrap();
        }
        for v in 0..100 {
            assert_eq!(q.dequeue(&ctx).unwrap(), v);
        }
        assert_eq!(q.len(), 0);
    }

    #[test]
    fn bounded_rejects_on_deadline() {
        let q = LinkedBlockingQueue::bounded(2);
        let ctx = Context::background();
        q.enqueue(&ctx, 1).unwrap();
        q.enqueue(&ctx, 2).unwrap();

        let (timeout_ctx, _cancel) = Context::with_timeout(&ctx, Duration::from_millis(50));
        let err = q.enqueue(&timeout_ctx, 3).unwrap_err();
        assert!(matches!(err, EnqueueError::Ctx(3, Error::DeadlineExceeded)));
    }

    #[test]
    fn bounded_unblocks_producer_on_concurrent_dequeue() {
        let q = LinkedBlockingQueue::bounded(1);
        let ctx = Context::background();
        q.enqueue(&ctx, 1).unwrap();

        let consumer_q = q.clone();
        let consumer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            consumer_q.dequeue(&Context::background()).unwrap()
        });

        let (producer_ctx, _cancel) = Context::with_timeout(&ctx, Duration::from_secs(1));
        q.enqueue(&producer_ctx, 2).unwrap();

        assert_eq!(consumer.join().unwrap(), 1);
        assert_eq!(q.dequeue(&ctx).unwrap(), 2);
    }

    #[test]
    fn dequeue_blocks_until_enqueue() {
        let q: LinkedBlockingQueue<i32> = LinkedBlockingQueue::unbounded();
        let producer_q = q.clone();
        let producer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            producer_q.enqueue(&Context::background(), 42).unwrap();
        });

        let (ctx, _cancel) = Context::with_timeout(&Context::background(), Duration::from_secs(1));
        assert_eq!(q.dequeue(&ctx).unwrap(), 42);
        producer.join().unwrap();
    }

    #[test]
    #[should_panic(expected = "capacity must be positive")]
    fn zero_bounded_capacity_panics() {
        let _q: LinkedBlockingQueue<i32> = LinkedBlockingQueue::bounded(0);
    }
}
