//! Bounded blocking queue backed by a fixed-size ring buffer.

use std::sync::{Arc, Mutex};

use crate::cond::BroadcastCond;
use crate::context::Context;
use crate::error::{EnqueueError, Error};
use crate::traits::BlockingQueue;

struct State<T> {
    buf: Box<[Option<T>]>,
    head: usize,
    tail: usize,
    len: usize,
}

impl<T> State<T> {
    fn is_full(&self, capacity: usize) -> bool {
        self.len == capacity
    }
}

struct Inner<T> {
    capacity: usize,
    state: Mutex<State<T>>,
    not_full: BroadcastCond,
    not_empty: BroadcastCond,
}

/// A bounded, strict-FIFO blocking queue backed by a ring buffer, protected
/// by a single mutex and two [`BroadcastCond`]s (`not_full`, `not_empty`).
///
/// Cloning an `ArrayBlockingQueue` shares the same underlying queue; clone
/// it to hand out multiple producer/consumer handles, the way one would
/// clone an `Arc`.
pub struct ArrayBlockingQueue<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for ArrayBlockingQueue<T> {
    fn clone(&self) -> Self {
        ArrayBlockingQueue {
            inner: self.inner.clone(),
        }
    }
}

impl<T> ArrayBlockingQueue<T> {
    /// Creates a queue with room for exactly `capacity` elements.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> ArrayBlockingQueue<T> {
        assert!(capacity > 0, "ArrayBlockingQueue capacity must be positive");

        let buf = (0..capacity).map(|_| None).collect::<Vec<_>>().into_boxed_slice();
        ArrayBlockingQueue {
            inner: Arc::new(Inner {
                capacity,
                state: Mutex::new(State {
                    buf,
                    head: 0,
                    tail: 0,
                    len: 0,
                }),
                not_full: BroadcastCond::new(),
                not_empty: BroadcastCond::new(),
            }),
        }
    }

    /// The fixed capacity this queue was created with.
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }
}

impl<T> BlockingQueue<T> for ArrayBlockingQueue<T> {
    fn enqueue(&self, ctx: &Context, value: T) -> Result<(), EnqueueError<T>> {
        if let Some(err) = ctx.err() {
            return Err(EnqueueError::Ctx(value, err));
        }

        let mut guard = self.inner.state.lock().unwrap();
        while guard.is_full(self.inner.capacity) {
            debug_assert_eq!(guard.len, self.inner.capacity);
            guard = match self.inner.not_full.wait_with(&self.inner.state, guard, ctx) {
                Ok(guard) => guard,
                Err(err) => return Err(EnqueueError::Ctx(value, err)),
            };
        }

        let tail = guard.tail;
        guard.buf[tail] = Some(value);
        guard.tail = (tail + 1) % self.inner.capacity;
        guard.len += 1;
        debug_assert!(guard.len <= self.inner.capacity);
        log::trace!("array_blocking_queue: enqueued, len={}", guard.len);

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

        let head = guard.head;
        let value = guard.buf[head].take().expect("live ring slot held no value");
        guard.head = (head + 1) % self.inner.capacity;
        guard.len -= 1;
        debug_assert!(guard.buf[head].is_none());
        log::trace!("array_blocking_queue: dequeued, len={}", guard.len);

        self.inner.not_full.broadcast(guard);
        Ok(value)
    }

    fn len(&self) -> usize {
        self.inner.state.lock().unwrap().len
    }

    fn is_full(&self) -> bool {
        self.inner.state.lock().unwrap().is_full(self.inner.capacity)
    }
}
