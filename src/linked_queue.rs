//! Lock-free, unbounded FIFO queue safe under arbitrary producer/consumer
//! parallelism.
//!
//! A Michael-Scott queue: a sentinel-headed singly linked list with
//! independently-advancing `head`/`tail` atomic pointers, reclaimed with
//! `crossbeam-epoch` so a reader that loaded a node before a concurrent
//! dequeue unlinked it never has it freed out from under it.
//!
//! Unlike [`crate::array_blocking_queue::ArrayBlockingQueue`] and
//! [`crate::linked_blocking_queue::LinkedBlockingQueue`], `dequeue` never
//! suspends waiting for an element to appear; an empty queue is reported
//! immediately. The `ctx` argument here only bounds how long `enqueue`/
//! `dequeue` may spend retrying under CAS contention; it is not a wait for
//! capacity or occupancy.

use std::mem::ManuallyDrop;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_epoch::{self as epoch, Atomic, Owned};
use crossbeam_utils::CachePadded;

use crate::context::Context;
use crate::error::{EnqueueError, Error};

struct Node<T> {
    // `None` for the sentinel. Wrapped in `ManuallyDrop` because a node that
    // has already given up its value to a dequeuer (but is still linked in,
    // now serving as the new sentinel) must not drop that value a second
    // time when the node itself is eventually reclaimed.
    item: Option<ManuallyDrop<T>>,
    next: Atomic<Node<T>>,
}

struct QueueImpl<T> {
    head: CachePadded<Atomic<Node<T>>>,
    tail: CachePadded<Atomic<Node<T>>>,
    // Advisory only, never consulted to decide correctness of an enqueue or
    // dequeue.
    len: AtomicUsize,
}

unsafe impl<T: Send> Send for QueueImpl<T> {}
unsafe impl<T: Send> Sync for QueueImpl<T> {}

impl<T> QueueImpl<T> {
    fn new() -> QueueImpl<T> {
        let sentinel: Owned<Node<T>> = Owned::new(Node { item: None, next: Atomic::null() });
        let guard = epoch::pin();
        let sentinel = sentinel.into_shared(&guard);
        QueueImpl {
            head: CachePadded::new(Atomic::from(sentinel)),
            tail: CachePadded::new(Atomic::from(sentinel)),
            len: AtomicUsize::new(0),
        }
    }
}

impl<T> Drop for QueueImpl<T> {
    fn drop(&mut self) {
        // Single-threaded at this point (we own the only `Arc`), so no
        // concurrent reader can be holding a reference into the list. Drain
        // every live value first so it drops normally, then free the
        // remaining sentinel, whose `item` is always spent (`None`, or
        // already handed to a caller and therefore never read again).
        unsafe {
            let guard = epoch::unprotected();
            loop {
                let head = self.head.load(Ordering::Relaxed, guard);
                let head_ref = head.deref();
                let next = head_ref.next.load(Ordering::Relaxed, guard);
                match next.as_ref() {
                    Some(next_ref) => {
                        self.head.store(next, Ordering::Relaxed);
                        drop(head.into_owned());
                        if let Some(v) = std::ptr::read(&next_ref.item) {
                            ManuallyDrop::into_inner(v);
                        }
                    }
                    None => {
                        drop(head.into_owned());
                        break;
                    }
                }
            }
        }
    }
}

/// An unbounded, lock-free FIFO queue.
///
/// Cloning a `LinkedQueue` shares the same underlying queue.
pub struct LinkedQueue<T> {
    inner: Arc<QueueImpl<T>>,
}

impl<T> Clone for LinkedQueue<T> {
    fn clone(&self) -> Self {
        LinkedQueue { inner: self.inner.clone() }
    }
}

impl<T> Default for LinkedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LinkedQueue<T> {
    pub fn new() -> LinkedQueue<T> {
        LinkedQueue { inner: Arc::new(QueueImpl::new()) }
    }

    /// The number of elements currently in the queue.
    ///
    /// Advisory: under concurrent access the true count may already have
    /// changed by the time the caller observes this value.
    pub fn len(&self) -> usize {
        self.inner.len.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Enqueues `value`. Never blocks for capacity, since this queue is
    /// always unbounded, but may retry its CAS loop under contention, and
    /// returns `ctx`'s error if `ctx` becomes done mid-retry.
    pub fn enqueue(&self, ctx: &Context, value: T) -> Result<(), EnqueueError<T>> {
        if let Some(err) = ctx.err() {
            return Err(EnqueueError::Ctx(value, err));
        }

        let guard = epoch::pin();
        let new = Owned::new(Node {
            item: Some(ManuallyDrop::new(value)),
            next: Atomic::null(),
        })
        .into_shared(&guard);

        loop {
            let tail = self.inner.tail.load(Ordering::Acquire, &guard);
            if self
                .inner
                .tail
                .compare_exchange(tail, new, Ordering::AcqRel, Ordering::Relaxed, &guard)
                .is_ok()
            {
                // Won the tail swap; the old tail is only reachable from
                // `head` via its `next` pointer, which we publish now. Until
                // this store lands, `tail` points past the end of the
                // published chain — `dequeue` is built to tolerate that.
                let tail_ref = unsafe { tail.deref() };
                tail_ref.next.store(new, Ordering::Release);
                self.inner.len.fetch_add(1, Ordering::Relaxed);
                log::trace!("linked_queue: enqueued lock-free");
                return Ok(());
            }

            if let Some(err) = ctx.err() {
                let item = unsafe { new.into_owned().into_box() }
                    .item
                    .expect("node carried a value");
                return Err(EnqueueError::Ctx(ManuallyDrop::into_inner(item), err));
            }
        }
    }

    /// Attempts to dequeue the head element. Returns `Error::EmptyQueue`
    /// immediately if the queue is observed empty rather than waiting for an
    /// element to appear.
    pub fn dequeue(&self, ctx: &Context) -> Result<T, Error> {
        if let Some(err) = ctx.err() {
            return Err(err);
        }

        let guard = epoch::pin();
        loop {
            let head = self.inner.head.load(Ordering::Acquire, &guard);
            let tail = self.inner.tail.load(Ordering::Acquire, &guard);

            if head == tail {
                // A concurrent enqueue may have already swung `tail` past
                // this point without yet publishing the old tail's `next`;
                // from this reader's perspective that element is not yet
                // enqueued. No tail-helping: report empty immediately.
                log::trace!("linked_queue: dequeue observed head == tail, reporting empty");
                return Err(Error::EmptyQueue);
            }

            let head_ref = unsafe { head.deref() };
            let next = head_ref.next.load(Ordering::Acquire, &guard);
            let Some(next_ref) = (unsafe { next.as_ref() }) else {
                // `head != tail` but `head.next` isn't published yet: the
                // enqueuer that swung `tail` here hasn't finished linking.
                // Wait for it rather than unsafely advancing `head` to a
                // null pointer.
                if let Some(err) = ctx.err() {
                    return Err(err);
                }
                continue;
            };

            if self
                .inner
                .head
                .compare_exchange(head, next, Ordering::AcqRel, Ordering::Relaxed, &guard)
                .is_ok()
            {
                self.inner.len.fetch_sub(1, Ordering::Relaxed);
                unsafe {
                    guard.defer_destroy(head);
                }
                log::trace!("linked_queue: dequeued lock-free");
                // Safety: only the thread that won the head CAS reads this
                // node's item, and only once. The node becomes the new
                // sentinel and is never read from again until it is itself
                // retired, at which point its spent `item` is not re-dropped
                // (see `Node::item`).
                let item = unsafe { std::ptr::read(&next_ref.item) }
                    .expect("live node carried no item");
                return Ok(ManuallyDrop::into_inner(item));
            }

            if let Some(err) = ctx.err() {
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;

    #[test]
    fn fifo_single_threaded() {
        let q = LinkedQueue::new();
        let ctx = Context::background();
        for v in 0..50 {
            q.enqueue(&ctx, v).unwrap();
        }
        for v in 0..50 {
            assert_eq!(q.dequeue(&ctx).unwrap(), v);
        }
        assert_eq!(q.dequeue(&ctx).unwrap_err(), Error::EmptyQueue);
    }

    #[test]
    fn empty_queue_reports_empty_immediately() {
        let q: LinkedQueue<i32> = LinkedQueue::new();
        assert_eq!(q.dequeue(&Context::background()).unwrap_err(), Error::EmptyQueue);
    }

    /// S6: many producers, many consumers, every enqueued value dequeued
    /// exactly once, none duplicated or lost.
    #[test]
    fn s6_concurrent_producers_and_consumers_conserve_elements() {
        use std::sync::atomic::AtomicBool;

        const PRODUCERS: usize = 8;
        const PER_PRODUCER: usize = 2000;
        const TOTAL: usize = PRODUCERS * PER_PRODUCER;

        let _ = env_logger::try_init();

        let q = LinkedQueue::new();
        let producers_done = Arc::new(AtomicBool::new(false));

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let q = q.clone();
                thread::spawn(move || {
                    let ctx = Context::background();
                    for i in 0..PER_PRODUCER {
                        q.enqueue(&ctx, p * PER_PRODUCER + i).unwrap();
                    }
                })
            })
            .collect();

        let consumers: Vec<_> = (0..PRODUCERS)
            .map(|_| {
                let q = q.clone();
                let producers_done = producers_done.clone();
                thread::spawn(move || {
                    let ctx = Context::background();
                    let mut collected = Vec::new();
                    loop {
                        match q.dequeue(&ctx) {
                            Ok(v) => collected.push(v),
                            Err(Error::EmptyQueue) => {
                                if producers_done.load(Ordering::Relaxed) && q.is_empty() {
                                    break;
                                }
                                thread::yield_now();
                            }
                            Err(e) => panic!("unexpected error: {e}"),
                        }
                    }
                    collected
                })
            })
            .collect();

        for p in producers {
            p.join().unwrap();
        }
        producers_done.store(true, Ordering::Relaxed);

        let mut all = Vec::new();
        for c in consumers {
            all.extend(c.join().unwrap());
        }

        assert_eq!(all.len(), TOTAL, "no element should be lost or duplicated");
        let unique: HashSet<_> = all.iter().copied().collect();
        assert_eq!(unique.len(), TOTAL, "every value must be distinct");
    }
}
