//! The non-blocking [`Queue`], blocking [`BlockingQueue`], and [`Delayable`]
//! contracts shared across the queue family.

use std::time::Duration;

use crate::context::Context;
use crate::error::{EnqueueError, Error};

/// A non-blocking queue: operations either complete immediately or report
/// why they couldn't.
///
/// Implemented by [`crate::heap::PriorityHeap`], which
/// [`crate::delay_queue::DelayQueue`] enqueues/dequeues through while holding
/// its own mutex. Not part of the public blocking surface.
pub trait Queue<T> {
    /// Attempts to enqueue `value` without blocking.
    fn enqueue(&mut self, value: T) -> Result<(), EnqueueError<T>>;
    /// Attempts to dequeue a value without blocking.
    fn dequeue(&mut self) -> Result<T, Error>;
}

/// The public surface of [`crate::ArrayBlockingQueue`], [`crate::LinkedBlockingQueue`],
/// and [`crate::DelayQueue`].
///
/// Every operation takes a [`Context`] and blocks cooperatively, tolerating
/// spurious wakes, until it can complete or until the context is done.
pub trait BlockingQueue<T> {
    /// Enqueues `value`, blocking until space is available or `ctx` is done.
    fn enqueue(&self, ctx: &Context, value: T) -> Result<(), EnqueueError<T>>;
    /// Dequeues the head element, blocking until one is available or `ctx`
    /// is done.
    fn dequeue(&self, ctx: &Context) -> Result<T, Error>;
    /// The current number of elements in the queue.
    fn len(&self) -> usize;
    /// Whether the queue currently has zero elements.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Whether the queue is at capacity (always `false` for unbounded
    /// queues).
    fn is_full(&self) -> bool;
}

/// Elements stored in a [`crate::DelayQueue`] must report how long until they
/// should become available.
///
/// `delay` is invoked under the queue's internal mutex and must be
/// side-effect-free and fast. A zero or negative-equivalent delay
/// (`Duration::ZERO`) means the element is ready now; this crate represents
/// "already past due" the same way the Go source does, by letting
/// `delay()` return a value that has decreased to zero between calls, not by
/// a separate signed type. See [`crate::delay_queue`] for how a decreasing
/// live delay interacts with the heap comparator.
pub trait Delayable {
    /// Returns the remaining delay before this element should be released.
    /// A queue never treats a negative quantity specially; an element whose
    /// underlying deadline has passed should simply return `Duration::ZERO`.
    fn delay(&self) -> Duration;
}
