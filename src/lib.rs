//! A family of generic concurrent queues sharing one cancellable,
//! deadline-aware wake-up primitive.
//!
//! Four variants are provided:
//!
//! - [`ArrayBlockingQueue`]: bounded, ring-buffer, blocking.
//! - [`LinkedBlockingQueue`]: bounded or unbounded, linked-node, blocking.
//! - [`LinkedQueue`]: unbounded, linked-node, lock-free.
//! - [`DelayQueue`]: blocking queue ordered by a per-element delay.
//!
//! All four observe a [`Context`] rather than inventing their own
//! cancellation story: every blocking call takes one and returns promptly
//! with [`Error::Cancelled`] or [`Error::DeadlineExceeded`] if it is done
//! before the call would otherwise complete.

mod array_blocking_queue;
mod cond;
mod context;
mod delay_queue;
mod error;
mod heap;
mod linked_blocking_queue;
mod linked_queue;
mod traits;

pub use array_blocking_queue::ArrayBlockingQueue;
pub use context::{Canceller, Context};
pub use delay_queue::DelayQueue;
pub use error::{EnqueueError, Error, OutOfCapacity};
pub use linked_blocking_queue::LinkedBlockingQueue;
pub use linked_queue::LinkedQueue;
pub use traits::{BlockingQueue, Delayable, Queue};
