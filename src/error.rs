use std::fmt;

/// Errors returned by the blocking surface of the queues in this crate.
///
/// `Cancelled` and `DeadlineExceeded` are returned unwrapped from the
/// [`Context`](crate::context::Context) that was passed in, so callers can
/// match on them by value rather than having to unwrap a nested error.
/// `EmptyQueue` is reserved for queues that elect to report emptiness
/// instead of blocking for it, currently only [`LinkedQueue`](crate::LinkedQueue),
/// whose `dequeue` never suspends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The context passed to the operation was cancelled before it completed.
    #[error("context cancelled")]
    Cancelled,
    /// The context passed to the operation reached its deadline before the
    /// operation completed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
    /// The queue was empty and the operation does not block to wait for an
    /// element.
    #[error("queue is empty")]
    EmptyQueue,
}

/// The queue is at capacity and cannot accept another element without
/// blocking.
///
/// Kept as its own unit type (rather than a variant of [`Error`]) so that
/// [`EnqueueError`] can hand the rejected value back to the caller without
/// `Error` itself needing to be generic over `T`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("queue is at capacity")]
pub struct OutOfCapacity;

/// Error returned by a non-blocking `enqueue`, carrying the value back since
/// the queue never took ownership of it.
///
/// `Debug`, `Display`, and `std::error::Error` are implemented by hand below
/// rather than derived with `thiserror`, since a blanket `#[error(...)]`
/// can't express "format the inner queue error, ignoring the payload" for a
/// type generic over an arbitrary, possibly non-`Debug` `T`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum EnqueueError<T> {
    /// The queue is bounded and full.
    Full(T),
    /// The context passed to the operation was cancelled or reached its
    /// deadline before a slot became available.
    Ctx(T, Error),
}

impl<T> EnqueueError<T> {
    /// Recovers the value that could not be enqueued.
    pub fn into_inner(self) -> T {
        match self {
            EnqueueError::Full(v) => v,
            EnqueueError::Ctx(v, _) => v,
        }
    }
}

impl<T> fmt::Debug for EnqueueError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnqueueError::Full(_) => f.debug_tuple("Full").field(&"..").finish(),
            EnqueueError::Ctx(_, e) => f.debug_tuple("Ctx").field(&"..").field(e).finish(),
        }
    }
}

impl<T> fmt::Display for EnqueueError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnqueueError::Full(_) => OutOfCapacity.fmt(f),
            EnqueueError::Ctx(_, e) => e.fmt(f),
        }
    }
}

impl<T: fmt::Debug> std::error::Error for EnqueueError<T> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueue_error_hands_back_the_value() {
        assert_eq!(EnqueueError::<i32>::Full(7).into_inner(), 7);
        assert_eq!(EnqueueError::Ctx(7, Error::Cancelled).into_inner(), 7);
    }

    #[test]
    fn enqueue_error_display_ignores_the_payload() {
        assert_eq!(EnqueueError::Full(7).to_string(), OutOfCapacity.to_string());
        assert_eq!(
            EnqueueError::Ctx(7, Error::DeadlineExceeded).to_string(),
            Error::DeadlineExceeded.to_string(),
        );
    }

    #[test]
    fn enqueue_error_debug_does_not_print_a_non_debug_payload() {
        struct NotDebug;
        let err = EnqueueError::Full(NotDebug);
        assert_eq!(format!("{err:?}"), "Full(\"..\")");
    }
}
