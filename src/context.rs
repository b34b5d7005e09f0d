//! Cancellation and deadline propagation for blocking queue operations.
//!
//! Every blocking queue operation takes a `ctx` argument that it only ever
//! observes, never creates: a `done` signal and an error. [`Context`] is this
//! crate's concrete, minimal implementation of that handle, modelled on the
//! shape of a context tree (background root, cancellable/timed children)
//! without trying to be a general-purpose port of it.

use std::sync::{Arc, Mutex, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Select, Sender};

use crate::error::Error;

struct Inner {
    done_tx: Mutex<Option<Sender<()>>>,
    done_rx: Receiver<()>,
    deadline: Option<Instant>,
    err: OnceLock<Error>,
}

impl Inner {
    fn fire(&self, err: Error) {
        // `OnceLock::set` only succeeds for the first caller; whichever of
        // cancellation or deadline happens first wins and is latched.
        let _ = self.err.set(err);
        if let Some(tx) = self.done_tx.lock().unwrap().take() {
            drop(tx);
        }
    }
}

/// A cancellation and deadline handle passed to every blocking queue
/// operation.
///
/// Cloning a `Context` shares the same underlying done-signal: cancelling one
/// clone cancels all of them. A `Context` created with a parent also becomes
/// done when its parent does.
#[derive(Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

impl Context {
    /// A context that is never done and has no deadline.
    ///
    /// Used as the root of a context tree, or directly by callers who don't
    /// need cancellation.
    pub fn background() -> Context {
        let (tx, rx) = bounded(0);
        Context {
            inner: Arc::new(Inner {
                done_tx: Mutex::new(Some(tx)),
                done_rx: rx,
                deadline: None,
                err: OnceLock::new(),
            }),
        }
    }

    /// Derives a child context that becomes done either when `cancel` is
    /// called on the returned [`Canceller`], or when `parent` becomes done,
    /// whichever happens first.
    pub fn with_cancel(parent: &Context) -> (Context, Canceller) {
        Self::spawn_child(parent, None)
    }

    /// Derives a child context that becomes done after `timeout` elapses, or
    /// when `parent` becomes done, or when the returned [`Canceller`] is
    /// used, whichever happens first.
    pub fn with_timeout(parent: &Context, timeout: Duration) -> (Context, Canceller) {
        Self::with_deadline(parent, Instant::now() + timeout)
    }

    /// Derives a child context that becomes done at the absolute instant
    /// `at`, or earlier per the same rules as [`Context::with_timeout`].
    pub fn with_deadline(parent: &Context, at: Instant) -> (Context, Canceller) {
        Self::spawn_child(parent, Some(at))
    }

    fn spawn_child(parent: &Context, deadline: Option<Instant>) -> (Context, Canceller) {
        let (tx, rx) = bounded(0);
        let inner = Arc::new(Inner {
            done_tx: Mutex::new(Some(tx)),
            done_rx: rx,
            deadline,
            err: OnceLock::new(),
        });

        let guard_parent = parent.clone();
        let guard_inner = inner.clone();
        thread::Builder::new()
            .name("syncqueue-ctx-guard".into())
            .spawn(move || Self::guard(guard_parent, deadline, guard_inner))
            .expect("failed to spawn context guard thread");

        (Context { inner: inner.clone() }, Canceller { inner })
    }

    /// Waits for either the parent or this context's own done-channel, with
    /// a timeout if a deadline was given, and propagates whichever fired.
    fn guard(parent: Context, deadline: Option<Instant>, inner: Arc<Inner>) {
        let mut sel = Select::new();
        let parent_idx = sel.recv(&parent.inner.done_rx);
        let own_idx = sel.recv(&inner.done_rx);

        let selected = match deadline {
            Some(at) => sel.select_timeout(at.saturating_duration_since(Instant::now())),
            None => Ok(sel.select()),
        };

        match selected {
            Ok(op) if op.index() == parent_idx => {
                let _ = op.recv(&parent.inner.done_rx);
                inner.fire(parent.err().unwrap_or(Error::Cancelled));
            }
            Ok(op) if op.index() == own_idx => {
                let _ = op.recv(&inner.done_rx);
                // Already fired by its `Canceller`; nothing to propagate.
            }
            Ok(_) => unreachable!("select only registered two operations"),
            Err(_) => inner.fire(Error::DeadlineExceeded),
        }
    }

    /// Returns the reason this context is done, or `None` if it is still
    /// live.
    pub fn err(&self) -> Option<Error> {
        self.inner.err.get().copied()
    }

    /// Returns this context's absolute deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Returns `true` if this context has been cancelled or has passed its
    /// deadline.
    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Clones the receiver side of this context's done-channel.
    ///
    /// This is the handle that [`crate::cond::BroadcastCond::wait_with`]
    /// selects against alongside the queue's own notification channel.
    pub(crate) fn done(&self) -> Receiver<()> {
        self.inner.done_rx.clone()
    }
}

/// Cancels the [`Context`] it was returned alongside.
///
/// Dropping a `Canceller` without calling [`Canceller::cancel`] leaks the
/// context's guard thread until its parent fires or its deadline elapses (if
/// either was set), the same way a forgotten `context.CancelFunc` leaks a
/// goroutine. Always call `cancel`.
pub struct Canceller {
    inner: Arc<Inner>,
}

impl Canceller {
    /// Marks the associated context as cancelled, waking any waiter blocked
    /// on it.
    pub fn cancel(&self) {
        self.inner.fire(Error::Cancelled);
    }
}
