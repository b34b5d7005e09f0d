//! The broadcast-on-channel condition primitive shared by every blocking
//! queue in this crate.
//!
//! A [`BroadcastCond`] wakes an unbounded number of waiters with a single
//! call by closing the channel they are all holding a receiver for, then
//! installing a fresh one. The trick that avoids the classic lost-wakeup race
//! is ordering: a waiter reads the *current* channel while still holding the
//! queue's own mutex, and only the broadcaster, also under that mutex, ever
//! swaps it out. A waiter that registers after a broadcast sees the new
//! channel and simply waits for the next one; a waiter that registered before
//! sees the old channel close no matter how late it gets scheduled.
//!
//! Calling [`BroadcastCond::notify_channel`] or [`BroadcastCond::broadcast`]
//! without holding the associated queue mutex is a misuse of this type; both
//! take the `MutexGuard` by value specifically to make that hard to get
//! wrong, and debug builds additionally assert nothing slips through (see the
//! `debug_assert` in each caller's predicate loop).

use std::sync::{Mutex, MutexGuard};

use crossbeam_channel::{bounded, Receiver, Select, Sender};

use crate::context::Context;
use crate::error::Error;

pub(crate) struct BroadcastCond {
    slot: Mutex<(Sender<()>, Receiver<()>)>,
}

impl BroadcastCond {
    pub(crate) fn new() -> BroadcastCond {
        let (tx, rx) = bounded(0);
        BroadcastCond {
            slot: Mutex::new((tx, rx)),
        }
    }

    /// Returns the channel that will close on the next [`broadcast`](Self::broadcast).
    ///
    /// Must be called while holding the queue's own mutex, passed in as
    /// `guard`; releases it as part of returning.
    pub(crate) fn notify_channel<'a, T>(&self, guard: MutexGuard<'a, T>) -> Receiver<()> {
        let ch = self.slot.lock().unwrap().1.clone();
        drop(guard);
        ch
    }

    /// Installs a fresh channel, then closes the old one, then releases
    /// `guard`, the queue's own mutex.
    ///
    /// Any waiter that fetched the old channel via `notify_channel` before
    /// this call, no matter how long ago, observes the close.
    pub(crate) fn broadcast<'a, T>(&self, guard: MutexGuard<'a, T>) {
        let (tx, rx) = bounded(0);
        let old_tx = {
            let mut slot = self.slot.lock().unwrap();
            let old_tx = std::mem::replace(&mut slot.0, tx);
            slot.1 = rx;
            old_tx
        };
        drop(old_tx);
        drop(guard);
    }

    /// Waits until either `ch` closes (a broadcast happened) or `ctx` is
    /// done, then reacquires `mutex`.
    ///
    /// This is the convenience wrapper spec'd as `wait_with`: fetch the
    /// notification channel, release the lock, wait, relock.
    pub(crate) fn wait_with<'a, T>(
        &self,
        mutex: &'a Mutex<T>,
        guard: MutexGuard<'a, T>,
        ctx: &Context,
    ) -> Result<MutexGuard<'a, T>, Error> {
        let ch = self.notify_channel(guard);
        let outcome = Self::select_channel_or_ctx(&ch, ctx);
        let guard = mutex.lock().unwrap();
        outcome.map(|()| guard)
    }

    /// Blocks until `ch` closes or `ctx` is done. Does not touch any mutex;
    /// used directly by [`crate::delay_queue::DelayQueue`], which additionally
    /// waits on a per-call timer.
    pub(crate) fn select_channel_or_ctx(ch: &Receiver<()>, ctx: &Context) -> Result<(), Error> {
        if let Some(err) = ctx.err() {
            return Err(err);
        }

        let done = ctx.done();
        let mut sel = Select::new();
        let ch_idx = sel.recv(ch);
        let done_idx = sel.recv(&done);

        let op = sel.select();
        match op.index() {
            i if i == ch_idx => {
                let _ = op.recv(ch);
                log::trace!("broadcast cond woken by channel close");
                Ok(())
            }
            i if i == done_idx => {
                let _ = op.recv(&done);
                let err = ctx.err().unwrap_or(Error::Cancelled);
                log::trace!("broadcast cond wait aborted by context: {err}");
                Err(err)
            }
            _ => unreachable!("select only registered two operations"),
        }
    }
}
