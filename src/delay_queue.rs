//! Blocking queue that releases elements in order of a per-element delay
//! rather than insertion order.

use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Select};

use crate::cond::BroadcastCond;
use crate::context::Context;
use crate::error::{EnqueueError, Error};
use crate::heap::PriorityHeap;
use crate::traits::{BlockingQueue, Delayable, Queue};

/// A one-shot timer used by [`DelayQueue::dequeue`] to wait for exactly the
/// current head's remaining delay.
///
/// Reuses the same shape as [`crate::context::Context::with_timeout`]'s
/// guard thread (one helper thread that sleeps, then closes a channel)
/// rather than introducing a second timer primitive.
struct DelayTimer {
    done: Receiver<()>,
}

impl DelayTimer {
    fn fire_after(d: Duration) -> DelayTimer {
        let (tx, rx) = bounded(0);
        thread::Builder::new()
            .name("syncqueue-delay-timer".into())
            .spawn(move || {
                thread::sleep(d);
                drop(tx);
            })
            .expect("failed to spawn delay timer thread");
        DelayTimer { done: rx }
    }
}

/// A blocking queue ordered by each element's live [`Delayable::delay`]
/// rather than by arrival order.
///
/// Built on [`PriorityHeap`] behind a single mutex, with two
/// [`BroadcastCond`]s named to match the rest of this crate's ambient
/// terminology: `enqueue_signal` (an insert happened; head may have
/// changed) and `dequeue_signal` (a removal happened; a slot may be free).
pub struct DelayQueue<T> {
    heap: Mutex<PriorityHeap<T>>,
    enqueue_signal: BroadcastCond,
    dequeue_signal: BroadcastCond,
}

impl<T: Delayable> DelayQueue<T> {
    /// Creates a delay queue. `capacity = None` is unbounded.
    pub fn new(capacity: Option<usize>) -> DelayQueue<T> {
        DelayQueue {
            heap: Mutex::new(PriorityHeap::new(capacity, |a: &T, b: &T| a.delay().cmp(&b.delay()))),
            enqueue_signal: BroadcastCond::new(),
            dequeue_signal: BroadcastCond::new(),
        }
    }

    fn wait_timer_channel_or_ctx(
        timer: &DelayTimer,
        ch: &Receiver<()>,
        ctx: &Context,
    ) -> Result<(), Error> {
        if let Some(err) = ctx.err() {
            return Err(err);
        }

        let done = ctx.done();
        let mut sel = Select::new();
        let timer_idx = sel.recv(&timer.done);
        let ch_idx = sel.recv(ch);
        let done_idx = sel.recv(&done);

        let op = sel.select();
        match op.index() {
            i if i == timer_idx => {
                let _ = op.recv(&timer.done);
                log::trace!("delay_queue: woken by per-waiter timer");
                Ok(())
            }
            i if i == ch_idx => {
                let _ = op.recv(ch);
                log::trace!("delay_queue: woken by a concurrent enqueue");
                Ok(())
            }
            i if i == done_idx => {
                let _ = op.recv(&done);
                let err = ctx.err().unwrap_or(Error::Cancelled);
                log::trace!("delay_queue: wait aborted by context: {err}");
                Err(err)
            }
            _ => unreachable!("select only registered three operations"),
        }
    }
}

impl<T: Delayable> BlockingQueue<T> for DelayQueue<T> {
    /// Enqueues `value`, blocking until the queue has room (bounded queues
    /// only) or `ctx` is done.
    fn enqueue(&self, ctx: &Context, value: T) -> Result<(), EnqueueError<T>> {
        if let Some(err) = ctx.err() {
            return Err(EnqueueError::Ctx(value, err));
        }

        loop {
            let mut guard = self.heap.lock().unwrap();
            if !guard.is_full() {
                guard.enqueue(value).expect("checked capacity under the same lock");
                log::trace!("delay_queue: enqueued, len={}", guard.len());
                self.enqueue_signal.broadcast(guard);
                return Ok(());
            }

            let ch = self.dequeue_signal.notify_channel(guard);
            if let Err(err) = BroadcastCond::select_channel_or_ctx(&ch, ctx) {
                return Err(EnqueueError::Ctx(value, err));
            }
        }
    }

    /// Dequeues the element with the smallest current delay, blocking until
    /// that delay has elapsed or `ctx` is done.
    fn dequeue(&self, ctx: &Context) -> Result<T, Error> {
        loop {
            if let Some(err) = ctx.err() {
                return Err(err);
            }

            let mut guard = self.heap.lock().unwrap();
            if let Some(err) = ctx.err() {
                return Err(err);
            }

            let head_delay = match guard.peek() {
                Err(Error::EmptyQueue) => {
                    let ch = self.enqueue_signal.notify_channel(guard);
                    BroadcastCond::select_channel_or_ctx(&ch, ctx)?;
                    continue;
                }
                Err(err) => return Err(err),
                Ok(head) => head.delay(),
            };

            if head_delay == Duration::ZERO {
                let value = guard.dequeue()?;
                log::trace!("delay_queue: dequeued ready element");
                self.dequeue_signal.broadcast(guard);
                return Ok(value);
            }

            let timer = DelayTimer::fire_after(head_delay);
            let ch = self.enqueue_signal.notify_channel(guard);
            Self::wait_timer_channel_or_ctx(&timer, &ch, ctx)?;
        }
    }

    /// The current number of elements in the queue.
    fn len(&self) -> usize {
        self.heap.lock().unwrap().len()
    }

    fn is_full(&self) -> bool {
        self.heap.lock().unwrap().is_full()
    }
}
