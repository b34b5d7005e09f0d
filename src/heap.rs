//! A single-threaded, comparator-driven binary min-heap.
//!
//! Used exclusively as the backing store for [`crate::delay_queue::DelayQueue`];
//! this type carries no synchronization of its own; the delay queue
//! serializes all access to it under its own mutex.
//!
//! The Go source this family was distilled from describes the backing array
//! as 1-indexed with a dummy slot at index 0. Rust has no "zero value" for an
//! arbitrary `T` to put in that dummy slot without requiring `T: Default`, so
//! this implementation uses the equivalent, equally standard 0-indexed
//! layout (parent of `i` is `(i - 1) / 2`, children are `2i + 1` and
//! `2i + 2`). The sift-up/sift-down/shrink semantics observable from outside
//! the type are identical either way.

use std::cmp::Ordering;

use crate::error::{EnqueueError, Error};
use crate::traits::Queue;

/// Above this backing capacity, shrinking targets `0.625 * capacity`; at or
/// below it, shrinking targets `capacity / 2`. See [`PriorityHeap::maybe_shrink`].
const SHRINK_THRESHOLD: usize = 2048;
/// Backing capacities at or below this are never shrunk.
const MIN_SHRINKABLE_CAPACITY: usize = 64;
/// Starting backing capacity for an unbounded heap.
const DEFAULT_UNBOUNDED_CAPACITY: usize = 64;

pub(crate) struct PriorityHeap<T> {
    data: Vec<T>,
    capacity: Option<usize>,
    compare: Box<dyn Fn(&T, &T) -> Ordering + Send>,
}

impl<T> PriorityHeap<T> {
    /// Creates a heap. `capacity = None` is unbounded; `Some(c)` is bounded
    /// at `c` and preallocated up front.
    pub(crate) fn new(
        capacity: Option<usize>,
        compare: impl Fn(&T, &T) -> Ordering + Send + 'static,
    ) -> PriorityHeap<T> {
        let initial = capacity.unwrap_or(DEFAULT_UNBOUNDED_CAPACITY);
        PriorityHeap {
            data: Vec::with_capacity(initial),
            capacity,
            compare: Box::new(compare),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }

    pub(crate) fn cap(&self) -> usize {
        self.capacity.unwrap_or_else(|| self.data.capacity())
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub(crate) fn is_full(&self) -> bool {
        self.capacity.is_some_and(|c| self.data.len() == c)
    }

    pub(crate) fn peek(&self) -> Result<&T, Error> {
        self.data.first().ok_or(Error::EmptyQueue)
    }

    fn sift_up(&mut self, mut node: usize) {
        while node > 0 {
            let parent = (node - 1) / 2;
            if (self.compare)(&self.data[node], &self.data[parent]) != Ordering::Less {
                break;
            }
            self.data.swap(node, parent);
            node = parent;
        }
    }

    fn sift_down(&mut self, mut node: usize) {
        let n = self.data.len();
        loop {
            let mut smallest = node;
            let left = 2 * node + 1;
            let right = 2 * node + 2;

            if left < n && (self.compare)(&self.data[left], &self.data[smallest]) == Ordering::Less {
                smallest = left;
            }
            if right < n && (self.compare)(&self.data[right], &self.data[smallest]) == Ordering::Less
            {
                smallest = right;
            }
            if smallest == node {
                break;
            }
            self.data.swap(node, smallest);
            node = smallest;
        }
    }

    /// Shrinks the backing allocation once occupancy drops far enough below
    /// it. A no-op for bounded heaps, which are preallocated once and never
    /// resized.
    fn maybe_shrink(&mut self) {
        if self.capacity.is_some() {
            return;
        }

        let cap = self.data.capacity();
        if cap <= MIN_SHRINKABLE_CAPACITY {
            return;
        }

        let len = self.data.len();
        // An empty heap trivially satisfies any `cap / len` ratio threshold.
        let ratio_at_least = |n: usize| len == 0 || cap / len >= n;

        let target = if cap > SHRINK_THRESHOLD && ratio_at_least(2) {
            Some((cap as f64 * 0.625) as usize)
        } else if cap <= SHRINK_THRESHOLD && ratio_at_least(4) {
            Some(cap / 2)
        } else {
            None
        };

        if let Some(target) = target {
            log::trace!("priority heap shrinking backing capacity {cap} -> {target}");
            self.data.shrink_to(target);
        }
    }
}

/// Realizes `spec.md` §6's non-blocking `Queue` interface: [`DelayQueue`](crate::delay_queue::DelayQueue)
/// enqueues/dequeues through this impl rather than through inherent methods.
impl<T> Queue<T> for PriorityHeap<T> {
    fn enqueue(&mut self, value: T) -> Result<(), EnqueueError<T>> {
        if self.is_full() {
            return Err(EnqueueError::Full(value));
        }
        self.data.push(value);
        self.sift_up(self.data.len() - 1);
        Ok(())
    }

    fn dequeue(&mut self) -> Result<T, Error> {
        if self.data.is_empty() {
            return Err(Error::EmptyQueue);
        }
        let last = self.data.len() - 1;
        self.data.swap(0, last);
        let popped = self.data.pop().expect("just checked non-empty");
        if !self.data.is_empty() {
            self.sift_down(0);
        }
        self.maybe_shrink();
        Ok(popped)
    }
}
