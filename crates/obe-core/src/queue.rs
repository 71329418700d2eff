//! The single FIFO queue abstraction used between every pipeline stage
//! (spec.md §4.1). A bounded list guarded by a mutex, with separate
//! producer/consumer condvars collapsed into one (parking_lot's `Condvar`
//! supports multiple waiters on one variable, so a single condvar serves
//! both directions here — push notifies a popper, pop-completing-a-drain
//! notifies a blocked pusher) plus a cancel flag every waiter observes.
//!
//! This mirrors the `Arc<(Mutex<Option<T>>, Condvar)>` slot pattern already
//! used for the scrub-frame request in the teacher's `MediaWorker`,
//! generalized from a single-slot "latest wins" rendezvous to an ordered
//! list with an optional capacity.
//!
//! The original C queue (`obe_t`'s `coded_frames`/`muxed_data` arrays) grew
//! by `realloc` on every single push; that's a per-item O(n) copy under the
//! lock. Here the backing `VecDeque` amortizes growth the normal way, and
//! `drain_all` lets a worker take the whole pending batch in one lock
//! acquisition, matching "Workers take one lock per poll, copy the whole
//! pending list under the lock, release the lock, then process."

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::Duration;

struct Inner<T> {
    items: VecDeque<T>,
    cancelled: bool,
}

/// A FIFO queue of `T`, optionally bounded. An unbounded queue (`capacity =
/// None`) is what the mux input uses, since the muxer must never apply
/// backpressure to encoders (spec.md §4.6 anchors on whichever video frame
/// arrives, however late).
pub struct Queue<T> {
    inner: Mutex<Inner<T>>,
    cv: Condvar,
    capacity: Option<usize>,
}

impl<T> Queue<T> {
    pub fn bounded(capacity: usize) -> Self {
        Queue {
            inner: Mutex::new(Inner { items: VecDeque::new(), cancelled: false }),
            cv: Condvar::new(),
            capacity: Some(capacity),
        }
    }

    pub fn unbounded() -> Self {
        Queue {
            inner: Mutex::new(Inner { items: VecDeque::new(), cancelled: false }),
            cv: Condvar::new(),
            capacity: None,
        }
    }

    /// Push one item, blocking while the queue is full (bounded variant).
    /// Returns `false` if the queue was cancelled before the item could be
    /// pushed (the caller is responsible for releasing the item's
    /// resources in that case).
    pub fn push(&self, item: T) -> bool {
        let mut guard = self.inner.lock();
        if let Some(cap) = self.capacity {
            while guard.items.len() >= cap && !guard.cancelled {
                self.cv.wait(&mut guard);
            }
        }
        if guard.cancelled {
            return false;
        }
        guard.items.push_back(item);
        self.cv.notify_all();
        true
    }

    /// Blocks until an item is available or the queue is cancelled.
    /// Returns `None` once cancelled and drained.
    pub fn pop(&self) -> Option<T> {
        let mut guard = self.inner.lock();
        loop {
            if let Some(item) = guard.items.pop_front() {
                self.cv.notify_all();
                return Some(item);
            }
            if guard.cancelled {
                return None;
            }
            self.cv.wait(&mut guard);
        }
    }

    /// Blocks until an item is available, cancellation, or `timeout`
    /// elapses. Used by stages that must also service a periodic tick
    /// (none of the core workers do today, but it mirrors the receive-
    /// socket timeout semantics spec.md §5 calls out for RTCP polling).
    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        let mut guard = self.inner.lock();
        if let Some(item) = guard.items.pop_front() {
            self.cv.notify_all();
            return item.into();
        }
        if guard.cancelled {
            return None;
        }
        let result = self.cv.wait_for(&mut guard, timeout);
        if result.timed_out() {
            return None;
        }
        let item = guard.items.pop_front();
        if item.is_some() {
            self.cv.notify_all();
        }
        item
    }

    /// Drains every item currently queued in one lock acquisition. Returns
    /// an empty `Vec` (never blocks) if the queue is empty — callers that
    /// want to block until at least one item exists should `pop()` first.
    pub fn drain_all(&self) -> Vec<T> {
        let mut guard = self.inner.lock();
        let drained = guard.items.drain(..).collect();
        self.cv.notify_all();
        drained
    }

    /// Blocks until at least one item is queued or cancellation, then
    /// drains everything pending. This is the exact pattern the muxer and
    /// IP outputs use: wait for non-empty, copy the whole list, release,
    /// process.
    pub fn wait_and_drain_all(&self) -> Vec<T> {
        let mut guard = self.inner.lock();
        while guard.items.is_empty() && !guard.cancelled {
            self.cv.wait(&mut guard);
        }
        let drained: Vec<T> = guard.items.drain(..).collect();
        if !drained.is_empty() {
            self.cv.notify_all();
        }
        drained
    }

    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sets the cancel flag and wakes every blocked waiter. Workers observe
    /// cancellation on their next wake and return without draining
    /// anything further (spec.md §5's cancellation model: release held
    /// frames, free local state, return — no attempt to finish the batch).
    pub fn cancel(&self) {
        let mut guard = self.inner.lock();
        guard.cancelled = true;
        self.cv.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.lock().cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn fifo_order_preserved() {
        let q: Queue<i32> = Queue::unbounded();
        for i in 0..10 {
            q.push(i);
        }
        let drained = q.drain_all();
        assert_eq!(drained, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn pop_blocks_until_push() {
        let q = Arc::new(Queue::<i32>::unbounded());
        let q2 = q.clone();
        let handle = thread::spawn(move || q2.pop());
        thread::sleep(Duration::from_millis(20));
        q.push(42);
        assert_eq!(handle.join().unwrap(), Some(42));
    }

    #[test]
    fn cancel_wakes_blocked_pop() {
        let q = Arc::new(Queue::<i32>::unbounded());
        let q2 = q.clone();
        let handle = thread::spawn(move || q2.pop());
        thread::sleep(Duration::from_millis(20));
        q.cancel();
        assert_eq!(handle.join().unwrap(), None);
    }

    #[test]
    fn bounded_push_blocks_until_space() {
        let q = Arc::new(Queue::<i32>::bounded(1));
        q.push(1);
        let q2 = q.clone();
        let handle = thread::spawn(move || q2.push(2));
        thread::sleep(Duration::from_millis(20));
        assert_eq!(q.pop(), Some(1));
        handle.join().unwrap();
        assert_eq!(q.pop(), Some(2));
    }
}
