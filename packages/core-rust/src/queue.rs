//! `ThreadsafeQueue`: a bounded-lifetime FIFO work queue.
//!
//! A single reader/writer lock guards the queue. It never blocks on empty —
//! callers poll via `try_pop`. Destruction (`Drop`) requires the queue to
//! be empty: an abandoned, non-empty queue indicates a programmer error, so
//! it panics loudly rather than silently leaking unfinished work.

use std::collections::VecDeque;

use parking_lot::Mutex;

/// FIFO queue with a single lock, used internally by the gossip server to
/// hand work from the polling thread to a worker pool.
pub struct ThreadsafeQueue<T> {
    inner: Mutex<VecDeque<T>>,
}

impl<T> Default for ThreadsafeQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ThreadsafeQueue<T> {
    /// Creates a new, empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
        }
    }

    /// Number of items currently queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether the queue currently holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Pushes an item onto the back of the queue.
    pub fn push(&self, item: T) {
        self.inner.lock().push_back(item);
    }

    /// Pops the item at the front of the queue, if any.
    ///
    /// Never blocks: returns `None` immediately if the queue is empty.
    pub fn try_pop(&self) -> Option<T> {
        self.inner.lock().pop_front()
    }
}

impl<T> Drop for ThreadsafeQueue<T> {
    fn drop(&mut self) {
        let len = self.inner.lock().len();
        assert!(
            len == 0,
            "ThreadsafeQueue dropped with {len} item(s) still queued"
        );
    }
}
