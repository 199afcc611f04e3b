//! A blocking work queue for frontier exploration.
//!
//! Workers both consume and produce: a popped cell can push newly
//! discovered neighbors back. Termination is therefore not "queue empty"
//! but "queue empty and nobody is mid-task", tracked by an in-flight
//! counter. Waits are bounded so a worker can notice an externally
//! reached budget instead of parking forever.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// Frontier discipline: FIFO gives breadth-first order, LIFO depth-first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Fifo,
    Lifo,
}

/// Result of a bounded-wait pop.
#[derive(Debug, PartialEq, Eq)]
pub enum Popped<T> {
    /// An item; the caller now holds an in-flight task and must call
    /// [`BlockingQueue::task_done`] when finished with it.
    Item(T),
    /// The wait elapsed with the queue still open and busy.
    TimedOut,
    /// No items remain and none can arrive: the queue is closed or every
    /// worker is idle.
    Finished,
}

struct Inner<T> {
    items: VecDeque<T>,
    in_flight: usize,
    closed: bool,
}

pub struct BlockingQueue<T> {
    inner: Mutex<Inner<T>>,
    cond: Condvar,
}

impl<T> BlockingQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                in_flight: 0,
                closed: false,
            }),
            cond: Condvar::new(),
        }
    }

    /// Add an item. Ignored after close.
    pub fn push(&self, item: T) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.closed {
            return;
        }
        inner.items.push_back(item);
        self.cond.notify_one();
    }

    /// Take an item, waiting up to `timeout`. Popping marks a task
    /// in-flight; the matching [`task_done`](Self::task_done) keeps the
    /// termination accounting correct.
    pub fn pop(&self, order: Order, timeout: Duration) -> Popped<T> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if let Some(item) = match order {
                Order::Fifo => inner.items.pop_front(),
                Order::Lifo => inner.items.pop_back(),
            } {
                inner.in_flight += 1;
                return Popped::Item(item);
            }
            if inner.closed || inner.in_flight == 0 {
                return Popped::Finished;
            }
            let (guard, wait) = self
                .cond
                .wait_timeout(inner, timeout)
                .unwrap_or_else(|e| e.into_inner());
            inner = guard;
            if wait.timed_out() {
                // Re-check once under the lock before reporting: the
                // notify could have raced the timeout.
                if inner.items.is_empty() && !inner.closed && inner.in_flight > 0 {
                    return Popped::TimedOut;
                }
            }
        }
    }

    /// Mark one popped task complete. The last idle worker's call wakes
    /// everyone so they can observe termination.
    pub fn task_done(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.in_flight = inner.in_flight.saturating_sub(1);
        if inner.in_flight == 0 {
            self.cond.notify_all();
        }
    }

    /// Stop accepting items and wake all waiters; pending items are
    /// discarded. Used when a search budget is reached.
    pub fn close(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.closed = true;
        inner.items.clear();
        self.cond.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).closed
    }
}

impl<T> Default for BlockingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
