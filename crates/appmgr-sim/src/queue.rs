//! A bounded, blocking queue standing in for the RTOS queue primitive the
//! specification assumes is available (§1, §5).

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use appmgr::{Queue, QueueError};

/// One simulated RTOS tick, for converting the timeout arguments
/// [`Queue::send`]/[`Queue::receive`] accept into real time.
const TICK: Duration = Duration::from_millis(1);

fn ticks(n: u32) -> Duration {
    TICK * n
}

struct Inner<T> {
    items: VecDeque<T>,
    capacity: usize,
}

/// A fixed-capacity queue with condition-variable-backed blocking send and
/// receive, used for both the thread queue (capacity 1) and the event queue
/// (capacity 5) in [`crate::SimPlatform`].
pub struct SimQueue<T> {
    inner: Mutex<Inner<T>>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl<T> SimQueue<T> {
    /// Builds an empty queue holding at most `capacity` items.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                capacity,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    /// Current number of queued items, for test assertions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().items.len()
    }

    /// Whether the queue currently holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Queue<T> for SimQueue<T> {
    fn send(&self, msg: T, timeout_ticks: u32) -> Result<(), QueueError> {
        let deadline = Instant::now() + ticks(timeout_ticks);
        let mut guard = self.inner.lock().unwrap();
        loop {
            if guard.items.len() < guard.capacity {
                guard.items.push_back(msg);
                self.not_empty.notify_one();
                return Ok(());
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(QueueError::Full);
            }
            guard = self.not_full.wait_timeout(guard, remaining).unwrap().0;
        }
    }

    fn send_from_isr(&self, msg: T) -> Result<bool, QueueError> {
        let mut guard = self.inner.lock().unwrap();
        if guard.items.len() >= guard.capacity {
            return Err(QueueError::Full);
        }
        let woke_a_waiter = guard.items.is_empty();
        guard.items.push_back(msg);
        self.not_empty.notify_one();
        Ok(woke_a_waiter)
    }

    fn receive(&self, timeout_ticks: Option<u32>) -> Option<T> {
        let mut guard = self.inner.lock().unwrap();
        match timeout_ticks {
            None => {
                while guard.items.is_empty() {
                    guard = self.not_empty.wait(guard).unwrap();
                }
            }
            Some(n) => {
                let deadline = Instant::now() + ticks(n);
                while guard.items.is_empty() {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return None;
                    }
                    guard = self.not_empty.wait_timeout(guard, remaining).unwrap().0;
                }
            }
        }
        let msg = guard.items.pop_front();
        self.not_full.notify_one();
        msg
    }

    fn reset(&self) {
        let mut guard = self.inner.lock().unwrap();
        guard.items.clear();
        self.not_full.notify_all();
    }
}
