//! Cycle semaphore (§5, §9 "Cycle semaphore" design note): single-slot,
//! reset-on-wait, implemented as a condvar+flag pair rather than a
//! dedicated semaphore crate, matching the teacher's std-only concurrency
//! primitives. Must never block the worker thread's publish path — only
//! `signal` is called from there, and it never blocks.

use std::sync::{Condvar, Mutex};
use std::time::Duration;

pub struct CycleSemaphore {
    raised: Mutex<bool>,
    cond: Condvar,
}

impl CycleSemaphore {
    pub fn new() -> Self {
        Self {
            raised: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    /// Raises the flag and wakes one waiter. Non-blocking.
    pub fn signal(&self) {
        let mut raised = self.raised.lock().unwrap_or_else(|p| p.into_inner());
        *raised = true;
        self.cond.notify_one();
    }

    /// Waits for the flag to be raised, then resets it (reset-on-wait).
    /// `timeout = None` waits indefinitely; `Some(d)` bounds the wait and
    /// returns `false` on expiry without consuming a pending signal.
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        let guard = self.raised.lock().unwrap_or_else(|p| p.into_inner());
        let mut guard = match timeout {
            None => self.cond.wait_while(guard, |r| !*r).unwrap_or_else(|p| p.into_inner()),
            Some(d) => {
                let (guard, result) = self
                    .cond
                    .wait_timeout_while(guard, d, |r| !*r)
                    .unwrap_or_else(|p| p.into_inner());
                if result.timed_out() {
                    return false;
                }
                guard
            }
        };
        *guard = false;
        true
    }
}

impl Default for CycleSemaphore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn signal_then_wait_returns_immediately() {
        let sem = CycleSemaphore::new();
        sem.signal();
        assert!(sem.wait(Some(Duration::from_millis(10))));
    }

    #[test]
    fn wait_times_out_without_a_signal() {
        let sem = CycleSemaphore::new();
        assert!(!sem.wait(Some(Duration::from_millis(5))));
    }

    #[test]
    fn wait_is_reset_after_consuming_a_signal() {
        let sem = CycleSemaphore::new();
        sem.signal();
        assert!(sem.wait(Some(Duration::from_millis(10))));
        assert!(!sem.wait(Some(Duration::from_millis(5))));
    }

    #[test]
    fn signal_from_another_thread_wakes_an_indefinite_wait() {
        let sem = Arc::new(CycleSemaphore::new());
        let sem2 = sem.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            sem2.signal();
        });
        assert!(sem.wait(None));
        handle.join().unwrap();
    }
}
