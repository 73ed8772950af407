/*! Cooperative cancellation.

Every suspending call in this crate (rate limiter wait, Mux request)
accepts a [`CancelToken`] rather than a full async runtime context: a
cheap, cloneable flag that a caller can trip to unblock a waiting
thread promptly, mirroring how [`crate::mtgraph::MTGraph`]'s
`CancellationToken` lets a Ctrl-C handler stop every running block
without plumbing a cancellation channel through each one.
*/
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Inner {
    canceled: AtomicBool,
    lock: Mutex<()>,
    cond: Condvar,
}

/// A cloneable flag used to cancel an in-progress wait.
///
/// Cloning shares the same underlying state: cancelling any clone
/// cancels all of them.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<Inner>);

impl CancelToken {
    /// Create a new, not-yet-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark this token (and every clone of it) as cancelled, and wake
    /// any thread blocked in [`CancelToken::wait_timeout`].
    pub fn cancel(&self) {
        self.0.canceled.store(true, Ordering::SeqCst);
        let _g = self.0.lock.lock().unwrap();
        self.0.cond.notify_all();
    }

    /// Whether this token has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.0.canceled.load(Ordering::SeqCst)
    }

    /// Block the calling thread for up to `timeout`, waking early if
    /// the token is cancelled in the meantime.
    ///
    /// Returns `true` if woken by cancellation, `false` on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.is_cancelled() {
            return true;
        }
        let deadline = Instant::now() + timeout;
        let guard = self.0.lock.lock().unwrap();
        let (mut guard, _) = self
            .0
            .cond
            .wait_timeout_while(guard, timeout, |_| {
                !self.0.canceled.load(Ordering::SeqCst) && Instant::now() < deadline
            })
            .unwrap();
        let _ = &mut guard;
        self.is_cancelled()
    }
}

/// A token that can never be cancelled, for callers that don't need
/// to abort in-flight work.
pub fn never() -> CancelToken {
    CancelToken::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_not_cancelled() {
        let t = CancelToken::new();
        assert!(!t.is_cancelled());
    }

    #[test]
    fn cancel_wakes_waiter() {
        let t = CancelToken::new();
        let t2 = t.clone();
        let start = Instant::now();
        let h = std::thread::spawn(move || t2.wait_timeout(Duration::from_secs(5)));
        std::thread::sleep(Duration::from_millis(20));
        t.cancel();
        assert!(h.join().unwrap());
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn clone_shares_state() {
        let t = CancelToken::new();
        let t2 = t.clone();
        t2.cancel();
        assert!(t.is_cancelled());
    }

    #[test]
    fn timeout_without_cancel() {
        let t = CancelToken::new();
        let start = Instant::now();
        assert!(!t.wait_timeout(Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}
