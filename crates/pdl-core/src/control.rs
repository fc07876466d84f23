//! Job cancellation: a shared abort token threaded through the probe, every
//! chunk worker, the single-stream fallback and the progress aggregator.
//!
//! The flag is an `AtomicBool` so hot paths (curl write callbacks) can poll it
//! cheaply; a `Condvar` lets retry sleeps wake as soon as abort is requested.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Inner {
    aborted: AtomicBool,
    lock: Mutex<()>,
    wake: Condvar,
}

/// Cloneable cancellation signal. All clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct AbortToken {
    inner: Arc<Inner>,
}

impl AbortToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request abort. Idempotent; wakes every thread sleeping in [`AbortToken::sleep`].
    pub fn abort(&self) {
        self.inner.aborted.store(true, Ordering::SeqCst);
        let _guard = self.inner.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.inner.wake.notify_all();
    }

    pub fn is_aborted(&self) -> bool {
        self.inner.aborted.load(Ordering::Relaxed)
    }

    /// Sleep for `duration` unless abort is requested first.
    /// Returns `false` if the sleep was cut short by an abort.
    ///
    /// A duration too large to form a deadline waits for abort alone.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now().checked_add(duration);
        let mut guard = self.inner.lock.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if self.is_aborted() {
                return false;
            }
            guard = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return true;
                    }
                    let (g, _) = self
                        .inner
                        .wake
                        .wait_timeout(guard, deadline - now)
                        .unwrap_or_else(|e| e.into_inner());
                    g
                }
                None => self.inner.wake.wait(guard).unwrap_or_else(|e| e.into_inner()),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let a = AbortToken::new();
        let b = a.clone();
        assert!(!b.is_aborted());
        a.abort();
        assert!(b.is_aborted());
    }

    #[test]
    fn sleep_completes_without_abort() {
        let t = AbortToken::new();
        assert!(t.sleep(Duration::from_millis(5)));
    }

    #[test]
    fn abort_wakes_sleeper_promptly() {
        let t = AbortToken::new();
        let t2 = t.clone();
        let start = Instant::now();
        let h = std::thread::spawn(move || t2.sleep(Duration::from_secs(30)));
        std::thread::sleep(Duration::from_millis(20));
        t.abort();
        let completed = h.join().unwrap();
        assert!(!completed, "sleep should report the abort");
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn unbounded_sleep_waits_for_abort() {
        let t = AbortToken::new();
        let t2 = t.clone();
        let start = Instant::now();
        let h = std::thread::spawn(move || t2.sleep(Duration::MAX));
        std::thread::sleep(Duration::from_millis(20));
        t.abort();
        assert!(!h.join().unwrap());
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn sleep_after_abort_returns_immediately() {
        let t = AbortToken::new();
        t.abort();
        assert!(!t.sleep(Duration::from_secs(30)));
        assert!(!t.sleep(Duration::from_secs_f64(1e19)));
    }
}
