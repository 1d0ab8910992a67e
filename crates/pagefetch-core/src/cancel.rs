//! Cancellation tokens shared by the fetcher, its callers and the reaper.
//!
//! A token is set once and never cleared. Waiters block on a condvar, so a
//! cancel wakes them immediately instead of at the end of their timeout.
//! Child tokens are cancelled together with their parent, which lets a caller
//! combine its own per-request token with the fetcher's shutdown token.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

/// Error returned when a wait is cut short by cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("interrupted by cancellation")]
pub struct Interrupted;

#[derive(Debug, Default)]
struct State {
    cancelled: bool,
    children: Vec<Weak<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    state: Mutex<State>,
    changed: Condvar,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cancel(&self) {
        let children = {
            let mut state = self.lock();
            if state.cancelled {
                return;
            }
            state.cancelled = true;
            std::mem::take(&mut state.children)
        };
        self.changed.notify_all();
        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel();
        }
    }
}

/// Cloneable cancellation flag. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels this token and every child derived from it. Idempotent.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.lock().cancelled
    }

    /// Returns a new token that is cancelled when this one is (but not the
    /// other way round). A child of an already cancelled token starts cancelled.
    pub fn child(&self) -> CancelToken {
        let child = CancelToken::new();
        self.propagate_to(&child);
        child
    }

    /// Makes `other` cancelled whenever this token is, in addition to whatever
    /// already cancels it. A token with two parents fires on either.
    pub fn propagate_to(&self, other: &CancelToken) {
        let mut state = self.inner.lock();
        if state.cancelled {
            drop(state);
            other.cancel();
        } else {
            state.children.retain(|weak| weak.strong_count() > 0);
            state.children.push(Arc::downgrade(&other.inner));
        }
    }

    /// Blocks for up to `timeout`. Returns `true` as soon as the token is
    /// cancelled, `false` once the timeout elapses without cancellation.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.inner.lock();
        while !state.cancelled {
            state = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return false;
                    }
                    self.inner
                        .changed
                        .wait_timeout(state, remaining)
                        .map(|(guard, _)| guard)
                        .unwrap_or_else(|e| e.into_inner().0)
                }
                None => self
                    .inner
                    .changed
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
            };
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn cancel_is_sticky_and_shared_by_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn wait_timeout_elapses_without_cancel() {
        let token = CancelToken::new();
        let start = Instant::now();
        assert!(!token.wait_timeout(Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn cancel_wakes_waiter_early() {
        let token = CancelToken::new();
        let waiter = {
            let token = token.clone();
            thread::spawn(move || {
                let start = Instant::now();
                let cancelled = token.wait_timeout(Duration::from_secs(10));
                (cancelled, start.elapsed())
            })
        };
        thread::sleep(Duration::from_millis(50));
        token.cancel();
        let (cancelled, waited) = waiter.join().unwrap();
        assert!(cancelled);
        assert!(waited < Duration::from_secs(5));
    }

    #[test]
    fn parent_cancel_reaches_children_but_not_back() {
        let parent = CancelToken::new();
        let child = parent.child();
        let grandchild = child.child();

        let other = parent.child();
        other.cancel();
        assert!(!parent.is_cancelled());

        parent.cancel();
        assert!(child.is_cancelled());
        assert!(grandchild.is_cancelled());
    }

    #[test]
    fn child_of_cancelled_token_starts_cancelled() {
        let parent = CancelToken::new();
        parent.cancel();
        assert!(parent.child().is_cancelled());
    }

    #[test]
    fn token_with_two_parents_fires_on_either() {
        let shutdown = CancelToken::new();
        let caller = CancelToken::new();
        let combined = shutdown.child();
        caller.propagate_to(&combined);

        let waiter = {
            let combined = combined.clone();
            thread::spawn(move || combined.wait_timeout(Duration::from_secs(10)))
        };
        thread::sleep(Duration::from_millis(20));
        shutdown.cancel();
        assert!(waiter.join().unwrap());
        assert!(!caller.is_cancelled());

        let second = CancelToken::new().child();
        caller.propagate_to(&second);
        caller.cancel();
        assert!(second.is_cancelled());
    }
}
