//! Background sweeper that closes stale pooled connections.

use crate::cancel::CancelToken;
use crate::pool::ConnectionPool;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaperPolicy {
    /// Time between two sweeps.
    pub interval: Duration,
    /// Idle connections unused for this long are closed.
    pub idle_timeout: Duration,
}

/// Periodic task closing expired and over-idle connections of one pool.
///
/// Runs on its own thread until [`stop`](Self::stop) is called or the token
/// it was started with is cancelled. Dropping the reaper stops it.
#[derive(Debug)]
pub struct IdleConnectionReaper {
    stop: CancelToken,
    passes: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl IdleConnectionReaper {
    pub fn start(pool: Arc<ConnectionPool>, policy: ReaperPolicy, shutdown: &CancelToken) -> io::Result<Self> {
        let stop = shutdown.child();
        let passes = Arc::new(AtomicU64::new(0));
        let handle = thread::Builder::new()
            .name("pagefetch-reaper".to_string())
            .spawn({
                let stop = stop.clone();
                let passes = Arc::clone(&passes);
                move || run_sweeps(&pool, policy, &stop, &passes)
            })?;
        tracing::debug!(?policy, "idle connection reaper started");
        Ok(Self {
            stop,
            passes,
            handle: Some(handle),
        })
    }

    /// Stops the sweeps and joins the thread. Safe to call more than once.
    pub fn stop(&mut self) {
        self.stop.cancel();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("idle connection reaper thread panicked");
            } else {
                tracing::debug!(passes = self.passes(), "idle connection reaper stopped");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Completed sweeps so far.
    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::Relaxed)
    }
}

impl Drop for IdleConnectionReaper {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_sweeps(pool: &ConnectionPool, policy: ReaperPolicy, stop: &CancelToken, passes: &AtomicU64) {
    while !stop.wait_timeout(policy.interval) {
        let expired = pool.close_expired();
        let idle = pool.close_idle(policy.idle_timeout);
        passes.fetch_add(1, Ordering::Relaxed);
        if expired + idle > 0 {
            tracing::debug!(expired, idle, "reaper closed pooled connections");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::pool::{PoolLimits, RouteKey};
    use std::time::Instant;
    use url::Url;

    fn pool(clock: Arc<ManualClock>) -> Arc<ConnectionPool> {
        let limits = PoolLimits {
            max_total: 4,
            max_per_route: 4,
            connect_timeout: Duration::from_millis(200),
            socket_timeout: Duration::from_millis(200),
        };
        Arc::new(ConnectionPool::new(limits, Duration::from_secs(300), clock))
    }

    fn policy() -> ReaperPolicy {
        ReaperPolicy {
            interval: Duration::from_millis(10),
            idle_timeout: Duration::from_secs(30),
        }
    }

    fn wait_until(mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if done() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        done()
    }

    #[test]
    fn closes_connections_idle_past_threshold() {
        let clock = Arc::new(ManualClock::new());
        let pool = pool(Arc::clone(&clock));
        let route = RouteKey::from_url(&Url::parse("http://example.com/").unwrap()).unwrap();
        pool.lease(&route, &CancelToken::new()).unwrap().release();
        assert_eq!(pool.stats().idle, 1);

        let shutdown = CancelToken::new();
        let mut reaper = IdleConnectionReaper::start(Arc::clone(&pool), policy(), &shutdown).unwrap();
        assert!(wait_until(|| reaper.passes() >= 2));
        assert_eq!(pool.stats().idle, 1, "not idle long enough yet");

        clock.advance(Duration::from_secs(31));
        assert!(wait_until(|| pool.stats().idle == 0));
        reaper.stop();
        assert!(!reaper.is_running());
    }

    #[test]
    fn stop_is_idempotent_and_final() {
        let clock = Arc::new(ManualClock::new());
        let shutdown = CancelToken::new();
        let mut reaper = IdleConnectionReaper::start(pool(clock), policy(), &shutdown).unwrap();
        assert!(reaper.is_running());
        reaper.stop();
        let passes = reaper.passes();
        reaper.stop();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(reaper.passes(), passes);
        assert!(!reaper.is_running());
    }

    #[test]
    fn shutdown_token_ends_the_sweeps() {
        let clock = Arc::new(ManualClock::new());
        let shutdown = CancelToken::new();
        let reaper = IdleConnectionReaper::start(pool(clock), policy(), &shutdown).unwrap();
        shutdown.cancel();
        assert!(wait_until(|| !reaper.is_running()));
    }
}
