//! Bounded pool of reusable HTTP connections.
//!
//! Each pooled connection is one curl `Easy2` handle restricted to a single
//! cached socket, partitioned by [`RouteKey`]. The pool enforces a global cap
//! and a per-route cap on leased connections; callers over either cap wait
//! (bounded by the connect timeout) for a lease to come back. Idle handles
//! keep their socket alive for reuse until the reaper or the lifetime rule
//! closes them.

mod lease;
mod route;

pub use lease::Lease;
pub use route::RouteKey;

use crate::cancel::CancelToken;
use crate::client::Collector;
use crate::clock::Clock;
use crate::fetch::FetchError;
use curl::easy::Easy2;
use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Upper bound on a single condvar wait so cancellation is noticed promptly
/// while waiting for a free connection.
const LEASE_WAIT_SLICE: Duration = Duration::from_millis(50);

/// Connection caps and timeouts. Read-only after the pool is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolLimits {
    pub max_total: usize,
    pub max_per_route: usize,
    pub connect_timeout: Duration,
    pub socket_timeout: Duration,
}

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub leased: usize,
    pub idle: usize,
    pub max_total: usize,
    pub max_per_route: usize,
}

/// One reusable connection (curl handle plus bookkeeping).
pub(crate) struct PooledConnection {
    pub(crate) easy: Easy2<Collector>,
    created: Instant,
    last_used: Instant,
    /// Cookie jar generation last imported into this handle.
    pub(crate) cookie_generation: u64,
}

impl PooledConnection {
    fn new(now: Instant) -> Self {
        Self {
            easy: Easy2::new(Collector::default()),
            created: now,
            last_used: now,
            cookie_generation: 0,
        }
    }
}

#[derive(Default)]
struct PoolState {
    idle: HashMap<RouteKey, Vec<PooledConnection>>,
    leased_total: usize,
    leased_per_route: HashMap<RouteKey, usize>,
    closed: bool,
}

impl PoolState {
    fn idle_count(&self) -> usize {
        self.idle.values().map(Vec::len).sum()
    }

    /// Removes and returns the least recently used idle connection.
    fn take_oldest_idle(&mut self) -> Option<PooledConnection> {
        let route = self
            .idle
            .iter()
            .filter_map(|(route, conns)| conns.first().map(|c| (route, c.last_used)))
            .min_by_key(|(_, last_used)| *last_used)
            .map(|(route, _)| route.clone())?;
        let conns = self.idle.get_mut(&route)?;
        let oldest = conns.remove(0);
        if conns.is_empty() {
            self.idle.remove(&route);
        }
        Some(oldest)
    }

    /// Removes idle connections matching `doomed` and returns them for closing.
    fn drain_idle(&mut self, mut doomed: impl FnMut(&PooledConnection) -> bool) -> Vec<PooledConnection> {
        let mut drained = Vec::new();
        for conns in self.idle.values_mut() {
            let (gone, kept): (Vec<_>, Vec<_>) = conns.drain(..).partition(|c| doomed(c));
            *conns = kept;
            drained.extend(gone);
        }
        self.idle.retain(|_, conns| !conns.is_empty());
        drained
    }
}

pub struct ConnectionPool {
    limits: PoolLimits,
    max_lifetime: Duration,
    clock: Arc<dyn Clock>,
    state: Mutex<PoolState>,
    returned: Condvar,
}

impl ConnectionPool {
    /// Builds an empty pool. No connection is opened until the first lease.
    pub fn new(limits: PoolLimits, max_lifetime: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            limits,
            max_lifetime,
            clock,
            state: Mutex::new(PoolState::default()),
            returned: Condvar::new(),
        }
    }

    pub fn limits(&self) -> &PoolLimits {
        &self.limits
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn expired(&self, conn: &PooledConnection, now: Instant) -> bool {
        now.saturating_duration_since(conn.created) >= self.max_lifetime
    }

    /// Leases a connection for `route`, waiting up to the connect timeout for
    /// capacity when the global or per-route cap is reached.
    pub fn lease(&self, route: &RouteKey, cancel: &CancelToken) -> Result<Lease<'_>, FetchError> {
        let started = Instant::now();
        let mut state = self.lock();
        loop {
            if cancel.is_cancelled() {
                return Err(FetchError::Interrupted);
            }
            if state.closed {
                return Err(FetchError::PoolClosed);
            }
            if let Some((conn, evicted)) = self.try_checkout(&mut state, route) {
                drop(state);
                drop(evicted);
                return Ok(Lease::new(self, route.clone(), conn));
            }
            let waited = started.elapsed();
            if waited >= self.limits.connect_timeout {
                tracing::debug!(%route, ?waited, "no pooled connection became available");
                return Err(FetchError::PoolTimeout {
                    route: route.to_string(),
                });
            }
            let slice = (self.limits.connect_timeout - waited).min(LEASE_WAIT_SLICE);
            state = self
                .returned
                .wait_timeout(state, slice)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|e| e.into_inner().0);
        }
    }

    /// Takes an idle connection for `route` or opens a slot for a new one.
    /// Also returns any idle connection evicted to stay under the global cap,
    /// so the caller can close it outside the lock.
    fn try_checkout(
        &self,
        state: &mut PoolState,
        route: &RouteKey,
    ) -> Option<(PooledConnection, Option<PooledConnection>)> {
        let per_route = state.leased_per_route.get(route).copied().unwrap_or(0);
        if state.leased_total >= self.limits.max_total || per_route >= self.limits.max_per_route {
            return None;
        }

        let now = self.clock.now();
        let mut evicted = None;
        let reused = match state.idle.get_mut(route) {
            Some(conns) => {
                let reused = conns.pop();
                if conns.is_empty() {
                    state.idle.remove(route);
                }
                reused
            }
            None => None,
        };
        let conn = match reused {
            Some(conn) if !self.expired(&conn, now) => conn,
            stale => {
                drop(stale);
                if state.leased_total + state.idle_count() >= self.limits.max_total {
                    evicted = state.take_oldest_idle();
                }
                PooledConnection::new(now)
            }
        };

        state.leased_total += 1;
        *state.leased_per_route.entry(route.clone()).or_insert(0) += 1;
        Some((conn, evicted))
    }

    /// Frees a leased slot; `conn` is kept for reuse unless the pool is closed
    /// or the connection is past its lifetime.
    fn check_in(&self, route: &RouteKey, conn: Option<PooledConnection>) {
        let discarded = {
            let mut state = self.lock();
            state.leased_total = state.leased_total.saturating_sub(1);
            if let Some(count) = state.leased_per_route.get_mut(route) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    state.leased_per_route.remove(route);
                }
            }
            match conn {
                Some(mut conn) => {
                    let now = self.clock.now();
                    if state.closed || self.expired(&conn, now) {
                        Some(conn)
                    } else {
                        conn.last_used = now;
                        state.idle.entry(route.clone()).or_default().push(conn);
                        None
                    }
                }
                None => None,
            }
        };
        drop(discarded);
        self.returned.notify_all();
    }

    /// Closes idle connections unused for at least `threshold`. Returns how many were closed.
    pub fn close_idle(&self, threshold: Duration) -> usize {
        let now = self.clock.now();
        let closed = self
            .lock()
            .drain_idle(|c| now.saturating_duration_since(c.last_used) >= threshold);
        closed.len()
    }

    /// Closes idle connections past their maximum lifetime. Returns how many were closed.
    pub fn close_expired(&self) -> usize {
        let now = self.clock.now();
        let closed = self.lock().drain_idle(|c| self.expired(c, now));
        closed.len()
    }

    /// Closes every idle connection and refuses further leases. Connections
    /// still leased are closed when their lease ends. Idempotent.
    pub fn close(&self) {
        let closed = {
            let mut state = self.lock();
            state.closed = true;
            state.drain_idle(|_| true)
        };
        if !closed.is_empty() {
            tracing::debug!(count = closed.len(), "closed idle connections on shutdown");
        }
        drop(closed);
        self.returned.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.lock();
        PoolStats {
            leased: state.leased_total,
            idle: state.idle_count(),
            max_total: self.limits.max_total,
            max_per_route: self.limits.max_per_route,
        }
    }
}
