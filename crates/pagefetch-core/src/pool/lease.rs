//! RAII lease on a pooled connection.

use super::{ConnectionPool, PooledConnection, RouteKey};

/// Exclusive use of one pooled connection.
///
/// Dropping a lease without calling [`Lease::release`] aborts the connection:
/// it is closed instead of being returned, since its transfer may have been
/// cut off mid-response.
pub struct Lease<'a> {
    // Declared first so an abandoned connection is closed before the ticket
    // gives its slot back.
    conn: PooledConnection,
    ticket: Ticket<'a>,
}

/// Gives the leased slot back to the pool when dropped.
struct Ticket<'a> {
    pool: &'a ConnectionPool,
    route: RouteKey,
    reusable: Option<PooledConnection>,
}

impl Drop for Ticket<'_> {
    fn drop(&mut self) {
        self.pool.check_in(&self.route, self.reusable.take());
    }
}

impl<'a> Lease<'a> {
    pub(super) fn new(pool: &'a ConnectionPool, route: RouteKey, conn: PooledConnection) -> Self {
        Self {
            conn,
            ticket: Ticket {
                pool,
                route,
                reusable: None,
            },
        }
    }

    pub fn route(&self) -> &RouteKey {
        &self.ticket.route
    }

    pub(crate) fn connection_mut(&mut self) -> &mut PooledConnection {
        &mut self.conn
    }

    /// Returns the connection to the pool for reuse. Only call after the
    /// response was read to its end.
    pub fn release(self) {
        let Lease { conn, mut ticket } = self;
        ticket.reusable = Some(conn);
    }

    /// Closes the connection and frees its slot.
    pub fn abort(self) {
        tracing::debug!(route = %self.ticket.route, "aborting pooled connection");
    }
}
