//! State of an open physical transaction.

use crate::asset::AssetQueue;
use crate::statement::StatementCache;
use recordkit_driver::Connection;

/// Everything that exists only while a physical transaction is open.
///
/// The statement cache and the asset queue are bound to the connection:
/// they are created with it and dropped with it.
pub(crate) struct LiveTransaction {
    pub(crate) conn: Box<dyn Connection>,
    pub(crate) statements: StatementCache,
    pub(crate) assets: AssetQueue,
    /// Set when a nested scope failed in a way that forbids committing.
    pub(crate) rollback_only: Option<String>,
}

impl LiveTransaction {
    pub(crate) fn new(conn: Box<dyn Connection>) -> Self {
        Self {
            conn,
            statements: StatementCache::new(),
            assets: AssetQueue::new(),
            rollback_only: None,
        }
    }

    /// Rolls back and closes the connection, discarding queued assets.
    ///
    /// Failures are logged; the connection is gone either way.
    pub(crate) fn discard(self) -> recordkit_driver::DriverResult<()> {
        let Self {
            mut conn,
            statements,
            assets,
            ..
        } = self;
        let connection = conn.id();
        if !assets.is_empty() {
            tracing::debug!(
                connection,
                discarded = assets.len(),
                "asset removals discarded with rolled back transaction"
            );
        }
        drop(assets);
        drop(statements);

        let rolled_back = conn.rollback();
        if let Err(e) = &rolled_back {
            tracing::warn!(connection, error = %e, "rollback failed");
        } else {
            tracing::debug!(connection, "transaction rolled back");
        }
        if let Err(e) = conn.close() {
            tracing::warn!(connection, error = %e, "closing connection after rollback failed");
        }
        rolled_back
    }
}

impl std::fmt::Debug for LiveTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveTransaction")
            .field("connection", &self.conn.id())
            .field("statements", &self.statements.len())
            .field("assets", &self.assets.len())
            .field("rollback_only", &self.rollback_only)
            .finish()
    }
}
