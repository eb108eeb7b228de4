//! Database handle trait definitions.

use crate::error::DriverResult;
use crate::value::{Binding, Row};
use std::fmt;

/// Opaque handle to a statement prepared on one connection.
///
/// A handle is only meaningful to the connection that issued it. It becomes
/// invalid when that connection closes; presenting it to any other
/// connection fails with [`crate::DriverError::UnknownStatement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatementId {
    connection: u64,
    index: u32,
}

impl StatementId {
    /// Creates a handle. Only drivers should call this.
    #[must_use]
    pub const fn new(connection: u64, index: u32) -> Self {
        Self { connection, index }
    }

    /// Identity of the issuing connection.
    #[must_use]
    pub const fn connection(self) -> u64 {
        self.connection
    }

    /// Position of the statement within its connection.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }
}

impl fmt::Display for StatementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stmt:{}.{}", self.connection, self.index)
    }
}

/// A live connection to a relational database.
///
/// Connections are **opaque executors**: they run query text handed to them
/// and bind named values. They know nothing about records, keys or caching.
///
/// # Invariants
///
/// - Query text uses named placeholders (`:name`) for every bound value
/// - `execute` binds exactly the supplied bindings
/// - Statement handles never outlive the connection that issued them
///
/// # Implementors
///
/// - [`crate::SqliteConnection`]
pub trait Connection: Send {
    /// Identity of this connection, unique within the process.
    fn id(&self) -> u64;

    /// Opens a physical transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if a transaction is already open or the database
    /// refuses to start one.
    fn begin(&mut self) -> DriverResult<()>;

    /// Commits the open physical transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails. The transaction may still be
    /// open afterwards and should be rolled back.
    fn commit(&mut self) -> DriverResult<()>;

    /// Rolls back the open physical transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the rollback fails.
    fn rollback(&mut self) -> DriverResult<()>;

    /// Prepares query text, returning a handle for later execution.
    ///
    /// # Errors
    ///
    /// Returns an error if the query text does not compile.
    fn prepare(&mut self, sql: &str) -> DriverResult<StatementId>;

    /// Executes a prepared statement with the given bindings.
    ///
    /// Returns every row produced; statements that produce no rows return
    /// an empty vector.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is unknown, a binding cannot be
    /// converted, or execution fails.
    fn execute(&mut self, statement: StatementId, bindings: &[Binding]) -> DriverResult<Vec<Row>>;

    /// Returns the identity generated by the most recent insert.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is closed.
    fn last_insert_id(&self) -> DriverResult<i64>;

    /// Closes the connection, invalidating every statement handle it issued.
    ///
    /// # Errors
    ///
    /// Returns an error if the database reports a failure while closing.
    fn close(self: Box<Self>) -> DriverResult<()>;
}

/// Source of new connections.
pub trait ConnectionFactory: Send + Sync {
    /// Opens a new connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be reached.
    fn connect(&self) -> DriverResult<Box<dyn Connection>>;
}

impl<F: ConnectionFactory + ?Sized> ConnectionFactory for std::sync::Arc<F> {
    fn connect(&self) -> DriverResult<Box<dyn Connection>> {
        (**self).connect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statement_id_display() {
        let id = StatementId::new(3, 7);
        assert_eq!(id.to_string(), "stmt:3.7");
        assert_eq!(id.connection(), 3);
        assert_eq!(id.index(), 7);
    }

    #[test]
    fn statement_ids_differ_across_connections() {
        assert_ne!(StatementId::new(1, 0), StatementId::new(2, 0));
    }
}
