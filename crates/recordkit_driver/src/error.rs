//! Error types for driver operations.

use crate::value::DataType;
use std::io;
use thiserror::Error;

/// Result type for driver operations.
pub type DriverResult<T> = Result<T, DriverError>;

/// Errors raised by a database connection.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The SQLite library reported an error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// An I/O error occurred while opening the database.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A write would duplicate a value the database holds unique.
    #[error("unique constraint violated on {}: {message}", .columns.join(", "))]
    UniqueViolation {
        /// Columns covered by the violated constraint, without table prefix.
        columns: Vec<String>,
        /// Message reported by the database.
        message: String,
    },

    /// A statement handle was presented to a connection that did not issue it.
    #[error("unknown statement handle {statement} (connection {connection})")]
    UnknownStatement {
        /// The rejected handle.
        statement: String,
        /// Identity of the connection it was presented to.
        connection: u64,
    },

    /// A raw column value could not be converted to the declared type.
    #[error("cannot convert {found} to {expected}")]
    Conversion {
        /// The declared data type.
        expected: DataType,
        /// Description of the value found.
        found: String,
    },

    /// A value does not fit the storage representation.
    #[error("value out of range: {0}")]
    OutOfRange(String),

    /// The database returned a column type this layer does not model.
    #[error("unsupported column type {kind} in column {column}")]
    UnsupportedColumn {
        /// Column name.
        column: String,
        /// Storage class reported by the database.
        kind: &'static str,
    },

    /// The connection has been closed.
    #[error("connection is closed")]
    Closed,

    /// A failure injected by a test harness.
    #[error("injected failure: {0}")]
    Injected(String),
}

impl DriverError {
    /// Creates a conversion error.
    pub fn conversion(expected: DataType, found: impl Into<String>) -> Self {
        Self::Conversion {
            expected,
            found: found.into(),
        }
    }

    /// Classifies a SQLite error, separating unique-constraint violations
    /// from other failures.
    pub fn from_sqlite(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(failure, Some(message)) = &err {
            if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
            {
                return Self::UniqueViolation {
                    columns: constraint_columns(message),
                    message: message.clone(),
                };
            }
        }
        Self::Sqlite(err)
    }

    /// Creates an injected failure.
    pub fn injected(what: impl Into<String>) -> Self {
        Self::Injected(what.into())
    }
}

/// Parses `UNIQUE constraint failed: t.a, t.b` into `["a", "b"]`.
fn constraint_columns(message: &str) -> Vec<String> {
    message
        .split_once(": ")
        .map(|(_, columns)| {
            columns
                .split(", ")
                .map(|c| c.rsplit('.').next().unwrap_or(c).trim().to_string())
                .filter(|c| !c.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_columns_drop_table_prefix() {
        assert_eq!(
            constraint_columns("UNIQUE constraint failed: memberships.team_id, memberships.user_id"),
            vec!["team_id", "user_id"]
        );
        assert_eq!(constraint_columns("UNIQUE constraint failed: users.name"), vec!["name"]);
        assert!(constraint_columns("constraint failed").is_empty());
    }
}
