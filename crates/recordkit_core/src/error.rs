//! Error types for RecordKit core.

use recordkit_driver::{DataType, DriverError};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for core operations.
pub type RecordResult<T> = Result<T, RecordError>;

/// Errors that can occur in record and transaction operations.
#[derive(Debug, Error)]
pub enum RecordError {
    /// The connection layer failed.
    #[error("driver error: {0}")]
    Driver(#[from] DriverError),

    /// Committing the physical transaction failed; it was rolled back.
    #[error("commit failed, transaction rolled back: {source}")]
    CommitFailed {
        /// The underlying failure.
        source: DriverError,
    },

    /// The transaction was marked rollback-only by an earlier failure.
    #[error("transaction aborted: {reason}")]
    TransactionAborted {
        /// Reason for abort.
        reason: String,
    },

    /// `end_transaction` was called with no transaction open.
    #[error("end_transaction called without a matching begin_transaction")]
    UnmatchedEnd,

    /// The field set is neither the identity nor a declared key set.
    #[error("invalid key for table {table}: {fields:?}")]
    InvalidKey {
        /// Table name.
        table: String,
        /// Field names that were offered.
        fields: Vec<String>,
    },

    /// A field name is not declared by the table.
    #[error("unknown field {field} on table {table}")]
    UnknownField {
        /// Table name.
        table: String,
        /// The undeclared field.
        field: String,
    },

    /// An insert supplied a server-managed parent field.
    #[error("field {field} of table {table} is server-managed and cannot be inserted")]
    ParentFieldInInsert {
        /// Table name.
        table: String,
        /// The parent field.
        field: String,
    },

    /// A fetch was requested with no criteria.
    #[error("fetch on table {table} requires at least one criterion")]
    EmptyCriteria {
        /// Table name.
        table: String,
    },

    /// A value does not match the declared data type of its field.
    #[error("field {field} of table {table} expects {expected}, got {found}")]
    TypeMismatch {
        /// Table name.
        table: String,
        /// Field name.
        field: String,
        /// Declared type.
        expected: DataType,
        /// Description of the offending value.
        found: String,
    },

    /// Operation not permitted in the record's current state.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of why the operation is invalid.
        message: String,
    },

    /// A table descriptor is malformed.
    #[error("invalid schema: {message}")]
    Schema {
        /// Description of the problem.
        message: String,
    },

    /// A record with the same key value already exists.
    #[error("duplicate {key} = {value} in table {table}")]
    Duplicate {
        /// Table name.
        table: String,
        /// Key field(s).
        key: String,
        /// Offending value(s).
        value: String,
    },

    /// A lookup by a unique key returned more than one row.
    #[error("uniqueness violated in table {table}: {key} matched {rows} rows")]
    UniquenessViolated {
        /// Table name.
        table: String,
        /// Key and value description.
        key: String,
        /// Number of rows returned.
        rows: usize,
    },

    /// A row expected to exist is gone.
    #[error("row {id} missing from table {table}")]
    RowMissing {
        /// Table name.
        table: String,
        /// Row identity.
        id: i64,
    },

    /// A record type's validation hook rejected the record.
    #[error("validation failed for table {table}: {message}")]
    Validation {
        /// Table name.
        table: String,
        /// Description of the failure.
        message: String,
    },
}

impl RecordError {
    /// Creates an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Creates a schema error.
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    /// Creates a transaction aborted error.
    pub fn transaction_aborted(reason: impl Into<String>) -> Self {
        Self::TransactionAborted {
            reason: reason.into(),
        }
    }

    /// Creates a validation error.
    pub fn validation(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Returns true for caller mistakes detected before any statement ran.
    #[must_use]
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::UnmatchedEnd
                | Self::InvalidKey { .. }
                | Self::UnknownField { .. }
                | Self::ParentFieldInInsert { .. }
                | Self::EmptyCriteria { .. }
                | Self::TypeMismatch { .. }
                | Self::InvalidState { .. }
                | Self::Schema { .. }
        )
    }

    /// Returns true if the failure leaves the physical transaction in a state
    /// that must not be committed.
    ///
    /// Precondition and validation failures happen before anything is
    /// written and leave an enclosing transaction usable.
    #[must_use]
    pub fn poisons_transaction(&self) -> bool {
        !(self.is_precondition()
            || matches!(self, Self::Validation { .. } | Self::Duplicate { .. }))
    }
}

/// Failure to remove an external asset after commit.
///
/// Never fatal: the database transaction that scheduled the removal has
/// already been committed.
#[derive(Debug, Error)]
pub enum AssetError {
    /// The asset no longer exists.
    #[error("asset missing: {}", path.display())]
    Missing {
        /// Resolved path.
        path: PathBuf,
    },

    /// The asset exists but could not be removed.
    #[error("asset not removable: {}: {source}", path.display())]
    NotRemovable {
        /// Resolved path.
        path: PathBuf,
        /// The I/O failure.
        source: io::Error,
    },
}

impl AssetError {
    /// Returns the path of the asset.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::Missing { path } | Self::NotRemovable { path, .. } => path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preconditions_do_not_poison() {
        let err = RecordError::InvalidKey {
            table: "users".into(),
            fields: vec!["email".into()],
        };
        assert!(err.is_precondition());
        assert!(!err.poisons_transaction());
    }

    #[test]
    fn driver_failures_poison() {
        let err = RecordError::from(DriverError::Closed);
        assert!(!err.is_precondition());
        assert!(err.poisons_transaction());
    }

    #[test]
    fn uniqueness_violation_poisons() {
        let err = RecordError::UniquenessViolated {
            table: "users".into(),
            key: "name = \"A\"".into(),
            rows: 2,
        };
        assert!(err.poisons_transaction());
    }

    #[test]
    fn duplicate_is_recoverable() {
        let err = RecordError::Duplicate {
            table: "users".into(),
            key: "name".into(),
            value: "\"A\"".into(),
        };
        assert!(!err.poisons_transaction());
        assert_eq!(err.to_string(), "duplicate name = \"A\" in table users");
    }
}
