//! # RecordKit Core
//!
//! Record lifecycle and transaction coordination engine for RecordKit.
//!
//! This crate provides:
//! - Table descriptors and key validation
//! - A transaction session that coalesces nested transactions into one
//!   physical transaction
//! - Per-connection prepared-statement caching
//! - Record fetch, insert, save and delete
//! - Deferred removal of external assets after commit
//!
//! ## Example
//!
//! ```rust
//! use recordkit_core::{field_values, Config, TableDescriptor, TransactionSession};
//! use recordkit_driver::{DataType, SqliteFactory};
//! use std::sync::Arc;
//!
//! let factory = SqliteFactory::shared_memory("core_doc").unwrap();
//! factory
//!     .execute_batch(
//!         "CREATE TABLE notes (
//!             id INTEGER PRIMARY KEY AUTOINCREMENT,
//!             created TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
//!             last_updated TIMESTAMP,
//!             body TEXT
//!         );",
//!     )
//!     .unwrap();
//! let notes = TableDescriptor::builder("notes")
//!     .field("body", DataType::String)
//!     .build()
//!     .unwrap();
//!
//! let mut session = TransactionSession::new(Arc::new(factory), Config::default());
//! session
//!     .with_transaction(|s| {
//!         s.insert(&notes, &field_values([("body", "first")]))?;
//!         s.insert(&notes, &field_values([("body", "second")]))?;
//!         Ok(())
//!     })
//!     .unwrap();
//! assert_eq!(session.count(&notes).unwrap(), 2);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod asset;
mod config;
mod error;
mod record;
mod schema;
mod statement;
mod transaction;
mod types;

pub use asset::{Asset, AssetQueue, AssetReport};
pub use config::Config;
pub use error::{AssetError, RecordError, RecordResult};
pub use record::{Candidate, NoHooks, Record, RecordHooks};
pub use schema::{is_identifier, is_valid_key, FieldSpec, KeySet, TableBuilder, TableDescriptor, TableSchema};
pub use statement::{query, QueryShape, StatementCache, StatementKind};
pub use transaction::{CommitOutcome, SharedSession, TransactionSession};
pub use types::{
    field_values, is_parent_field, FieldValues, RecordId, CREATED_FIELD, ID_FIELD,
    LAST_UPDATED_FIELD, PARENT_FIELDS,
};
