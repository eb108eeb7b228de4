//! Records and their lifecycle.
//!
//! Lifecycle operations are methods on [`crate::TransactionSession`] taking
//! the table descriptor explicitly:
//!
//! ```rust
//! use recordkit_core::{field_values, Config, TableDescriptor, TransactionSession};
//! use recordkit_driver::{DataType, SqliteFactory, Value};
//! use std::sync::Arc;
//!
//! let factory = SqliteFactory::shared_memory("record_doc").unwrap();
//! factory
//!     .execute_batch(
//!         "CREATE TABLE users (
//!             id INTEGER PRIMARY KEY AUTOINCREMENT,
//!             created TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
//!             last_updated TIMESTAMP,
//!             name TEXT NOT NULL
//!         );",
//!     )
//!     .unwrap();
//! let users = TableDescriptor::builder("users")
//!     .field("name", DataType::String)
//!     .unique_key("name")
//!     .build()
//!     .unwrap();
//!
//! let mut session = TransactionSession::new(Arc::new(factory), Config::default());
//! let inserted = session.insert(&users, &field_values([("name", "A")])).unwrap();
//! let fetched = session.fetch_by_key(&users, "name", "A").unwrap().unwrap();
//! assert_eq!(fetched.id(), inserted.id());
//! assert_eq!(fetched.get("name"), Some(&Value::from("A")));
//! ```

mod hooks;
mod instance;
mod lifecycle;

pub use hooks::{Candidate, NoHooks, RecordHooks};
pub use instance::Record;
