//! # RecordKit Driver
//!
//! Database handle trait, typed values and a SQLite implementation.
//!
//! This crate is the lowest layer of RecordKit. A [`Connection`] is an
//! **opaque executor**: it prepares query text, binds named values and
//! returns raw rows. It knows nothing about records, keys or caching.
//!
//! ## Design Principles
//!
//! - Every bound value is carried as a [`TypedField`] so the driver knows how
//!   to bind it
//! - Statement handles are scoped to the connection that issued them
//! - Rows come back raw; converting them to declared types is the caller's job
//!   ([`TypedField::coerce`])
//!
//! ## Available Drivers
//!
//! - [`SqliteFactory`] / [`SqliteConnection`] - SQLite via `rusqlite`
//!
//! ## Example
//!
//! ```rust
//! use recordkit_driver::{Binding, ConnectionFactory, DataType, SqliteFactory, TypedField, Value};
//!
//! let factory = SqliteFactory::shared_memory("doc_example").unwrap();
//! factory.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)").unwrap();
//!
//! let mut conn = factory.connect().unwrap();
//! let insert = conn.prepare("INSERT INTO t (name) VALUES (:name)").unwrap();
//! let name = TypedField::new(DataType::String, Value::from("A")).unwrap();
//! conn.execute(insert, &[Binding::new("name", name)]).unwrap();
//! assert_eq!(conn.last_insert_id().unwrap(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod connection;
mod error;
mod sqlite;
mod value;

pub use connection::{Connection, ConnectionFactory, StatementId};
pub use error::{DriverError, DriverResult};
pub use sqlite::{SqliteConnection, SqliteFactory, SqliteOptions};
pub use value::{Binding, DataType, Row, TypedField, Value, DATE_FORMAT, TIMESTAMP_FORMAT};
