//! # RecordKit Testkit
//!
//! Test utilities for RecordKit.
//!
//! This crate provides:
//! - SQLite test databases in temporary directories
//! - A connection wrapper that counts driver calls and injects failures
//! - Property-based test generators using proptest
//! - Test logging setup
//!
//! ## Usage
//!
//! ```rust
//! use recordkit_testkit::prelude::*;
//!
//! let db = TestDatabase::with_schema(&record_table_ddl("users", &[("name", "TEXT")]));
//! let factory = InstrumentedFactory::new(db.factory());
//! let probe = factory.probe();
//! assert_eq!(probe.begins(), 0);
//! assert_eq!(db.row_count("users"), 0);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod instrumented;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::init_tracing;
    pub use crate::instrumented::*;
}

pub use fixtures::*;
pub use generators::*;
pub use instrumented::*;

/// Installs a `tracing` subscriber for tests.
///
/// The filter is read from `RUST_LOG` and defaults to `warn`. Calling this
/// more than once is harmless.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
