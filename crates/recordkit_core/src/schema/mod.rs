//! Table descriptors and lookup keys.
//!
//! Every record type is described by a [`TableDescriptor`]: its table name,
//! its table-specific fields with their data types, and the key sets whose
//! combined values are unique per row. Descriptors are passed explicitly to
//! lifecycle operations; nothing is resolved from the Rust type at runtime.

mod descriptor;
mod key;

pub use descriptor::{is_identifier, FieldSpec, TableBuilder, TableDescriptor, TableSchema};
pub use key::{is_valid_key, KeySet};
