//! Statement generation and caching.

mod cache;
pub mod query;

pub use cache::{QueryShape, StatementCache};
pub use query::StatementKind;
