//! Transaction coordination.
//!
//! A [`TransactionSession`] owns at most one physical transaction and
//! reference-counts the logical transactions requested on top of it:
//! - **Nesting**: inner begin/end pairs never touch the connection
//! - **Implicit transactions**: lifecycle calls open and close their own
//!   level through [`TransactionSession::with_transaction`]
//! - **Rollback-only**: a poisoning failure in an inner level dooms the
//!   physical transaction instead of committing half of it

mod session;
mod state;

pub use session::{CommitOutcome, SharedSession, TransactionSession};
