//! Transaction session.

use crate::asset::{Asset, AssetReport};
use crate::config::Config;
use crate::error::{AssetError, RecordError, RecordResult};
use crate::statement::{QueryShape, StatementKind};
use crate::transaction::state::LiveTransaction;
use parking_lot::Mutex;
use recordkit_driver::{Binding, ConnectionFactory, Row, StatementId};
use std::fmt;
use std::sync::Arc;

/// A session shared between execution contexts.
///
/// Every piece of mutable session state sits behind the one mutex, so a
/// caller holding the guard owns the physical transaction exclusively.
pub type SharedSession = Arc<Mutex<TransactionSession>>;

/// Result of [`TransactionSession::end_transaction`].
#[derive(Debug)]
pub enum CommitOutcome {
    /// An inner level was closed; the physical transaction is still open.
    Nested,
    /// The outermost level was closed and the physical transaction
    /// committed. Carries the result of the post-commit asset removals.
    Committed(AssetReport),
}

impl CommitOutcome {
    /// Returns true if this call committed the physical transaction.
    #[must_use]
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed(_))
    }
}

/// Coordinates one physical transaction across nested logical requests.
///
/// The session is either **closed** (depth 0, no connection) or **open**
/// (depth > 0, one live connection with its statement cache and asset
/// queue). Nested [`begin_transaction`](Self::begin_transaction) calls only
/// count; the physical commit happens when the outermost level ends.
///
/// ```rust
/// use recordkit_core::{Config, TransactionSession};
/// use recordkit_driver::SqliteFactory;
/// use std::sync::Arc;
///
/// let factory = Arc::new(SqliteFactory::shared_memory("session_doc").unwrap());
/// let mut session = TransactionSession::new(factory, Config::default());
///
/// session.begin_transaction().unwrap();
/// session.begin_transaction().unwrap();
/// assert_eq!(session.depth(), 2);
///
/// assert!(!session.end_transaction().unwrap().is_committed());
/// assert!(session.end_transaction().unwrap().is_committed());
/// assert!(!session.is_open());
/// ```
pub struct TransactionSession {
    factory: Arc<dyn ConnectionFactory>,
    config: Config,
    depth: usize,
    /// Present iff `depth > 0`.
    live: Option<LiveTransaction>,
    asset_failures: Vec<AssetError>,
}

impl TransactionSession {
    /// Creates a closed session drawing connections from `factory`.
    pub fn new(factory: Arc<dyn ConnectionFactory>, config: Config) -> Self {
        Self {
            factory,
            config,
            depth: 0,
            live: None,
            asset_failures: Vec::new(),
        }
    }

    /// Wraps the session for use from several execution contexts.
    #[must_use]
    pub fn into_shared(self) -> SharedSession {
        Arc::new(Mutex::new(self))
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current nesting depth; 0 when closed.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Returns true while a physical transaction is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.live.is_some()
    }

    /// Returns true if an inner failure doomed the open transaction.
    #[must_use]
    pub fn is_rollback_only(&self) -> bool {
        self.live
            .as_ref()
            .is_some_and(|live| live.rollback_only.is_some())
    }

    /// Number of statements prepared on the live connection.
    #[must_use]
    pub fn statement_cache_len(&self) -> usize {
        self.live.as_ref().map_or(0, |live| live.statements.len())
    }

    /// Number of asset removals queued on the open transaction.
    #[must_use]
    pub fn pending_assets(&self) -> usize {
        self.live.as_ref().map_or(0, |live| live.assets.len())
    }

    /// Takes the asset failures of commits whose outcome was not returned
    /// to the caller, i.e. those closed by
    /// [`with_transaction`](Self::with_transaction).
    pub fn take_asset_failures(&mut self) -> Vec<AssetError> {
        std::mem::take(&mut self.asset_failures)
    }

    /// Opens one logical transaction level.
    ///
    /// At depth 0 this connects and begins a physical transaction; at any
    /// other depth it only increments the counter.
    ///
    /// # Errors
    ///
    /// Returns the driver error if connecting or beginning fails. The
    /// session stays closed in that case.
    pub fn begin_transaction(&mut self) -> RecordResult<()> {
        if self.depth > 0 {
            self.depth += 1;
            tracing::trace!(depth = self.depth, "nested transaction level");
            return Ok(());
        }

        let mut conn = self.factory.connect()?;
        let connection = conn.id();
        if let Err(e) = conn.begin() {
            if let Err(close) = conn.close() {
                tracing::warn!(connection, error = %close, "closing connection after failed begin");
            }
            return Err(e.into());
        }
        tracing::debug!(connection, "transaction started");
        self.live = Some(LiveTransaction::new(conn));
        self.depth = 1;
        Ok(())
    }

    /// Closes one logical transaction level.
    ///
    /// When the outermost level closes, the physical transaction commits,
    /// the connection is released, queued assets are removed, and every
    /// cached statement is discarded.
    ///
    /// # Errors
    ///
    /// - [`RecordError::UnmatchedEnd`] if no transaction is open
    /// - [`RecordError::TransactionAborted`] if an inner failure marked the
    ///   transaction rollback-only; it was rolled back
    /// - [`RecordError::CommitFailed`] if the commit failed; the transaction
    ///   was rolled back and its queued assets discarded
    pub fn end_transaction(&mut self) -> RecordResult<CommitOutcome> {
        if self.depth == 0 {
            return Err(RecordError::UnmatchedEnd);
        }
        if self.depth > 1 {
            self.depth -= 1;
            tracing::trace!(depth = self.depth, "nested transaction level closed");
            return Ok(CommitOutcome::Nested);
        }

        self.depth = 0;
        let Some(mut live) = self.live.take() else {
            return Err(RecordError::invalid_state(
                "transaction depth was positive without a live connection",
            ));
        };

        if let Some(reason) = live.rollback_only.take() {
            tracing::warn!(reason = %reason, "rolling back transaction marked rollback-only");
            if let Err(e) = live.discard() {
                tracing::warn!(error = %e, "rollback of aborted transaction failed");
            }
            return Err(RecordError::TransactionAborted { reason });
        }

        let connection = live.conn.id();
        if let Err(source) = live.conn.commit() {
            tracing::warn!(connection, error = %source, "commit failed, rolling back");
            if let Err(e) = live.discard() {
                tracing::warn!(connection, error = %e, "rollback after failed commit failed");
            }
            return Err(RecordError::CommitFailed { source });
        }
        tracing::debug!(connection, "transaction committed");

        let LiveTransaction {
            conn,
            statements,
            assets,
            ..
        } = live;
        if let Err(e) = conn.close() {
            tracing::warn!(connection, error = %e, "closing connection after commit failed");
        }
        let report = assets.run(self.config.asset_root.as_deref());
        tracing::trace!(
            connection,
            statements = statements.len(),
            hits = statements.hits(),
            "statement cache discarded"
        );
        drop(statements);
        Ok(CommitOutcome::Committed(report))
    }

    /// Closes one logical transaction level after `err` made its scope fail.
    ///
    /// At the outermost level the physical transaction is rolled back. At
    /// an inner level the counter is decremented and, if `err` poisons the
    /// transaction, the session is marked rollback-only so the outermost
    /// end rolls back instead of committing.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::UnmatchedEnd`] if no transaction is open, or
    /// the driver error if the rollback fails (the connection is released
    /// regardless).
    pub fn abort_transaction(&mut self, err: &RecordError) -> RecordResult<()> {
        if self.depth == 0 {
            return Err(RecordError::UnmatchedEnd);
        }
        if self.depth > 1 {
            self.depth -= 1;
            if err.poisons_transaction() {
                if let Some(live) = self.live.as_mut() {
                    if live.rollback_only.is_none() {
                        tracing::warn!(depth = self.depth, error = %err, "transaction marked rollback-only");
                        live.rollback_only = Some(err.to_string());
                    }
                }
            }
            return Ok(());
        }

        self.depth = 0;
        match self.live.take() {
            Some(live) => {
                tracing::debug!(error = %err, "aborting transaction");
                live.discard()?;
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Runs `f` inside one logical transaction level.
    ///
    /// The level is closed on every exit path: ended on success, aborted on
    /// failure. If this call opened the physical transaction it also
    /// commits or rolls it back.
    ///
    /// # Errors
    ///
    /// Returns the error of `f`, or the error of opening or closing the
    /// transaction.
    pub fn with_transaction<T, F>(&mut self, f: F) -> RecordResult<T>
    where
        F: FnOnce(&mut Self) -> RecordResult<T>,
    {
        self.begin_transaction()?;
        match f(self) {
            Ok(value) => {
                if let CommitOutcome::Committed(report) = self.end_transaction()? {
                    self.asset_failures.extend(report.failures);
                }
                Ok(value)
            }
            Err(err) => {
                if let Err(abort) = self.abort_transaction(&err) {
                    tracing::warn!(error = %abort, "abort after failed operation failed");
                }
                Err(err)
            }
        }
    }

    fn live_mut(&mut self) -> RecordResult<&mut LiveTransaction> {
        let live = self
            .live
            .as_mut()
            .ok_or_else(|| RecordError::invalid_state("no transaction is open"))?;
        if let Some(reason) = &live.rollback_only {
            return Err(RecordError::transaction_aborted(reason.clone()));
        }
        Ok(live)
    }

    /// Returns the prepared statement for `(kind, table, shape)`, generating
    /// and preparing it with `build` on a miss.
    pub(crate) fn statement<F>(
        &mut self,
        kind: StatementKind,
        table: &str,
        shape: &QueryShape,
        build: F,
    ) -> RecordResult<StatementId>
    where
        F: FnOnce() -> String,
    {
        let cache_statements = self.config.cache_statements;
        let log_statements = self.config.log_statements;
        let live = self.live_mut()?;
        let build = || {
            let sql = build();
            if log_statements {
                tracing::trace!(%kind, table, sql = %sql, "generated statement");
            }
            sql
        };
        if !cache_statements {
            return Ok(live.conn.prepare(&build())?);
        }
        Ok(live
            .statements
            .get_or_prepare(live.conn.as_mut(), kind, table, shape, build)?)
    }

    pub(crate) fn execute(
        &mut self,
        statement: StatementId,
        bindings: &[Binding],
    ) -> RecordResult<Vec<Row>> {
        let live = self.live_mut()?;
        Ok(live.conn.execute(statement, bindings)?)
    }

    pub(crate) fn last_insert_id(&mut self) -> RecordResult<i64> {
        let live = self.live_mut()?;
        Ok(live.conn.last_insert_id()?)
    }

    pub(crate) fn schedule_asset(&mut self, asset: Asset) -> RecordResult<()> {
        let live = self.live_mut()?;
        tracing::trace!(path = %asset.path().display(), "asset removal scheduled");
        live.assets.schedule(asset);
        Ok(())
    }

    /// Fails fast if the open transaction can no longer commit.
    pub(crate) fn ensure_usable(&mut self) -> RecordResult<()> {
        self.live_mut().map(|_| ())
    }
}

impl Drop for TransactionSession {
    fn drop(&mut self) {
        if let Some(live) = self.live.take() {
            tracing::warn!(depth = self.depth, "session dropped with open transaction, rolling back");
            if let Err(err) = live.discard() {
                tracing::warn!(error = %err, "rollback on drop failed");
            }
        }
    }
}

impl fmt::Debug for TransactionSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionSession")
            .field("config", &self.config)
            .field("depth", &self.depth)
            .field("live", &self.live)
            .field("asset_failures", &self.asset_failures.len())
            .finish_non_exhaustive()
    }
}
