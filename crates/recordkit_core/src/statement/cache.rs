//! Prepared-statement cache.

use crate::statement::StatementKind;
use recordkit_driver::{Connection, DriverResult, StatementId};
use std::collections::HashMap;

/// The literal shape of a parameterized query: the ordered field names it
/// matches on. Empty for statements with a fixed shape per table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct QueryShape(Vec<String>);

impl QueryShape {
    /// Shape of a statement that depends only on the table.
    #[must_use]
    pub fn table() -> Self {
        Self(Vec::new())
    }

    /// Shape of a statement matching `fields` in the given order.
    pub fn of<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(fields.into_iter().map(Into::into).collect())
    }

    /// Field names of the shape.
    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.0
    }
}

/// Prepared statements of one connection, keyed by operation category,
/// table and query shape.
///
/// Handles are only valid on the connection they were prepared against, so
/// a cache lives and dies with its connection. It is never carried over to
/// a new one.
#[derive(Debug, Default)]
pub struct StatementCache {
    entries: HashMap<StatementKind, HashMap<String, HashMap<QueryShape, StatementId>>>,
    hits: u64,
    misses: u64,
}

impl StatementCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a cached handle.
    #[must_use]
    pub fn get(&self, kind: StatementKind, table: &str, shape: &QueryShape) -> Option<StatementId> {
        self.entries
            .get(&kind)
            .and_then(|tables| tables.get(table))
            .and_then(|shapes| shapes.get(shape))
            .copied()
    }

    /// Stores a handle.
    pub fn insert(
        &mut self,
        kind: StatementKind,
        table: &str,
        shape: QueryShape,
        statement: StatementId,
    ) {
        self.entries
            .entry(kind)
            .or_default()
            .entry(table.to_string())
            .or_default()
            .insert(shape, statement);
    }

    /// Returns the cached handle, or generates the query text with `build`,
    /// prepares it on `conn` and caches the result.
    ///
    /// # Errors
    ///
    /// Returns the driver error if preparation fails; nothing is cached.
    pub fn get_or_prepare<F>(
        &mut self,
        conn: &mut dyn Connection,
        kind: StatementKind,
        table: &str,
        shape: &QueryShape,
        build: F,
    ) -> DriverResult<StatementId>
    where
        F: FnOnce() -> String,
    {
        if let Some(statement) = self.get(kind, table, shape) {
            self.hits += 1;
            tracing::trace!(%kind, table, %statement, "statement cache hit");
            return Ok(statement);
        }
        let sql = build();
        let statement = conn.prepare(&sql)?;
        self.misses += 1;
        tracing::trace!(%kind, table, %statement, "statement prepared");
        self.insert(kind, table, shape.clone(), statement);
        Ok(statement)
    }

    /// Number of cached statements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .values()
            .flat_map(HashMap::values)
            .map(HashMap::len)
            .sum()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of lookups served from the cache.
    #[must_use]
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Number of statements prepared.
    #[must_use]
    pub fn misses(&self) -> u64 {
        self.misses
    }

    /// Discards every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
