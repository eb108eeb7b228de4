//! Test fixtures and database helpers.
//!
//! Provides SQLite databases in temporary directories, laid out the way the
//! lifecycle engine expects: every record table carries `id`, `created` and
//! `last_updated` ahead of its own columns.

use crate::instrumented::InstrumentedFactory;
use recordkit_driver::SqliteFactory;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// A file-backed SQLite database with automatic cleanup.
pub struct TestDatabase {
    factory: Arc<SqliteFactory>,
    path: PathBuf,
    /// The temporary directory (kept alive to prevent cleanup).
    temp_dir: TempDir,
}

impl TestDatabase {
    /// Creates an empty database.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("test.db");
        let factory = SqliteFactory::open(&path).expect("Failed to open SQLite database");
        Self {
            factory: Arc::new(factory),
            path,
            temp_dir,
        }
    }

    /// Creates a database and runs `ddl` against it.
    pub fn with_schema(ddl: &str) -> Self {
        let db = Self::new();
        db.execute_batch(ddl);
        db
    }

    /// The connection factory.
    pub fn factory(&self) -> Arc<SqliteFactory> {
        Arc::clone(&self.factory)
    }

    /// A counting factory over this database.
    pub fn instrumented(&self) -> InstrumentedFactory<Arc<SqliteFactory>> {
        InstrumentedFactory::new(self.factory())
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The temporary directory holding the database.
    pub fn dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Creates (if needed) and returns a directory for asset files.
    pub fn asset_dir(&self) -> PathBuf {
        let dir = self.temp_dir.path().join("assets");
        std::fs::create_dir_all(&dir).expect("Failed to create asset directory");
        dir
    }

    /// Runs SQL outside any session.
    pub fn execute_batch(&self, sql: &str) {
        self.factory
            .execute_batch(sql)
            .expect("Failed to execute SQL batch");
    }

    /// Counts rows of `table` through a separate raw connection.
    pub fn row_count(&self, table: &str) -> i64 {
        let conn = rusqlite::Connection::open(&self.path).expect("Failed to open database");
        conn.query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |row| {
            row.get(0)
        })
        .expect("Failed to count rows")
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}

/// DDL for a record table: the reserved parent columns followed by
/// `columns` as `(name, SQL type)` pairs.
///
/// No uniqueness constraints are declared; uniqueness is left to the
/// record type.
pub fn record_table_ddl(table: &str, columns: &[(&str, &str)]) -> String {
    let mut ddl = format!(
        "CREATE TABLE \"{table}\" (\n    \"id\" INTEGER PRIMARY KEY AUTOINCREMENT,\n    \"created\" TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,\n    \"last_updated\" TIMESTAMP"
    );
    for (name, sql_type) in columns {
        ddl.push_str(&format!(",\n    \"{name}\" {sql_type}"));
    }
    ddl.push_str("\n);");
    ddl
}

/// Writes a small file under `dir` and returns its path.
pub fn write_asset(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, name.as_bytes()).expect("Failed to write asset");
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_table_has_parent_columns() {
        let db = TestDatabase::with_schema(&record_table_ddl("users", &[("name", "TEXT")]));
        db.execute_batch("INSERT INTO users (name) VALUES ('A');");
        assert_eq!(db.row_count("users"), 1);
    }

    #[test]
    fn asset_dir_exists() {
        let db = TestDatabase::new();
        let path = write_asset(&db.asset_dir(), "a.txt");
        assert!(path.exists());
        assert!(path.starts_with(db.dir()));
    }
}
