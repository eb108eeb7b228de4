//! SQLite driver built on `rusqlite`.

use crate::connection::{Connection, ConnectionFactory, StatementId};
use crate::error::{DriverError, DriverResult};
use crate::value::{Binding, DataType, Row, Value, DATE_FORMAT, TIMESTAMP_FORMAT};
use parking_lot::Mutex;
use rusqlite::types::{ToSql, Value as SqlValue, ValueRef};
use rusqlite::OpenFlags;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Options applied to every SQLite connection a factory opens.
#[derive(Debug, Clone)]
pub struct SqliteOptions {
    /// How long to wait on a locked database before failing.
    pub busy_timeout: Duration,

    /// Whether to enforce foreign key constraints.
    pub foreign_keys: bool,

    /// Capacity of rusqlite's own compiled-statement cache.
    pub statement_cache_capacity: usize,
}

impl Default for SqliteOptions {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_secs(5),
            foreign_keys: true,
            statement_cache_capacity: 64,
        }
    }
}

impl SqliteOptions {
    /// Creates options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the busy timeout.
    #[must_use]
    pub const fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Sets foreign key enforcement.
    #[must_use]
    pub const fn foreign_keys(mut self, value: bool) -> Self {
        self.foreign_keys = value;
        self
    }

    /// Sets the compiled-statement cache capacity.
    #[must_use]
    pub const fn statement_cache_capacity(mut self, capacity: usize) -> Self {
        self.statement_cache_capacity = capacity;
        self
    }
}

#[derive(Debug)]
enum Location {
    File(PathBuf),
    SharedMemory(String),
}

/// Opens connections to one SQLite database.
///
/// # Example
///
/// ```no_run
/// use recordkit_driver::{ConnectionFactory, SqliteFactory};
/// use std::path::Path;
///
/// let factory = SqliteFactory::open(Path::new("app.db")).unwrap();
/// factory.execute_batch("CREATE TABLE IF NOT EXISTS t (id INTEGER PRIMARY KEY)").unwrap();
/// let conn = factory.connect().unwrap();
/// conn.close().unwrap();
/// ```
#[derive(Debug)]
pub struct SqliteFactory {
    location: Location,
    options: SqliteOptions,
    /// Keeps a shared in-memory database alive between connections.
    anchor: Mutex<Option<rusqlite::Connection>>,
}

impl SqliteFactory {
    /// Creates a factory for the database file at `path`, creating parent
    /// directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created.
    pub fn open(path: &Path) -> DriverResult<Self> {
        Self::with_options(path, SqliteOptions::default())
    }

    /// Creates a file factory with custom options.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created.
    pub fn with_options(path: &Path, options: SqliteOptions) -> DriverResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(Self {
            location: Location::File(path.to_path_buf()),
            options,
            anchor: Mutex::new(None),
        })
    }

    /// Creates a factory for a named in-memory database shared by every
    /// connection the factory opens. The database lives as long as the
    /// factory.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created.
    pub fn shared_memory(name: &str) -> DriverResult<Self> {
        let factory = Self {
            location: Location::SharedMemory(format!("file:{name}?mode=memory&cache=shared")),
            options: SqliteOptions::default(),
            anchor: Mutex::new(None),
        };
        let anchor = factory.open_raw()?;
        *factory.anchor.lock() = Some(anchor);
        Ok(factory)
    }

    /// Returns the database file path, if file-backed.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match &self.location {
            Location::File(path) => Some(path),
            Location::SharedMemory(_) => None,
        }
    }

    /// Runs semicolon-separated SQL on a fresh connection outside any
    /// managed transaction. Intended for applying generated DDL.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails.
    pub fn execute_batch(&self, sql: &str) -> DriverResult<()> {
        let conn = self.open_raw()?;
        conn.execute_batch(sql)?;
        conn.close().map_err(|(_, e)| DriverError::Sqlite(e))
    }

    fn open_raw(&self) -> DriverResult<rusqlite::Connection> {
        let conn = match &self.location {
            Location::File(path) => rusqlite::Connection::open(path)?,
            Location::SharedMemory(uri) => rusqlite::Connection::open_with_flags(
                uri,
                OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_CREATE
                    | OpenFlags::SQLITE_OPEN_URI,
            )?,
        };
        conn.busy_timeout(self.options.busy_timeout)?;
        conn.pragma_update(None, "foreign_keys", self.options.foreign_keys)?;
        conn.set_prepared_statement_cache_capacity(self.options.statement_cache_capacity);
        Ok(conn)
    }
}

impl ConnectionFactory for SqliteFactory {
    fn connect(&self) -> DriverResult<Box<dyn Connection>> {
        let conn = self.open_raw()?;
        let id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(connection = id, location = ?self.location, "sqlite connection opened");
        Ok(Box::new(SqliteConnection {
            id,
            conn: Some(conn),
            statements: Vec::new(),
        }))
    }
}

/// A connection to a SQLite database.
///
/// Prepared statements are compiled through rusqlite's statement cache;
/// the handle returned by `prepare` indexes the query text registered on
/// this connection.
pub struct SqliteConnection {
    id: u64,
    conn: Option<rusqlite::Connection>,
    statements: Vec<String>,
}

impl SqliteConnection {
    fn conn(&self) -> DriverResult<&rusqlite::Connection> {
        self.conn.as_ref().ok_or(DriverError::Closed)
    }

    fn statement_text(&self, statement: StatementId) -> DriverResult<&str> {
        let unknown = || DriverError::UnknownStatement {
            statement: statement.to_string(),
            connection: self.id,
        };
        if statement.connection() != self.id {
            return Err(unknown());
        }
        self.statements
            .get(statement.index() as usize)
            .map(String::as_str)
            .ok_or_else(unknown)
    }
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("id", &self.id)
            .field("open", &self.conn.is_some())
            .field("statements", &self.statements.len())
            .finish()
    }
}

impl Connection for SqliteConnection {
    fn id(&self) -> u64 {
        self.id
    }

    fn begin(&mut self) -> DriverResult<()> {
        self.conn()?.execute_batch("BEGIN")?;
        Ok(())
    }

    fn commit(&mut self) -> DriverResult<()> {
        self.conn()?.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> DriverResult<()> {
        self.conn()?.execute_batch("ROLLBACK")?;
        Ok(())
    }

    fn prepare(&mut self, sql: &str) -> DriverResult<StatementId> {
        // Compile once now so bad query text fails here, not at execute.
        self.conn()?.prepare_cached(sql)?;
        let known = self
            .statements
            .iter()
            .position(|known| known == sql)
            .and_then(|index| u32::try_from(index).ok());
        if let Some(index) = known {
            return Ok(StatementId::new(self.id, index));
        }
        let index = u32::try_from(self.statements.len())
            .map_err(|_| DriverError::OutOfRange("too many prepared statements".into()))?;
        self.statements.push(sql.to_string());
        Ok(StatementId::new(self.id, index))
    }

    fn execute(&mut self, statement: StatementId, bindings: &[Binding]) -> DriverResult<Vec<Row>> {
        let sql = self.statement_text(statement)?;
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(sql)?;

        let values = bindings
            .iter()
            .map(|b| Ok((b.placeholder(), to_sql_value(b.field.value())?)))
            .collect::<DriverResult<Vec<(String, SqlValue)>>>()?;
        let params: Vec<(&str, &dyn ToSql)> = values
            .iter()
            .map(|(name, value)| (name.as_str(), value as &dyn ToSql))
            .collect();

        if stmt.column_count() == 0 {
            stmt.execute(params.as_slice()).map_err(DriverError::from_sqlite)?;
            return Ok(Vec::new());
        }

        let columns: Arc<[String]> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt
            .query(params.as_slice())
            .map_err(DriverError::from_sqlite)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(DriverError::from_sqlite)? {
            let mut row_values = Vec::with_capacity(columns.len());
            for (i, column) in columns.iter().enumerate() {
                row_values.push(from_value_ref(column, row.get_ref(i)?)?);
            }
            out.push(Row::new(Arc::clone(&columns), row_values));
        }
        Ok(out)
    }

    fn last_insert_id(&self) -> DriverResult<i64> {
        Ok(self.conn()?.last_insert_rowid())
    }

    fn close(self: Box<Self>) -> DriverResult<()> {
        let SqliteConnection { id, conn, .. } = *self;
        if let Some(conn) = conn {
            conn.close().map_err(|(_, e)| DriverError::Sqlite(e))?;
            tracing::trace!(connection = id, "sqlite connection closed");
        }
        Ok(())
    }
}

fn to_sql_value(value: &Value) -> DriverResult<SqlValue> {
    Ok(match value {
        Value::Null => SqlValue::Null,
        Value::Integer(v) => SqlValue::Integer(*v),
        Value::Unsigned(v) => SqlValue::Integer(
            i64::try_from(*v).map_err(|_| DriverError::OutOfRange(format!("{v} exceeds i64")))?,
        ),
        Value::Bool(v) => SqlValue::Integer(i64::from(*v)),
        Value::Text(v) => SqlValue::Text(v.clone()),
        Value::Timestamp(v) => SqlValue::Text(v.format(TIMESTAMP_FORMAT).to_string()),
        Value::Date(v) => SqlValue::Text(v.format(DATE_FORMAT).to_string()),
    })
}

fn from_value_ref(column: &str, value: ValueRef<'_>) -> DriverResult<Value> {
    match value {
        ValueRef::Null => Ok(Value::Null),
        ValueRef::Integer(v) => Ok(Value::Integer(v)),
        ValueRef::Text(bytes) => std::str::from_utf8(bytes)
            .map(|s| Value::Text(s.to_string()))
            .map_err(|_| DriverError::conversion(DataType::String, "invalid UTF-8")),
        ValueRef::Real(_) => Err(DriverError::UnsupportedColumn {
            column: column.to_string(),
            kind: "real",
        }),
        ValueRef::Blob(_) => Err(DriverError::UnsupportedColumn {
            column: column.to_string(),
            kind: "blob",
        }),
    }
}
