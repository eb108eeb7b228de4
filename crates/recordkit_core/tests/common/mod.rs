//! Shared setup for the integration tests.

#![allow(dead_code)]

use recordkit_core::{Config, RecordHooks, TableDescriptor, TransactionSession};
use recordkit_driver::DataType;
use recordkit_testkit::{init_tracing, record_table_ddl, Probe, TestDatabase};
use std::sync::Arc;

/// A database, a session over a counting factory, and its probe.
pub struct Env {
    pub session: TransactionSession,
    pub probe: Arc<Probe>,
    pub db: TestDatabase,
}

impl Env {
    pub fn new(ddl: &[String]) -> Self {
        Self::with_config(ddl, |_| Config::default())
    }

    pub fn with_config(ddl: &[String], config: impl FnOnce(&TestDatabase) -> Config) -> Self {
        init_tracing();
        let db = TestDatabase::new();
        for statement in ddl {
            db.execute_batch(statement);
        }
        let factory = db.instrumented();
        let probe = factory.probe();
        let config = config(&db);
        let session = TransactionSession::new(Arc::new(factory), config);
        Self { session, probe, db }
    }
}

pub fn users_ddl() -> String {
    record_table_ddl(
        "users",
        &[
            ("name", "TEXT"),
            ("age", "INTEGER"),
            ("active", "INTEGER"),
            ("avatar", "TEXT"),
        ],
    )
}

/// A unique index over `columns`, enforced by the database itself.
pub fn unique_index(table: &str, columns: &[&str]) -> String {
    format!(
        "CREATE UNIQUE INDEX {table}_{} ON {table} ({});",
        columns.join("_"),
        columns.join(", ")
    )
}

/// `users` with a declared unique key on `name`, optionally with hooks.
pub fn users(hooks: Option<Arc<dyn RecordHooks>>) -> Arc<TableDescriptor> {
    let mut builder = TableDescriptor::builder("users")
        .field("name", DataType::String)
        .field("age", DataType::Unsigned)
        .field("active", DataType::Boolean)
        .field("avatar", DataType::String)
        .unique_key("name");
    if let Some(hooks) = hooks {
        builder = builder.hooks(hooks);
    }
    builder.build().unwrap()
}

pub fn memberships_ddl() -> String {
    record_table_ddl(
        "memberships",
        &[("team_id", "INTEGER"), ("user_id", "INTEGER"), ("role", "TEXT")],
    )
}

pub fn memberships() -> Arc<TableDescriptor> {
    TableDescriptor::builder("memberships")
        .field("team_id", DataType::ForeignKey)
        .field("user_id", DataType::ForeignKey)
        .field("role", DataType::String)
        .composite_key(["team_id", "user_id"])
        .build()
        .unwrap()
}
