//! Query text generation.
//!
//! Table and field names come from validated descriptors and are quoted as
//! identifiers. Every value is bound through a named placeholder
//! (`:field`); no value is ever written into query text.

use crate::schema::TableDescriptor;
use crate::types::{ID_FIELD, LAST_UPDATED_FIELD};
use std::fmt;

/// Category of a generated statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    /// Select every row of a table.
    FetchAll,
    /// Select rows matching equality criteria.
    FetchBy,
    /// Insert one row.
    Insert,
    /// Update one row by identity.
    Save,
    /// Delete one row by identity.
    Delete,
    /// Count rows of a table.
    Count,
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatementKind::FetchAll => "fetch_all",
            StatementKind::FetchBy => "fetch_by",
            StatementKind::Insert => "insert",
            StatementKind::Save => "save",
            StatementKind::Delete => "delete",
            StatementKind::Count => "count",
        };
        f.write_str(name)
    }
}

fn quote(ident: &str) -> String {
    format!("\"{ident}\"")
}

fn column_list(table: &TableDescriptor) -> String {
    table
        .column_names()
        .map(quote)
        .collect::<Vec<_>>()
        .join(", ")
}

/// `SELECT` of every row, ordered by identity.
#[must_use]
pub fn select_all(table: &TableDescriptor) -> String {
    format!(
        "SELECT {} FROM {} ORDER BY {}",
        column_list(table),
        quote(table.name()),
        quote(ID_FIELD)
    )
}

/// `SELECT` with one equality predicate per field, conjoined with `AND`.
#[must_use]
pub fn select_where(table: &TableDescriptor, fields: &[String]) -> String {
    let predicates = fields
        .iter()
        .map(|f| format!("{} = :{f}", quote(f)))
        .collect::<Vec<_>>()
        .join(" AND ");
    format!(
        "SELECT {} FROM {} WHERE {} ORDER BY {}",
        column_list(table),
        quote(table.name()),
        predicates,
        quote(ID_FIELD)
    )
}

/// `INSERT` of every table-specific field.
#[must_use]
pub fn insert(table: &TableDescriptor) -> String {
    if table.fields().is_empty() {
        return format!("INSERT INTO {} DEFAULT VALUES", quote(table.name()));
    }
    let columns = table
        .fields()
        .iter()
        .map(|f| quote(&f.name))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = table
        .fields()
        .iter()
        .map(|f| format!(":{}", f.name))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({columns}) VALUES ({placeholders})",
        quote(table.name())
    )
}

/// `UPDATE` of every table-specific field by identity.
///
/// The modification timestamp is set by the server.
#[must_use]
pub fn update(table: &TableDescriptor) -> String {
    let mut assignments: Vec<String> = table
        .fields()
        .iter()
        .map(|f| format!("{} = :{}", quote(&f.name), f.name))
        .collect();
    assignments.push(format!("{} = CURRENT_TIMESTAMP", quote(LAST_UPDATED_FIELD)));
    format!(
        "UPDATE {} SET {} WHERE {} = :{ID_FIELD}",
        quote(table.name()),
        assignments.join(", "),
        quote(ID_FIELD)
    )
}

/// `DELETE` of one row by identity, returning the identity of the deleted
/// row so that a missing row can be told apart.
#[must_use]
pub fn delete(table: &TableDescriptor) -> String {
    format!(
        "DELETE FROM {} WHERE {} = :{ID_FIELD} RETURNING {}",
        quote(table.name()),
        quote(ID_FIELD),
        quote(ID_FIELD)
    )
}

/// Row count, returned in a column named `count`.
#[must_use]
pub fn count(table: &TableDescriptor) -> String {
    format!("SELECT COUNT(*) AS \"count\" FROM {}", quote(table.name()))
}
