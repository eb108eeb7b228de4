//! Extension points of a record type.

use crate::asset::Asset;
use crate::error::RecordResult;
use crate::record::Record;
use crate::schema::TableDescriptor;
use crate::transaction::TransactionSession;
use crate::types::RecordId;
use recordkit_driver::{TypedField, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Behaviour a concrete record type plugs into the lifecycle engine.
///
/// Every method has a no-op default. Hooks run inside the transaction of
/// the operation that invoked them, so any lifecycle call they make on the
/// session joins that transaction.
pub trait RecordHooks: Send + Sync {
    /// Checks a record about to be inserted or saved.
    ///
    /// # Errors
    ///
    /// Return [`crate::RecordError::Validation`] or
    /// [`crate::RecordError::Duplicate`] to reject the record. Nothing has
    /// been written when this runs.
    fn validate(
        &self,
        _session: &mut TransactionSession,
        _candidate: &Candidate<'_>,
    ) -> RecordResult<()> {
        Ok(())
    }

    /// Removes rows owned by `record` before its own row is deleted.
    ///
    /// # Errors
    ///
    /// Any error aborts the delete.
    fn on_delete_children(
        &self,
        _session: &mut TransactionSession,
        _record: &Record,
    ) -> RecordResult<()> {
        Ok(())
    }

    /// External assets owned by `record`, removed once its delete commits.
    fn assets(&self, _record: &Record) -> Vec<Asset> {
        Vec::new()
    }
}

/// Hooks of a record type with no custom behaviour.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl RecordHooks for NoHooks {}

/// The field values of a record about to be written.
///
/// `id` is `None` for an insert and the row's identity for a save.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    table: &'a Arc<TableDescriptor>,
    id: Option<RecordId>,
    fields: &'a BTreeMap<String, TypedField>,
}

impl<'a> Candidate<'a> {
    pub(crate) fn new(
        table: &'a Arc<TableDescriptor>,
        id: Option<RecordId>,
        fields: &'a BTreeMap<String, TypedField>,
    ) -> Self {
        Self { table, id, fields }
    }

    /// Descriptor of the record's table.
    #[must_use]
    pub fn table(&self) -> &'a Arc<TableDescriptor> {
        self.table
    }

    /// Identity of the row being saved; `None` when inserting.
    #[must_use]
    pub fn id(&self) -> Option<RecordId> {
        self.id
    }

    /// Value of a table-specific field. Fields not supplied are NULL.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&'a Value> {
        self.fields.get(name).map(TypedField::value)
    }

    /// Typed value of a table-specific field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&'a TypedField> {
        self.fields.get(name)
    }
}
