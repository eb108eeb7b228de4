//! Record lifecycle operations.
//!
//! Every operation checks its preconditions first, then runs inside
//! [`TransactionSession::with_transaction`]: it joins the open transaction
//! if there is one and otherwise opens and closes its own.

use crate::error::{RecordError, RecordResult};
use crate::record::instance::{field_bindings, typed_field};
use crate::record::{Candidate, Record};
use crate::schema::TableDescriptor;
use crate::statement::{query, QueryShape, StatementKind};
use crate::transaction::TransactionSession;
use crate::types::{is_parent_field, FieldValues, RecordId, ID_FIELD};
use recordkit_driver::{Binding, DataType, DriverError, TypedField, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

impl TransactionSession {
    /// Fetches every row of `table`, ordered by identity.
    ///
    /// # Errors
    ///
    /// Returns the driver error if the query fails.
    pub fn fetch_all(&mut self, table: &Arc<TableDescriptor>) -> RecordResult<Vec<Record>> {
        self.with_transaction(|s| {
            let statement = s.statement(
                StatementKind::FetchAll,
                table.name(),
                &QueryShape::table(),
                || query::select_all(table),
            )?;
            s.execute(statement, &[])?
                .into_iter()
                .map(|row| Record::from_row(table, row))
                .collect()
        })
    }

    /// Fetches the rows whose fields equal every value in `criteria`.
    ///
    /// Criteria may name parent columns as well as table-specific fields.
    /// Matching is by equality, so a NULL criterion matches no row.
    ///
    /// # Errors
    ///
    /// - [`RecordError::EmptyCriteria`] if `criteria` is empty
    /// - [`RecordError::UnknownField`] if a field is not declared
    /// - [`RecordError::TypeMismatch`] if a value does not fit its field
    pub fn fetch(
        &mut self,
        table: &Arc<TableDescriptor>,
        criteria: &FieldValues,
    ) -> RecordResult<Vec<Record>> {
        let (shape, bindings) = criteria_bindings(table, criteria)?;
        self.with_transaction(|s| s.run_fetch(table, &shape, &bindings))
    }

    /// Fetches the record whose unique key `key` equals `value`.
    ///
    /// `key` may also be the identity field.
    ///
    /// # Errors
    ///
    /// - [`RecordError::InvalidKey`] if `key` is not a declared unique key
    /// - [`RecordError::UniquenessViolated`] if more than one row matched
    pub fn fetch_by_key(
        &mut self,
        table: &Arc<TableDescriptor>,
        key: &str,
        value: impl Into<Value>,
    ) -> RecordResult<Option<Record>> {
        let mut criteria = FieldValues::new();
        criteria.insert(key.to_string(), value.into());
        self.fetch_unique(table, &criteria)
    }

    /// Fetches the record matching a composite key.
    ///
    /// # Errors
    ///
    /// - [`RecordError::InvalidKey`] if the field names are not exactly a
    ///   declared key set and do not include the identity field
    /// - [`RecordError::UniquenessViolated`] if more than one row matched
    pub fn fetch_by_composite_key(
        &mut self,
        table: &Arc<TableDescriptor>,
        criteria: &FieldValues,
    ) -> RecordResult<Option<Record>> {
        self.fetch_unique(table, criteria)
    }

    /// Inserts a row and returns it as the server stored it.
    ///
    /// Fields not supplied are written as NULL. The record type's
    /// validation hook runs before anything is written.
    ///
    /// # Errors
    ///
    /// - [`RecordError::ParentFieldInInsert`] if `values` names a parent
    ///   column
    /// - [`RecordError::UnknownField`] or [`RecordError::TypeMismatch`] for
    ///   an undeclared field or ill-typed value
    /// - whatever the validation hook returns
    /// - [`RecordError::Duplicate`] if the database holds the values of a
    ///   unique column set already
    pub fn insert(
        &mut self,
        table: &Arc<TableDescriptor>,
        values: &FieldValues,
    ) -> RecordResult<Record> {
        let mut fields = BTreeMap::new();
        for (name, value) in values {
            if is_parent_field(name) {
                return Err(RecordError::ParentFieldInInsert {
                    table: table.name().to_string(),
                    field: name.clone(),
                });
            }
            let data_type = table
                .child_field_type(name)
                .ok_or_else(|| unknown_field(table, name))?;
            fields.insert(
                name.clone(),
                typed_field(table, name, data_type, value.clone())?,
            );
        }
        for spec in table.fields() {
            fields
                .entry(spec.name.clone())
                .or_insert_with(|| TypedField::null(spec.data_type));
        }
        let bindings = field_bindings(table, &fields);
        let hooks = Arc::clone(table.hooks());

        self.with_transaction(|s| {
            hooks.validate(s, &Candidate::new(table, None, &fields))?;
            let statement = s.statement(
                StatementKind::Insert,
                table.name(),
                &QueryShape::table(),
                || query::insert(table),
            )?;
            s.execute(statement, &bindings).map_err(|err| {
                duplicate_or(table, |name| fields.get(name).map(TypedField::value), err)
            })?;
            let id = RecordId::new(s.last_insert_id()?);
            tracing::trace!(table = table.name(), %id, "row inserted");
            s.load(table, id)?.ok_or_else(|| RecordError::RowMissing {
                table: table.name().to_string(),
                id: id.as_i64(),
            })
        })
    }

    /// Writes every table-specific field of `record` back to its row, then
    /// re-reads the row to pick up the server-set `last_updated`.
    ///
    /// # Errors
    ///
    /// - [`RecordError::InvalidState`] if the record is deleted
    /// - whatever the validation hook returns
    /// - [`RecordError::Duplicate`] if another row holds the values of a
    ///   unique column set
    /// - [`RecordError::RowMissing`] if the row no longer exists
    pub fn save(&mut self, record: &mut Record) -> RecordResult<()> {
        record.ensure_live()?;
        let table = Arc::clone(record.table());
        let hooks = Arc::clone(table.hooks());
        let mut bindings = record.bindings();
        bindings.push(id_binding(record.id())?);

        self.with_transaction(|s| {
            hooks.validate(s, &record.candidate())?;
            let statement = s.statement(
                StatementKind::Save,
                table.name(),
                &QueryShape::table(),
                || query::update(&table),
            )?;
            s.execute(statement, &bindings)
                .map_err(|err| duplicate_or(&table, |name| record.get(name), err))?;
            s.reload(record)
        })
    }

    /// Re-reads `record` from its row.
    ///
    /// # Errors
    ///
    /// - [`RecordError::InvalidState`] if the record is deleted
    /// - [`RecordError::RowMissing`] if the row no longer exists
    pub fn refresh(&mut self, record: &mut Record) -> RecordResult<()> {
        record.ensure_live()?;
        self.with_transaction(|s| s.reload(record))
    }

    /// Deletes the row of `record`.
    ///
    /// The record type's child-cleanup hook runs first. Once the row is
    /// gone the record's assets are queued for removal after the
    /// transaction commits, and the record is marked deleted.
    ///
    /// # Errors
    ///
    /// - [`RecordError::InvalidState`] if the record is already deleted
    /// - whatever the child-cleanup hook returns
    /// - [`RecordError::RowMissing`] if the row was already deleted through
    ///   another copy of the record
    pub fn delete(&mut self, record: &mut Record) -> RecordResult<()> {
        record.ensure_live()?;
        let table = Arc::clone(record.table());
        let hooks = Arc::clone(table.hooks());
        let bindings = [id_binding(record.id())?];

        self.with_transaction(|s| {
            hooks.on_delete_children(s, record)?;
            let statement = s.statement(
                StatementKind::Delete,
                table.name(),
                &QueryShape::table(),
                || query::delete(&table),
            )?;
            if s.execute(statement, &bindings)?.is_empty() {
                return Err(RecordError::RowMissing {
                    table: table.name().to_string(),
                    id: record.id().as_i64(),
                });
            }
            for asset in hooks.assets(record) {
                s.schedule_asset(asset)?;
            }
            tracing::trace!(table = table.name(), id = %record.id(), "row deleted");
            Ok(())
        })?;
        record.mark_deleted();
        Ok(())
    }

    /// Deletes every row of `table` in one transaction, returning how many
    /// were deleted.
    ///
    /// # Errors
    ///
    /// Returns the first failure; nothing is deleted in that case unless an
    /// enclosing transaction commits anyway.
    pub fn delete_all(&mut self, table: &Arc<TableDescriptor>) -> RecordResult<usize> {
        self.with_transaction(|s| {
            let mut records = s.fetch_all(table)?;
            for record in &mut records {
                s.delete(record)?;
            }
            Ok(records.len())
        })
    }

    /// Number of rows in `table`.
    ///
    /// # Errors
    ///
    /// Returns the driver error if the query fails.
    pub fn count(&mut self, table: &Arc<TableDescriptor>) -> RecordResult<u64> {
        self.with_transaction(|s| {
            let statement = s.statement(
                StatementKind::Count,
                table.name(),
                &QueryShape::table(),
                || query::count(table),
            )?;
            let rows = s.execute(statement, &[])?;
            rows.first()
                .and_then(|row| row.get("count"))
                .and_then(Value::as_u64)
                .ok_or_else(|| {
                    RecordError::from(DriverError::conversion(DataType::Unsigned, "no count row"))
                })
        })
    }

    fn fetch_unique(
        &mut self,
        table: &Arc<TableDescriptor>,
        criteria: &FieldValues,
    ) -> RecordResult<Option<Record>> {
        if !table.is_valid_key(criteria.keys().map(String::as_str)) {
            return Err(RecordError::InvalidKey {
                table: table.name().to_string(),
                fields: criteria.keys().cloned().collect(),
            });
        }
        let (shape, bindings) = criteria_bindings(table, criteria)?;

        self.with_transaction(|s| {
            let mut records = s.run_fetch(table, &shape, &bindings)?;
            match records.len() {
                0 | 1 => Ok(records.pop()),
                rows => {
                    let key = describe(criteria);
                    tracing::warn!(table = table.name(), key = %key, rows, "unique lookup matched several rows");
                    Err(RecordError::UniquenessViolated {
                        table: table.name().to_string(),
                        key,
                        rows,
                    })
                }
            }
        })
    }

    fn run_fetch(
        &mut self,
        table: &Arc<TableDescriptor>,
        shape: &QueryShape,
        bindings: &[Binding],
    ) -> RecordResult<Vec<Record>> {
        let statement = self.statement(StatementKind::FetchBy, table.name(), shape, || {
            query::select_where(table, shape.fields())
        })?;
        self.execute(statement, bindings)?
            .into_iter()
            .map(|row| Record::from_row(table, row))
            .collect()
    }

    /// Reads the row with identity `id`, if it exists.
    fn load(&mut self, table: &Arc<TableDescriptor>, id: RecordId) -> RecordResult<Option<Record>> {
        let shape = QueryShape::of([ID_FIELD]);
        let mut records = self.run_fetch(table, &shape, &[id_binding(id)?])?;
        Ok(records.pop())
    }

    fn reload(&mut self, record: &mut Record) -> RecordResult<()> {
        let table = Arc::clone(record.table());
        let fresh = self
            .load(&table, record.id())?
            .ok_or_else(|| RecordError::RowMissing {
                table: table.name().to_string(),
                id: record.id().as_i64(),
            })?;
        *record = fresh;
        Ok(())
    }
}

fn unknown_field(table: &TableDescriptor, name: &str) -> RecordError {
    RecordError::UnknownField {
        table: table.name().to_string(),
        field: name.to_string(),
    }
}

fn id_binding(id: RecordId) -> RecordResult<Binding> {
    Ok(Binding::new(
        ID_FIELD,
        TypedField::new(DataType::Integer, id.into())?,
    ))
}

/// Validates fetch criteria and types their values. The shape lists the
/// field names in sorted order.
fn criteria_bindings(
    table: &TableDescriptor,
    criteria: &FieldValues,
) -> RecordResult<(QueryShape, Vec<Binding>)> {
    if criteria.is_empty() {
        return Err(RecordError::EmptyCriteria {
            table: table.name().to_string(),
        });
    }
    let mut bindings = Vec::with_capacity(criteria.len());
    for (name, value) in criteria {
        let data_type = table
            .field_type(name)
            .ok_or_else(|| unknown_field(table, name))?;
        bindings.push(Binding::new(
            name.clone(),
            typed_field(table, name, data_type, value.clone())?,
        ));
    }
    Ok((QueryShape::of(criteria.keys().cloned()), bindings))
}

/// Reports a unique-constraint failure on table fields as a duplicate of
/// their values. Other failures pass through unchanged.
fn duplicate_or<'v>(
    table: &TableDescriptor,
    value_of: impl Fn(&str) -> Option<&'v Value>,
    err: RecordError,
) -> RecordError {
    let RecordError::Driver(DriverError::UniqueViolation { columns, .. }) = &err else {
        return err;
    };
    let reported: BTreeSet<&str> = columns.iter().map(String::as_str).collect();
    let key: Vec<String> = match table.keys().iter().find(|key| key.matches(&reported)) {
        Some(key) => key.fields().map(str::to_string).collect(),
        None => columns.clone(),
    };
    let values: Option<Vec<String>> = key
        .iter()
        .map(|name| value_of(name.as_str()).map(ToString::to_string))
        .collect();
    match values {
        Some(values) if !key.is_empty() => {
            tracing::debug!(table = table.name(), key = ?key, "unique constraint rejected write");
            RecordError::Duplicate {
                table: table.name().to_string(),
                key: key.join(", "),
                value: values.join(", "),
            }
        }
        _ => err,
    }
}

fn describe(criteria: &FieldValues) -> String {
    criteria
        .iter()
        .map(|(name, value)| format!("{name} = {value}"))
        .collect::<Vec<_>>()
        .join(", ")
}
