//! In-memory record bound to one row.

use crate::error::{RecordError, RecordResult};
use crate::record::Candidate;
use crate::schema::TableDescriptor;
use crate::types::{is_parent_field, RecordId, CREATED_FIELD, ID_FIELD, LAST_UPDATED_FIELD};
use chrono::NaiveDateTime;
use recordkit_driver::{Binding, DataType, DriverError, Row, TypedField, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// One row of a table.
///
/// The parent columns (`id`, `created`, `last_updated`) are read-only and
/// only change when the row is re-read. Table-specific fields may be
/// modified with [`set`](Self::set) and written back with
/// [`TransactionSession::save`](crate::TransactionSession::save).
///
/// A record becomes inert once deleted: every further lifecycle call on it
/// fails with [`RecordError::InvalidState`].
#[derive(Debug, Clone)]
pub struct Record {
    table: Arc<TableDescriptor>,
    id: RecordId,
    created: NaiveDateTime,
    last_updated: Option<NaiveDateTime>,
    fields: BTreeMap<String, TypedField>,
    deleted: bool,
}

impl Record {
    /// Builds a record from a row holding every column of `table`.
    pub(crate) fn from_row(table: &Arc<TableDescriptor>, row: Row) -> RecordResult<Self> {
        let mut columns: HashMap<String, Value> = row.into_pairs().collect();
        let mut take = |name: &str| {
            columns.remove(name).ok_or_else(|| {
                RecordError::schema(format!(
                    "column {name} missing from result for table {}",
                    table.name()
                ))
            })
        };

        let id = match take(ID_FIELD)? {
            Value::Integer(id) => RecordId::new(id),
            other => return Err(DriverError::conversion(DataType::Integer, other.kind()).into()),
        };
        let created = TypedField::coerce(DataType::Timestamp, take(CREATED_FIELD)?)?
            .value()
            .as_timestamp()
            .ok_or_else(|| DriverError::conversion(DataType::Timestamp, "null"))?;
        let last_updated = TypedField::coerce(DataType::Timestamp, take(LAST_UPDATED_FIELD)?)?
            .value()
            .as_timestamp();

        let mut fields = BTreeMap::new();
        for spec in table.fields() {
            let field = TypedField::coerce(spec.data_type, take(spec.name.as_str())?)?;
            fields.insert(spec.name.clone(), field);
        }

        Ok(Self {
            table: Arc::clone(table),
            id,
            created,
            last_updated,
            fields,
            deleted: false,
        })
    }

    /// Descriptor of the record's table.
    #[must_use]
    pub fn table(&self) -> &Arc<TableDescriptor> {
        &self.table
    }

    /// Server-generated identity.
    #[must_use]
    pub fn id(&self) -> RecordId {
        self.id
    }

    /// Server-defaulted creation timestamp.
    #[must_use]
    pub fn created(&self) -> NaiveDateTime {
        self.created
    }

    /// Timestamp of the last save, if the row was ever saved.
    #[must_use]
    pub fn last_updated(&self) -> Option<NaiveDateTime> {
        self.last_updated
    }

    /// Value of a table-specific field.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).map(TypedField::value)
    }

    /// Typed value of a table-specific field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&TypedField> {
        self.fields.get(name)
    }

    /// Table-specific fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &TypedField)> {
        self.table
            .fields()
            .iter()
            .filter_map(|spec| self.fields.get_key_value(&spec.name))
            .map(|(name, field)| (name.as_str(), field))
    }

    /// Returns true once the record's row has been deleted.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Changes a table-specific field. The change is written by the next
    /// save.
    ///
    /// # Errors
    ///
    /// - [`RecordError::InvalidState`] if the record is deleted or `name`
    ///   is a parent column
    /// - [`RecordError::UnknownField`] if the table has no such field
    /// - [`RecordError::TypeMismatch`] if the value does not fit the
    ///   field's data type
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> RecordResult<()> {
        self.ensure_live()?;
        if is_parent_field(name) {
            return Err(RecordError::invalid_state(format!(
                "field {name} of table {} is server-managed",
                self.table.name()
            )));
        }
        let data_type = self
            .table
            .child_field_type(name)
            .ok_or_else(|| RecordError::UnknownField {
                table: self.table.name().to_string(),
                field: name.to_string(),
            })?;
        let field = typed_field(&self.table, name, data_type, value.into())?;
        self.fields.insert(name.to_string(), field);
        Ok(())
    }

    pub(crate) fn ensure_live(&self) -> RecordResult<()> {
        if self.deleted {
            return Err(RecordError::invalid_state(format!(
                "record {} of table {} is deleted",
                self.id,
                self.table.name()
            )));
        }
        Ok(())
    }

    pub(crate) fn mark_deleted(&mut self) {
        self.deleted = true;
    }

    pub(crate) fn candidate(&self) -> Candidate<'_> {
        Candidate::new(&self.table, Some(self.id), &self.fields)
    }

    /// Bindings for every table-specific field, in declaration order.
    pub(crate) fn bindings(&self) -> Vec<Binding> {
        field_bindings(&self.table, &self.fields)
    }
}

/// Pairs `value` with `data_type`, reporting a mismatch against `name`.
pub(crate) fn typed_field(
    table: &TableDescriptor,
    name: &str,
    data_type: DataType,
    value: Value,
) -> RecordResult<TypedField> {
    let found = value.to_string();
    let kind = value.kind();
    TypedField::new(data_type, value).map_err(|_| RecordError::TypeMismatch {
        table: table.name().to_string(),
        field: name.to_string(),
        expected: data_type,
        found: format!("{kind} {found}"),
    })
}

pub(crate) fn field_bindings(
    table: &TableDescriptor,
    fields: &BTreeMap<String, TypedField>,
) -> Vec<Binding> {
    table
        .fields()
        .iter()
        .map(|spec| {
            let field = fields
                .get(&spec.name)
                .cloned()
                .unwrap_or_else(|| TypedField::null(spec.data_type));
            Binding::new(spec.name.clone(), field)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn table() -> Arc<TableDescriptor> {
        TableDescriptor::builder("people")
            .field("name", DataType::String)
            .field("active", DataType::Boolean)
            .field("born", DataType::Date)
            .build()
            .unwrap()
    }

    fn row(values: Vec<Value>) -> Row {
        let columns: Arc<[String]> = ["id", "created", "last_updated", "name", "active", "born"]
            .iter()
            .map(|c| c.to_string())
            .collect();
        Row::new(columns, values)
    }

    fn record() -> Record {
        Record::from_row(
            &table(),
            row(vec![
                Value::Integer(7),
                Value::Text("2024-03-01 10:00:00".into()),
                Value::Null,
                Value::Text("Ada".into()),
                Value::Integer(1),
                Value::Text("1815-12-10".into()),
            ]),
        )
        .unwrap()
    }

    #[test]
    fn from_row_coerces_declared_types() {
        let record = record();
        assert_eq!(record.id(), RecordId::new(7));
        assert_eq!(
            record.created(),
            NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap()
        );
        assert_eq!(record.last_updated(), None);
        assert_eq!(record.get("name"), Some(&Value::Text("Ada".into())));
        assert_eq!(record.get("active"), Some(&Value::Bool(true)));
        assert_eq!(
            record.get("born"),
            Some(&Value::Date(NaiveDate::from_ymd_opt(1815, 12, 10).unwrap()))
        );
    }

    #[test]
    fn from_row_requires_created() {
        let result = Record::from_row(
            &table(),
            row(vec![
                Value::Integer(1),
                Value::Null,
                Value::Null,
                Value::Null,
                Value::Null,
                Value::Null,
            ]),
        );
        assert!(matches!(result, Err(RecordError::Driver(_))));
    }

    #[test]
    fn from_row_reports_missing_column() {
        let columns: Arc<[String]> = ["id", "created"].iter().map(|c| c.to_string()).collect();
        let result = Record::from_row(
            &table(),
            Row::new(
                columns,
                vec![Value::Integer(1), Value::Text("2024-03-01 10:00:00".into())],
            ),
        );
        assert!(matches!(result, Err(RecordError::Schema { .. })));
    }

    #[test]
    fn fields_follow_declaration_order() {
        let record = record();
        let names: Vec<&str> = record.fields().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["name", "active", "born"]);
    }

    #[test]
    fn set_checks_type() {
        let mut record = record();
        record.set("name", "Grace").unwrap();
        assert_eq!(record.get("name"), Some(&Value::Text("Grace".into())));

        let err = record.set("active", "yes").unwrap_err();
        assert!(matches!(err, RecordError::TypeMismatch { .. }));
    }

    #[test]
    fn set_accepts_null() {
        let mut record = record();
        record.set("born", Value::Null).unwrap();
        assert_eq!(record.get("born"), Some(&Value::Null));
    }

    #[test]
    fn set_rejects_parent_and_unknown_fields() {
        let mut record = record();
        assert!(matches!(
            record.set("created", Value::Null),
            Err(RecordError::InvalidState { .. })
        ));
        assert!(matches!(
            record.set("nickname", "A"),
            Err(RecordError::UnknownField { .. })
        ));
    }

    #[test]
    fn deleted_record_is_inert() {
        let mut record = record();
        record.mark_deleted();
        assert!(record.is_deleted());
        assert!(matches!(
            record.set("name", "B"),
            Err(RecordError::InvalidState { .. })
        ));
    }

    #[test]
    fn bindings_cover_every_field() {
        let record = record();
        let names: Vec<String> = record.bindings().into_iter().map(|b| b.name).collect();
        assert_eq!(names, vec!["name", "active", "born"]);
    }
}
