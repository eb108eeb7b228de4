//! Table descriptors.

use crate::error::{RecordError, RecordResult};
use crate::record::{NoHooks, RecordHooks};
use crate::schema::key::{is_valid_key, KeySet};
use crate::types::{is_parent_field, CREATED_FIELD, ID_FIELD, LAST_UPDATED_FIELD, PARENT_FIELDS};
use recordkit_driver::DataType;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// A table-specific column and its data type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Column name.
    pub name: String,
    /// Declared data type.
    #[serde(rename = "type")]
    pub data_type: DataType,
}

/// Serialized form of a table, as emitted by the schema compiler.
///
/// ```json
/// {
///   "name": "users",
///   "fields": [{ "name": "email", "type": "string" }],
///   "keys": [["email"]]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Table name.
    pub name: String,
    /// Table-specific fields in column order.
    pub fields: Vec<FieldSpec>,
    /// Declared unique and composite keys.
    #[serde(default)]
    pub keys: Vec<Vec<String>>,
}

/// Schema-level description of one table.
///
/// A descriptor is immutable once built and shared by every record of the
/// table. Besides the declared fields every table carries the reserved
/// parent columns `id`, `created` and `last_updated`.
pub struct TableDescriptor {
    name: String,
    fields: Vec<FieldSpec>,
    keys: Vec<KeySet>,
    hooks: Arc<dyn RecordHooks>,
}

impl TableDescriptor {
    /// Starts building a descriptor for `name`.
    pub fn builder(name: impl Into<String>) -> TableBuilder {
        TableBuilder {
            name: name.into(),
            fields: Vec::new(),
            keys: Vec::new(),
            hooks: None,
        }
    }

    /// Builds a descriptor from a deserialized schema.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::Schema`] if the schema is malformed.
    pub fn from_schema(
        schema: TableSchema,
        hooks: Option<Arc<dyn RecordHooks>>,
    ) -> RecordResult<Arc<Self>> {
        let mut builder = Self::builder(schema.name);
        for field in schema.fields {
            builder = builder.field(field.name, field.data_type);
        }
        for key in schema.keys {
            builder = builder.composite_key(key);
        }
        if let Some(hooks) = hooks {
            builder = builder.hooks(hooks);
        }
        builder.build()
    }

    /// Builds a descriptor from schema JSON, with no hooks.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::Schema`] if the JSON does not parse or the
    /// schema is malformed.
    pub fn from_json(json: &str) -> RecordResult<Arc<Self>> {
        let schema: TableSchema = serde_json::from_str(json)
            .map_err(|e| RecordError::schema(format!("cannot parse table schema: {e}")))?;
        Self::from_schema(schema, None)
    }

    /// Returns the serializable form of this descriptor.
    #[must_use]
    pub fn to_schema(&self) -> TableSchema {
        TableSchema {
            name: self.name.clone(),
            fields: self.fields.clone(),
            keys: self
                .keys
                .iter()
                .map(|k| k.fields().map(String::from).collect())
                .collect(),
        }
    }

    /// Table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Table-specific fields in column order.
    #[must_use]
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Declared key sets.
    #[must_use]
    pub fn keys(&self) -> &[KeySet] {
        &self.keys
    }

    /// Lifecycle hooks of the record type.
    #[must_use]
    pub fn hooks(&self) -> &Arc<dyn RecordHooks> {
        &self.hooks
    }

    /// Data type of a table-specific field.
    #[must_use]
    pub fn child_field_type(&self, name: &str) -> Option<DataType> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.data_type)
    }

    /// Data type of any field, including the parent columns.
    #[must_use]
    pub fn field_type(&self, name: &str) -> Option<DataType> {
        match name {
            ID_FIELD => Some(DataType::Integer),
            CREATED_FIELD | LAST_UPDATED_FIELD => Some(DataType::Timestamp),
            _ => self.child_field_type(name),
        }
    }

    /// All column names: parent columns first, then fields in order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        PARENT_FIELDS
            .iter()
            .copied()
            .chain(self.fields.iter().map(|f| f.name.as_str()))
    }

    /// Returns true if `candidate` is a valid lookup key for this table.
    pub fn is_valid_key<'a, I>(&self, candidate: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        is_valid_key(self, candidate)
    }
}

impl fmt::Debug for TableDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableDescriptor")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("keys", &self.keys)
            .finish_non_exhaustive()
    }
}

/// Builder for [`TableDescriptor`].
///
/// ```rust
/// use recordkit_core::TableDescriptor;
/// use recordkit_driver::DataType;
///
/// let users = TableDescriptor::builder("users")
///     .field("email", DataType::String)
///     .field("team_id", DataType::ForeignKey)
///     .unique_key("email")
///     .build()
///     .unwrap();
/// assert!(users.is_valid_key(["email"]));
/// ```
#[must_use]
pub struct TableBuilder {
    name: String,
    fields: Vec<FieldSpec>,
    keys: Vec<Vec<String>>,
    hooks: Option<Arc<dyn RecordHooks>>,
}

impl TableBuilder {
    /// Declares a table-specific field.
    pub fn field(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            data_type,
        });
        self
    }

    /// Declares a single-field unique key.
    pub fn unique_key(mut self, field: impl Into<String>) -> Self {
        self.keys.push(vec![field.into()]);
        self
    }

    /// Declares a composite key.
    pub fn composite_key<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keys.push(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the record type's lifecycle hooks.
    pub fn hooks(mut self, hooks: Arc<dyn RecordHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Validates and builds the descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::Schema`] if a name is not a plain identifier,
    /// a field shadows a parent column or is declared twice, or a key set is
    /// empty or names an undeclared field.
    pub fn build(self) -> RecordResult<Arc<TableDescriptor>> {
        if !is_identifier(&self.name) {
            return Err(RecordError::schema(format!(
                "table name {:?} is not a plain identifier",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if !is_identifier(&field.name) {
                return Err(RecordError::schema(format!(
                    "field name {:?} in table {} is not a plain identifier",
                    field.name, self.name
                )));
            }
            if is_parent_field(&field.name) {
                return Err(RecordError::schema(format!(
                    "field {} in table {} shadows a reserved column",
                    field.name, self.name
                )));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(RecordError::schema(format!(
                    "field {} declared twice in table {}",
                    field.name, self.name
                )));
            }
        }

        let mut keys = Vec::with_capacity(self.keys.len());
        for names in self.keys {
            if names.is_empty() {
                return Err(RecordError::schema(format!(
                    "empty key set in table {}",
                    self.name
                )));
            }
            if let Some(missing) = names.iter().find(|n| !seen.contains(n.as_str())) {
                return Err(RecordError::schema(format!(
                    "key field {missing} is not declared in table {}",
                    self.name
                )));
            }
            let key = KeySet::new(names);
            if !keys.contains(&key) {
                keys.push(key);
            }
        }

        Ok(Arc::new(TableDescriptor {
            name: self.name,
            fields: self.fields,
            keys,
            hooks: self.hooks.unwrap_or_else(|| Arc::new(NoHooks)),
        }))
    }
}

/// Returns true for `[A-Za-z_][A-Za-z0-9_]*`.
///
/// Names are interpolated into query text, so only plain identifiers are
/// accepted.
#[must_use]
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
