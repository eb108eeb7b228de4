//! Core type definitions for RecordKit.

use recordkit_driver::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Name of the server-generated identity column.
pub const ID_FIELD: &str = "id";

/// Name of the server-defaulted creation timestamp column.
pub const CREATED_FIELD: &str = "created";

/// Name of the server-updated modification timestamp column.
pub const LAST_UPDATED_FIELD: &str = "last_updated";

/// The reserved columns every table carries, in column order.
pub const PARENT_FIELDS: [&str; 3] = [ID_FIELD, CREATED_FIELD, LAST_UPDATED_FIELD];

/// Returns true if `name` is one of the reserved parent columns.
#[must_use]
pub fn is_parent_field(name: &str) -> bool {
    PARENT_FIELDS.contains(&name)
}

/// Field values keyed by field name.
///
/// Ordered by name, so the same set of names always yields the same
/// query shape.
pub type FieldValues = BTreeMap<String, Value>;

/// Builds [`FieldValues`] from pairs.
///
/// ```rust
/// use recordkit_core::field_values;
///
/// let values = field_values([("name", "A"), ("email", "a@example.com")]);
/// assert_eq!(values.len(), 2);
/// ```
pub fn field_values<I, K, V>(pairs: I) -> FieldValues
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Identity of a row, generated by the database on insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(pub i64);

impl RecordId {
    /// Creates a record ID.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<RecordId> for Value {
    fn from(id: RecordId) -> Self {
        Value::Integer(id.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_fields_are_reserved() {
        assert!(is_parent_field("id"));
        assert!(is_parent_field("created"));
        assert!(is_parent_field("last_updated"));
        assert!(!is_parent_field("name"));
    }

    #[test]
    fn field_values_are_ordered_by_name() {
        let values = field_values([("b", 2i64), ("a", 1i64)]);
        let names: Vec<_> = values.keys().cloned().collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn record_id_into_value() {
        assert_eq!(Value::from(RecordId::new(9)), Value::Integer(9));
        assert_eq!(RecordId::new(9).to_string(), "9");
    }
}
