//! Typed field values.

use crate::error::{DriverError, DriverResult};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Text layout used for timestamps, matching SQL `CURRENT_TIMESTAMP`.
///
/// Fractional seconds are written only when non-zero.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Text layout used for dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Primitive data type of a column.
///
/// The tag tells the driver how to bind a value, e.g. to distinguish
/// "bind as unsigned integer" from "bind as string".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// Signed 64-bit integer.
    Integer,
    /// Unsigned integer. Stored values must fit a signed 64-bit column.
    Unsigned,
    /// Boolean, stored as 0/1.
    Boolean,
    /// UTF-8 text.
    String,
    /// Date and time without zone.
    Timestamp,
    /// Identity of a row in another table.
    ForeignKey,
    /// Calendar date.
    Date,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Integer => "integer",
            DataType::Unsigned => "unsigned",
            DataType::Boolean => "boolean",
            DataType::String => "string",
            DataType::Timestamp => "timestamp",
            DataType::ForeignKey => "foreign_key",
            DataType::Date => "date",
        };
        f.write_str(name)
    }
}

/// A single column value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// Signed integer.
    Integer(i64),
    /// Unsigned integer.
    Unsigned(u64),
    /// Boolean.
    Bool(bool),
    /// Text.
    Text(String),
    /// Timestamp.
    Timestamp(NaiveDateTime),
    /// Date.
    Date(NaiveDate),
}

impl Value {
    /// Returns true for [`Value::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short name of the variant, used in error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Unsigned(_) => "unsigned",
            Value::Bool(_) => "boolean",
            Value::Text(_) => "text",
            Value::Timestamp(_) => "timestamp",
            Value::Date(_) => "date",
        }
    }

    /// Returns the value as a signed integer, if it is one.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            Value::Unsigned(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Returns the value as an unsigned integer, if it is one.
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Unsigned(v) => Some(*v),
            Value::Integer(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Returns the value as a boolean, if it is one.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as text, if it is text.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the value as a timestamp, if it is one.
    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Timestamp(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as a date, if it is one.
    #[must_use]
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::Unsigned(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Text(v) => write!(f, "{v:?}"),
            Value::Timestamp(v) => write!(f, "{}", v.format(TIMESTAMP_FORMAT)),
            Value::Date(v) => write!(f, "{}", v.format(DATE_FORMAT)),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Unsigned(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Unsigned(u64::from(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Timestamp(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// A value paired with the data type it is bound as.
///
/// NULL is accepted for every data type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedField {
    data_type: DataType,
    value: Value,
}

impl TypedField {
    /// Pairs a value with its data type.
    ///
    /// Integer variants are normalized to the representation of the data
    /// type, so `Value::Integer(3)` declared `Unsigned` becomes
    /// `Value::Unsigned(3)`.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Conversion`] if the value is not compatible.
    pub fn new(data_type: DataType, value: Value) -> DriverResult<Self> {
        let value = match (data_type, value) {
            (_, Value::Null) => Value::Null,
            (DataType::Integer | DataType::ForeignKey, v @ (Value::Integer(_) | Value::Unsigned(_))) => {
                match v.as_i64() {
                    Some(i) => Value::Integer(i),
                    None => return Err(DriverError::OutOfRange(format!("{v} exceeds i64"))),
                }
            }
            (DataType::Unsigned, v @ (Value::Integer(_) | Value::Unsigned(_))) => match v.as_u64() {
                Some(u) => Value::Unsigned(u),
                None => return Err(DriverError::conversion(data_type, format!("negative {v}"))),
            },
            (DataType::Boolean, v @ Value::Bool(_))
            | (DataType::String, v @ Value::Text(_))
            | (DataType::Timestamp, v @ Value::Timestamp(_))
            | (DataType::Date, v @ Value::Date(_)) => v,
            (_, other) => return Err(DriverError::conversion(data_type, other.kind())),
        };
        Ok(Self { data_type, value })
    }

    /// A NULL of the given type.
    #[must_use]
    pub fn null(data_type: DataType) -> Self {
        Self {
            data_type,
            value: Value::Null,
        }
    }

    /// Converts a raw column value as returned by a driver into `data_type`.
    ///
    /// Drivers return integers and text; booleans come back as 0/1 and
    /// timestamps and dates as text in [`TIMESTAMP_FORMAT`] / [`DATE_FORMAT`].
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Conversion`] if the raw value cannot represent
    /// the declared type.
    pub fn coerce(data_type: DataType, raw: Value) -> DriverResult<Self> {
        match (data_type, raw) {
            (DataType::Boolean, Value::Integer(0)) => Self::new(data_type, Value::Bool(false)),
            (DataType::Boolean, Value::Integer(1)) => Self::new(data_type, Value::Bool(true)),
            (DataType::Timestamp, Value::Text(text)) => {
                let ts = parse_timestamp(&text)
                    .ok_or_else(|| DriverError::conversion(data_type, format!("text {text:?}")))?;
                Self::new(data_type, Value::Timestamp(ts))
            }
            (DataType::Date, Value::Text(text)) => {
                let date = NaiveDate::parse_from_str(&text, DATE_FORMAT)
                    .map_err(|_| DriverError::conversion(data_type, format!("text {text:?}")))?;
                Self::new(data_type, Value::Date(date))
            }
            (_, raw) => Self::new(data_type, raw),
        }
    }

    /// Returns the data type.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Returns the value.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Consumes the field, returning the value.
    #[must_use]
    pub fn into_value(self) -> Value {
        self.value
    }
}

fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
}

/// A named value bound to a statement placeholder.
///
/// `name` is the field name without the leading `:`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    /// Placeholder name.
    pub name: String,
    /// Value and bind type.
    pub field: TypedField,
}

impl Binding {
    /// Creates a binding.
    pub fn new(name: impl Into<String>, field: TypedField) -> Self {
        Self {
            name: name.into(),
            field,
        }
    }

    /// The placeholder as it appears in query text.
    #[must_use]
    pub fn placeholder(&self) -> String {
        format!(":{}", self.name)
    }
}

/// A row returned by a statement.
///
/// Values are raw: integers, text or NULL as the driver produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// Creates a row. `values` must be in `columns` order.
    #[must_use]
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    /// Returns the value of a column by name.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
    }

    /// Column names in result order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the row has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Consumes the row into `(column, value)` pairs.
    pub fn into_pairs(self) -> impl Iterator<Item = (String, Value)> {
        let columns = self.columns;
        self.values
            .into_iter()
            .enumerate()
            .map(move |(i, v)| (columns[i].clone(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(text: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn null_accepted_for_every_type() {
        for dt in [
            DataType::Integer,
            DataType::Unsigned,
            DataType::Boolean,
            DataType::String,
            DataType::Timestamp,
            DataType::ForeignKey,
            DataType::Date,
        ] {
            assert!(TypedField::new(dt, Value::Null).unwrap().value().is_null());
        }
    }

    #[test]
    fn unsigned_normalizes_integer() {
        let field = TypedField::new(DataType::Unsigned, Value::Integer(7)).unwrap();
        assert_eq!(field.value(), &Value::Unsigned(7));
    }

    #[test]
    fn unsigned_rejects_negative() {
        let result = TypedField::new(DataType::Unsigned, Value::Integer(-1));
        assert!(matches!(result, Err(DriverError::Conversion { .. })));
    }

    #[test]
    fn integer_rejects_oversized_unsigned() {
        let result = TypedField::new(DataType::Integer, Value::Unsigned(u64::MAX));
        assert!(matches!(result, Err(DriverError::OutOfRange(_))));
    }

    #[test]
    fn string_rejects_integer() {
        let result = TypedField::new(DataType::String, Value::Integer(1));
        assert!(result.is_err());
    }

    #[test]
    fn coerce_boolean_from_integer() {
        let field = TypedField::coerce(DataType::Boolean, Value::Integer(1)).unwrap();
        assert_eq!(field.value(), &Value::Bool(true));
        assert!(TypedField::coerce(DataType::Boolean, Value::Integer(2)).is_err());
    }

    #[test]
    fn coerce_timestamp_from_text() {
        let field =
            TypedField::coerce(DataType::Timestamp, Value::Text("2024-05-01 10:20:30".into()))
                .unwrap();
        assert_eq!(field.value(), &Value::Timestamp(ts("2024-05-01 10:20:30")));

        let iso =
            TypedField::coerce(DataType::Timestamp, Value::Text("2024-05-01T10:20:30".into()))
                .unwrap();
        assert_eq!(iso.value(), field.value());
    }

    #[test]
    fn coerce_timestamp_with_fraction() {
        let field = TypedField::coerce(
            DataType::Timestamp,
            Value::Text("2024-05-01 10:20:30.250".into()),
        )
        .unwrap();
        let expected = ts("2024-05-01 10:20:30") + chrono::Duration::milliseconds(250);
        assert_eq!(field.value(), &Value::Timestamp(expected));
    }

    #[test]
    fn coerce_date_rejects_garbage() {
        let result = TypedField::coerce(DataType::Date, Value::Text("yesterday".into()));
        assert!(matches!(result, Err(DriverError::Conversion { .. })));
    }

    #[test]
    fn timestamp_display_omits_zero_fraction() {
        let value = Value::Timestamp(ts("2024-01-02 03:04:05"));
        assert_eq!(value.to_string(), "2024-01-02 03:04:05");
    }

    #[test]
    fn row_lookup_by_name() {
        let columns: Arc<[String]> = vec!["id".to_string(), "name".to_string()].into();
        let row = Row::new(columns, vec![Value::Integer(1), Value::Text("A".into())]);
        assert_eq!(row.get("name"), Some(&Value::Text("A".into())));
        assert_eq!(row.get("missing"), None);
        assert_eq!(row.len(), 2);
    }

    #[test]
    fn option_into_value() {
        let none: Option<&str> = None;
        assert_eq!(Value::from(none), Value::Null);
        assert_eq!(Value::from(Some(5i64)), Value::Integer(5));
    }
}
