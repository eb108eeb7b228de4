//! Property-based test generators using proptest.
//!
//! Provides strategies for generating values that survive a round trip
//! through SQLite unchanged.

use chrono::{NaiveDate, NaiveDateTime};
use proptest::prelude::*;
use recordkit_driver::{DataType, TypedField, Value};

/// Strategy for generating plain identifiers that are not reserved columns.
pub fn field_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,15}")
        .expect("Invalid regex")
        .prop_filter("Field name must not be reserved", |s| {
            !matches!(s.as_str(), "id" | "created" | "last_updated")
        })
}

/// Strategy for generating every data type.
pub fn data_type_strategy() -> impl Strategy<Value = DataType> {
    prop_oneof![
        Just(DataType::Integer),
        Just(DataType::Unsigned),
        Just(DataType::Boolean),
        Just(DataType::String),
        Just(DataType::Timestamp),
        Just(DataType::ForeignKey),
        Just(DataType::Date),
    ]
}

/// Strategy for generating dates between 1900 and 2100.
pub fn date_strategy() -> impl Strategy<Value = NaiveDate> {
    (1900i32..2100, 1u32..=12, 1u32..=28)
        .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).expect("valid date"))
}

/// Strategy for generating timestamps with whole-second precision.
pub fn timestamp_strategy() -> impl Strategy<Value = NaiveDateTime> {
    (date_strategy(), 0u32..24, 0u32..60, 0u32..60).prop_map(|(date, h, m, s)| {
        date.and_hms_opt(h, m, s).expect("valid time")
    })
}

/// Strategy for generating a non-NULL value of `data_type`.
pub fn value_strategy(data_type: DataType) -> BoxedStrategy<Value> {
    match data_type {
        DataType::Integer => any::<i64>().prop_map(Value::Integer).boxed(),
        DataType::ForeignKey => (1i64..i64::MAX).prop_map(Value::Integer).boxed(),
        DataType::Unsigned => (0u64..=i64::MAX as u64).prop_map(Value::Unsigned).boxed(),
        DataType::Boolean => any::<bool>().prop_map(Value::Bool).boxed(),
        DataType::String => "\\PC{0,32}".prop_map(Value::Text).boxed(),
        DataType::Timestamp => timestamp_strategy().prop_map(Value::Timestamp).boxed(),
        DataType::Date => date_strategy().prop_map(Value::Date).boxed(),
    }
}

/// Strategy for generating a typed field of any data type, NULL included.
pub fn typed_field_strategy() -> impl Strategy<Value = TypedField> {
    data_type_strategy().prop_flat_map(|data_type| {
        prop_oneof![
            1 => Just(TypedField::null(data_type)),
            4 => value_strategy(data_type).prop_map(move |value| {
                TypedField::new(data_type, value).expect("generated value fits its type")
            }),
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn field_names_are_not_reserved(name in field_name_strategy()) {
            prop_assert!(!["id", "created", "last_updated"].contains(&name.as_str()));
        }

        #[test]
        fn generated_values_fit_their_type(
            (data_type, value) in data_type_strategy()
                .prop_flat_map(|dt| (Just(dt), value_strategy(dt)))
        ) {
            prop_assert!(TypedField::new(data_type, value).is_ok());
        }
    }
}
