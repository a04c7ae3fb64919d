//! Polars `AnyValue` conversion into model cells.

use polars::prelude::*;

use batchprep_model::{Value, format_numeric};

/// Converts a Polars `AnyValue` into a [`Value`].
///
/// Nulls and empty strings become [`Value::Missing`]; every other value is
/// kept as text so downstream rendering matches the streaming reader.
pub fn any_to_value(value: AnyValue<'_>) -> Value {
    match value {
        AnyValue::Null => Value::Missing,
        AnyValue::String(s) => Value::from_field(s),
        AnyValue::StringOwned(s) => Value::from_field(s.as_str()),
        AnyValue::Int8(v) => Value::Text(v.to_string()),
        AnyValue::Int16(v) => Value::Text(v.to_string()),
        AnyValue::Int32(v) => Value::Text(v.to_string()),
        AnyValue::Int64(v) => Value::Text(v.to_string()),
        AnyValue::UInt8(v) => Value::Text(v.to_string()),
        AnyValue::UInt16(v) => Value::Text(v.to_string()),
        AnyValue::UInt32(v) => Value::Text(v.to_string()),
        AnyValue::UInt64(v) => Value::Text(v.to_string()),
        AnyValue::Float32(v) => Value::Text(format_numeric(f64::from(v))),
        AnyValue::Float64(v) => Value::Text(format_numeric(v)),
        other => {
            let s = other.to_string();
            // Strip surrounding quotes that might come from formatting
            if s.starts_with('"') && s.ends_with('"') && s.len() >= 2 {
                Value::from_field(&s[1..s.len() - 1])
            } else {
                Value::from_field(&s)
            }
        }
    }
}
