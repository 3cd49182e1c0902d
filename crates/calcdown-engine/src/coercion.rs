//! Conversions of host-supplied values into declared input and column types.
//!
//! Hosts (input forms, table editors, patch statements) hand over loosely typed values; these
//! helpers accept the lenient spellings (numeric strings, `"1"`/`"0"` for booleans, ISO text for
//! dates) and reject everything else with a short message.

use calcdown_model::date::{format_datetime, format_iso_date, parse_datetime, parse_iso_date};
use calcdown_model::{ColumnType, TypeName};

use crate::document::InputDef;
use crate::value::{format_number, parse_number, Value};

fn number_like(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => Some(*n).filter(|n| n.is_finite()),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

fn boolean_like(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        Value::Number(n) if *n == 1.0 => Some(true),
        Value::Number(n) if *n == 0.0 => Some(false),
        _ => None,
    }
}

fn non_blank(value: &Value) -> Option<&str> {
    value.as_str().map(str::trim).filter(|s| !s.is_empty())
}

/// Converts an evaluation-time override for `def` into its declared type.
///
/// Types without a dedicated rule follow the kind of the declared default: numeric defaults
/// accept numbers, boolean defaults accept `true`/`false`, string defaults stringify anything.
pub fn normalize_override_value(def: &InputDef, value: &Value) -> Result<Value, String> {
    let invalid = |expected: &str| format!("Invalid override for {} (expected {expected})", def.name);
    match &def.ty.name {
        TypeName::Date => match value {
            Value::Date(d) => Ok(Value::Date(*d)),
            Value::DateTime(dt) => Ok(Value::Date(dt.date_naive())),
            Value::String(s) => parse_iso_date(s).map(Value::Date).map_err(|e| e.to_string()),
            _ => Err(invalid("date string")),
        },
        TypeName::Integer => number_like(value)
            .map(|n| Value::Number(n.trunc()))
            .ok_or_else(|| invalid("integer")),
        name if name.is_numeric() => number_like(value)
            .map(Value::Number)
            .ok_or_else(|| invalid("number")),
        _ => match &def.default_value {
            Value::Number(_) => number_like(value)
                .map(Value::Number)
                .ok_or_else(|| invalid("number")),
            Value::Bool(_) => match value {
                Value::Bool(b) => Ok(Value::Bool(*b)),
                Value::String(s) if s == "true" => Ok(Value::Bool(true)),
                Value::String(s) if s == "false" => Ok(Value::Bool(false)),
                _ => Err(invalid("boolean")),
            },
            Value::String(_) => Ok(match value {
                Value::String(_) => value.clone(),
                other => Value::string(other.to_string()),
            }),
            default => Ok(default.clone()),
        },
    }
}

/// Coerces the result of a table patch expression to the target column's type.
pub fn coerce_table_cell_value(ty: &ColumnType, value: &Value) -> Result<Value, String> {
    match &ty.name {
        TypeName::String => Ok(match value {
            Value::String(_) => value.clone(),
            other => Value::string(other.to_string()),
        }),
        TypeName::Boolean => boolean_like(value)
            .map(Value::Bool)
            .ok_or_else(|| "Expected boolean value".to_string()),
        TypeName::Integer => number_like(value)
            .map(|n| Value::Number(n.trunc()))
            .ok_or_else(|| "Expected integer value".to_string()),
        name if name.is_numeric() => number_like(value)
            .map(Value::Number)
            .ok_or_else(|| "Expected numeric value".to_string()),
        TypeName::Date => match value {
            Value::Date(d) => Ok(Value::Date(*d)),
            Value::DateTime(dt) => Ok(Value::Date(dt.date_naive())),
            Value::String(s) => parse_iso_date(s).map(Value::Date).map_err(|e| e.to_string()),
            _ => Err("Expected date value".to_string()),
        },
        TypeName::Datetime => match value {
            Value::DateTime(dt) => Ok(Value::DateTime(*dt)),
            Value::Date(_) => value
                .as_instant()
                .map(Value::DateTime)
                .ok_or_else(|| "Expected valid Date".to_string()),
            _ => {
                let text = non_blank(value).ok_or("Expected datetime value")?;
                parse_datetime(text)
                    .map(Value::DateTime)
                    .map_err(|e| e.to_string())
            }
        },
        _ => Ok(value.clone()),
    }
}

/// Source text for an input default, as written back into an `inputs` line.
pub fn input_default_text(ty: &ColumnType, value: &Value) -> Result<String, String> {
    match &ty.name {
        TypeName::String => {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Ok(serde_json::Value::String(text).to_string())
        }
        TypeName::Boolean => boolean_like(value)
            .map(|b| b.to_string())
            .ok_or_else(|| "Expected boolean value".to_string()),
        TypeName::Date => match value {
            Value::Date(d) => Ok(format_iso_date(*d)),
            _ => non_blank(value)
                .map(str::to_string)
                .ok_or_else(|| "Expected date value".to_string()),
        },
        TypeName::Datetime => match value {
            Value::DateTime(dt) => Ok(format_datetime(*dt)),
            _ => non_blank(value)
                .map(str::to_string)
                .ok_or_else(|| "Expected datetime value".to_string()),
        },
        TypeName::Integer => number_like(value)
            .map(|n| format_number(n.trunc()))
            .ok_or_else(|| "Expected integer value".to_string()),
        name if name.is_numeric() => number_like(value)
            .map(format_number)
            .ok_or_else(|| "Expected numeric value".to_string()),
        _ => Ok(value.to_json().to_string()),
    }
}

/// JSON value for a table cell, as written back into a JSONL row.
pub fn json_cell_value(ty: &ColumnType, value: &Value) -> Result<serde_json::Value, String> {
    match &ty.name {
        TypeName::String | TypeName::Boolean | TypeName::Integer => {
            coerce_table_cell_value(ty, value).map(|v| v.to_json())
        }
        name if name.is_numeric() => coerce_table_cell_value(ty, value).map(|v| v.to_json()),
        TypeName::Date => match value {
            Value::Date(d) => Ok(serde_json::Value::String(format_iso_date(*d))),
            _ => non_blank(value)
                .map(|s| serde_json::Value::String(s.to_string()))
                .ok_or_else(|| "Expected date value".to_string()),
        },
        TypeName::Datetime => match value {
            Value::DateTime(dt) => Ok(serde_json::Value::String(format_datetime(*dt))),
            _ => non_blank(value)
                .map(|s| serde_json::Value::String(s.to_string()))
                .ok_or_else(|| "Expected datetime value".to_string()),
        },
        _ => Ok(value.to_json()),
    }
}
