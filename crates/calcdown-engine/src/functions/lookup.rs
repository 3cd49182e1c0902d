//! Keyed row lookup.
//!
//! `lookup.index` returns a plain object `{ keyColumn, entries }` where `entries` maps the
//! encoded [`MapKey`] of each key value to the rows carrying it, in input order.

use super::{arg, array_arg, row_object, safe_key_str, BuiltinFn, FunctionContext, MapKey};
use crate::error::{EvalError, EvalResult};
use crate::value::{Record, Value};

pub(super) const FUNCTIONS: &[(&str, BuiltinFn)] =
    &[("index", index), ("get", get), ("xlookup", xlookup)];

const KEY_COLUMN: &str = "keyColumn";
const ENTRIES: &str = "entries";

fn column_arg<'v>(args: &'v [Value], idx: usize, prefix: &str, name: &str) -> EvalResult<&'v str> {
    let column = arg(args, idx)
        .as_str()
        .ok_or_else(|| EvalError::function(format!("{prefix}: {name} must be string")))?;
    safe_key_str(column, prefix)?;
    Ok(column)
}

fn row_key(row: &Value, column: &str, prefix: &str) -> EvalResult<MapKey> {
    let record = row_object(row, &format!("{prefix}: expected row objects"))?;
    record.get(column).and_then(MapKey::of).ok_or_else(|| {
        EvalError::function(format!(
            "{prefix}: key values must be string or finite number"
        ))
    })
}

fn index(_: &dyn FunctionContext, args: &[Value]) -> EvalResult<Value> {
    let rows = array_arg(args, 0, "lookup.index: expected rows array")?;
    let key_column = column_arg(args, 1, "lookup.index", "keyColumn")?;

    let mut buckets: indexmap::IndexMap<String, Vec<Value>> = indexmap::IndexMap::new();
    for row in rows {
        let key = row_key(row, key_column, "lookup.index")?;
        buckets.entry(key.encode()).or_default().push(row.clone());
    }

    let mut entries = Record::new();
    for (key, bucket) in buckets {
        entries.insert(key, Value::array(bucket));
    }
    let mut idx = Record::new();
    idx.insert(KEY_COLUMN.into(), Value::from(key_column));
    idx.insert(ENTRIES.into(), Value::object(entries));
    Ok(Value::object(idx))
}

fn get(_: &dyn FunctionContext, args: &[Value]) -> EvalResult<Value> {
    let entries = arg(args, 0)
        .as_object()
        .filter(|idx| idx.get(KEY_COLUMN).and_then(Value::as_str).is_some())
        .and_then(|idx| idx.get(ENTRIES))
        .and_then(Value::as_object)
        .ok_or_else(|| EvalError::function("lookup.get: invalid index"))?;
    let key = MapKey::of(arg(args, 1)).ok_or_else(|| {
        EvalError::function("lookup.get: key must be string or finite number")
    })?;
    entries
        .get(&key.encode())
        .and_then(Value::as_array)
        .and_then(|bucket| bucket.first())
        .cloned()
        .ok_or_else(|| EvalError::function("lookup.get: key not found"))
}

/// `xlookup(key, rows, keyColumn, valueColumn[, notFound])`: value column of the first row whose
/// key matches. A supplied `notFound` (even `null`) replaces the not-found error.
fn xlookup(_: &dyn FunctionContext, args: &[Value]) -> EvalResult<Value> {
    let rows = array_arg(args, 1, "lookup.xlookup: expected rows array")?;
    let key_column = arg(args, 2)
        .as_str()
        .ok_or_else(|| EvalError::function("lookup.xlookup: keyColumn must be string"))?;
    let value_column = arg(args, 3)
        .as_str()
        .ok_or_else(|| EvalError::function("lookup.xlookup: valueColumn must be string"))?;
    safe_key_str(key_column, "lookup.xlookup")?;
    safe_key_str(value_column, "lookup.xlookup")?;
    let needle = MapKey::of(arg(args, 0)).ok_or_else(|| {
        EvalError::function("lookup.xlookup: key must be string or finite number")
    })?;

    for row in rows {
        if row_key(row, key_column, "lookup.xlookup")? == needle {
            let record = row_object(row, "lookup.xlookup: expected row objects")?;
            return Ok(record.get(value_column).cloned().unwrap_or(Value::Null));
        }
    }
    match args.get(4) {
        Some(not_found) => Ok(not_found.clone()),
        None => Err(EvalError::function("lookup.xlookup: key not found")),
    }
}
