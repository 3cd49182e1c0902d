use std::cmp::Ordering;

use super::{arg, array_arg, function_arg, integer_arg, row_object, safe_key, truthy, BuiltinFn, FunctionContext};
use crate::error::{EvalError, EvalResult};
use crate::value::Value;

pub(super) const FUNCTIONS: &[(&str, BuiltinFn)] = &[
    ("sequence", sequence),
    ("filter", filter),
    ("sortBy", sort_by),
    ("last", last),
    ("scan", scan),
];

/// Upper bound on generated sequences.
const MAX_SEQUENCE_LEN: usize = 10_000_000;

fn sequence(_: &dyn FunctionContext, args: &[Value]) -> EvalResult<Value> {
    const COUNT: &str = "sequence: count must be a non-negative integer";
    let count = integer_arg(args, 0, COUNT)?;
    if count < 0.0 {
        return Err(EvalError::function(COUNT));
    }
    if count > MAX_SEQUENCE_LEN as f64 {
        return Err(EvalError::function("sequence: count is too large"));
    }
    let opts = arg(args, 1).as_object();
    let option = |key: &str| -> EvalResult<f64> {
        match opts.and_then(|o| o.get(key)) {
            None | Some(Value::Null) => Ok(1.0),
            Some(v) => v
                .as_finite()
                .ok_or_else(|| EvalError::function(format!("sequence: {key} must be finite"))),
        }
    };
    let start = option("start")?;
    let step = option("step")?;
    Ok(Value::array(
        (0..count as usize)
            .map(|i| Value::Number(start + i as f64 * step))
            .collect(),
    ))
}

fn filter(cx: &dyn FunctionContext, args: &[Value]) -> EvalResult<Value> {
    let items = array_arg(args, 0, "filter: expected array")?;
    let predicate = function_arg(args, 1, "filter: expected predicate function")?;
    let mut out = Vec::new();
    for (i, item) in items.iter().enumerate() {
        if truthy(&cx.call(predicate, &[item.clone(), Value::from(i as f64)])?) {
            out.push(item.clone());
        }
    }
    Ok(Value::array(out))
}

#[derive(Debug, Clone, PartialEq)]
enum SortKey {
    Missing,
    Number(f64),
    Text(String),
}

fn sort_key(row: &Value, key: &str) -> EvalResult<SortKey> {
    let record = row_object(row, "sortBy: expected row objects")?;
    match record.get(key) {
        None | Some(Value::Null) => Ok(SortKey::Missing),
        Some(v @ (Value::Date(_) | Value::DateTime(_))) => Ok(SortKey::Number(
            v.as_instant()
                .map(|dt| dt.timestamp_millis() as f64)
                .unwrap_or_default(),
        )),
        Some(Value::Number(n)) if n.is_finite() => Ok(SortKey::Number(*n)),
        Some(Value::Number(_)) => Err(EvalError::function(
            "sortBy: expected finite number keys",
        )),
        Some(Value::String(s)) => Ok(SortKey::Text(s.clone())),
        Some(_) => Err(EvalError::function("sortBy: unsupported key type")),
    }
}

/// Stable sort of row objects by one column. Rows whose key is missing or null go last in
/// either direction; mixing numeric and text keys is an error.
pub(crate) fn sort_rows(rows: &[Value], key: &str, descending: bool) -> EvalResult<Vec<Value>> {
    let mut keyed = rows
        .iter()
        .map(|row| Ok((sort_key(row, key)?, row)))
        .collect::<EvalResult<Vec<_>>>()?;

    let mut numeric = None;
    for (k, _) in &keyed {
        let is_number = match k {
            SortKey::Missing => continue,
            SortKey::Number(_) => true,
            SortKey::Text(_) => false,
        };
        if *numeric.get_or_insert(is_number) != is_number {
            return Err(EvalError::function("sortBy: mixed key types"));
        }
    }

    keyed.sort_by(|(a, _), (b, _)| {
        let ord = match (a, b) {
            (SortKey::Missing, SortKey::Missing) => return Ordering::Equal,
            (SortKey::Missing, _) => return Ordering::Greater,
            (_, SortKey::Missing) => return Ordering::Less,
            (SortKey::Number(x), SortKey::Number(y)) => x.total_cmp(y),
            (SortKey::Text(x), SortKey::Text(y)) => x.cmp(y),
            _ => Ordering::Equal,
        };
        if descending {
            ord.reverse()
        } else {
            ord
        }
    });
    Ok(keyed.into_iter().map(|(_, row)| row.clone()).collect())
}

pub(super) fn sort_by(_: &dyn FunctionContext, args: &[Value]) -> EvalResult<Value> {
    let rows = array_arg(args, 0, "sortBy: expected rows array")?;
    let key = safe_key(arg(args, 1), "sortBy")?;
    let descending = match arg(args, 2) {
        Value::Null => false,
        Value::String(dir) if dir == "asc" => false,
        Value::String(dir) if dir == "desc" => true,
        _ => {
            return Err(EvalError::function(
                "sortBy: direction must be 'asc' or 'desc'",
            ))
        }
    };
    sort_rows(rows, key, descending).map(Value::array)
}

fn last(_: &dyn FunctionContext, args: &[Value]) -> EvalResult<Value> {
    let items = array_arg(args, 0, "last: expected array")?;
    items
        .last()
        .cloned()
        .ok_or_else(|| EvalError::function("last: empty array"))
}

/// Running fold: `reducer(state, item, index)` for each item, collecting every state.
fn scan(cx: &dyn FunctionContext, args: &[Value]) -> EvalResult<Value> {
    let items = array_arg(args, 0, "scan: expected array items")?;
    let reducer = function_arg(args, 1, "scan: expected reducer function")?;
    let seed_arg = arg(args, 2);
    let mut state = match seed_arg.as_object().and_then(|o| o.get("seed")) {
        Some(seed) => seed.clone(),
        None => seed_arg.clone(),
    };
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        state = cx.call(reducer, &[state, item.clone(), Value::from(i as f64)])?;
        out.push(state.clone());
    }
    Ok(Value::array(out))
}
