use std::collections::HashMap;

use indexmap::IndexMap;

use super::{
    arg, array_arg, data, function_arg, row_object, safe_key, safe_key_str, truthy, BuiltinFn,
    FunctionContext, MapKey,
};
use crate::error::{EvalError, EvalResult};
use crate::value::{Function, Record, Value};

pub(super) const FUNCTIONS: &[(&str, BuiltinFn)] = &[
    ("col", col),
    ("map", map),
    ("sum", sum),
    ("filter", filter),
    ("sortBy", data::sort_by),
    ("groupBy", group_by),
    ("agg", agg),
    ("join", join),
];

fn column(args: &[Value], prefix: &str) -> EvalResult<Vec<Value>> {
    let rows = array_arg(args, 0, &format!("{prefix}: expected rows array"))?;
    let key = safe_key(arg(args, 1), prefix)?;
    rows.iter()
        .map(|row| {
            let record = row_object(row, &format!("{prefix}: expected row objects"))?;
            Ok(record.get(key).cloned().unwrap_or(Value::Null))
        })
        .collect()
}

fn col(_: &dyn FunctionContext, args: &[Value]) -> EvalResult<Value> {
    column(args, "col").map(Value::array)
}

fn map(cx: &dyn FunctionContext, args: &[Value]) -> EvalResult<Value> {
    let rows = array_arg(args, 0, "map: expected rows array")?;
    let mapper = function_arg(args, 1, "map: expected mapper function")?;
    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            row_object(row, "map: expected row objects")?;
            cx.call(mapper, &[row.clone(), Value::from(i as f64)])
        })
        .collect::<EvalResult<Vec<_>>>()
        .map(Value::array)
}

fn sum(_: &dyn FunctionContext, args: &[Value]) -> EvalResult<Value> {
    let mut total = 0.0;
    for v in column(args, "col")? {
        total += v
            .as_finite()
            .ok_or_else(|| EvalError::function("sum: expected finite numbers"))?;
    }
    Ok(Value::Number(total))
}

fn filter(cx: &dyn FunctionContext, args: &[Value]) -> EvalResult<Value> {
    let rows = array_arg(args, 0, "filter: expected rows array")?;
    let predicate = function_arg(args, 1, "filter: expected predicate function")?;
    let mut out = Vec::new();
    for (i, row) in rows.iter().enumerate() {
        row_object(row, "filter: expected row objects")?;
        if truthy(&cx.call(predicate, &[row.clone(), Value::from(i as f64)])?) {
            out.push(row.clone());
        }
    }
    Ok(Value::array(out))
}

#[derive(Clone, Copy)]
enum GroupKey<'a> {
    Column(&'a str),
    Callback(&'a Function),
}

/// Groups rows by a column name or key callback, keeping first-seen group order. Each group is
/// `{ key, rows }`.
fn group_by(cx: &dyn FunctionContext, args: &[Value]) -> EvalResult<Value> {
    let rows = array_arg(args, 0, "groupBy: expected rows array")?;
    let key = match arg(args, 1) {
        Value::String(_) => GroupKey::Column(safe_key(arg(args, 1), "groupBy")?),
        Value::Function(f) => GroupKey::Callback(f),
        _ => {
            return Err(EvalError::function(
                "groupBy: key must be a string or function",
            ))
        }
    };

    let mut groups: IndexMap<MapKey, (Value, Vec<Value>)> = IndexMap::new();
    for (i, row) in rows.iter().enumerate() {
        let record = row_object(row, "groupBy: expected row objects")?;
        let kv = match key {
            GroupKey::Column(column) => record.get(column).cloned().unwrap_or(Value::Null),
            GroupKey::Callback(f) => cx.call(f, &[row.clone(), Value::from(i as f64)])?,
        };
        let map_key = match &kv {
            Value::Number(n) if !n.is_finite() => {
                return Err(EvalError::function(
                    "groupBy: key values must be finite numbers",
                ))
            }
            Value::Number(_) | Value::String(_) => MapKey::of(&kv),
            _ => None,
        }
        .ok_or_else(|| EvalError::function("groupBy: key values must be strings or numbers"))?;
        groups
            .entry(map_key)
            .or_insert_with(|| (kv, Vec::new()))
            .1
            .push(row.clone());
    }

    Ok(Value::array(
        groups
            .into_values()
            .map(|(key, rows)| group_value(key, rows))
            .collect(),
    ))
}

fn group_value(key: Value, rows: Vec<Value>) -> Value {
    let mut group = Record::new();
    group.insert("key".into(), key);
    group.insert("rows".into(), Value::array(rows));
    Value::object(group)
}

/// Maps each `{ key, rows }` group to an output row object.
fn agg(cx: &dyn FunctionContext, args: &[Value]) -> EvalResult<Value> {
    let groups = array_arg(args, 0, "agg: expected groups array")?;
    let mapper = function_arg(args, 1, "agg: expected mapper function")?;
    let mut out = Vec::with_capacity(groups.len());
    for (i, group) in groups.iter().enumerate() {
        let record = row_object(group, "agg: expected group objects")?;
        let key = record.get("key").cloned().unwrap_or(Value::Null);
        if MapKey::of(&key).is_none() {
            return Err(EvalError::function(
                "agg: group.key must be string or finite number",
            ));
        }
        let rows = match record.get("rows") {
            Some(rows @ Value::Array(_)) => rows.clone(),
            _ => return Err(EvalError::function("agg: group.rows must be an array")),
        };
        let mut arg_group = Record::new();
        arg_group.insert("key".into(), key);
        arg_group.insert("rows".into(), rows);
        let mapped = cx.call(mapper, &[Value::object(arg_group), Value::from(i as f64)])?;
        let mapped = mapped
            .as_object()
            .ok_or_else(|| EvalError::function("agg: mapper must return an object"))?;
        let mut row = Record::new();
        for (k, v) in mapped {
            safe_key_str(k, "agg")?;
            row.insert(k.clone(), v.clone());
        }
        out.push(Value::object(row));
    }
    Ok(Value::array(out))
}

fn join(_: &dyn FunctionContext, args: &[Value]) -> EvalResult<Value> {
    let left_rows = array_arg(args, 0, "join: expected leftRows array")?;
    let right_rows = array_arg(args, 1, "join: expected rightRows array")?;
    let opts = arg(args, 2)
        .as_object()
        .ok_or_else(|| EvalError::function("join: expected opts object"))?;
    let null = Value::Null;
    let option = |name: &str| opts.get(name).unwrap_or(&null);

    let left_key = option("leftKey")
        .as_str()
        .ok_or_else(|| EvalError::function("join: leftKey must be string"))?;
    let right_key = option("rightKey")
        .as_str()
        .ok_or_else(|| EvalError::function("join: rightKey must be string"))?;
    safe_key_str(left_key, "join")?;
    safe_key_str(right_key, "join")?;
    let keep_unmatched = match option("how") {
        Value::Null => false,
        Value::String(how) if how == "inner" => false,
        Value::String(how) if how == "left" => true,
        _ => return Err(EvalError::function("join: how must be 'inner' or 'left'")),
    };
    let right_prefix = option("rightPrefix").as_str().unwrap_or("right_");

    let mut index: HashMap<MapKey, Vec<&Record>> = HashMap::new();
    for row in right_rows {
        let record = row_object(row, "join: expected right row objects")?;
        let key = record
            .get(right_key)
            .and_then(MapKey::of)
            .ok_or_else(|| {
                EvalError::function("join: right key values must be string or finite number")
            })?;
        index.entry(key).or_default().push(record);
    }

    let mut out = Vec::new();
    for row in left_rows {
        let left = row_object(row, "join: expected left row objects")?;
        let key = left.get(left_key).and_then(MapKey::of).ok_or_else(|| {
            EvalError::function("join: left key values must be string or finite number")
        })?;
        match index.get(&key) {
            Some(matches) => {
                for right in matches {
                    out.push(merge_rows(left, Some(*right), right_prefix)?);
                }
            }
            None if keep_unmatched => out.push(merge_rows(left, None, right_prefix)?),
            None => {}
        }
    }
    Ok(Value::array(out))
}

fn merge_rows(left: &Record, right: Option<&Record>, right_prefix: &str) -> EvalResult<Value> {
    let mut row = Record::new();
    for (k, v) in left {
        safe_key_str(k, "join")?;
        row.insert(k.clone(), v.clone());
    }
    for (k, v) in right.into_iter().flatten() {
        safe_key_str(k, "join")?;
        let target = if row.contains_key(k) {
            format!("{right_prefix}{k}")
        } else {
            k.clone()
        };
        safe_key_str(&target, "join")?;
        if row.contains_key(&target) {
            return Err(EvalError::function(format!(
                "join: key collision for '{target}'"
            )));
        }
        row.insert(target, v.clone());
    }
    Ok(Value::object(row))
}
