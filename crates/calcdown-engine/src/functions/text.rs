use super::{arg, integer_arg, BuiltinFn, FunctionContext};
use crate::error::{EvalError, EvalResult};
use crate::value::{format_number, Value};

pub(super) const FUNCTIONS: &[(&str, BuiltinFn)] = &[("concat", concat), ("repeat", repeat)];

/// Upper bound on the size of a repeated string.
const MAX_REPEAT_BYTES: usize = 1 << 26;

fn part_text(value: &Value, label: &str) -> EvalResult<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) if n.is_finite() => Ok(format_number(*n)),
        Value::Number(_) => Err(EvalError::function(format!("{label}: expected finite numbers"))),
        _ => Err(EvalError::function(format!(
            "{label}: expected string or finite number"
        ))),
    }
}

/// Concatenates scalars, or broadcasts across equal-length arrays.
fn concat(_: &dyn FunctionContext, args: &[Value]) -> EvalResult<Value> {
    let mut len = None;
    for part in args {
        if let Some(items) = part.as_array() {
            match len {
                None => len = Some(items.len()),
                Some(n) if n != items.len() => {
                    return Err(EvalError::function("concat: array length mismatch"))
                }
                Some(_) => {}
            }
        }
    }

    let Some(len) = len else {
        let mut out = String::new();
        for part in args {
            out.push_str(&part_text(part, "concat")?);
        }
        return Ok(Value::String(out));
    };

    let mut out = Vec::with_capacity(len);
    for i in 0..len {
        let label = format!("concat [index {i}]");
        let mut s = String::new();
        for part in args {
            let v = match part.as_array() {
                Some(items) => &items[i],
                None => part,
            };
            s.push_str(&part_text(v, &label)?);
        }
        out.push(Value::String(s));
    }
    Ok(Value::array(out))
}

fn repeat_one(text: &str, count: usize) -> EvalResult<String> {
    if text.len().saturating_mul(count) > MAX_REPEAT_BYTES {
        return Err(EvalError::function("repeat: result is too large"));
    }
    Ok(text.repeat(count))
}

fn repeat(_: &dyn FunctionContext, args: &[Value]) -> EvalResult<Value> {
    const COUNT: &str = "repeat: count must be a non-negative integer";
    let count = integer_arg(args, 1, COUNT)?;
    if count < 0.0 {
        return Err(EvalError::function(COUNT));
    }
    let count = count as usize;
    match arg(args, 0) {
        Value::String(s) => Ok(Value::String(repeat_one(s, count)?)),
        Value::Array(items) => items
            .iter()
            .map(|v| match v {
                Value::String(s) => repeat_one(s, count).map(Value::String),
                _ => Err(EvalError::function("repeat: expected string array")),
            })
            .collect::<EvalResult<Vec<_>>>()
            .map(Value::array),
        _ => Err(EvalError::function(
            "repeat: expected string or string array",
        )),
    }
}
