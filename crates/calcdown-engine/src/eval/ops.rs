//! Operator semantics: broadcasting arithmetic and concatenation, comparisons, equality.

use crate::ast::BinaryOp;
use crate::error::{EvalError, EvalResult};
use crate::value::{format_number, Value};

fn expect_finite(value: &Value, label: &str) -> EvalResult<f64> {
    value
        .as_finite()
        .ok_or_else(|| EvalError::type_error(format!("{label} expects finite number")))
}

fn finite(n: f64) -> EvalResult<f64> {
    if n.is_finite() {
        Ok(n)
    } else {
        Err(EvalError::NonFinite)
    }
}

pub(crate) fn expect_bool(value: &Value, label: &str) -> EvalResult<bool> {
    value
        .as_bool()
        .ok_or_else(|| EvalError::type_error(format!("{label} expects boolean")))
}

fn scalar_arith(op: BinaryOp, x: f64, y: f64) -> EvalResult<f64> {
    let n = match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x * y,
        BinaryOp::Div => {
            if y == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            x / y
        }
        BinaryOp::Pow => x.powf(y),
        other => {
            return Err(EvalError::type_error(format!(
                "Unsupported binary op: {other}"
            )))
        }
    };
    finite(n)
}

/// `+ - * / **` over scalars and arrays.
///
/// Two arrays must have equal length and combine elementwise; a scalar operand is broadcast
/// across the other side's elements.
pub fn arithmetic(op: BinaryOp, a: &Value, b: &Value) -> EvalResult<Value> {
    let label = format!("Binary '{op}'");
    let index_label = |i: usize| format!("{label} [index {i}]");
    match (a, b) {
        (Value::Array(xs), Value::Array(ys)) => {
            if xs.len() != ys.len() {
                return Err(EvalError::type_error(format!(
                    "Vector length mismatch: {} vs {}",
                    xs.len(),
                    ys.len()
                )));
            }
            xs.iter()
                .zip(ys.iter())
                .enumerate()
                .map(|(i, (x, y))| {
                    let x = expect_finite(x, &index_label(i))?;
                    let y = expect_finite(y, &index_label(i))?;
                    scalar_arith(op, x, y).map(Value::Number)
                })
                .collect::<EvalResult<Vec<_>>>()
                .map(Value::array)
        }
        (Value::Array(xs), scalar) => {
            let y = expect_finite(scalar, &format!("{label} (scalar right)"))?;
            xs.iter()
                .enumerate()
                .map(|(i, x)| {
                    let x = expect_finite(x, &index_label(i))?;
                    scalar_arith(op, x, y).map(Value::Number)
                })
                .collect::<EvalResult<Vec<_>>>()
                .map(Value::array)
        }
        (scalar, Value::Array(ys)) => {
            let x = expect_finite(scalar, &format!("{label} (scalar left)"))?;
            ys.iter()
                .enumerate()
                .map(|(i, y)| {
                    let y = expect_finite(y, &index_label(i))?;
                    scalar_arith(op, x, y).map(Value::Number)
                })
                .collect::<EvalResult<Vec<_>>>()
                .map(Value::array)
        }
        (a, b) => {
            let x = expect_finite(a, &label)?;
            let y = expect_finite(b, &label)?;
            scalar_arith(op, x, y).map(Value::Number)
        }
    }
}

/// Eager binary operators. `&&` and `||` short-circuit in the interpreter and never reach here.
pub fn apply(op: BinaryOp, a: &Value, b: &Value) -> EvalResult<Value> {
    match op {
        BinaryOp::Concat => concat(a, b),
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Pow => {
            arithmetic(op, a, b)
        }
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => compare(op, a, b),
        BinaryOp::Eq => strict_equals(a, b).map(Value::Bool),
        BinaryOp::Ne => strict_equals(a, b).map(|eq| Value::Bool(!eq)),
        BinaryOp::And | BinaryOp::Or => Err(EvalError::type_error(format!(
            "Unsupported binary op: {op}"
        ))),
    }
}

fn concat_part(value: &Value, label: &str) -> EvalResult<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) if n.is_finite() => Ok(format_number(*n)),
        Value::Number(_) => Err(EvalError::type_error(format!(
            "{label} expects finite number"
        ))),
        _ => Err(EvalError::type_error(format!(
            "{label} expects string or finite number"
        ))),
    }
}

/// `&`: string concatenation with the same broadcasting rules as arithmetic.
pub fn concat(a: &Value, b: &Value) -> EvalResult<Value> {
    const LABEL: &str = "Binary '&'";
    let index_label = |i: usize| format!("{LABEL} [index {i}]");
    let joined = |x: &Value, y: &Value, i: usize| -> EvalResult<Value> {
        let label = index_label(i);
        Ok(Value::String(concat_part(x, &label)? + &concat_part(y, &label)?))
    };
    match (a, b) {
        (Value::Array(xs), Value::Array(ys)) => {
            if xs.len() != ys.len() {
                return Err(EvalError::type_error(format!(
                    "{LABEL} vector length mismatch: {} vs {}",
                    xs.len(),
                    ys.len()
                )));
            }
            xs.iter()
                .zip(ys.iter())
                .enumerate()
                .map(|(i, (x, y))| joined(x, y, i))
                .collect::<EvalResult<Vec<_>>>()
                .map(Value::array)
        }
        (Value::Array(xs), scalar) => {
            let right = concat_part(scalar, &format!("{LABEL} (scalar right)"))?;
            xs.iter()
                .enumerate()
                .map(|(i, x)| Ok(Value::String(concat_part(x, &index_label(i))? + &right)))
                .collect::<EvalResult<Vec<_>>>()
                .map(Value::array)
        }
        (scalar, Value::Array(ys)) => {
            let left = concat_part(scalar, &format!("{LABEL} (scalar left)"))?;
            ys.iter()
                .enumerate()
                .map(|(i, y)| Ok(Value::String(left.clone() + &concat_part(y, &index_label(i))?)))
                .collect::<EvalResult<Vec<_>>>()
                .map(Value::array)
        }
        (a, b) => Ok(Value::String(
            concat_part(a, LABEL)? + &concat_part(b, LABEL)?,
        )),
    }
}

/// `< <= > >=` on two finite numbers or two dates/datetimes. No broadcasting.
pub fn compare(op: BinaryOp, a: &Value, b: &Value) -> EvalResult<Value> {
    let label = format!("Binary '{op}'");
    let ordering = match (a, b) {
        (Value::Number(_), Value::Number(_)) => {
            let x = expect_finite(a, &label)?;
            let y = expect_finite(b, &label)?;
            x.partial_cmp(&y)
        }
        _ => match (a.as_instant(), b.as_instant()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => None,
        },
    }
    .ok_or_else(|| EvalError::type_error(format!("{label} expects numbers or dates")))?;
    let result = match op {
        BinaryOp::Lt => ordering.is_lt(),
        BinaryOp::Le => ordering.is_le(),
        BinaryOp::Gt => ordering.is_gt(),
        BinaryOp::Ge => ordering.is_ge(),
        other => {
            return Err(EvalError::type_error(format!(
                "Unsupported binary op: {other}"
            )))
        }
    };
    Ok(Value::Bool(result))
}

fn is_primitive(value: &Value) -> bool {
    matches!(value, Value::Number(_) | Value::String(_) | Value::Bool(_))
}

fn is_date(value: &Value) -> bool {
    matches!(value, Value::Date(_) | Value::DateTime(_))
}

/// Strict equality shared by `==` and `!=`.
///
/// Same-kind scalars compare by value; `null` equals only `null`; mixed primitive or date pairs
/// are unequal. Arrays, objects and functions cannot be compared with each other.
pub fn strict_equals(a: &Value, b: &Value) -> EvalResult<bool> {
    const LABEL: &str = "Binary '=='";
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => {
            Ok(expect_finite(a, LABEL)? == expect_finite(b, LABEL)?)
        }
        (Value::String(x), Value::String(y)) => Ok(x == y),
        (Value::Bool(x), Value::Bool(y)) => Ok(x == y),
        _ if is_date(a) && is_date(b) => Ok(a.as_instant() == b.as_instant()),
        (Value::Null, Value::Null) => Ok(true),
        (Value::Null, _) | (_, Value::Null) => Ok(false),
        _ if is_primitive(a) || is_primitive(b) => Ok(false),
        _ if is_date(a) || is_date(b) => Ok(false),
        _ => Err(EvalError::type_error(
            "Binary '==' expects comparable scalars",
        )),
    }
}

/// Unary minus, elementwise over arrays.
pub fn negate(value: &Value) -> EvalResult<Value> {
    const LABEL: &str = "Unary '-'";
    match value {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let n = expect_finite(v, &format!("{LABEL} [index {i}]"))?;
                finite(-n).map(Value::Number)
            })
            .collect::<EvalResult<Vec<_>>>()
            .map(Value::array),
        scalar => {
            let n = expect_finite(scalar, LABEL)?;
            finite(-n).map(Value::Number)
        }
    }
}
