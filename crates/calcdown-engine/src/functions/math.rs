use super::{arg, array_arg, finite_arg, finite_result, BuiltinFn, FunctionContext};
use crate::error::{EvalError, EvalResult};
use crate::value::Value;

pub(super) const FUNCTIONS: &[(&str, BuiltinFn)] = &[
    ("sum", sum),
    ("mean", mean),
    ("minOf", min_of),
    ("maxOf", max_of),
    ("round", round),
    ("abs", abs),
    ("sign", sign),
    ("sqrt", sqrt),
    ("exp", exp),
    ("ln", ln),
    ("log10", log10),
    ("sin", sin),
    ("cos", cos),
    ("tan", tan),
    ("asin", asin),
    ("acos", acos),
    ("atan", atan),
    ("atan2", atan2),
    ("sinh", sinh),
    ("cosh", cosh),
    ("tanh", tanh),
    ("ceil", ceil),
    ("floor", floor),
    ("trunc", trunc),
    ("pow", pow),
];

/// Finite numbers of an array argument; `name` prefixes the error messages.
fn numbers(args: &[Value], name: &str, allow_empty: bool) -> EvalResult<Vec<f64>> {
    let xs = array_arg(args, 0, &format!("{name}: expected array"))?;
    if !allow_empty && xs.is_empty() {
        return Err(EvalError::function(format!("{name}: empty array")));
    }
    xs.iter()
        .map(|v| {
            v.as_finite()
                .ok_or_else(|| EvalError::function(format!("{name}: expected finite number array")))
        })
        .collect()
}

fn sum(_: &dyn FunctionContext, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Number(numbers(args, "sum", true)?.iter().sum()))
}

fn mean(_: &dyn FunctionContext, args: &[Value]) -> EvalResult<Value> {
    let xs = numbers(args, "mean", false)?;
    Ok(Value::Number(xs.iter().sum::<f64>() / xs.len() as f64))
}

fn min_of(_: &dyn FunctionContext, args: &[Value]) -> EvalResult<Value> {
    let xs = numbers(args, "minOf", false)?;
    Ok(Value::Number(xs.into_iter().fold(f64::INFINITY, f64::min)))
}

fn max_of(_: &dyn FunctionContext, args: &[Value]) -> EvalResult<Value> {
    let xs = numbers(args, "maxOf", false)?;
    Ok(Value::Number(xs.into_iter().fold(f64::NEG_INFINITY, f64::max)))
}

/// Spreadsheet rounding: half away from zero, `digits` in `[-12, 12]`.
fn round(_: &dyn FunctionContext, args: &[Value]) -> EvalResult<Value> {
    let x = finite_arg(args, 0, "round: x must be finite")?;
    let digits = match arg(args, 1) {
        Value::Null => 0.0,
        Value::Number(d) if d.is_finite() && d.fract() == 0.0 => *d,
        _ => return Err(EvalError::function("round: digits must be integer")),
    };
    if digits == 0.0 {
        return Ok(Value::Number(x.round()));
    }
    if digits.abs() > 12.0 {
        return Err(EvalError::function("round: digits out of range"));
    }
    let factor = 10f64.powi(digits.abs() as i32);
    let rounded = if digits > 0.0 {
        (x * factor).round() / factor
    } else {
        (x / factor).round() * factor
    };
    finite_result(rounded)
}

fn unary(args: &[Value], name: &str, f: fn(f64) -> f64) -> EvalResult<Value> {
    let x = finite_arg(args, 0, &format!("{name}: x must be finite"))?;
    finite_result(f(x))
}

macro_rules! unary_fns {
    ($($name:ident => $f:expr),* $(,)?) => {
        $(
            fn $name(_: &dyn FunctionContext, args: &[Value]) -> EvalResult<Value> {
                unary(args, stringify!($name), $f)
            }
        )*
    };
}

unary_fns! {
    abs => f64::abs,
    sqrt => f64::sqrt,
    exp => f64::exp,
    ln => f64::ln,
    log10 => f64::log10,
    sin => f64::sin,
    cos => f64::cos,
    tan => f64::tan,
    asin => f64::asin,
    acos => f64::acos,
    atan => f64::atan,
    sinh => f64::sinh,
    cosh => f64::cosh,
    tanh => f64::tanh,
    ceil => f64::ceil,
    floor => f64::floor,
    trunc => f64::trunc,
}

fn sign(_: &dyn FunctionContext, args: &[Value]) -> EvalResult<Value> {
    let x = finite_arg(args, 0, "sign: x must be finite")?;
    let s = if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    };
    Ok(Value::Number(s))
}

fn atan2(_: &dyn FunctionContext, args: &[Value]) -> EvalResult<Value> {
    let y = finite_arg(args, 0, "atan2: y must be finite")?;
    let x = finite_arg(args, 1, "atan2: x must be finite")?;
    finite_result(y.atan2(x))
}

fn pow(_: &dyn FunctionContext, args: &[Value]) -> EvalResult<Value> {
    let base = finite_arg(args, 0, "pow: base must be finite")?;
    let exp = finite_arg(args, 1, "pow: exp must be finite")?;
    finite_result(base.powf(exp))
}
