use super::{arg, finite_arg, finite_result, BuiltinFn, FunctionContext};
use crate::error::{EvalError, EvalResult};
use crate::value::Value;

pub(super) const FUNCTIONS: &[(&str, BuiltinFn)] =
    &[("toMonthlyRate", to_monthly_rate), ("pmt", pmt)];

fn to_monthly_rate(_: &dyn FunctionContext, args: &[Value]) -> EvalResult<Value> {
    let annual_percent = finite_arg(args, 0, "toMonthlyRate: annualPercent must be finite")?;
    Ok(Value::Number(annual_percent / 100.0 / 12.0))
}

/// Optional numeric argument; `Null` (absent) takes `default`.
fn optional(args: &[Value], idx: usize, default: f64) -> Option<f64> {
    match arg(args, idx) {
        Value::Null => Some(default),
        v => v.as_finite(),
    }
}

/// Periodic payment of an annuity (spreadsheet `PMT`). `type` 1 means payments at period start.
pub(crate) fn payment(rate: f64, nper: f64, pv: f64, fv: f64, due: bool) -> f64 {
    if rate == 0.0 {
        return -(pv + fv) / nper;
    }
    let pow = (1.0 + rate).powf(nper);
    let type_factor = if due { 1.0 + rate } else { 1.0 };
    -(rate * (fv + pv * pow)) / (type_factor * (pow - 1.0))
}

fn pmt(_: &dyn FunctionContext, args: &[Value]) -> EvalResult<Value> {
    let invalid = || EvalError::function("pmt: invalid arguments");
    let rate = arg(args, 0).as_finite().ok_or_else(invalid)?;
    let nper = arg(args, 1).as_finite().ok_or_else(invalid)?;
    let pv = arg(args, 2).as_finite().ok_or_else(invalid)?;
    let fv = optional(args, 3, 0.0).ok_or_else(invalid)?;
    if nper == 0.0 {
        return Err(EvalError::function("pmt: nper must be non-zero"));
    }
    let due = match optional(args, 4, 0.0) {
        Some(t) if t == 0.0 => false,
        Some(t) if t == 1.0 => true,
        _ => return Err(EvalError::function("pmt: type must be 0 or 1")),
    };
    finite_result(payment(rate, nper, pv, fv, due))
}
