use calcdown_model::date::{add_months, format_date, parse_iso_date};
use chrono::NaiveDate;

use super::{arg, integer_arg, BuiltinFn, FunctionContext};
use crate::error::{EvalError, EvalResult};
use crate::value::Value;

pub(super) const FUNCTIONS: &[(&str, BuiltinFn)] = &[
    ("now", now),
    ("today", today),
    ("parse", parse),
    ("format", format),
    ("addMonths", add_months_fn),
];

/// Calendar date of a date or datetime argument (datetimes are read in UTC).
fn date_arg(args: &[Value], idx: usize, message: &str) -> EvalResult<NaiveDate> {
    match arg(args, idx) {
        Value::Date(d) => Ok(*d),
        Value::DateTime(dt) => Ok(dt.date_naive()),
        _ => Err(EvalError::function(message)),
    }
}

fn now(cx: &dyn FunctionContext, _: &[Value]) -> EvalResult<Value> {
    Ok(Value::DateTime(cx.now()))
}

fn today(cx: &dyn FunctionContext, _: &[Value]) -> EvalResult<Value> {
    Ok(Value::Date(cx.now().date_naive()))
}

fn parse(_: &dyn FunctionContext, args: &[Value]) -> EvalResult<Value> {
    let text = arg(args, 0)
        .as_str()
        .ok_or_else(|| EvalError::function("parse: expected ISO date string"))?;
    parse_iso_date(text)
        .map(Value::Date)
        .map_err(|err| EvalError::function(err.to_string()))
}

fn format(_: &dyn FunctionContext, args: &[Value]) -> EvalResult<Value> {
    let date = date_arg(args, 0, "format: invalid date")?;
    let template = arg(args, 1)
        .as_str()
        .ok_or_else(|| EvalError::function("format: expected template string"))?;
    format_date(date, template)
        .map(Value::String)
        .map_err(|err| EvalError::function(err.to_string()))
}

fn add_months_fn(_: &dyn FunctionContext, args: &[Value]) -> EvalResult<Value> {
    let date = date_arg(args, 0, "addMonths: invalid date")?;
    let months = integer_arg(args, 1, "addMonths: months must be integer")? as i64;
    add_months(date, months)
        .map(Value::Date)
        .ok_or_else(|| EvalError::function("addMonths: result out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::tests::TestContext;
    use pretty_assertions::assert_eq;

    fn ymd(y: i32, m: u32, d: u32) -> Value {
        Value::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    #[test]
    fn clock_functions_use_the_run_clock() {
        assert_eq!(today(&TestContext, &[]).unwrap(), ymd(2024, 1, 31));
        let Value::DateTime(dt) = now(&TestContext, &[]).unwrap() else {
            panic!("now() should return a datetime");
        };
        assert_eq!(dt, TestContext.now());
    }

    #[test]
    fn parse_and_format() {
        assert_eq!(parse(&TestContext, &["2024-02-29".into()]).unwrap(), ymd(2024, 2, 29));
        assert_eq!(
            parse(&TestContext, &["2023-02-29".into()]).unwrap_err().to_string(),
            "Invalid calendar date: 2023-02-29"
        );
        assert_eq!(
            parse(&TestContext, &[Value::from(1.0)]).unwrap_err().to_string(),
            "parse: expected ISO date string"
        );
        assert_eq!(
            format(&TestContext, &[ymd(2024, 7, 4), "%d.%m.%Y".into()]).unwrap(),
            Value::from("04.07.2024")
        );
        assert_eq!(
            format(&TestContext, &["2024-07-04".into(), "%Y".into()])
                .unwrap_err()
                .to_string(),
            "format: invalid date"
        );
    }

    #[test]
    fn add_months_clamps_day() {
        assert_eq!(
            add_months_fn(&TestContext, &[ymd(2024, 1, 31), Value::from(1.0)]).unwrap(),
            ymd(2024, 2, 29)
        );
        assert_eq!(
            add_months_fn(&TestContext, &[ymd(2024, 1, 31), Value::from(0.5)])
                .unwrap_err()
                .to_string(),
            "addMonths: months must be integer"
        );
    }
}
