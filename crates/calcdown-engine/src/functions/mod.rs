//! The `std` namespace.
//!
//! Every evaluation run builds its own [`StdLib`]: a frozen tree of module objects whose leaves
//! are [`Builtin`] functions and constants. The interpreter only calls builtins that are
//! identity-equal to a leaf of the run's tree, so values that merely look like functions cannot
//! be invoked.

use std::rc::Rc;

use chrono::{DateTime, Utc};

use crate::error::{EvalError, EvalResult};
use crate::value::{Function, Record, Value};

mod assert;
mod data;
mod date_time;
mod financial;
mod lookup;
mod math;
mod table;
mod text;

pub(crate) use data::sort_rows;

/// Services a builtin may need from the running interpreter.
pub trait FunctionContext {
    /// Invokes a callback (arrow closure or builtin) with positional arguments.
    fn call(&self, function: &Function, args: &[Value]) -> EvalResult<Value>;
    /// The run clock, fixed for the duration of one evaluation.
    fn now(&self) -> DateTime<Utc>;
}

pub type BuiltinFn = fn(&dyn FunctionContext, &[Value]) -> EvalResult<Value>;

pub struct Builtin {
    /// Dotted path below `std`, e.g. `math.sum`.
    pub name: String,
    pub imp: BuiltinFn,
}

type Module = (&'static str, &'static [(&'static str, BuiltinFn)]);

const MODULES: &[Module] = &[
    ("math", math::FUNCTIONS),
    ("text", text::FUNCTIONS),
    ("data", data::FUNCTIONS),
    ("table", table::FUNCTIONS),
    ("lookup", lookup::FUNCTIONS),
    ("date", date_time::FUNCTIONS),
    ("finance", financial::FUNCTIONS),
    ("assert", assert::FUNCTIONS),
];

/// Per-run standard library capability object.
pub struct StdLib {
    root: Value,
    builtins: Vec<Rc<Builtin>>,
    now: DateTime<Utc>,
}

impl StdLib {
    pub fn new(now: DateTime<Utc>) -> Self {
        let mut root = Record::new();
        for (module, functions) in MODULES {
            let mut members = Record::new();
            for (name, imp) in functions.iter() {
                let builtin = Builtin {
                    name: format!("{module}.{name}"),
                    imp: *imp,
                };
                members.insert(
                    name.to_string(),
                    Value::Function(Function::Builtin(Rc::new(builtin))),
                );
            }
            if *module == "math" {
                members.insert("E".into(), Value::Number(std::f64::consts::E));
                members.insert("PI".into(), Value::Number(std::f64::consts::PI));
            }
            root.insert(module.to_string(), Value::object(members));
        }
        let root = Value::object(root);
        let mut builtins = Vec::new();
        collect_builtins(&root, &mut builtins);
        Self {
            root,
            builtins,
            now,
        }
    }

    /// The value bound to the identifier `std`.
    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Returns `true` when `builtin` is one of this run's library functions.
    pub fn contains(&self, builtin: &Rc<Builtin>) -> bool {
        self.builtins.iter().any(|b| Rc::ptr_eq(b, builtin))
    }
}

fn collect_builtins(value: &Value, out: &mut Vec<Rc<Builtin>>) {
    match value {
        Value::Function(Function::Builtin(b)) => out.push(Rc::clone(b)),
        Value::Object(record) => {
            for member in record.values() {
                collect_builtins(member, out);
            }
        }
        _ => {}
    }
}

// Argument helpers shared by the library modules. Missing arguments read as `Null`.

pub(crate) fn arg(args: &[Value], idx: usize) -> &Value {
    const NULL: &Value = &Value::Null;
    args.get(idx).unwrap_or(NULL)
}

pub(crate) fn finite_arg(args: &[Value], idx: usize, message: &str) -> EvalResult<f64> {
    arg(args, idx)
        .as_finite()
        .ok_or_else(|| EvalError::function(message))
}

/// Finite integral number, as used for counts and offsets.
pub(crate) fn integer_arg(args: &[Value], idx: usize, message: &str) -> EvalResult<f64> {
    let n = finite_arg(args, idx, message)?;
    if n.fract() != 0.0 {
        return Err(EvalError::function(message));
    }
    Ok(n)
}

pub(crate) fn array_arg<'v>(args: &'v [Value], idx: usize, message: &str) -> EvalResult<&'v [Value]> {
    arg(args, idx)
        .as_array()
        .ok_or_else(|| EvalError::function(message))
}

pub(crate) fn function_arg<'v>(
    args: &'v [Value],
    idx: usize,
    message: &str,
) -> EvalResult<&'v Function> {
    match arg(args, idx) {
        Value::Function(f) => Ok(f),
        _ => Err(EvalError::function(message)),
    }
}

pub(crate) fn row_object<'v>(value: &'v Value, message: &str) -> EvalResult<&'v Record> {
    value
        .as_object()
        .ok_or_else(|| EvalError::function(message))
}

/// Checks a column/key name used by table helpers: a non-empty string outside the banned set.
pub(crate) fn safe_key<'v>(value: &'v Value, prefix: &str) -> EvalResult<&'v str> {
    match value.as_str() {
        Some(key) if !key.is_empty() => safe_key_str(key, prefix).map(|_| key),
        _ => Err(EvalError::function(format!("{prefix}: expected key string"))),
    }
}

pub(crate) fn safe_key_str(key: &str, prefix: &str) -> EvalResult<()> {
    if key.is_empty() {
        return Err(EvalError::function(format!("{prefix}: expected key string")));
    }
    if calcdown_model::is_banned_key(key) {
        return Err(EvalError::function(format!("{prefix}: disallowed key: {key}")));
    }
    Ok(())
}

pub(crate) fn finite_result(n: f64) -> EvalResult<Value> {
    if n.is_finite() {
        Ok(Value::Number(n))
    } else {
        Err(EvalError::NonFinite)
    }
}

/// Truthiness used for predicate and assertion results.
pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Null | Value::Error(_) => false,
        Value::Bool(b) => *b,
        Value::Number(n) => *n != 0.0 && !n.is_nan(),
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// Hash key for joins, lookups and grouping: strings and finite numbers are kept apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum MapKey {
    Text(String),
    Number(String),
}

impl MapKey {
    pub(crate) fn of(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(MapKey::Text(s.clone())),
            Value::Number(n) if n.is_finite() => Some(MapKey::Number(crate::value::format_number(*n))),
            _ => None,
        }
    }

    /// Stable text form, used as a record key.
    pub(crate) fn encode(&self) -> String {
        match self {
            MapKey::Text(s) => format!("s:{s}"),
            MapKey::Number(n) => format!("n:{n}"),
        }
    }
}
