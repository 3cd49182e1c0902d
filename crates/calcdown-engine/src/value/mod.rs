use std::fmt;
use std::rc::Rc;

use calcdown_model::date::{format_datetime, format_iso_date};
use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexMap;

use crate::eval::Closure;
use crate::functions::Builtin;

mod number;

pub use number::{format_number, parse_number};

/// An insertion-ordered record (table row or object literal).
pub type Record = IndexMap<String, Value>;

/// Poison value published in place of a node that failed to evaluate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeError {
    pub node_name: String,
    pub message: String,
}

#[derive(Clone)]
pub enum Function {
    Builtin(Rc<Builtin>),
    Closure(Rc<Closure>),
}

impl Function {
    pub fn same(&self, other: &Function) -> bool {
        match (self, other) {
            (Function::Builtin(a), Function::Builtin(b)) => Rc::ptr_eq(a, b),
            (Function::Closure(a), Function::Closure(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Function::Builtin(b) => write!(f, "Builtin(std.{})", b.name),
            Function::Closure(c) => write!(f, "Closure({})", c.params.join(", ")),
        }
    }
}

/// Runtime value of an expression.
///
/// Arrays and objects are reference counted; values are immutable once built so clones are
/// cheap and sharing is unobservable.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Number(f64),
    String(String),
    Bool(bool),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    Array(Rc<Vec<Value>>),
    Object(Rc<Record>),
    Function(Function),
    Error(NodeError),
}

impl Value {
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(items))
    }

    pub fn object(record: Record) -> Self {
        Value::Object(Rc::new(record))
    }

    pub fn string(text: impl Into<String>) -> Self {
        Value::String(text.into())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Bool(_) => "boolean",
            Value::Date(_) => "date",
            Value::DateTime(_) => "datetime",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
            Value::Error(_) => "error",
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_finite(&self) -> Option<f64> {
        self.as_number().filter(|n| n.is_finite())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Record> {
        match self {
            Value::Object(record) => Some(&**record),
            _ => None,
        }
    }

    /// Dates and datetimes as a comparable instant (dates at UTC midnight).
    pub fn as_instant(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Date(d) => d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc()),
            Value::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    /// Key used for primary-key and lookup matching: strings as-is, finite numbers via
    /// [`format_number`]. Everything else has no key.
    pub fn key_text(&self) -> Option<String> {
        match self {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) if n.is_finite() => Some(format_number(*n)),
            _ => None,
        }
    }

    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => n.as_f64().map(Value::Number).unwrap_or(Value::Null),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => {
                Value::array(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// JSON rendering for hosts: dates become ISO strings; functions, errors and non-finite
    /// numbers become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null | Value::Function(_) | Value::Error(_) => serde_json::Value::Null,
            Value::Number(n) => json_number(*n),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Date(d) => serde_json::Value::String(format_iso_date(*d)),
            Value::DateTime(dt) => serde_json::Value::String(format_datetime(*dt)),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Object(record) => serde_json::Value::Object(
                record
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

/// Integral values become JSON integers so rows re-serialize as `{"qty":3}` rather than `3.0`.
pub(crate) fn json_number(n: f64) -> serde_json::Value {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        return serde_json::Value::from(n as i64);
    }
    serde_json::Number::from_f64(n)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a.same(b),
            (Value::Error(a), Value::Error(b)) => a == b,
            _ => false,
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::array(value)
    }
}

impl From<Record> for Value {
    fn from(value: Record) -> Self {
        Value::object(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::String(s) => f.write_str(s),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Date(d) => f.write_str(&format_iso_date(*d)),
            Value::DateTime(dt) => f.write_str(&format_datetime(*dt)),
            Value::Array(_) | Value::Object(_) => write!(f, "{}", self.to_json()),
            Value::Function(func) => write!(f, "{func:?}"),
            Value::Error(err) => write!(f, "#ERROR({}: {})", err.node_name, err.message),
        }
    }
}
