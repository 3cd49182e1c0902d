use std::rc::Rc;

use calcdown_model::{is_banned_key, STD_NAME};
use chrono::{DateTime, Utc};

use super::ops;
use super::scope::{Closure, Globals, Scope};
use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::error::{EvalError, EvalResult};
use crate::functions::{FunctionContext, StdLib};
use crate::value::{Function, Record, Value};

/// Primary-key metadata for the table snapshots of one run, keyed by array identity.
#[derive(Debug, Default, Clone)]
pub struct TableKeys {
    entries: Vec<(Rc<Vec<Value>>, String)>,
}

impl TableKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `rows` as a table snapshot; non-array values are ignored.
    pub fn register(&mut self, rows: &Value, primary_key: &str) {
        if let Value::Array(items) = rows {
            self.entries.push((Rc::clone(items), primary_key.to_string()));
        }
    }

    /// Primary key column of the table whose snapshot is exactly `rows`.
    pub fn primary_key_of(&self, rows: &Rc<Vec<Value>>) -> Option<&str> {
        self.entries
            .iter()
            .find(|(items, _)| Rc::ptr_eq(items, rows))
            .map(|(_, key)| key.as_str())
    }
}

/// Tree-walking evaluator for one run.
pub struct Interpreter<'a> {
    globals: &'a Globals,
    std: &'a StdLib,
    tables: &'a TableKeys,
}

impl<'a> Interpreter<'a> {
    pub fn new(globals: &'a Globals, std: &'a StdLib, tables: &'a TableKeys) -> Self {
        Self {
            globals,
            std,
            tables,
        }
    }

    pub fn evaluate(&self, expr: &Expr) -> EvalResult<Value> {
        self.eval(expr, None)
    }

    fn eval(&self, expr: &Expr, scope: Option<&Rc<Scope>>) -> EvalResult<Value> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::String(s) => Ok(Value::String(s.clone())),
            Expr::Boolean(b) => Ok(Value::Bool(*b)),
            Expr::Identifier(name) => self.lookup(name, scope),
            Expr::Unary { op, expr } => {
                let value = self.eval(expr, scope)?;
                match op {
                    UnaryOp::Neg => ops::negate(&value),
                    UnaryOp::Not => Ok(Value::Bool(!ops::expect_bool(&value, "Unary '!'")?)),
                }
            }
            Expr::Binary { op, left, right } => self.binary(*op, left, right, scope),
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                let test = self.eval(test, scope)?;
                if ops::expect_bool(&test, "Conditional test")? {
                    self.eval(consequent, scope)
                } else {
                    self.eval(alternate, scope)
                }
            }
            Expr::Member { object, property } => {
                let object = self.eval(object, scope)?;
                self.member(&object, property)
            }
            Expr::Call { callee, args } => self.call_std(callee, args, scope),
            Expr::Object { properties } => {
                let mut record = Record::new();
                for prop in properties {
                    if is_banned_key(&prop.key) {
                        return Err(EvalError::type_error(format!(
                            "Disallowed object key: {}",
                            prop.key
                        )));
                    }
                    record.insert(prop.key.clone(), self.eval(&prop.value, scope)?);
                }
                Ok(Value::object(record))
            }
            Expr::Arrow { params, body } => Ok(Value::Function(Function::Closure(Rc::new(
                Closure {
                    params: params.clone(),
                    body: Rc::clone(body),
                    scope: scope.cloned(),
                },
            )))),
        }
    }

    fn lookup(&self, name: &str, scope: Option<&Rc<Scope>>) -> EvalResult<Value> {
        let found = match scope.and_then(|s| s.lookup(name)) {
            Some(value) => Some(value),
            None if name == STD_NAME => Some(self.std.root()),
            None => self.globals.get(name),
        };
        match found {
            Some(Value::Error(err)) => Err(EvalError::Upstream {
                node: err.node_name.clone(),
                message: err.message.clone(),
            }),
            Some(value) => Ok(value.clone()),
            None => Err(EvalError::UnknownIdentifier(name.to_string())),
        }
    }

    fn binary(
        &self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        scope: Option<&Rc<Scope>>,
    ) -> EvalResult<Value> {
        if !matches!(op, BinaryOp::And | BinaryOp::Or) {
            let a = self.eval(left, scope)?;
            let b = self.eval(right, scope)?;
            return ops::apply(op, &a, &b);
        }
        let label = format!("Binary '{op}'");
        let lhs = ops::expect_bool(&self.eval(left, scope)?, &label)?;
        if lhs == (op == BinaryOp::Or) {
            return Ok(Value::Bool(lhs));
        }
        let rhs = ops::expect_bool(&self.eval(right, scope)?, &label)?;
        Ok(Value::Bool(rhs))
    }

    fn member(&self, object: &Value, property: &str) -> EvalResult<Value> {
        if is_banned_key(property) {
            return Err(EvalError::type_error(format!(
                "Disallowed property access: {property}"
            )));
        }
        let Value::Array(items) = object else {
            return own_property(object, property);
        };
        if property == "length" {
            return Ok(Value::Number(items.len() as f64));
        }

        let primary_key = self.tables.primary_key_of(items);
        items
            .iter()
            .enumerate()
            .map(|(i, row)| {
                own_property(row, property).map_err(|inner| EvalError::Row {
                    label: row_label(row, i, primary_key),
                    inner: Box::new(inner),
                })
            })
            .collect::<EvalResult<Vec<_>>>()
            .map(Value::array)
    }

    fn call_std(
        &self,
        callee: &Expr,
        args: &[Expr],
        scope: Option<&Rc<Scope>>,
    ) -> EvalResult<Value> {
        if !callee.is_std_member_path() {
            return Err(EvalError::UnsafeCall);
        }
        let builtin = match self.eval(callee, scope)? {
            Value::Function(Function::Builtin(builtin)) => builtin,
            Value::Function(Function::Closure(_)) => {
                return Err(EvalError::type_error(
                    "Only std library functions may be called",
                ))
            }
            _ => return Err(EvalError::type_error("Callee is not a function")),
        };
        if !self.std.contains(&builtin) {
            return Err(EvalError::type_error(
                "Only std library functions may be called",
            ));
        }
        let args = args
            .iter()
            .map(|arg| self.eval(arg, scope))
            .collect::<EvalResult<Vec<_>>>()?;
        (builtin.imp)(self, &args)
    }
}

impl FunctionContext for Interpreter<'_> {
    fn call(&self, function: &Function, args: &[Value]) -> EvalResult<Value> {
        match function {
            Function::Builtin(builtin) => (builtin.imp)(self, args),
            Function::Closure(closure) => {
                let scope = closure.bind(args);
                self.eval(&closure.body, Some(&scope))
            }
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.std.now()
    }
}

fn own_property(object: &Value, property: &str) -> EvalResult<Value> {
    match object {
        Value::Object(record) => record
            .get(property)
            .cloned()
            .ok_or_else(|| EvalError::UnknownProperty(property.to_string())),
        Value::Array(_) | Value::Function(_) | Value::Date(_) | Value::DateTime(_) => {
            Err(EvalError::UnknownProperty(property.to_string()))
        }
        _ => Err(EvalError::type_error(format!(
            "Cannot access property {property} on non-object"
        ))),
    }
}

/// `Row (id = "a")` when the row carries a usable primary key, otherwise `Row <index>`.
fn row_label(row: &Value, index: usize, primary_key: Option<&str>) -> String {
    let pk = primary_key.and_then(|key| {
        let value = row.as_object()?.get(key)?;
        let text = value.key_text().filter(|text| !text.is_empty())?;
        Some((key, text))
    });
    match pk {
        Some((key, text)) => format!("Row ({key} = {})", serde_json::Value::String(text)),
        None => format!("Row {index}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_expression;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    struct Fixture {
        globals: Globals,
        std: StdLib,
        tables: TableKeys,
    }

    impl Fixture {
        fn new() -> Self {
            let mut globals = Globals::new();
            let items = Value::from_json(&json!([
                {"id": "a", "qty": 2, "price": 5},
                {"id": "b", "qty": 3, "price": 1.5}
            ]));
            let mut tables = TableKeys::new();
            tables.register(&items, "id");
            globals.insert("items".into(), items);
            globals.insert("rate".into(), Value::from(0.1));
            Self {
                globals,
                std: StdLib::new(Utc::now()),
                tables,
            }
        }

        fn eval(&self, src: &str) -> EvalResult<Value> {
            let expr = parse_expression(src).unwrap();
            Interpreter::new(&self.globals, &self.std, &self.tables).evaluate(&expr)
        }
    }

    #[test]
    fn projects_columns_and_broadcasts() {
        let fx = Fixture::new();
        assert_eq!(fx.eval("items.qty * items.price").unwrap().to_json(), json!([10, 4.5]));
        assert_eq!(fx.eval("items.length").unwrap(), Value::from(2.0));
        assert_eq!(
            fx.eval("std.math.sum(items.qty) * (1 + rate)").unwrap(),
            Value::from(5.5)
        );
    }

    #[test]
    fn projection_errors_name_the_row() {
        let fx = Fixture::new();
        let err = fx.eval("items.missing").unwrap_err();
        assert_eq!(err.to_string(), "Row (id = \"a\"): Unknown property: missing");
        assert_eq!(err.code(), calcdown_model::codes::CALC_UNKNOWN_PROPERTY);

        let err = fx.eval("items.qty.x").unwrap_err();
        assert_eq!(err.to_string(), "Row 0: Cannot access property x on non-object");
    }

    #[test]
    fn closures_capture_their_scope() {
        let fx = Fixture::new();
        let value = fx
            .eval("std.table.map(items, (row) => std.table.sum(std.data.filter(items, (r) => r.qty >= row.qty), \"qty\"))")
            .unwrap();
        assert_eq!(value.to_json(), json!([5, 3]));
    }

    #[test]
    fn short_circuit_and_conditionals() {
        let fx = Fixture::new();
        assert_eq!(fx.eval("false && nope").unwrap(), Value::Bool(false));
        assert_eq!(fx.eval("true || nope").unwrap(), Value::Bool(true));
        assert_eq!(
            fx.eval("1 && true").unwrap_err().to_string(),
            "Binary '&&' expects boolean"
        );
        assert_eq!(
            fx.eval("rate ? 1 : 2").unwrap_err().to_string(),
            "Conditional test expects boolean"
        );
        assert_eq!(fx.eval("rate > 0 ? \"up\" : \"down\"").unwrap(), Value::from("up"));
    }

    #[test]
    fn only_std_functions_are_callable() {
        let fx = Fixture::new();
        assert_eq!(fx.eval("items(1)").unwrap_err(), EvalError::UnsafeCall);
        assert_eq!(
            fx.eval("std.math(1)").unwrap_err().to_string(),
            "Callee is not a function"
        );
        assert_eq!(
            fx.eval("std.math.nope(1)").unwrap_err(),
            EvalError::UnknownProperty("nope".into())
        );
    }

    #[test]
    fn upstream_errors_and_unknown_names() {
        let mut fx = Fixture::new();
        fx.globals.insert(
            "broken".into(),
            Value::Error(crate::value::NodeError {
                node_name: "broken".into(),
                message: "Division by zero".into(),
            }),
        );
        assert_eq!(
            fx.eval("broken + 1").unwrap_err().to_string(),
            "Upstream error in 'broken': Division by zero"
        );
        assert_eq!(
            fx.eval("ghost").unwrap_err(),
            EvalError::UnknownIdentifier("ghost".into())
        );
    }

    #[test]
    fn object_literals_build_records() {
        let fx = Fixture::new();
        assert_eq!(
            fx.eval("{ a: 1, rate, b: \"x\" }").unwrap().to_json(),
            json!({"a": 1, "rate": 0.1, "b": "x"})
        );
    }
}
