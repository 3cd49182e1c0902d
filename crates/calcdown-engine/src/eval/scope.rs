use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::Expr;
use crate::value::Value;

/// Top-level bindings: inputs, table snapshots and node results (or their error sentinels).
pub type Globals = HashMap<String, Value>;

/// Arrow parameter bindings, linked to the scope the arrow was created in.
#[derive(Debug)]
pub struct Scope {
    bindings: Vec<(String, Value)>,
    parent: Option<Rc<Scope>>,
}

impl Scope {
    pub fn new(bindings: Vec<(String, Value)>, parent: Option<Rc<Scope>>) -> Self {
        Self { bindings, parent }
    }

    /// Innermost binding of `name`, walking outwards through enclosing arrows.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        let mut scope = Some(self);
        while let Some(current) = scope {
            if let Some((_, value)) = current.bindings.iter().find(|(n, _)| n == name) {
                return Some(value);
            }
            scope = current.parent.as_deref();
        }
        None
    }
}

/// An evaluated arrow function.
#[derive(Debug)]
pub struct Closure {
    pub params: Vec<String>,
    pub body: Rc<Expr>,
    pub scope: Option<Rc<Scope>>,
}

impl Closure {
    /// Binds positional arguments to parameters; missing arguments read as `Null`.
    pub(crate) fn bind(&self, args: &[Value]) -> Rc<Scope> {
        let bindings = self
            .params
            .iter()
            .enumerate()
            .map(|(i, param)| (param.clone(), args.get(i).cloned().unwrap_or(Value::Null)))
            .collect();
        Rc::new(Scope::new(bindings, self.scope.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_bindings_shadow_outer_ones() {
        let outer = Rc::new(Scope::new(
            vec![("x".into(), Value::from(1.0)), ("y".into(), Value::from(2.0))],
            None,
        ));
        let inner = Scope::new(vec![("x".into(), Value::from(10.0))], Some(outer));
        assert_eq!(inner.lookup("x"), Some(&Value::from(10.0)));
        assert_eq!(inner.lookup("y"), Some(&Value::from(2.0)));
        assert_eq!(inner.lookup("z"), None);
    }

    #[test]
    fn missing_arguments_bind_null() {
        let closure = Closure {
            params: vec!["a".into(), "b".into()],
            body: Rc::new(Expr::Identifier("a".into())),
            scope: None,
        };
        let scope = closure.bind(&[Value::from(1.0)]);
        assert_eq!(scope.lookup("a"), Some(&Value::from(1.0)));
        assert_eq!(scope.lookup("b"), Some(&Value::Null));
    }
}
