use super::{arg, truthy, BuiltinFn, FunctionContext};
use crate::error::{EvalError, EvalResult};
use crate::value::Value;

pub(super) const FUNCTIONS: &[(&str, BuiltinFn)] = &[("that", that)];

fn that(_: &dyn FunctionContext, args: &[Value]) -> EvalResult<Value> {
    if truthy(arg(args, 0)) {
        return Ok(Value::Null);
    }
    let message = match arg(args, 1) {
        Value::Null => "Assertion failed".to_string(),
        other => other.to_string(),
    };
    Err(EvalError::Function(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::tests::TestContext;

    #[test]
    fn failing_assertion_uses_message() {
        assert_eq!(that(&TestContext, &[Value::Bool(true)]).unwrap(), Value::Null);
        assert_eq!(
            that(&TestContext, &[Value::from(0.0)]).unwrap_err().to_string(),
            "Assertion failed"
        );
        assert_eq!(
            that(&TestContext, &[Value::Bool(false), "rate too high".into()])
                .unwrap_err()
                .to_string(),
            "rate too high"
        );
    }
}
