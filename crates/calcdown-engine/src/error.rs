use calcdown_model::codes;
use thiserror::Error;

/// Failure raised while evaluating one expression.
///
/// The `Display` text is the user-facing diagnostic message; [`EvalError::code`] gives the stable
/// diagnostic code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Non-finite numeric result")]
    NonFinite,
    #[error("Unknown identifier: {0}")]
    UnknownIdentifier(String),
    #[error("Unknown property: {0}")]
    UnknownProperty(String),
    #[error("Upstream error in '{node}': {message}")]
    Upstream { node: String, message: String },
    #[error("Only std.* function calls are supported in this evaluator")]
    UnsafeCall,
    /// Per-row failure while projecting a column out of an array of rows.
    #[error("{label}: {inner}")]
    Row { label: String, inner: Box<EvalError> },
    #[error("{0}")]
    Type(String),
    #[error("{0}")]
    Function(String),
}

impl EvalError {
    pub fn type_error(message: impl Into<String>) -> Self {
        EvalError::Type(message.into())
    }

    pub fn function(message: impl Into<String>) -> Self {
        EvalError::Function(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            EvalError::DivisionByZero => codes::CALC_DIV_ZERO,
            EvalError::NonFinite => codes::CALC_NONFINITE,
            EvalError::UnknownIdentifier(_) => codes::CALC_UNKNOWN_IDENTIFIER,
            EvalError::UnknownProperty(_) => codes::CALC_UNKNOWN_PROPERTY,
            EvalError::Upstream { .. } => codes::CALC_UPSTREAM_ERROR,
            EvalError::UnsafeCall => codes::CALC_UNSAFE_CALL,
            EvalError::Row { inner, .. } => inner.code(),
            EvalError::Type(_) | EvalError::Function(_) => codes::CALC_EVAL,
        }
    }
}

pub type EvalResult<T> = Result<T, EvalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_errors_keep_the_inner_code() {
        let err = EvalError::Row {
            label: "Row (id = \"a\")".into(),
            inner: Box::new(EvalError::UnknownProperty("qty".into())),
        };
        assert_eq!(err.to_string(), "Row (id = \"a\"): Unknown property: qty");
        assert_eq!(err.code(), codes::CALC_UNKNOWN_PROPERTY);
    }

    #[test]
    fn upstream_message() {
        let err = EvalError::Upstream {
            node: "x".into(),
            message: "Division by zero".into(),
        };
        assert_eq!(err.to_string(), "Upstream error in 'x': Division by zero");
        assert_eq!(err.code(), codes::CALC_UPSTREAM_ERROR);
        assert_eq!(EvalError::function("sum: expected array").code(), codes::CALC_EVAL);
    }
}
