use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl UnaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Concat,
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Pow => "**",
            BinaryOp::Concat => "&",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub key: String,
    pub value: Expr,
}

/// Expression tree produced by [`crate::parser::parse_expression`].
///
/// Arrow bodies are reference counted so closures can capture them without cloning the tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    String(String),
    Boolean(bool),
    Identifier(String),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    Member {
        object: Box<Expr>,
        property: String,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Object {
        properties: Vec<Property>,
    },
    Arrow {
        params: Vec<String>,
        body: Rc<Expr>,
    },
}

impl Expr {
    /// Returns `true` for `std` or `std.a.b...` (identifier/member chains rooted at `std`).
    pub fn is_std_member_path(&self) -> bool {
        match self {
            Expr::Identifier(name) => name == calcdown_model::STD_NAME,
            Expr::Member { object, .. } => object.is_std_member_path(),
            _ => false,
        }
    }

    /// Visits this node and every descendant, parents first.
    pub fn walk(&self, f: &mut dyn FnMut(&Expr)) {
        f(self);
        match self {
            Expr::Number(_) | Expr::String(_) | Expr::Boolean(_) | Expr::Identifier(_) => {}
            Expr::Unary { expr, .. } => expr.walk(f),
            Expr::Binary { left, right, .. } => {
                left.walk(f);
                right.walk(f);
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                test.walk(f);
                consequent.walk(f);
                alternate.walk(f);
            }
            Expr::Member { object, .. } => object.walk(f),
            Expr::Call { callee, args } => {
                callee.walk(f);
                for arg in args {
                    arg.walk(f);
                }
            }
            Expr::Object { properties } => {
                for prop in properties {
                    prop.value.walk(f);
                }
            }
            Expr::Arrow { body, .. } => body.walk(f),
        }
    }
}
