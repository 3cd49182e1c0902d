//! Expression parser.
//!
//! Precedence climbing over a one-token lookahead [`Lexer`]. Arrow function parameter lists are
//! recognized speculatively: the parser checkpoints the lexer, tries to read `x =>` or
//! `(a, b) =>`, and rewinds when no arrow follows.

use std::fmt;
use std::rc::Rc;

use crate::ast::{BinaryOp, Expr, Property, UnaryOp};

mod lexer;

pub use lexer::{Lexer, Mark, Spanned, Token};

/// Bound on parser recursion (parentheses, arguments, unary chains).
const MAX_DEPTH: usize = 192;

/// Bound on the height of a parsed tree. Tree walks, evaluation and drop recurse once per level,
/// so long operator or member chains count as well as nesting.
const MAX_HEIGHT: usize = 256;

const TOO_DEEP: &str = "Expression is nested too deeply";

/// A syntax error with the byte offset (within the parsed text) where it was detected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub message: String,
    pub pos: usize,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, pos: usize) -> Self {
        Self {
            message: message.into(),
            pos,
        }
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (at {})", self.message, self.pos)
    }
}

impl std::error::Error for SyntaxError {}

/// Parses a complete expression; trailing tokens are an error.
pub fn parse_expression(src: &str) -> Result<Expr, SyntaxError> {
    let mut parser = Parser::new(src);
    let node = parser.parse_arrow()?;
    let tail = parser.lexer.peek()?;
    if tail.token != Token::Eof {
        return Err(SyntaxError::new(
            format!("Unexpected trailing token: {}", tail.token),
            tail.pos,
        ));
    }
    Ok(node.expr)
}

/// A parsed subtree and its height.
struct Node {
    expr: Expr,
    height: usize,
}

impl Node {
    fn leaf(expr: Expr) -> Self {
        Self { expr, height: 1 }
    }
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            lexer: Lexer::new(src),
            depth: 0,
        }
    }

    fn too_deep(&mut self) -> SyntaxError {
        let pos = self.lexer.peek().map(|t| t.pos).unwrap_or(0);
        SyntaxError::new(TOO_DEEP, pos)
    }

    fn enter(&mut self) -> Result<(), SyntaxError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.too_deep());
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Wraps `expr` as a node one level above its tallest child.
    fn branch(&mut self, expr: Expr, child_height: usize) -> Result<Node, SyntaxError> {
        let height = child_height + 1;
        if height > MAX_HEIGHT {
            return Err(self.too_deep());
        }
        Ok(Node { expr, height })
    }

    fn expect(&mut self, expected: Token, message: &str) -> Result<(), SyntaxError> {
        let tok = self.lexer.next()?;
        if tok.token != expected {
            return Err(SyntaxError::new(message, tok.pos));
        }
        Ok(())
    }

    fn parse_arrow(&mut self) -> Result<Node, SyntaxError> {
        self.enter()?;
        let node = self.parse_arrow_inner();
        self.leave();
        node
    }

    fn parse_arrow_inner(&mut self) -> Result<Node, SyntaxError> {
        let mark = self.lexer.mark();
        if let Ok(Some(params)) = self.try_arrow_params() {
            if matches!(self.lexer.peek(), Ok(Spanned { token: Token::Arrow, .. })) {
                self.lexer.next()?;
                let body = self.parse_arrow()?;
                return self.branch(
                    Expr::Arrow {
                        params,
                        body: Rc::new(body.expr),
                    },
                    body.height,
                );
            }
        }
        self.lexer.reset(mark);
        self.parse_conditional()
    }

    /// Reads `ident` or `( [ident {, ident}] )`. `Ok(None)` means "not a parameter list"; the
    /// caller rewinds in either case.
    fn try_arrow_params(&mut self) -> Result<Option<Vec<String>>, SyntaxError> {
        let tok = self.lexer.next()?;
        match tok.token {
            Token::Identifier(name) => Ok(Some(vec![name])),
            Token::LParen => {
                let mut params = Vec::new();
                if self.lexer.eat(&Token::RParen)? {
                    return Ok(Some(params));
                }
                loop {
                    match self.lexer.next()?.token {
                        Token::Identifier(name) => params.push(name),
                        _ => return Ok(None),
                    }
                    if !self.lexer.eat(&Token::Comma)? {
                        break;
                    }
                }
                if self.lexer.next()?.token != Token::RParen {
                    return Ok(None);
                }
                Ok(Some(params))
            }
            _ => Ok(None),
        }
    }

    fn parse_conditional(&mut self) -> Result<Node, SyntaxError> {
        let test = self.parse_binary_level(0)?;
        if !self.lexer.eat(&Token::Question)? {
            return Ok(test);
        }
        let consequent = self.parse_arrow()?;
        self.expect(Token::Colon, "Expected ':' in conditional expression")?;
        let alternate = self.parse_arrow()?;
        let height = test.height.max(consequent.height).max(alternate.height);
        self.branch(
            Expr::Conditional {
                test: Box::new(test.expr),
                consequent: Box::new(consequent.expr),
                alternate: Box::new(alternate.expr),
            },
            height,
        )
    }

    /// Left-associative binary levels, loosest first: `||`, `&&`, equality, comparison, `&`,
    /// additive, multiplicative. Level 7 is `**`.
    fn parse_binary_level(&mut self, level: usize) -> Result<Node, SyntaxError> {
        if level == BINARY_LEVELS.len() {
            return self.parse_power();
        }
        let mut left = self.parse_binary_level(level + 1)?;
        loop {
            let tok = &self.lexer.peek()?.token;
            let Some(op) = BINARY_LEVELS[level]
                .iter()
                .find(|(t, _)| t == tok)
                .map(|(_, op)| *op)
            else {
                return Ok(left);
            };
            self.lexer.next()?;
            let right = self.parse_binary_level(level + 1)?;
            let height = left.height.max(right.height);
            left = self.branch(
                Expr::Binary {
                    op,
                    left: Box::new(left.expr),
                    right: Box::new(right.expr),
                },
                height,
            )?;
        }
    }

    fn parse_power(&mut self) -> Result<Node, SyntaxError> {
        self.enter()?;
        let node = self.parse_power_inner();
        self.leave();
        node
    }

    fn parse_power_inner(&mut self) -> Result<Node, SyntaxError> {
        let base = self.parse_unary()?;
        if !self.lexer.eat(&Token::StarStar)? {
            return Ok(base);
        }
        let exponent = self.parse_power()?;
        let height = base.height.max(exponent.height);
        self.branch(
            Expr::Binary {
                op: BinaryOp::Pow,
                left: Box::new(base.expr),
                right: Box::new(exponent.expr),
            },
            height,
        )
    }

    fn parse_unary(&mut self) -> Result<Node, SyntaxError> {
        let op = match self.lexer.peek()?.token {
            Token::Minus => UnaryOp::Neg,
            Token::Bang => UnaryOp::Not,
            _ => return self.parse_postfix(),
        };
        self.lexer.next()?;
        self.enter()?;
        let operand = self.parse_unary();
        self.leave();
        let operand = operand?;
        self.branch(
            Expr::Unary {
                op,
                expr: Box::new(operand.expr),
            },
            operand.height,
        )
    }

    fn parse_postfix(&mut self) -> Result<Node, SyntaxError> {
        let mut node = self.parse_primary()?;
        loop {
            if self.lexer.eat(&Token::Dot)? {
                let id = self.lexer.next()?;
                let Token::Identifier(property) = id.token else {
                    return Err(SyntaxError::new("Expected identifier after '.'", id.pos));
                };
                node = self.branch(
                    Expr::Member {
                        object: Box::new(node.expr),
                        property,
                    },
                    node.height,
                )?;
                continue;
            }
            if self.lexer.eat(&Token::LParen)? {
                let mut height = node.height;
                let mut args = Vec::new();
                if self.lexer.peek()?.token != Token::RParen {
                    loop {
                        let arg = self.parse_arrow()?;
                        height = height.max(arg.height);
                        args.push(arg.expr);
                        if !self.lexer.eat(&Token::Comma)? {
                            break;
                        }
                    }
                }
                self.expect(Token::RParen, "Expected ')'")?;
                node = self.branch(
                    Expr::Call {
                        callee: Box::new(node.expr),
                        args,
                    },
                    height,
                )?;
                continue;
            }
            return Ok(node);
        }
    }

    fn parse_primary(&mut self) -> Result<Node, SyntaxError> {
        let tok = self.lexer.next()?;
        match tok.token {
            Token::Number(n) => Ok(Node::leaf(Expr::Number(n))),
            Token::String(s) => Ok(Node::leaf(Expr::String(s))),
            Token::Boolean(b) => Ok(Node::leaf(Expr::Boolean(b))),
            Token::Identifier(name) => Ok(Node::leaf(Expr::Identifier(name))),
            Token::LBrace => self.parse_object_literal(),
            Token::LParen => {
                let node = self.parse_arrow()?;
                self.expect(Token::RParen, "Expected ')'")?;
                Ok(node)
            }
            Token::Eof => Err(SyntaxError::new("Unexpected end of expression", tok.pos)),
            other => Err(SyntaxError::new(
                format!("Unexpected token: {other}"),
                tok.pos,
            )),
        }
    }

    /// Parses the remainder of `{ ... }` after the opening brace.
    fn parse_object_literal(&mut self) -> Result<Node, SyntaxError> {
        let mut properties = Vec::new();
        if self.lexer.eat(&Token::RBrace)? {
            return Ok(Node::leaf(Expr::Object { properties }));
        }
        let mut height = 0;
        loop {
            let key_tok = self.lexer.next()?;
            let (key, is_identifier) = match key_tok.token {
                Token::Identifier(name) => (name, true),
                Token::String(s) => (s, false),
                _ => {
                    return Err(SyntaxError::new(
                        "Expected object property key",
                        key_tok.pos,
                    ))
                }
            };
            let value = if self.lexer.eat(&Token::Colon)? {
                self.parse_arrow()?
            } else if is_identifier {
                Node::leaf(Expr::Identifier(key.clone()))
            } else {
                return Err(SyntaxError::new(
                    "String keys require ':' value",
                    key_tok.pos,
                ));
            };
            height = height.max(value.height);
            properties.push(Property {
                key,
                value: value.expr,
            });

            let sep = self.lexer.next()?;
            match sep.token {
                Token::Comma => {
                    if self.lexer.eat(&Token::RBrace)? {
                        break;
                    }
                }
                Token::RBrace => break,
                _ => {
                    return Err(SyntaxError::new(
                        "Expected ',' or '}' in object literal",
                        sep.pos,
                    ))
                }
            }
        }
        self.branch(Expr::Object { properties }, height)
    }
}

const BINARY_LEVELS: [&[(Token, BinaryOp)]; 7] = [
    &[(Token::OrOr, BinaryOp::Or)],
    &[(Token::AndAnd, BinaryOp::And)],
    &[(Token::EqEq, BinaryOp::Eq), (Token::NotEq, BinaryOp::Ne)],
    &[
        (Token::Less, BinaryOp::Lt),
        (Token::LessEq, BinaryOp::Le),
        (Token::Greater, BinaryOp::Gt),
        (Token::GreaterEq, BinaryOp::Ge),
    ],
    &[(Token::Ampersand, BinaryOp::Concat)],
    &[(Token::Plus, BinaryOp::Add), (Token::Minus, BinaryOp::Sub)],
    &[(Token::Star, BinaryOp::Mul), (Token::Slash, BinaryOp::Div)],
];

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn num(n: f64) -> Box<Expr> {
        Box::new(Expr::Number(n))
    }

    fn ident(name: &str) -> Box<Expr> {
        Box::new(Expr::Identifier(name.to_string()))
    }

    fn bin(op: BinaryOp, left: Box<Expr>, right: Box<Expr>) -> Box<Expr> {
        Box::new(Expr::Binary { op, left, right })
    }

    #[test]
    fn respects_precedence() {
        let expr = parse_expression("1 + 2 * 3 ** 2 ** 1").unwrap();
        let expected = bin(
            BinaryOp::Add,
            num(1.0),
            bin(
                BinaryOp::Mul,
                num(2.0),
                bin(BinaryOp::Pow, num(3.0), bin(BinaryOp::Pow, num(2.0), num(1.0))),
            ),
        );
        assert_eq!(expr, *expected);
    }

    #[test]
    fn concat_binds_looser_than_addition() {
        let expr = parse_expression("a & b + 1").unwrap();
        let expected = bin(BinaryOp::Concat, ident("a"), bin(BinaryOp::Add, ident("b"), num(1.0)));
        assert_eq!(expr, *expected);
    }

    #[test]
    fn unary_binds_tighter_than_power() {
        let expr = parse_expression("-2 ** 2").unwrap();
        let expected = bin(
            BinaryOp::Pow,
            Box::new(Expr::Unary {
                op: UnaryOp::Neg,
                expr: num(2.0),
            }),
            num(2.0),
        );
        assert_eq!(expr, *expected);
    }

    #[test]
    fn parses_arrows() {
        let expr = parse_expression("(a, b) => a + b").unwrap();
        assert_eq!(
            expr,
            Expr::Arrow {
                params: vec!["a".into(), "b".into()],
                body: Rc::new(*bin(BinaryOp::Add, ident("a"), ident("b"))),
            }
        );
        assert!(matches!(
            parse_expression("() => 1").unwrap(),
            Expr::Arrow { ref params, .. } if params.is_empty()
        ));
        assert!(matches!(
            parse_expression("x => y => x").unwrap(),
            Expr::Arrow { ref body, .. } if matches!(**body, Expr::Arrow { .. })
        ));
    }

    #[test]
    fn parenthesized_expression_is_not_an_arrow() {
        let expr = parse_expression("(a + b) * 2").unwrap();
        let expected = bin(BinaryOp::Mul, bin(BinaryOp::Add, ident("a"), ident("b")), num(2.0));
        assert_eq!(expr, *expected);
        assert_eq!(parse_expression("(a)").unwrap(), Expr::Identifier("a".into()));
    }

    #[test]
    fn parses_calls_members_and_objects() {
        let expr = parse_expression("std.table.sortBy(rows, \"qty\", { dir: 'desc', rows, })")
            .unwrap();
        let Expr::Call { callee, args } = expr else {
            panic!("expected call");
        };
        assert!(callee.is_std_member_path());
        assert_eq!(args.len(), 3);
        assert_eq!(
            args[2],
            Expr::Object {
                properties: vec![
                    Property {
                        key: "dir".into(),
                        value: Expr::String("desc".into()),
                    },
                    Property {
                        key: "rows".into(),
                        value: Expr::Identifier("rows".into()),
                    },
                ],
            }
        );
    }

    #[test]
    fn parses_conditionals() {
        let expr = parse_expression("a > 1 ? 'big' : x => x").unwrap();
        let Expr::Conditional { alternate, .. } = expr else {
            panic!("expected conditional");
        };
        assert!(matches!(*alternate, Expr::Arrow { .. }));
    }

    #[test]
    fn reports_errors_with_positions() {
        let cases = [
            ("1 +", "Unexpected end of expression", 3),
            ("a b", "Unexpected trailing token: identifier b", 2),
            ("a ? b", "Expected ':' in conditional expression", 5),
            ("a.1", "Expected identifier after '.'", 2),
            ("f(1, 2", "Expected ')'", 6),
            ("{ 1: 2 }", "Expected object property key", 2),
            ("{ 'a' }", "String keys require ':' value", 2),
            ("{ a: 1 b }", "Expected ',' or '}' in object literal", 7),
            ("*", "Unexpected token: '*'", 0),
        ];
        for (src, message, pos) in cases {
            let err = parse_expression(src).unwrap_err();
            assert_eq!((err.message.as_str(), err.pos), (message, pos), "{src}");
        }
    }

    #[test]
    fn rejects_deep_nesting() {
        let src = format!("{}1{}", "(".repeat(500), ")".repeat(500));
        let err = parse_expression(&src).unwrap_err();
        assert_eq!(err.message, "Expression is nested too deeply");
        assert!(parse_expression(&format!("{}1{}", "(".repeat(20), ")".repeat(20))).is_ok());
    }

    #[test]
    fn rejects_tall_operator_chains() {
        let chain = vec!["1"; 10_000].join(" + ");
        let err = parse_expression(&chain).unwrap_err();
        assert_eq!(err.message, "Expression is nested too deeply");

        let members = format!("a{}", ".b".repeat(10_000));
        assert_eq!(parse_expression(&members).unwrap_err().message, "Expression is nested too deeply");

        // Chains split across parentheses still add up.
        let group = vec!["1"; 200].join(" * ");
        let grouped = vec![format!("({group})"); 100].join(" + ");
        assert_eq!(parse_expression(&grouped).unwrap_err().message, "Expression is nested too deeply");

        assert!(parse_expression(&vec!["1"; 200].join(" - ")).is_ok());
        assert!(parse_expression(&format!("f(x){}", "(1)".repeat(100))).is_ok());
    }
}
