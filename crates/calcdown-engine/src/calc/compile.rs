use std::collections::{BTreeSet, HashSet};

use calcdown_model::{codes, is_banned_key, Message, STD_NAME};

use super::decl::{extract_declarations, ConstDecl};
use crate::ast::Expr;
use crate::parser::parse_expression;

/// A named calculation.
///
/// `expr` is `None` when the declaration failed to parse or validate; such a node is permanently
/// unresolved and poisons its dependents at evaluation time.
#[derive(Debug, Clone, PartialEq)]
pub struct CalcNode {
    pub name: String,
    pub expr_text: String,
    pub expr: Option<Expr>,
    /// Free identifiers referenced by the expression (sorted, `std` excluded).
    pub dependencies: Vec<String>,
    pub line: usize,
}

/// Free identifiers of `expr`: every referenced name minus arrow parameters in scope.
pub fn free_identifiers(expr: &Expr) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    collect_free(expr, &mut out);
    out
}

fn collect_free(expr: &Expr, out: &mut BTreeSet<String>) {
    match expr {
        Expr::Identifier(name) => {
            out.insert(name.clone());
        }
        Expr::Number(_) | Expr::String(_) | Expr::Boolean(_) => {}
        Expr::Unary { expr, .. } => collect_free(expr, out),
        Expr::Binary { left, right, .. } => {
            collect_free(left, out);
            collect_free(right, out);
        }
        Expr::Conditional {
            test,
            consequent,
            alternate,
        } => {
            collect_free(test, out);
            collect_free(consequent, out);
            collect_free(alternate, out);
        }
        Expr::Member { object, .. } => collect_free(object, out),
        Expr::Call { callee, args } => {
            collect_free(callee, out);
            for arg in args {
                collect_free(arg, out);
            }
        }
        Expr::Object { properties } => {
            for prop in properties {
                collect_free(&prop.value, out);
            }
        }
        Expr::Arrow { params, body } => {
            let mut inner = BTreeSet::new();
            collect_free(body, &mut inner);
            for param in params {
                inner.remove(param);
            }
            out.extend(inner);
        }
    }
}

/// Reports banned member/object keys and invalid arrow parameters. Returns the diagnostics in
/// tree order.
pub fn validate_expr(expr: &Expr, line: usize, node_name: &str) -> Vec<Message> {
    let mut messages = Vec::new();
    let mut report = |code: &str, message: String| {
        messages.push(Message::error(code, message).at_line(line).for_node(node_name));
    };
    expr.walk(&mut |node| match node {
        Expr::Member { property, .. } if is_banned_key(property) => report(
            codes::CALC_DISALLOWED_MEMBER,
            format!("Disallowed property access: {property}"),
        ),
        Expr::Object { properties } => {
            for prop in properties.iter().filter(|p| is_banned_key(&p.key)) {
                report(
                    codes::CALC_DISALLOWED_OBJECT_KEY,
                    format!("Disallowed object key: {}", prop.key),
                );
            }
        }
        Expr::Arrow { params, .. } => {
            let mut seen = HashSet::new();
            for param in params {
                if param == STD_NAME {
                    report(
                        codes::CALC_ARROW_PARAM_RESERVED,
                        "The identifier 'std' is reserved and cannot be used as an arrow parameter"
                            .to_string(),
                    );
                }
                if is_banned_key(param) {
                    report(
                        codes::CALC_DISALLOWED_PARAM,
                        format!("Disallowed arrow parameter name: {param}"),
                    );
                }
                if !seen.insert(param.as_str()) {
                    report(
                        codes::CALC_DUPLICATE_PARAM,
                        format!("Duplicate arrow parameter name: {param}"),
                    );
                }
            }
        }
        _ => {}
    });
    messages
}

/// Extracts, parses and validates every declaration of one calc block.
pub fn compile_calc_block(source: &str, base_line: usize) -> (Vec<CalcNode>, Vec<Message>) {
    let (decls, mut messages) = extract_declarations(source, base_line);
    let mut nodes = Vec::with_capacity(decls.len());
    let mut seen = HashSet::new();

    for decl in decls {
        if !seen.insert(decl.name.clone()) {
            messages.push(
                Message::error(
                    codes::CALC_DUPLICATE_NODE,
                    format!("Duplicate node name: {}", decl.name),
                )
                .at_line(decl.line)
                .for_node(&decl.name),
            );
            continue;
        }
        nodes.push(compile_decl(decl, &mut messages));
    }
    (nodes, messages)
}

fn compile_decl(decl: ConstDecl, messages: &mut Vec<Message>) -> CalcNode {
    let parsed = match parse_expression(&decl.expr_text) {
        Ok(expr) => Some(expr),
        Err(err) => {
            let (line, column) = decl.locate(err.pos);
            messages.push(
                Message::error(codes::CALC_PARSE_EXPR, err.message)
                    .at(line, column)
                    .for_node(&decl.name),
            );
            None
        }
    };

    let Some(expr) = parsed else {
        return CalcNode {
            name: decl.name,
            expr_text: decl.expr_text,
            expr: None,
            dependencies: Vec::new(),
            line: decl.line,
        };
    };

    let mut dependencies = free_identifiers(&expr);
    dependencies.remove(STD_NAME);
    let problems = validate_expr(&expr, decl.line, &decl.name);
    let valid = problems.is_empty();
    messages.extend(problems);

    CalcNode {
        name: decl.name,
        expr_text: decl.expr_text,
        expr: valid.then_some(expr),
        dependencies: dependencies.into_iter().collect(),
        line: decl.line,
    }
}
