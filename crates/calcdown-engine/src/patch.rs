//! Table patch statements: `table[selector].column = expr;` lines inside calc blocks.
//!
//! Patches are parsed separately from declarations and applied after every node has been
//! evaluated, in source order. Each successful patch replaces the targeted row with a copy
//! carrying the coerced value, so later patches observe earlier ones.

use std::collections::HashSet;
use std::fmt;
use std::sync::OnceLock;

use calcdown_model::{codes, is_banned_key, Message};
use indexmap::IndexMap;
use regex::Regex;

use crate::ast::Expr;
use crate::coercion::coerce_table_cell_value;
use crate::document::{split_lines, CodeBlock, Table};
use crate::eval::{Globals, Interpreter, TableKeys};
use crate::functions::StdLib;
use crate::parser::parse_expression;
use crate::value::{Record, Value};

const CALC_LANG: &str = "calc";

/// Which row a patch targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowSelector {
    /// 1-based position in the table snapshot.
    Index(usize),
    PrimaryKey(String),
}

impl RowSelector {
    /// Parses the text between the brackets: a positive integer, a JSON string literal or a
    /// single-quoted literal.
    pub fn parse(text: &str) -> Option<Self> {
        let t = text.trim();
        if !t.is_empty() && t.bytes().all(|b| b.is_ascii_digit()) {
            let index = t.parse::<usize>().unwrap_or(usize::MAX);
            return (index >= 1).then_some(RowSelector::Index(index));
        }
        if t.len() >= 2 && t.starts_with('"') && t.ends_with('"') {
            return serde_json::from_str::<String>(t).ok().map(RowSelector::PrimaryKey);
        }
        if t.len() >= 2 && t.starts_with('\'') && t.ends_with('\'') {
            return Some(RowSelector::PrimaryKey(t[1..t.len() - 1].to_string()));
        }
        None
    }
}

impl fmt::Display for RowSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowSelector::Index(index) => write!(f, "{index}"),
            RowSelector::PrimaryKey(key) => write!(f, "{}", serde_json::Value::String(key.clone())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TablePatch {
    pub table_name: String,
    pub selector: RowSelector,
    pub column: String,
    pub expr: Expr,
    pub line: usize,
}

impl TablePatch {
    fn cell_name(&self) -> String {
        format!("{}[{}].{}", self.table_name, self.selector, self.column)
    }

    fn column_name(&self) -> String {
        format!("{}.{}", self.table_name, self.column)
    }
}

fn patch_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^([A-Za-z_][A-Za-z0-9_]*)\s*\[\s*([^\]]+)\s*\]\s*\.\s*([A-Za-z_][A-Za-z0-9_]*)\s*=\s*(.+)\s*;\s*$",
        )
        .expect("valid regex")
    })
}

/// 1-based character column where the expression of a patch line starts.
fn expr_start_column(raw_line: &str) -> usize {
    let Some(eq) = raw_line.find('=') else {
        return 1;
    };
    let after = &raw_line[eq + 1..];
    let ws = after.len() - after.trim_start().len();
    raw_line[..eq + 1 + ws].chars().count() + 1
}

/// Extracts the patch statements of one calc block.
pub fn parse_table_patches(block: &CodeBlock) -> (Vec<TablePatch>, Vec<Message>) {
    let mut patches = Vec::new();
    let mut messages = Vec::new();

    for (i, raw_line) in split_lines(&block.content).into_iter().enumerate() {
        let trimmed = raw_line.trim();
        if trimmed.is_empty() || trimmed.starts_with("//") {
            continue;
        }
        let Some(caps) = patch_regex().captures(trimmed) else {
            continue;
        };
        let table_name = &caps[1];
        let selector_text = caps[2].trim();
        let column = &caps[3];
        let expr_text = caps[4].trim();
        let line = block.fence_line + 1 + i;
        let node_name = format!("{table_name}[{selector_text}].{column}");

        let Some(selector) = RowSelector::parse(selector_text) else {
            messages.push(
                Message::error(
                    codes::CALC_PATCH_INVALID_SELECTOR,
                    format!("Invalid table patch selector: [{selector_text}]"),
                )
                .at_line(line)
                .in_block(CALC_LANG)
                .for_node(&node_name),
            );
            continue;
        };
        match parse_expression(expr_text) {
            Ok(expr) => patches.push(TablePatch {
                table_name: table_name.to_string(),
                selector,
                column: column.to_string(),
                expr,
                line,
            }),
            Err(err) => {
                let offset = expr_text.get(..err.pos).map_or(0, |s| s.chars().count());
                messages.push(
                    Message::error(codes::CALC_PATCH_PARSE_EXPR, err.message)
                        .at(line, expr_start_column(raw_line) + offset)
                        .in_block(CALC_LANG)
                        .for_node(&node_name),
                );
            }
        }
    }
    (patches, messages)
}

/// Parses the patches of every calc block in document order.
pub fn collect_table_patches(blocks: &[CodeBlock]) -> (Vec<TablePatch>, Vec<Message>) {
    let mut patches = Vec::new();
    let mut messages = Vec::new();
    for block in blocks.iter().filter(|block| block.lang == CALC_LANG) {
        let (block_patches, block_messages) = parse_table_patches(block);
        patches.extend(block_patches);
        messages.extend(block_messages);
    }
    (patches, messages)
}

/// Mutable state the patches of one run are applied to.
pub struct PatchTarget<'a> {
    /// Table snapshots by name, as exposed in the value map.
    pub tables: &'a mut IndexMap<String, Value>,
    /// The final evaluation environment patch expressions run in.
    pub env: &'a mut Globals,
    pub keys: &'a mut TableKeys,
}

fn find_row(rows: &[Value], selector: &RowSelector, primary_key: &str) -> Option<usize> {
    match selector {
        RowSelector::Index(index) => Some(index - 1).filter(|i| *i < rows.len()),
        RowSelector::PrimaryKey(key) => rows.iter().position(|row| {
            row.as_object()
                .and_then(|record| record.get(primary_key))
                .and_then(Value::key_text)
                .is_some_and(|pk| !pk.is_empty() && pk == *key)
        }),
    }
}

/// Applies `patches` in order, returning one message per rejected patch.
pub fn apply_table_patches(
    patches: &[TablePatch],
    schemas: &[Table],
    target: PatchTarget<'_>,
    std: &StdLib,
) -> Vec<Message> {
    let PatchTarget { tables, env, keys } = target;
    let mut messages = Vec::new();
    let mut warned_positional = HashSet::new();

    for patch in patches {
        let fail = |code: &str, message: String, node: &str| {
            Message::error(code, message)
                .at_line(patch.line)
                .in_block(CALC_LANG)
                .for_node(node)
        };
        let name = patch.table_name.as_str();
        let Some(schema) = schemas.iter().find(|table| table.name == name) else {
            messages.push(fail(
                codes::CALC_PATCH_UNKNOWN_TABLE,
                format!("Table patch target does not exist: {name}"),
                name,
            ));
            continue;
        };
        if schema.source.is_some() {
            messages.push(fail(
                codes::CALC_PATCH_EXTERNAL_TABLE,
                format!("External data tables are read-only and cannot be patched: {name}"),
                name,
            ));
            continue;
        }
        let column = patch.column.as_str();
        if is_banned_key(column) {
            messages.push(fail(
                codes::CALC_PATCH_DISALLOWED_KEY,
                format!("Disallowed column key in patch: {column}"),
                &patch.column_name(),
            ));
            continue;
        }
        let Some(column_type) = schema.columns.get(column) else {
            messages.push(fail(
                codes::CALC_PATCH_UNKNOWN_COLUMN,
                format!("Unknown column '{column}' for table '{name}'"),
                &patch.column_name(),
            ));
            continue;
        };
        if column == schema.primary_key {
            messages.push(fail(
                codes::CALC_PATCH_PRIMARYKEY,
                format!("Patching primaryKey '{}' is not supported", schema.primary_key),
                &patch.column_name(),
            ));
            continue;
        }
        let Some(Value::Array(rows)) = tables.get(name) else {
            log::warn!("patch target {name} has no row array in the evaluation snapshot");
            messages.push(fail(
                codes::CALC_PATCH_TARGET_NOT_TABLE,
                format!("Patch target is not a table: {name}"),
                name,
            ));
            continue;
        };
        if matches!(patch.selector, RowSelector::Index(_)) && warned_positional.insert(name) {
            messages.push(
                Message::warning(
                    codes::CALC_PATCH_POSITIONAL,
                    format!(
                        "Table patches by row index are fragile; prefer primaryKey selectors like {name}[\"...\"]"
                    ),
                )
                .at_line(patch.line)
                .in_block(CALC_LANG)
                .for_node(name),
            );
        }
        let Some(index) = find_row(rows, &patch.selector, &schema.primary_key) else {
            messages.push(fail(
                codes::CALC_PATCH_ROW_NOT_FOUND,
                format!("Row not found for patch: {name}[{}]", patch.selector),
                &patch.cell_name(),
            ));
            continue;
        };
        let Some(row) = rows[index].as_object() else {
            messages.push(fail(
                codes::CALC_PATCH_ROW_INVALID,
                format!("Target row is not an object for patch: {name}"),
                name,
            ));
            continue;
        };

        let computed = match Interpreter::new(env, std, keys).evaluate(&patch.expr) {
            Ok(value) => value,
            Err(err) => {
                log::trace!("patch {} failed: {err}", patch.cell_name());
                messages.push(fail(err.code(), err.to_string(), &patch.cell_name()));
                continue;
            }
        };
        let next_value = match coerce_table_cell_value(column_type, &computed) {
            Ok(value) => value,
            Err(message) => {
                messages.push(fail(codes::CALC_PATCH_TYPE, message, &patch.cell_name()));
                continue;
            }
        };

        let mut next_row: Record = row.clone();
        next_row.insert(column.to_string(), next_value);
        let mut next_rows = rows.to_vec();
        next_rows[index] = Value::object(next_row);
        let next_rows = Value::array(next_rows);
        log::trace!("patched {}", patch.cell_name());

        keys.register(&next_rows, &schema.primary_key);
        env.insert(name.to_string(), next_rows.clone());
        tables.insert(name.to_string(), next_rows);
    }
    messages
}
