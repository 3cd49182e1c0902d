//! Targeted edits of document source text.
//!
//! A [`SourceMap`] remembers where inputs and inline table rows were declared; [`apply_patch`]
//! rewrites exactly one of those lines and leaves every other byte of the document alone.

use std::collections::HashMap;

use calcdown_model::ColumnType;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::coercion::{input_default_text, json_cell_value};
use crate::document::{Program, Table};
use crate::value::Value;

/// An edit requested by a host UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PatchOp {
    #[serde(rename_all = "camelCase")]
    UpdateInput {
        name: String,
        value: serde_json::Value,
    },
    #[serde(rename_all = "camelCase")]
    UpdateTableCell {
        table_name: String,
        primary_key: serde_json::Value,
        column: String,
        value: serde_json::Value,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    #[error("Input not found: {0}")]
    InputNotFound(String),
    #[error("Input line out of range: {0}")]
    InputLineOutOfRange(String),
    #[error("Could not find '=' when patching input: {0}")]
    MissingEquals(String),
    #[error("Table not found: {0}")]
    TableNotFound(String),
    #[error("External data tables are read-only: {0}")]
    ExternalTable(String),
    #[error("Invalid primaryKey for patch: {0}")]
    InvalidPrimaryKey(String),
    #[error("Row not found in table '{table}': {key}")]
    RowNotFound { table: String, key: String },
    #[error("Row line out of range for '{table}': {key}")]
    RowLineOutOfRange { table: String, key: String },
    #[error("Empty JSONL row at {table}:{key}")]
    EmptyRow { table: String, key: String },
    #[error("Invalid JSONL row at {table}:{key} ({reason})")]
    InvalidRow {
        table: String,
        key: String,
        reason: String,
    },
    #[error("JSONL row must be an object at {table}:{key}")]
    RowNotObject { table: String, key: String },
    #[error("Row is missing primaryKey '{column}' at {table}:{key}")]
    RowMissingPrimaryKey {
        table: String,
        key: String,
        column: String,
    },
    #[error("Row primaryKey mismatch at {table}:{key} (expected {key}, found {found})")]
    PrimaryKeyMismatch {
        table: String,
        key: String,
        found: String,
    },
    #[error("Unknown column '{column}' for table '{table}'")]
    UnknownColumn { table: String, column: String },
    #[error("Editing primaryKey '{0}' is not supported by updateTableCell")]
    PrimaryKeyColumn(String),
    #[error("{0}")]
    InvalidValue(String),
}

struct InputLocation {
    ty: ColumnType,
    line: usize,
}

struct TableLocation<'p> {
    table: &'p Table,
    rows: HashMap<String, usize>,
}

/// Line numbers of everything [`apply_patch`] can edit in one parsed document.
pub struct SourceMap<'p> {
    inputs: HashMap<String, InputLocation>,
    tables: HashMap<String, TableLocation<'p>>,
}

impl<'p> SourceMap<'p> {
    pub fn build(program: &'p Program) -> Self {
        let inputs = program
            .inputs
            .iter()
            .map(|def| {
                let location = InputLocation {
                    ty: def.ty.clone(),
                    line: def.line,
                };
                (def.name.clone(), location)
            })
            .collect();
        let tables = program
            .tables
            .iter()
            .map(|table| {
                let rows = table
                    .row_map
                    .iter()
                    .flatten()
                    .filter(|loc| !loc.primary_key.is_empty())
                    .map(|loc| (loc.primary_key.clone(), loc.line))
                    .collect();
                (table.name.clone(), TableLocation { table, rows })
            })
            .collect();
        Self { inputs, tables }
    }

    pub fn input_line(&self, name: &str) -> Option<usize> {
        self.inputs.get(name).map(|loc| loc.line)
    }

    pub fn row_line(&self, table: &str, primary_key: &str) -> Option<usize> {
        self.tables.get(table)?.rows.get(primary_key).copied()
    }
}

fn primary_key_text(value: &serde_json::Value) -> Option<String> {
    Value::from_json(value).key_text().filter(|key| !key.is_empty())
}

fn leading_whitespace(text: &str) -> &str {
    &text[..text.len() - text.trim_start().len()]
}

fn trailing_whitespace(text: &str) -> &str {
    &text[text.trim_end().len()..]
}

fn patch_input_line(line: &str, name: &str, ty: &ColumnType, value: &Value) -> Result<String, PatchError> {
    let (before_comment, comment) = line.split_at(line.find('#').unwrap_or(line.len()));
    let eq = before_comment
        .find('=')
        .ok_or_else(|| PatchError::MissingEquals(name.to_string()))?;
    let (prefix, after_eq) = before_comment.split_at(eq + 1);
    let next = input_default_text(ty, value).map_err(PatchError::InvalidValue)?;
    Ok(format!(
        "{prefix}{}{next}{}{comment}",
        leading_whitespace(after_eq),
        trailing_whitespace(after_eq)
    ))
}

fn patch_row_line(
    line: &str,
    location: &TableLocation<'_>,
    key: &str,
    column: &str,
    value: &Value,
) -> Result<String, PatchError> {
    let table = location.table;
    let name = table.name.as_str();
    let row_error = |make: fn(String, String) -> PatchError| make(name.to_string(), key.to_string());

    let indent = leading_whitespace(line);
    let rest = &line[indent.len()..];
    let trailing = trailing_whitespace(rest);
    let json_text = rest.trim();
    if json_text.is_empty() {
        return Err(row_error(|table, key| PatchError::EmptyRow { table, key }));
    }
    let row: serde_json::Value =
        serde_json::from_str(json_text).map_err(|err| PatchError::InvalidRow {
            table: name.to_string(),
            key: key.to_string(),
            reason: err.to_string(),
        })?;
    let serde_json::Value::Object(mut row) = row else {
        return Err(row_error(|table, key| PatchError::RowNotObject { table, key }));
    };
    let Some(found) = row.get(&table.primary_key).and_then(primary_key_text) else {
        return Err(PatchError::RowMissingPrimaryKey {
            table: name.to_string(),
            key: key.to_string(),
            column: table.primary_key.clone(),
        });
    };
    if found != key {
        return Err(PatchError::PrimaryKeyMismatch {
            table: name.to_string(),
            key: key.to_string(),
            found,
        });
    }
    let Some(column_type) = table.columns.get(column) else {
        return Err(PatchError::UnknownColumn {
            table: name.to_string(),
            column: column.to_string(),
        });
    };
    if column == table.primary_key {
        return Err(PatchError::PrimaryKeyColumn(table.primary_key.clone()));
    }
    let next_value = json_cell_value(column_type, value).map_err(PatchError::InvalidValue)?;

    let mut next_row = serde_json::Map::new();
    for declared in table.columns.keys() {
        if declared == column {
            next_row.insert(declared.clone(), next_value.clone());
        } else if let Some(cell) = row.remove(declared) {
            next_row.insert(declared.clone(), cell);
        }
    }
    next_row.extend(row);
    Ok(format!(
        "{indent}{}{trailing}",
        serde_json::Value::Object(next_row)
    ))
}

/// Byte range of the content of 1-based `line`, excluding its `\n` or `\r\n` terminator.
fn line_span(source: &str, line: usize) -> Option<(usize, usize)> {
    let mut start = 0;
    for (idx, segment) in source.split_inclusive('\n').enumerate() {
        if idx + 1 == line {
            let content = segment.strip_suffix('\n').unwrap_or(segment);
            let content = content.strip_suffix('\r').unwrap_or(content);
            return Some((start, start + content.len()));
        }
        start += segment.len();
    }
    None
}

/// Applies one edit to `source`, returning the new text.
///
/// Only the content of the targeted line changes; every line terminator, including the target's
/// own, is kept as written. On error `source` is left as it was.
pub fn apply_patch(source: &str, op: &PatchOp, map: &SourceMap<'_>) -> Result<String, PatchError> {
    let ((start, end), next) = match op {
        PatchOp::UpdateInput { name, value } => {
            let location = map
                .inputs
                .get(name)
                .ok_or_else(|| PatchError::InputNotFound(name.clone()))?;
            let span = line_span(source, location.line)
                .ok_or_else(|| PatchError::InputLineOutOfRange(name.clone()))?;
            let current = &source[span.0..span.1];
            (span, patch_input_line(current, name, &location.ty, &Value::from_json(value))?)
        }
        PatchOp::UpdateTableCell {
            table_name,
            primary_key,
            column,
            value,
        } => {
            let location = map
                .tables
                .get(table_name)
                .ok_or_else(|| PatchError::TableNotFound(table_name.clone()))?;
            if location.table.source.is_some() || location.table.is_external() {
                return Err(PatchError::ExternalTable(table_name.clone()));
            }
            let key = primary_key_text(primary_key)
                .ok_or_else(|| PatchError::InvalidPrimaryKey(primary_key.to_string()))?;
            let line = location
                .rows
                .get(&key)
                .copied()
                .ok_or_else(|| PatchError::RowNotFound {
                    table: table_name.clone(),
                    key: key.clone(),
                })?;
            let span = line_span(source, line).ok_or_else(|| PatchError::RowLineOutOfRange {
                table: table_name.clone(),
                key: key.clone(),
            })?;
            let current = &source[span.0..span.1];
            (span, patch_row_line(current, location, &key, column, &Value::from_json(value))?)
        }
    };
    Ok(format!("{}{next}{}", &source[..start], &source[end..]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::parse_program;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const DOC: &str = "# Budget\n\n```inputs\nrate: percent =  5   # yearly\nname: string = \"Q1\"\n```\n\n```data\nname: items\nprimaryKey: id\ncolumns:\n  id: string\n  qty: integer\n  price: number\n---\n  {\"price\": 2, \"id\": \"a\", \"note\": \"x\"}  \n{\"id\": \"b\", \"qty\": 1}\n```\n";

    fn patch(source: &str, op: PatchOp) -> Result<String, PatchError> {
        let (program, messages) = parse_program(source);
        assert!(messages.is_empty(), "{messages:?}");
        let map = SourceMap::build(&program);
        apply_patch(source, &op, &map)
    }

    #[test]
    fn input_edit_keeps_spacing_and_comment() {
        let out = patch(
            DOC,
            PatchOp::UpdateInput {
                name: "rate".into(),
                value: json!("7.5"),
            },
        )
        .unwrap();
        let changed: Vec<_> = DOC.lines().zip(out.lines()).filter(|(a, b)| a != b).collect();
        assert_eq!(
            changed,
            vec![("rate: percent =  5   # yearly", "rate: percent =  7.5   # yearly")]
        );
        assert_eq!(out.lines().count(), DOC.lines().count());
    }

    #[test]
    fn string_inputs_are_quoted() {
        let out = patch(
            DOC,
            PatchOp::UpdateInput {
                name: "name".into(),
                value: json!(12),
            },
        )
        .unwrap();
        assert!(out.contains("name: string = \"12\"\n"));
    }

    #[test]
    fn cell_edit_reorders_to_declared_columns() {
        let out = patch(
            DOC,
            PatchOp::UpdateTableCell {
                table_name: "items".into(),
                primary_key: json!("a"),
                column: "qty".into(),
                value: json!("3"),
            },
        )
        .unwrap();
        assert!(
            out.contains("\n  {\"id\":\"a\",\"qty\":3,\"price\":2,\"note\":\"x\"}  \n"),
            "{out}"
        );
    }

    #[test]
    fn preserves_crlf() {
        let source = DOC.replace('\n', "\r\n");
        let out = patch(
            &source,
            PatchOp::UpdateTableCell {
                table_name: "items".into(),
                primary_key: json!("b"),
                column: "price".into(),
                value: json!(4.25),
            },
        )
        .unwrap();
        assert!(out.contains("\r\n{\"id\":\"b\",\"qty\":1,\"price\":4.25}\r\n"));
        assert_eq!(out.matches("\r\n").count(), source.matches("\r\n").count());
    }

    #[test]
    fn keeps_mixed_line_endings() {
        let source = "```inputs\r\nrate: number = 1\n```\nplain line\r\n";
        let out = patch(
            source,
            PatchOp::UpdateInput {
                name: "rate".into(),
                value: json!(2),
            },
        )
        .unwrap();
        assert_eq!(out, "```inputs\r\nrate: number = 2\n```\nplain line\r\n");

        let no_trailing_newline = "```inputs\nrate: number = 1\r\n```";
        let out = patch(
            no_trailing_newline,
            PatchOp::UpdateInput {
                name: "rate".into(),
                value: json!(3),
            },
        )
        .unwrap();
        assert_eq!(out, "```inputs\nrate: number = 3\r\n```");
    }

    #[test]
    fn rejects_bad_edits() {
        let cases = vec![
            (
                PatchOp::UpdateInput {
                    name: "missing".into(),
                    value: json!(1),
                },
                "Input not found: missing",
            ),
            (
                PatchOp::UpdateInput {
                    name: "rate".into(),
                    value: json!("lots"),
                },
                "Expected numeric value",
            ),
            (
                PatchOp::UpdateTableCell {
                    table_name: "items".into(),
                    primary_key: json!("zzz"),
                    column: "qty".into(),
                    value: json!(1),
                },
                "Row not found in table 'items': zzz",
            ),
            (
                PatchOp::UpdateTableCell {
                    table_name: "items".into(),
                    primary_key: json!("a"),
                    column: "id".into(),
                    value: json!("c"),
                },
                "Editing primaryKey 'id' is not supported by updateTableCell",
            ),
            (
                PatchOp::UpdateTableCell {
                    table_name: "items".into(),
                    primary_key: json!("a"),
                    column: "color".into(),
                    value: json!("red"),
                },
                "Unknown column 'color' for table 'items'",
            ),
            (
                PatchOp::UpdateTableCell {
                    table_name: "items".into(),
                    primary_key: json!(null),
                    column: "qty".into(),
                    value: json!(1),
                },
                "Invalid primaryKey for patch: null",
            ),
        ];
        for (op, expected) in cases {
            let err = patch(DOC, op).unwrap_err();
            assert_eq!(err.to_string(), expected);
        }
    }

    #[test]
    fn stale_source_is_detected() {
        let (program, _) = parse_program(DOC);
        let map = SourceMap::build(&program);
        let edited = DOC.replace("{\"id\": \"b\", \"qty\": 1}", "{\"id\": \"c\", \"qty\": 1}");
        let err = apply_patch(
            &edited,
            &PatchOp::UpdateTableCell {
                table_name: "items".into(),
                primary_key: json!("b"),
                column: "qty".into(),
                value: json!(2),
            },
            &map,
        )
        .unwrap_err();
        assert_eq!(
            err,
            PatchError::PrimaryKeyMismatch {
                table: "items".into(),
                key: "b".into(),
                found: "c".into(),
            }
        );
    }

    #[test]
    fn ops_deserialize_from_host_json() {
        let op: PatchOp = serde_json::from_value(json!({
            "kind": "updateTableCell",
            "tableName": "items",
            "primaryKey": 7,
            "column": "qty",
            "value": 2
        }))
        .unwrap();
        assert_eq!(
            op,
            PatchOp::UpdateTableCell {
                table_name: "items".into(),
                primary_key: json!(7),
                column: "qty".into(),
                value: json!(2),
            }
        );
    }
}
