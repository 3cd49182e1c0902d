//! Whole-program evaluation.

use calcdown_model::{codes, Message};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::coercion::normalize_override_value;
use crate::document::Program;
use crate::eval::{evaluate_nodes, Globals, TableKeys};
use crate::functions::{sort_rows, StdLib};
use crate::patch::{apply_table_patches, collect_table_patches, PatchTarget};
use crate::value::Value;

/// Per-run settings supplied by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EvalContext {
    /// Clock for `std.date.now`/`today`; the system clock when absent.
    pub current_date_time: Option<DateTime<Utc>>,
    /// Present tables with a `sortBy` header in that order.
    pub apply_sort_by: bool,
}

impl Default for EvalContext {
    fn default() -> Self {
        Self {
            current_date_time: None,
            apply_sort_by: true,
        }
    }
}

/// Result of one evaluation run.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Inputs, then tables (after patches), then node results in evaluation order.
    pub values: IndexMap<String, Value>,
    pub messages: Vec<Message>,
}

impl Evaluation {
    pub fn has_errors(&self) -> bool {
        self.messages.iter().any(Message::is_error)
    }

    /// The value map rendered as a JSON object.
    pub fn values_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.values
                .iter()
                .map(|(name, value)| (name.clone(), value.to_json()))
                .collect(),
        )
    }
}

/// Evaluates `program` with input (or table) `overrides`.
///
/// Never fails: unknown overrides, invalid override values, node failures, cycles and rejected
/// patches are all reported as messages.
pub fn evaluate_program(
    program: &Program,
    overrides: &IndexMap<String, Value>,
    context: &EvalContext,
) -> Evaluation {
    let mut messages = Vec::new();

    let mut inputs: IndexMap<String, Value> = program
        .inputs
        .iter()
        .map(|def| (def.name.clone(), def.default_value.clone()))
        .collect();
    let mut tables: IndexMap<String, Value> = program
        .tables
        .iter()
        .map(|table| {
            let rows = table.rows.iter().cloned().map(Value::object).collect();
            (table.name.clone(), Value::array(rows))
        })
        .collect();

    let (patches, patch_messages) = collect_table_patches(&program.blocks);
    messages.extend(patch_messages);

    for (name, value) in overrides {
        let Some(def) = program.input(name) else {
            if let Some(slot) = tables.get_mut(name) {
                *slot = value.clone();
            } else {
                messages.push(Message::warning(
                    codes::OVERRIDE_UNKNOWN,
                    format!("Unknown override: {name}"),
                ));
            }
            continue;
        };
        match normalize_override_value(def, value) {
            Ok(normalized) => {
                inputs.insert(name.clone(), normalized);
            }
            Err(message) => {
                messages.push(Message::error(codes::OVERRIDE_INVALID, message).for_node(name));
            }
        }
    }

    let now = context.current_date_time.unwrap_or_else(Utc::now);
    let std = StdLib::new(now);

    if context.apply_sort_by {
        for table in &program.tables {
            let Some(key) = table.sort_by.as_deref() else {
                continue;
            };
            let Some(Value::Array(rows)) = tables.get(&table.name) else {
                continue;
            };
            match sort_rows(rows, key, false) {
                Ok(sorted) => {
                    tables.insert(table.name.clone(), Value::array(sorted));
                }
                Err(err) => messages.push(
                    Message::error(codes::DATA_SORTBY_RUNTIME, err.to_string())
                        .at_line(table.line)
                        .for_node(&table.name)
                        .in_block("data"),
                ),
            }
        }
    }

    let mut keys = TableKeys::new();
    for table in &program.tables {
        if let Some(rows) = tables.get(&table.name) {
            keys.register(rows, &table.primary_key);
        }
    }

    let globals: Globals = inputs
        .iter()
        .chain(tables.iter())
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    let evaluation = evaluate_nodes(&program.nodes, globals, &std, &keys);
    messages.extend(evaluation.messages);

    let mut env = evaluation.globals;
    messages.extend(apply_table_patches(
        &patches,
        &program.tables,
        PatchTarget {
            tables: &mut tables,
            env: &mut env,
            keys: &mut keys,
        },
        &std,
    ));

    let mut values = inputs;
    values.extend(tables);
    values.extend(evaluation.values);
    log::debug!(
        "evaluated program: {} values, {} messages",
        values.len(),
        messages.len()
    );
    Evaluation { values, messages }
}
