use std::collections::HashSet;
use std::sync::OnceLock;

use calcdown_model::date::parse_iso_date;
use calcdown_model::{codes, ColumnType, Message, TypeName};
use regex::Regex;

use super::markdown::{split_lines, CodeBlock};
use crate::value::{parse_number, Value};

/// A typed, defaulted input declared in an `inputs` block.
#[derive(Debug, Clone, PartialEq)]
pub struct InputDef {
    pub name: String,
    pub ty: ColumnType,
    /// The default as written, without surrounding whitespace or trailing comment.
    pub default_text: String,
    pub default_value: Value,
    pub line: usize,
}

/// Parses the default of an input according to its declared type.
pub fn parse_default_value(ty: &ColumnType, text: &str) -> Result<Value, String> {
    let t = text.trim();
    match &ty.name {
        TypeName::String => Ok(Value::string(unquote(t))),
        TypeName::Boolean => match t {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(format!("Invalid boolean default: {t}")),
        },
        TypeName::Date => parse_iso_date(t).map(Value::Date).map_err(|e| e.to_string()),
        TypeName::Integer => parse_number(t)
            .filter(|n| n.fract() == 0.0)
            .map(Value::Number)
            .ok_or_else(|| format!("Invalid integer default: {t}")),
        name if name.is_numeric() => parse_number(t)
            .map(Value::Number)
            .ok_or_else(|| format!("Invalid numeric default: {t}")),
        _ => Ok(parse_number(t).map_or_else(|| Value::string(t), Value::Number)),
    }
}

fn unquote(text: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = text
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    text
}

/// Parses every `name: type = default  # comment` line of an `inputs` block.
pub fn parse_inputs_block(block: &CodeBlock) -> (Vec<InputDef>, Vec<Message>) {
    static LINE: OnceLock<Regex> = OnceLock::new();
    let re = LINE.get_or_init(|| {
        Regex::new(
            r"^([A-Za-z_][A-Za-z0-9_]*)\s*:\s*([A-Za-z_][A-Za-z0-9_]*(?:\([^)]*\))?)\s*=\s*(.+)$",
        )
        .expect("valid regex")
    });

    let mut inputs = Vec::new();
    let mut messages = Vec::new();
    let mut seen = HashSet::new();

    for (i, raw_line) in split_lines(&block.content).into_iter().enumerate() {
        let line = block.fence_line + 1 + i;
        let trimmed = raw_line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let code = raw_line.split('#').next().unwrap_or_default().trim();
        if code.is_empty() {
            continue;
        }
        let Some(caps) = re.captures(code) else {
            messages.push(
                Message::error(codes::INPUT_INVALID_LINE, format!("Invalid input line: {code}"))
                    .at_line(line)
                    .in_block(&block.lang),
            );
            continue;
        };
        let name = &caps[1];
        let ty = ColumnType::parse(&caps[2]);
        let default_text = caps[3].trim();

        if !seen.insert(name.to_string()) {
            messages.push(
                Message::error(
                    codes::INPUT_DUPLICATE_NAME,
                    format!("Duplicate input name: {name}"),
                )
                .at_line(line)
                .in_block(&block.lang)
                .for_node(name),
            );
            continue;
        }

        match parse_default_value(&ty, default_text) {
            Ok(default_value) => inputs.push(InputDef {
                name: name.to_string(),
                ty,
                default_text: default_text.to_string(),
                default_value,
                line,
            }),
            Err(message) => messages.push(
                Message::error(codes::INPUT_INVALID_DEFAULT, message)
                    .at_line(line)
                    .in_block(&block.lang)
                    .for_node(name),
            ),
        }
    }
    (inputs, messages)
}
