use std::collections::HashSet;
use std::sync::OnceLock;

use calcdown_model::date::{parse_datetime, parse_iso_date};
use calcdown_model::{
    codes, is_identifier, ColumnType, HashError, Message, SourceFormat, TableSource, TypeName,
    STD_NAME,
};
use indexmap::IndexMap;
use regex::Regex;

use super::markdown::{split_lines, CodeBlock};
use crate::value::{Record, Value};

const DATA_LANG: &str = "data";

/// Where an inline row's primary key was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowLocation {
    pub primary_key: String,
    pub line: usize,
}

/// A typed table declared by a `data` block.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub primary_key: String,
    pub columns: IndexMap<String, ColumnType>,
    /// Inline rows; always empty for external tables.
    pub rows: Vec<Record>,
    /// Present for inline tables only.
    pub row_map: Option<Vec<RowLocation>>,
    pub source: Option<TableSource>,
    pub sort_by: Option<String>,
    /// 1-based line of the block's first header line.
    pub line: usize,
}

impl Table {
    pub fn is_external(&self) -> bool {
        self.row_map.is_none()
    }

    pub fn row_line(&self, primary_key: &str) -> Option<usize> {
        self.row_map
            .as_deref()?
            .iter()
            .find(|loc| loc.primary_key == primary_key)
            .map(|loc| loc.line)
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Null | serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
            "object"
        }
    }
}

/// Coerces a raw cell to the declared column type.
pub fn parse_scalar_by_type(ty: &ColumnType, value: &serde_json::Value) -> Result<Value, String> {
    match &ty.name {
        TypeName::String => match value {
            serde_json::Value::String(s) => Ok(Value::string(s.as_str())),
            other => Err(format!("Expected string, got {}", json_type_name(other))),
        },
        TypeName::Boolean => match value {
            serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
            other => Err(format!("Expected boolean, got {}", json_type_name(other))),
        },
        TypeName::Integer => value
            .as_f64()
            .filter(|n| n.is_finite() && n.fract() == 0.0)
            .map(Value::Number)
            .ok_or_else(|| "Expected integer".to_string()),
        name if name.is_numeric() => value
            .as_f64()
            .filter(|n| n.is_finite())
            .map(Value::Number)
            .ok_or_else(|| "Expected number".to_string()),
        TypeName::Date => {
            let text = value.as_str().ok_or("Expected ISO date string")?;
            parse_iso_date(text).map(Value::Date).map_err(|e| e.to_string())
        }
        TypeName::Datetime => {
            let text = value.as_str().ok_or("Expected datetime string")?;
            parse_datetime(text)
                .map(Value::DateTime)
                .map_err(|e| e.to_string())
        }
        _ => Ok(Value::from_json(value)),
    }
}

fn primary_key_text(value: &serde_json::Value) -> Option<String> {
    let text = match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => Value::Number(n.as_f64()?).key_text()?,
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Validates raw rows one at a time against a table's primary key and column types.
///
/// Rows with a missing, mistyped or duplicate primary key are dropped; cells that fail coercion
/// are reported and kept as written.
pub struct RowCoercer<'a> {
    table_name: &'a str,
    primary_key: &'a str,
    columns: &'a IndexMap<String, ColumnType>,
    file: Option<&'a str>,
    seen: HashSet<String>,
    pub rows: Vec<Record>,
    pub row_map: Vec<RowLocation>,
    pub messages: Vec<Message>,
}

impl<'a> RowCoercer<'a> {
    pub fn new(
        table_name: &'a str,
        primary_key: &'a str,
        columns: &'a IndexMap<String, ColumnType>,
        file: Option<&'a str>,
    ) -> Self {
        Self {
            table_name,
            primary_key,
            columns,
            file,
            seen: HashSet::new(),
            rows: Vec::new(),
            row_map: Vec::new(),
            messages: Vec::new(),
        }
    }

    /// Records a row-level error for `line`.
    pub fn report(&mut self, line: usize, code: &str, message: impl Into<String>) {
        self.messages.push(
            Message::error(code, message)
                .in_file(self.file)
                .at_line(line)
                .in_block(DATA_LANG)
                .for_node(self.table_name),
        );
    }

    pub fn push(&mut self, line: usize, raw: serde_json::Value) {
        let serde_json::Value::Object(object) = raw else {
            self.report(line, codes::DATA_ROW_NOT_OBJECT, "Data row must be a JSON object");
            return;
        };
        let pk = self.primary_key;
        let Some(pk_value) = object.get(pk) else {
            self.report(
                line,
                codes::DATA_ROW_MISSING_PK,
                format!("Data row is missing primaryKey '{pk}'"),
            );
            return;
        };
        let Some(key) = primary_key_text(pk_value) else {
            self.report(
                line,
                codes::DATA_PK_TYPE,
                format!("primaryKey '{pk}' must be a string or number"),
            );
            return;
        };
        if self.seen.contains(&key) {
            self.report(
                line,
                codes::DATA_PK_DUPLICATE,
                format!("Duplicate primaryKey '{key}'"),
            );
            return;
        }
        self.seen.insert(key.clone());

        let mut row = Record::with_capacity(object.len());
        for (column, cell) in &object {
            let value = match self.columns.get(column) {
                Some(ty) => parse_scalar_by_type(ty, cell).unwrap_or_else(|err| {
                    self.report(
                        line,
                        codes::DATA_INVALID_VALUE,
                        format!("Invalid value for column '{column}': {err}"),
                    );
                    Value::from_json(cell)
                }),
                None => Value::from_json(cell),
            };
            row.insert(column.clone(), value);
        }
        self.rows.push(row);
        self.row_map.push(RowLocation {
            primary_key: key,
            line,
        });
    }
}

/// Runs numbered raw rows (e.g. from an external file) through the primary-key and coercion
/// pipeline.
pub fn coerce_rows_to_table(
    table_name: &str,
    primary_key: &str,
    columns: &IndexMap<String, ColumnType>,
    raw_rows: impl IntoIterator<Item = (usize, serde_json::Value)>,
    file: Option<&str>,
) -> (Vec<Record>, Vec<Message>) {
    let mut coercer = RowCoercer::new(table_name, primary_key, columns, file);
    for (line, raw) in raw_rows {
        coercer.push(line, raw);
    }
    (coercer.rows, coercer.messages)
}

#[derive(Default)]
struct Header {
    name: Option<String>,
    primary_key: Option<String>,
    sort_by: Option<String>,
    source: Option<String>,
    format: Option<String>,
    hash: Option<String>,
    columns: IndexMap<String, ColumnType>,
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn is_skippable(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with('#')
}

fn parse_header(lines: &[&str], block: &CodeBlock, messages: &mut Vec<Message>) -> Header {
    static KEY: OnceLock<Regex> = OnceLock::new();
    static COLUMN: OnceLock<Regex> = OnceLock::new();
    let key_re =
        KEY.get_or_init(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\s*:\s*(.*)$").expect("valid regex"));
    let column_re = COLUMN
        .get_or_init(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\s*:\s*(.+)$").expect("valid regex"));

    let mut header = Header::default();
    let mut i = 0;
    while i < lines.len() {
        let line_no = block.fence_line + 1 + i;
        let trimmed = lines[i].trim();
        i += 1;
        if is_skippable(trimmed) {
            continue;
        }
        let Some(caps) = key_re.captures(trimmed) else {
            messages.push(
                Message::error(
                    codes::DATA_HEADER_INVALID_LINE,
                    format!("Invalid data header line: {trimmed}"),
                )
                .at_line(line_no)
                .in_block(&block.lang),
            );
            continue;
        };
        let value = &caps[2];
        match &caps[1] {
            "name" => header.name = non_empty(value),
            "primaryKey" => header.primary_key = non_empty(value),
            "sortBy" => header.sort_by = non_empty(value),
            "source" => header.source = non_empty(value),
            "format" => header.format = non_empty(value),
            "hash" => header.hash = non_empty(value),
            "columns" => {
                while i < lines.len() {
                    let raw = lines[i];
                    if is_skippable(raw) {
                        i += 1;
                        continue;
                    }
                    if !raw.starts_with([' ', '\t']) {
                        break;
                    }
                    let entry = raw.trim();
                    match column_re.captures(entry) {
                        Some(col) => {
                            header
                                .columns
                                .insert(col[1].to_string(), ColumnType::parse(&col[2]));
                        }
                        None => messages.push(
                            Message::error(
                                codes::DATA_COLUMNS_INVALID_ENTRY,
                                format!("Invalid columns entry: {entry}"),
                            )
                            .at_line(block.fence_line + 1 + i)
                            .in_block(&block.lang),
                        ),
                    }
                    i += 1;
                }
            }
            other => messages.push(
                Message::warning(
                    codes::DATA_HEADER_UNKNOWN_KEY,
                    format!("Unknown data header key: {other}"),
                )
                .at_line(line_no)
                .in_block(&block.lang),
            ),
        }
    }
    header
}

/// Parses a `data` block into a table.
///
/// Returns `None` when the header lacks a usable name, primary key or column list; every
/// other problem is reported and the table is still produced.
pub fn parse_data_block(block: &CodeBlock) -> (Option<Table>, Vec<Message>) {
    let mut messages = Vec::new();
    let header_line = block.fence_line + 1;
    let lines = split_lines(&block.content);
    let Some(sep) = lines.iter().position(|line| line.trim() == "---") else {
        messages.push(
            Message::error(
                codes::DATA_MISSING_SEPARATOR,
                "Data block is missing '---' separator between header and rows",
            )
            .at_line(header_line)
            .in_block(&block.lang),
        );
        return (None, messages);
    };
    let header = parse_header(&lines[..sep], block, &mut messages);
    let row_lines = &lines[sep + 1..];
    let row_line = |i: usize| header_line + sep + 1 + i;
    let at_header = |message: Message| message.at_line(header_line).in_block(&block.lang);

    let mut valid_name = None;
    match &header.name {
        None => messages.push(at_header(Message::error(
            codes::DATA_HEADER_MISSING_NAME,
            "Data header is missing required key: name",
        ))),
        Some(name) if !is_identifier(name) => messages.push(
            at_header(Message::error(
                codes::DATA_INVALID_NAME,
                format!("Invalid table name: {name}"),
            ))
            .for_node(name),
        ),
        Some(name) if name == STD_NAME => messages.push(
            at_header(Message::error(
                codes::DATA_RESERVED_NAME,
                "The identifier 'std' is reserved and cannot be used as a table name",
            ))
            .for_node(name),
        ),
        Some(name) => valid_name = Some(name.clone()),
    }
    if header.primary_key.is_none() {
        messages.push(at_header(Message::error(
            codes::DATA_HEADER_MISSING_PRIMARY_KEY,
            "Data header is missing required key: primaryKey",
        )));
    }
    if header.columns.is_empty() {
        messages.push(at_header(Message::error(
            codes::DATA_HEADER_MISSING_COLUMNS,
            "Data header is missing required key: columns",
        )));
    } else if let Some(pk) = header
        .primary_key
        .as_deref()
        .filter(|pk| !header.columns.contains_key(*pk))
    {
        messages.push(
            at_header(Message::error(
                codes::DATA_PRIMARYKEY_NOT_DECLARED,
                format!("primaryKey '{pk}' must be declared in columns"),
            ))
            .for_node(pk),
        );
    }
    let mut sort_by = header.sort_by.clone();
    if let Some(key) = &header.sort_by {
        if !is_identifier(key) {
            messages.push(
                at_header(Message::error(
                    codes::DATA_SORTBY_INVALID,
                    format!("Invalid sortBy column name: {key}"),
                ))
                .for_node(key),
            );
            sort_by = None;
        } else if !header.columns.is_empty() && !header.columns.contains_key(key) {
            messages.push(
                at_header(Message::warning(
                    codes::DATA_SORTBY_UNKNOWN,
                    format!("sortBy column '{key}' is not declared in columns"),
                ))
                .for_node(key),
            );
        }
    }

    let (Some(name), Some(primary_key)) = (valid_name, header.primary_key.clone()) else {
        return (None, messages);
    };
    if header.columns.is_empty() {
        return (None, messages);
    }

    let mut table = Table {
        name,
        primary_key,
        columns: header.columns,
        rows: Vec::new(),
        row_map: None,
        source: None,
        sort_by,
        line: header_line,
    };
    let name = table.name.as_str();

    if let Some(uri) = header.source {
        let format = SourceFormat::resolve(header.format.as_deref(), &uri);
        if format.is_none() {
            messages.push(
                at_header(Message::error(
                    codes::DATA_EXTERNAL_FORMAT,
                    "External data tables must specify format: csv|json (or use a .csv/.json extension)",
                ))
                .for_node(name),
            );
        }
        let hash = match TableSource::check_hash(header.hash.as_deref()) {
            Ok(hash) => Some(hash.to_string()),
            Err(err) => {
                let code = match err {
                    HashError::Missing => codes::DATA_EXTERNAL_MISSING_HASH,
                    HashError::Invalid => codes::DATA_EXTERNAL_INVALID_HASH,
                };
                messages.push(at_header(Message::error(code, err.to_string())).for_node(name));
                None
            }
        };
        if let Some(i) = row_lines.iter().position(|line| !is_skippable(line)) {
            messages.push(
                Message::error(
                    codes::DATA_EXTERNAL_INLINE_ROWS,
                    "External data tables must not include inline JSONL rows",
                )
                .at_line(row_line(i))
                .in_block(&block.lang)
                .for_node(name),
            );
        }
        if let (Some(format), Some(hash)) = (format, hash) {
            table.source = Some(TableSource { uri, format, hash });
        }
        return (Some(table), messages);
    }

    if header.format.is_some() {
        messages.push(
            at_header(Message::warning(
                codes::DATA_UNUSED_FORMAT,
                "Ignoring data header key 'format' without 'source'",
            ))
            .for_node(name),
        );
    }
    if header.hash.is_some() {
        messages.push(
            at_header(Message::warning(
                codes::DATA_UNUSED_HASH,
                "Ignoring data header key 'hash' without 'source'",
            ))
            .for_node(name),
        );
    }

    let mut coercer = RowCoercer::new(name, &table.primary_key, &table.columns, None);
    for (i, raw) in row_lines.iter().enumerate() {
        if is_skippable(raw) {
            continue;
        }
        let line = row_line(i);
        match serde_json::from_str::<serde_json::Value>(raw.trim()) {
            Ok(parsed) => coercer.push(line, parsed),
            Err(err) => coercer.report(line, codes::DATA_ROW_INVALID_JSON, err.to_string()),
        }
    }
    let RowCoercer {
        rows,
        row_map,
        messages: row_messages,
        ..
    } = coercer;
    messages.extend(row_messages);
    table.rows = rows;
    table.row_map = Some(row_map);
    (Some(table), messages)
}
