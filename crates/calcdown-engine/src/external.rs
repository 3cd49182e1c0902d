//! Ingestion of externally hosted tables.
//!
//! Fetching is the host's job. The loader receives the fetched text for each `source:` table,
//! checks it against the pinned digest, decodes CSV or JSON and runs the rows through the same
//! primary-key and coercion pipeline as inline rows. The result plugs straight into
//! [`evaluate_program`](crate::evaluate_program) as table overrides.

use calcdown_model::delimited::parse_csv;
use calcdown_model::{codes, ColumnType, Message, SourceFormat, TableSource, TypeName};
use indexmap::IndexMap;
use sha2::{Digest, Sha256};

use crate::document::{Program, RowCoercer, Table};
use crate::value::{json_number, parse_number, Value};

/// The host's answer for one external table.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedSource {
    pub table_name: String,
    /// Resolved location, reported as the `file` of row messages.
    pub location: String,
    /// Fetched text, or the host's description of why it could not be read.
    pub contents: Result<String, String>,
    /// Hex SHA-256 of the raw bytes, if the host computed one.
    pub digest: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ExternalTables {
    /// Table name to row array, ready to pass as evaluation overrides.
    pub overrides: IndexMap<String, Value>,
    pub messages: Vec<Message>,
    /// `false` when any error was reported.
    pub ok: bool,
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn csv_cell(ty: Option<&ColumnType>, text: &str) -> serde_json::Value {
    let as_text = || serde_json::Value::String(text.to_string());
    let Some(ty) = ty else {
        return as_text();
    };
    match &ty.name {
        TypeName::Boolean => match text.trim() {
            "true" | "1" => serde_json::Value::Bool(true),
            "false" | "0" => serde_json::Value::Bool(false),
            _ => as_text(),
        },
        TypeName::Integer => parse_number(text)
            .map(|n| json_number(n.trunc()))
            .unwrap_or_else(as_text),
        name if name.is_numeric() => parse_number(text).map(json_number).unwrap_or_else(as_text),
        _ => as_text(),
    }
}

fn csv_rows(table: &Table, text: &str, file: &str) -> Result<Vec<(usize, serde_json::Value)>, Message> {
    let error = |code: &str, message: String| {
        Message::error(code, message)
            .in_file(Some(file))
            .at_line(1)
            .in_block("data")
            .for_node(&table.name)
    };
    let csv = parse_csv(text).map_err(|err| error(codes::DATA_SOURCE_READ, err.to_string()))?;
    if let Some(missing) = table
        .columns
        .keys()
        .find(|column| !csv.header.iter().any(|h| h == *column))
    {
        return Err(error(
            codes::DATA_CSV_MISSING_COLUMN,
            format!("CSV is missing column: {missing}"),
        ));
    }
    let rows = csv
        .keyed_records()
        .map(|(line, cells)| {
            let object = cells
                .into_iter()
                .filter(|(_, cell)| !cell.is_empty())
                .map(|(column, cell)| (column.to_string(), csv_cell(table.columns.get(column), cell)))
                .collect();
            (line, serde_json::Value::Object(object))
        })
        .collect();
    Ok(rows)
}

fn json_rows(table: &Table, text: &str, file: &str) -> Result<Vec<(usize, serde_json::Value)>, Message> {
    let error = |code: &str, message: String| {
        Message::error(code, message)
            .in_file(Some(file))
            .at_line(1)
            .in_block("data")
            .for_node(&table.name)
    };
    let parsed: serde_json::Value = serde_json::from_str(text)
        .map_err(|err| error(codes::DATA_JSON_PARSE, format!("Failed to parse JSON: {err}")))?;
    let serde_json::Value::Array(items) = parsed else {
        return Err(error(
            codes::DATA_JSON_NOT_ARRAY,
            "JSON source must be an array of objects".to_string(),
        ));
    };
    Ok(items.into_iter().enumerate().map(|(i, row)| (1 + i, row)).collect())
}

fn load_one(table: &Table, source: &TableSource, fetched: Option<&FetchedSource>) -> Result<(Value, Vec<Message>), Message> {
    let read_error = |file: Option<&str>, message: String| {
        Message::error(codes::DATA_SOURCE_READ, message)
            .in_file(file)
            .at_line(table.line)
            .in_block("data")
            .for_node(&table.name)
    };
    let Some(fetched) = fetched else {
        return Err(read_error(
            None,
            format!("Failed to load data source: {} (not provided)", source.uri),
        ));
    };
    let file = fetched.location.as_str();
    let text = fetched.contents.as_deref().map_err(|err| {
        read_error(Some(file), format!("Failed to load data source: {} ({err})", source.uri))
    })?;

    let digest = match &fetched.digest {
        Some(digest) => digest.clone(),
        None => sha256_hex(text.as_bytes()),
    };
    if !source.digest_matches(&digest) {
        return Err(Message::error(
            codes::DATA_HASH_MISMATCH,
            format!(
                "Hash mismatch for {} (expected {}, got sha256:{})",
                source.uri,
                source.hash,
                digest.to_ascii_lowercase()
            ),
        )
        .in_file(Some(file))
        .at_line(table.line)
        .in_block("data")
        .for_node(&table.name));
    }

    let raw_rows = match source.format {
        SourceFormat::Csv => csv_rows(table, text, file)?,
        SourceFormat::Json => json_rows(table, text, file)?,
    };
    let mut coercer = RowCoercer::new(&table.name, &table.primary_key, &table.columns, Some(file));
    for (line, raw) in raw_rows {
        coercer.push(line, raw);
    }
    let rows = coercer.rows.into_iter().map(Value::object).collect();
    Ok((Value::array(rows), coercer.messages))
}

/// Turns fetched external sources into table overrides.
///
/// Tables without a usable `source` are ignored. A table whose source cannot be read, fails its
/// digest check or cannot be decoded gets no override and a single error.
pub fn load_external_tables(program: &Program, fetched: &[FetchedSource]) -> ExternalTables {
    let mut result = ExternalTables::default();
    for table in &program.tables {
        let Some(source) = &table.source else {
            continue;
        };
        let entry = fetched.iter().find(|f| f.table_name == table.name);
        match load_one(table, source, entry) {
            Ok((rows, messages)) => {
                log::debug!("loaded external table {} from {}", table.name, source.uri);
                result.overrides.insert(table.name.clone(), rows);
                result.messages.extend(messages);
            }
            Err(message) => result.messages.push(message),
        }
    }
    result.ok = !result.messages.iter().any(Message::is_error);
    result
}
