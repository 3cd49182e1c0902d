//! Envelope checks for `view` blocks.
//!
//! A view block holds one view object or an array of them, written as JSON or YAML. Only the
//! envelope is validated here (identity, library, type and the presence of `source`/`spec`);
//! the per-type spec schema belongs to whichever renderer draws the view.

use std::collections::HashSet;

use calcdown_model::{codes, is_banned_key, Message};
use serde::Serialize;
use serde_json::{Map, Value as Json};

use super::markdown::CodeBlock;

pub const MAX_VIEW_DEPTH: usize = 64;
pub const MAX_VIEW_NODES: usize = 5000;

const DEFAULT_LIBRARY: &str = "calcdown";
const VIEW_TYPES: [&str; 4] = ["cards", "table", "chart", "layout"];

/// A view that passed envelope validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewDef {
    pub id: String,
    #[serde(rename = "type")]
    pub view_type: String,
    pub library: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub spec: Json,
    pub line: usize,
}

type SanitizeError = (&'static str, String);

fn count_node(nodes: &mut usize) -> Result<(), SanitizeError> {
    *nodes += 1;
    if *nodes > MAX_VIEW_NODES {
        return Err((
            codes::VIEW_LIMIT,
            format!("View is too large (max nodes {MAX_VIEW_NODES})"),
        ));
    }
    Ok(())
}

fn sanitize(value: &Json, depth: usize, nodes: &mut usize) -> Result<(), SanitizeError> {
    if depth > MAX_VIEW_DEPTH {
        return Err((
            codes::VIEW_LIMIT,
            format!("View is too deeply nested (max depth {MAX_VIEW_DEPTH})"),
        ));
    }
    match value {
        Json::Array(items) => {
            count_node(nodes)?;
            for item in items {
                sanitize(item, depth + 1, nodes)?;
            }
        }
        Json::Object(map) => {
            count_node(nodes)?;
            for (key, item) in map {
                if is_banned_key(key) {
                    return Err((codes::VIEW_DISALLOWED_KEY, format!("Disallowed key: {key}")));
                }
                sanitize(item, depth + 1, nodes)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn parse_view_text(text: &str, base_line: usize) -> Result<Json, Message> {
    let json_err = match serde_json::from_str::<Json>(text) {
        Ok(value) => return Ok(value),
        Err(err) => err,
    };
    serde_yaml::from_str::<Json>(text).map_err(|yaml_err| {
        let line = yaml_err
            .location()
            .map_or(base_line, |loc| base_line + loc.line().saturating_sub(1));
        Message::error(
            codes::VIEW_PARSE,
            format!(
                "View blocks must be JSON or YAML. JSON error: {json_err}. YAML error: {yaml_err}."
            ),
        )
        .at_line(line)
    })
}

/// Parses one `view` block into raw view objects.
pub fn parse_view_block(block: &CodeBlock) -> (Vec<Map<String, Json>>, Vec<Message>) {
    let base_line = block.fence_line + 1;
    let in_block = |message: Message| message.in_block(&block.lang);
    let text = block.content.trim();
    if text.is_empty() {
        let message = Message::error(codes::VIEW_EMPTY_BLOCK, "Empty view block").at_line(base_line);
        return (Vec::new(), vec![in_block(message)]);
    }
    let raw = match parse_view_text(text, base_line) {
        Ok(raw) => raw,
        Err(message) => return (Vec::new(), vec![in_block(message)]),
    };
    if let Err((code, message)) = sanitize(&raw, 0, &mut 0) {
        let message = Message::error(code, message).at_line(base_line);
        return (Vec::new(), vec![in_block(message)]);
    }

    match raw {
        Json::Array(items) => {
            let mut views = Vec::new();
            let mut messages = Vec::new();
            for item in items {
                match item {
                    Json::Object(map) => views.push(map),
                    _ => messages.push(in_block(
                        Message::error(
                            codes::VIEW_ITEMS_OBJECT,
                            "View JSON array items must be objects",
                        )
                        .at_line(base_line),
                    )),
                }
            }
            (views, messages)
        }
        Json::Object(map) => (vec![map], Vec::new()),
        _ => (
            Vec::new(),
            vec![in_block(
                Message::error(
                    codes::VIEW_EXPECT_OBJECT_OR_ARRAY,
                    "View JSON must be an object or an array of objects",
                )
                .at_line(base_line),
            )],
        ),
    }
}

fn string_field<'a>(view: &'a Map<String, Json>, key: &str) -> Option<&'a str> {
    view.get(key).and_then(Json::as_str)
}

fn check_envelope(
    view: &Map<String, Json>,
    view_type: &str,
    line: usize,
) -> Result<ViewDef, Message> {
    let missing = |code: &str, what: &str| {
        Message::error(code, format!("{view_type} view is missing {what}")).at_line(line)
    };
    let id = string_field(view, "id")
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| missing(codes::VIEW_SCHEMA_MISSING_ID, "required field: id"))?;
    let source = if matches!(view_type, "table" | "chart") {
        let source = string_field(view, "source")
            .map(str::trim)
            .filter(|source| !source.is_empty())
            .ok_or_else(|| missing(codes::VIEW_SCHEMA_MISSING_SOURCE, "required field: source"))?;
        Some(source.to_string())
    } else {
        None
    };
    let spec = view
        .get("spec")
        .filter(|spec| spec.is_object())
        .ok_or_else(|| missing(codes::VIEW_SCHEMA_MISSING_SPEC, "required object: spec"))?;
    Ok(ViewDef {
        id: id.to_string(),
        view_type: view_type.to_string(),
        library: DEFAULT_LIBRARY.to_string(),
        source,
        spec: spec.clone(),
        line,
    })
}

/// Validates the envelope of every view across all `view` blocks.
pub fn validate_views(blocks: &[CodeBlock]) -> (Vec<ViewDef>, Vec<Message>) {
    let mut views = Vec::new();
    let mut messages = Vec::new();
    let mut seen_ids = HashSet::new();

    for block in blocks.iter().filter(|block| block.lang == "view") {
        let (raw_views, block_messages) = parse_view_block(block);
        messages.extend(block_messages);
        let line = block.fence_line + 1;

        for raw in raw_views {
            let id = string_field(&raw, "id")
                .map(str::trim)
                .filter(|id| !id.is_empty());
            if let Some(id) = id {
                if !seen_ids.insert(id.to_string()) {
                    messages.push(
                        Message::error(codes::VIEW_DUPLICATE_ID, format!("Duplicate view id: {id}"))
                            .at_line(line),
                    );
                    continue;
                }
            }
            let library = string_field(&raw, "library")
                .filter(|library| !library.is_empty())
                .unwrap_or(DEFAULT_LIBRARY);
            if library != DEFAULT_LIBRARY {
                let mut warning = Message::warning(
                    codes::VIEW_UNSUPPORTED_LIBRARY,
                    format!("Skipping validation for non-calcdown view library: {library}"),
                )
                .at_line(line);
                if let Some(id) = id {
                    warning = warning.for_node(id);
                }
                messages.push(warning);
                continue;
            }
            let view_type = string_field(&raw, "type").map(str::trim);
            let Some(view_type) = view_type.filter(|t| VIEW_TYPES.contains(t)) else {
                messages.push(
                    Message::error(
                        codes::VIEW_UNKNOWN_TYPE,
                        format!(
                            "Unknown calcdown view type: {}",
                            view_type.unwrap_or("(missing)")
                        ),
                    )
                    .at_line(line),
                );
                continue;
            };
            match check_envelope(&raw, view_type, line) {
                Ok(view) => views.push(view),
                Err(message) => messages.push(message),
            }
        }
    }
    (views, messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn view_block(content: &str) -> CodeBlock {
        CodeBlock {
            lang: "view".into(),
            info: "view".into(),
            content: content.into(),
            fence_line: 20,
            close_fence_line: None,
        }
    }

    fn codes_of(messages: &[Message]) -> Vec<&str> {
        messages.iter().map(|m| m.code.as_str()).collect()
    }

    #[test]
    fn accepts_json_and_yaml_views() {
        let blocks = vec![
            view_block(r#"{"id": "summary", "type": "cards", "spec": {"items": [{"key": "total"}]}}"#),
            view_block("id: rows\ntype: table\nsource: items\nspec:\n  editable: true\n"),
        ];
        let (views, messages) = validate_views(&blocks);
        assert!(messages.is_empty(), "{messages:?}");
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].view_type, "cards");
        assert_eq!(views[1].source.as_deref(), Some("items"));
        assert_eq!(views[1].spec, serde_json::json!({"editable": true}));
        assert_eq!(views[1].line, 21);
    }

    #[test]
    fn envelope_errors() {
        let blocks = vec![view_block(
            r#"[
              {"id": "a", "type": "chart", "spec": {}},
              {"id": "a", "type": "cards", "spec": {}},
              {"id": "b", "type": "pie", "spec": {}},
              {"id": "c", "library": "vega", "type": "whatever"},
              {"type": "layout", "spec": {}},
              {"id": "d", "type": "cards", "spec": []},
              7
            ]"#,
        )];
        let (views, messages) = validate_views(&blocks);
        assert!(views.is_empty());
        assert_eq!(
            codes_of(&messages),
            vec![
                codes::VIEW_ITEMS_OBJECT,
                codes::VIEW_SCHEMA_MISSING_SOURCE,
                codes::VIEW_DUPLICATE_ID,
                codes::VIEW_UNKNOWN_TYPE,
                codes::VIEW_UNSUPPORTED_LIBRARY,
                codes::VIEW_SCHEMA_MISSING_ID,
                codes::VIEW_SCHEMA_MISSING_SPEC,
            ]
        );
        assert_eq!(messages[1].message, "chart view is missing required field: source");
        assert_eq!(messages[3].message, "Unknown calcdown view type: pie");
        assert_eq!(messages[4].node_name.as_deref(), Some("c"));
        assert_eq!(messages[5].message, "layout view is missing required field: id");
    }

    #[test]
    fn rejects_banned_keys_and_limits() {
        let (_, messages) = parse_view_block(&view_block(r#"{"spec": {"__proto__": 1}}"#));
        assert_eq!(codes_of(&messages), vec![codes::VIEW_DISALLOWED_KEY]);
        assert_eq!(messages[0].message, "Disallowed key: __proto__");

        let wide = format!("[{}]", vec!["{}"; MAX_VIEW_NODES].join(","));
        let (_, messages) = parse_view_block(&view_block(&wide));
        assert_eq!(codes_of(&messages), vec![codes::VIEW_LIMIT]);
        assert_eq!(messages[0].message, "View is too large (max nodes 5000)");

        let deep = format!("{}1{}", "[".repeat(66), "]".repeat(66));
        let (_, messages) = parse_view_block(&view_block(&deep));
        assert_eq!(codes_of(&messages), vec![codes::VIEW_LIMIT]);
        assert_eq!(messages[0].message, "View is too deeply nested (max depth 64)");
    }

    #[test]
    fn empty_and_unparseable_blocks() {
        let (_, messages) = parse_view_block(&view_block("  \n"));
        assert_eq!(codes_of(&messages), vec![codes::VIEW_EMPTY_BLOCK]);
        assert_eq!(messages[0].block_lang.as_deref(), Some("view"));

        let (_, messages) = parse_view_block(&view_block("{ id: [unclosed"));
        assert_eq!(codes_of(&messages), vec![codes::VIEW_PARSE]);
        assert!(messages[0]
            .message
            .starts_with("View blocks must be JSON or YAML. JSON error: "));

        let (_, messages) = parse_view_block(&view_block("42"));
        assert_eq!(codes_of(&messages), vec![codes::VIEW_EXPECT_OBJECT_OR_ARRAY]);
    }
}
