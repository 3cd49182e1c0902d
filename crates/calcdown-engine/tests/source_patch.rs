use calcdown_engine::{apply_patch, parse_program, PatchError, PatchOp, SourceMap};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::json;

/// Builds the document with the terminator `ending(i)` after line `i`.
fn document_with(rows: usize, ending: impl Fn(usize) -> &'static str) -> String {
    let mut lines = vec![
        "---".to_string(),
        "title: Orders".to_string(),
        "---".to_string(),
        String::new(),
        "Prose stays untouched.".to_string(),
        String::new(),
        "```inputs".to_string(),
        "discount: percent = 10  # seasonal".to_string(),
        "start: date = 2024-01-31".to_string(),
        "```".to_string(),
        String::new(),
        "```data".to_string(),
        "name: orders".to_string(),
        "primaryKey: sku".to_string(),
        "columns:".to_string(),
        "  sku: string".to_string(),
        "  qty: integer".to_string(),
        "  paid: boolean".to_string(),
        "---".to_string(),
    ];
    for i in 0..rows {
        lines.push(format!("{{\"sku\": \"s{i}\", \"qty\": {i}, \"paid\": false}}"));
    }
    lines.push("```".to_string());
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| format!("{line}{}", ending(i)))
        .collect()
}

fn document(rows: usize, newline: &'static str) -> String {
    document_with(rows, |_| newline)
}

/// Indexes of lines whose bytes differ, terminators included.
fn changed_lines(before: &str, after: &str) -> Vec<usize> {
    let before: Vec<_> = before.split('\n').collect();
    let after: Vec<_> = after.split('\n').collect();
    assert_eq!(before.len(), after.len());
    (0..before.len()).filter(|&i| before[i] != after[i]).collect()
}

fn patch(source: &str, op: &PatchOp) -> Result<String, PatchError> {
    let (program, messages) = parse_program(source);
    assert!(messages.is_empty(), "{messages:?}");
    apply_patch(source, op, &SourceMap::build(&program))
}

proptest! {
    #[test]
    fn cell_edits_touch_only_their_row(
        rows in 1usize..20,
        pick in any::<prop::sample::Index>(),
        qty in -10_000i64..10_000,
        crlf in prop::collection::vec(any::<bool>(), 1..8),
    ) {
        let source = document_with(rows, |i| if crlf[i % crlf.len()] { "\r\n" } else { "\n" });
        let row = pick.index(rows);
        let op = PatchOp::UpdateTableCell {
            table_name: "orders".into(),
            primary_key: json!(format!("s{row}")),
            column: "qty".into(),
            value: json!(qty),
        };
        let out = patch(&source, &op).unwrap();
        // Header (19 lines) precedes the rows.
        prop_assert_eq!(changed_lines(&source, &out), vec![19 + row]);
        let row_line = out.split('\n').nth(19 + row).unwrap();
        prop_assert_eq!(
            row_line.trim_end_matches('\r').to_string(),
            format!("{{\"sku\":\"s{row}\",\"qty\":{qty},\"paid\":false}}")
        );

        let (program, messages) = parse_program(&out);
        prop_assert!(messages.is_empty());
        prop_assert_eq!(program.tables[0].rows.len(), rows);
    }

    #[test]
    fn input_edits_touch_only_their_line(value in 0.0f64..1000.0) {
        let source = document(3, "\n");
        let op = PatchOp::UpdateInput { name: "discount".into(), value: json!(value) };
        let out = patch(&source, &op).unwrap();
        let changed = changed_lines(&source, &out);
        prop_assert!(changed.is_empty() || changed == vec![7]);
        let (program, _) = parse_program(&out);
        prop_assert_eq!(program.input("discount").map(|d| d.default_value.clone()), Some(calcdown_engine::Value::Number(value)));
    }
}

#[test]
fn date_and_boolean_edits() {
    let source = document(2, "\n");
    let out = patch(
        &source,
        &PatchOp::UpdateInput {
            name: "start".into(),
            value: json!("2024-02-29"),
        },
    )
    .unwrap();
    assert_eq!(changed_lines(&source, &out), vec![8]);
    assert!(out.contains("\nstart: date = 2024-02-29\n"));

    let out = patch(
        &out,
        &PatchOp::UpdateTableCell {
            table_name: "orders".into(),
            primary_key: json!("s1"),
            column: "paid".into(),
            value: json!("1"),
        },
    )
    .unwrap();
    assert!(out.contains("\n{\"sku\":\"s1\",\"qty\":1,\"paid\":true}\n"));
}

#[test]
fn failures_leave_source_alone() {
    let source = document(2, "\n");
    let err = patch(
        &source,
        &PatchOp::UpdateTableCell {
            table_name: "orders".into(),
            primary_key: json!("s0"),
            column: "qty".into(),
            value: json!("lots"),
        },
    )
    .unwrap_err();
    assert_eq!(err, PatchError::InvalidValue("Expected integer value".into()));

    let err = patch(
        &source,
        &PatchOp::UpdateTableCell {
            table_name: "missing".into(),
            primary_key: json!("s0"),
            column: "qty".into(),
            value: json!(1),
        },
    )
    .unwrap_err();
    assert_eq!(err.to_string(), "Table not found: missing");
}

#[test]
fn external_tables_are_read_only() {
    let digest = "a".repeat(64);
    let source = format!(
        "```data\nname: remote\nprimaryKey: id\nsource: rows.csv\nhash: sha256:{digest}\ncolumns:\n  id: string\n---\n```\n"
    );
    let err = patch(
        &source,
        &PatchOp::UpdateTableCell {
            table_name: "remote".into(),
            primary_key: json!("x"),
            column: "id".into(),
            value: json!("y"),
        },
    )
    .unwrap_err();
    assert_eq!(err, PatchError::ExternalTable("remote".into()));
}

#[test]
fn mixed_line_endings_survive_input_edits() {
    let source = "```inputs\r\nrate: number = 1\n```\nplain line\n";
    let out = patch(
        source,
        &PatchOp::UpdateInput {
            name: "rate".into(),
            value: json!(2),
        },
    )
    .unwrap();
    assert_eq!(out, "```inputs\r\nrate: number = 2\n```\nplain line\n");

    let source = document_with(2, |i| if i % 3 == 0 { "\r\n" } else { "\n" });
    let out = patch(
        &source,
        &PatchOp::UpdateInput {
            name: "discount".into(),
            value: json!(0.25),
        },
    )
    .unwrap();
    assert_eq!(changed_lines(&source, &out), vec![7]);
    assert_eq!(out.matches("\r\n").count(), source.matches("\r\n").count());
}
