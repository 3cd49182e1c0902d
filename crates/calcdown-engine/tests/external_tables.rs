use calcdown_engine::{
    codes, evaluate_program, load_external_tables, parse_program, sha256_hex, EvalContext,
    FetchedSource, Value,
};
use pretty_assertions::assert_eq;

const ROWS: &str = r#"[{"code": "EU", "rate": 0.2}, {"code": "US", "rate": 0.07}]"#;

fn document(digest: &str) -> String {
    format!(
        "```data\nname: taxes\nprimaryKey: code\nsortBy: rate\nsource: ./taxes.json\nhash: sha256:{digest}\ncolumns:\n  code: string\n  rate: percent\n---\n```\n\n```calc\nconst top = std.math.maxOf(taxes.rate);\nconst first = std.table.col(taxes, \"code\");\n```\n"
    )
}

#[test]
fn fetched_rows_feed_evaluation() {
    let source = document(&sha256_hex(ROWS.as_bytes()).to_uppercase());
    let (program, messages) = parse_program(&source);
    assert!(messages.is_empty(), "{messages:?}");
    assert!(program.table("taxes").is_some_and(|t| t.rows.is_empty()));

    let loaded = load_external_tables(
        &program,
        &[FetchedSource {
            table_name: "taxes".into(),
            location: "docs/taxes.json".into(),
            contents: Ok(ROWS.to_string()),
            digest: None,
        }],
    );
    assert!(loaded.ok, "{:?}", loaded.messages);

    let eval = evaluate_program(&program, &loaded.overrides, &EvalContext::default());
    assert!(eval.messages.is_empty(), "{:?}", eval.messages);
    assert_eq!(eval.values["top"], Value::Number(0.2));
    assert_eq!(
        eval.values["first"].to_json(),
        serde_json::json!(["US", "EU"])
    );
}

#[test]
fn host_read_failures_are_reported_per_table() {
    let source = document(&sha256_hex(ROWS.as_bytes()));
    let (program, _) = parse_program(&source);
    let loaded = load_external_tables(
        &program,
        &[FetchedSource {
            table_name: "taxes".into(),
            location: "docs/taxes.json".into(),
            contents: Err("404 Not Found".into()),
            digest: None,
        }],
    );
    assert!(!loaded.ok);
    assert!(loaded.overrides.is_empty());
    assert_eq!(loaded.messages.len(), 1);
    assert_eq!(loaded.messages[0].code, codes::DATA_SOURCE_READ);
    assert_eq!(
        loaded.messages[0].message,
        "Failed to load data source: ./taxes.json (404 Not Found)"
    );
    assert_eq!(loaded.messages[0].file.as_deref(), Some("docs/taxes.json"));
}

#[test]
fn collaborator_digest_wins_over_local_hash() {
    let source = document(&sha256_hex(ROWS.as_bytes()));
    let (program, _) = parse_program(&source);
    let loaded = load_external_tables(
        &program,
        &[FetchedSource {
            table_name: "taxes".into(),
            location: "docs/taxes.json".into(),
            contents: Ok(ROWS.to_string()),
            digest: Some("0".repeat(64)),
        }],
    );
    assert_eq!(loaded.messages[0].code, codes::DATA_HASH_MISMATCH);
}
