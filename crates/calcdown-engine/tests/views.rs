use calcdown_engine::{codes, parse_program, validate_views};
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn views_validate_against_document_blocks() {
    let source = "# Report\n\n```view\n[\n  {\"id\": \"kpis\", \"type\": \"cards\", \"library\": \"calcdown\", \"spec\": {\"items\": [{\"key\": \"total\"}]}},\n  {\"id\": \"lines\", \"type\": \"table\", \"source\": \"items\", \"spec\": {}}\n]\n```\n\n```view\nid: trend\ntype: chart\nsource: items\nspec:\n  kind: line\n  x: { key: month }\n```\n";
    let (program, messages) = parse_program(source);
    assert!(messages.is_empty(), "{messages:?}");

    let (views, messages) = validate_views(&program.blocks);
    assert!(messages.is_empty(), "{messages:?}");
    let ids: Vec<_> = views.iter().map(|v| v.id.as_str()).collect();
    assert_eq!(ids, vec!["kpis", "lines", "trend"]);
    assert_eq!(views[2].spec, json!({"kind": "line", "x": {"key": "month"}}));
    assert_eq!(
        serde_json::to_value(&views[1]).unwrap(),
        json!({"id": "lines", "type": "table", "library": "calcdown", "source": "items", "spec": {}, "line": 4})
    );
}

#[test]
fn view_keys_are_sandboxed() {
    let source = "```view\n{\"id\": \"x\", \"type\": \"cards\", \"spec\": {\"constructor\": {}}}\n```\n";
    let (program, _) = parse_program(source);
    let (views, messages) = validate_views(&program.blocks);
    assert!(views.is_empty());
    assert_eq!(messages[0].code, codes::VIEW_DISALLOWED_KEY);
}
