use calcdown_engine::{codes, evaluate_program, parse_program, EvalContext, Evaluation, Message, Value};
use indexmap::IndexMap;
use pretty_assertions::assert_eq;

fn evaluate(source: &str, overrides: &[(&str, Value)]) -> (Vec<Message>, Evaluation) {
    let (program, parse_messages) = parse_program(source);
    let overrides: IndexMap<String, Value> = overrides
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect();
    let evaluation = evaluate_program(&program, &overrides, &EvalContext::default());
    (parse_messages, evaluation)
}

fn codes_of(messages: &[Message]) -> Vec<&str> {
    messages.iter().map(|m| m.code.as_str()).collect()
}

#[test]
fn constant_arithmetic() {
    let (parse, eval) = evaluate("```calc\nconst a = 1 + 2;\n```\n", &[]);
    assert!(parse.is_empty());
    assert!(eval.messages.is_empty());
    assert_eq!(eval.values["a"], Value::Number(3.0));
}

#[test]
fn mutual_dependency_is_one_cycle() {
    let (parse, eval) = evaluate("```calc\nconst a = b + 1;\nconst b = a + 1;\n```\n", &[]);
    assert!(parse.is_empty());
    assert_eq!(codes_of(&eval.messages), vec![codes::CALC_CYCLE]);
    assert!(!eval.values.contains_key("a"));
    assert!(!eval.values.contains_key("b"));
}

#[test]
fn duplicate_primary_key_keeps_first_row() {
    let source = "```data\nname: t\nprimaryKey: id\ncolumns:\n  id: string\n  v: number\n---\n{\"id\":\"x\",\"v\":1}\n{\"id\":\"x\",\"v\":2}\n```\n";
    let (parse, eval) = evaluate(source, &[]);
    assert_eq!(codes_of(&parse), vec![codes::DATA_PK_DUPLICATE]);
    assert_eq!(parse[0].line, Some(9));
    assert_eq!(eval.values["t"].to_json(), serde_json::json!([{"id": "x", "v": 1}]));
}

#[test]
fn division_by_zero_poisons_dependents() {
    let (_, eval) = evaluate("```calc\nconst x = 1 / 0;\nconst y = x + 1;\n```\n", &[]);
    let got: Vec<_> = eval
        .messages
        .iter()
        .map(|m| (m.code.as_str(), m.node_name.as_deref()))
        .collect();
    assert_eq!(
        got,
        vec![
            (codes::CALC_DIV_ZERO, Some("x")),
            (codes::CALC_UPSTREAM_ERROR, Some("y")),
        ]
    );
    assert!(!eval.values.contains_key("x"));
    assert!(!eval.values.contains_key("y"));
}

#[test]
fn table_patch_reads_inputs() {
    let source = "```inputs\nprice: number = 10\n```\n\n```data\nname: prices\nprimaryKey: id\ncolumns:\n  id: string\n  price: number\n---\n{\"id\":\"k1\",\"price\":10}\n```\n\n```calc\nprices[\"k1\"].price = price * 1.1;\n```\n";
    let (parse, eval) = evaluate(source, &[]);
    assert!(parse.is_empty(), "{parse:?}");
    assert!(eval.messages.is_empty(), "{:?}", eval.messages);
    let rows = eval.values["prices"].as_array().unwrap();
    let patched = rows[0].as_object().unwrap()["price"].as_number().unwrap();
    assert!((patched - 11.0).abs() < 1e-9);
}

#[test]
fn invalid_integer_override_keeps_default() {
    let source = "```inputs\ncount: integer = 3\n```\n\n```calc\nconst doubled = count * 2;\n```\n";
    let (_, eval) = evaluate(source, &[("count", Value::string("many"))]);
    assert_eq!(codes_of(&eval.messages), vec![codes::OVERRIDE_INVALID]);
    assert_eq!(eval.values["count"], Value::Number(3.0));
    assert_eq!(eval.values["doubled"], Value::Number(6.0));
}

#[test]
fn values_are_ordered_inputs_tables_nodes() {
    let source = "```calc\nconst total = std.math.sum(items.qty) * rate;\n```\n\n```inputs\nrate: number = 2\n```\n\n```data\nname: items\nprimaryKey: id\ncolumns:\n  id: string\n  qty: integer\n---\n{\"id\":\"a\",\"qty\":1}\n{\"id\":\"b\",\"qty\":4}\n```\n";
    let (parse, eval) = evaluate(source, &[]);
    assert!(parse.is_empty(), "{parse:?}");
    let names: Vec<_> = eval.values.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["rate", "items", "total"]);
    assert_eq!(eval.values["total"], Value::Number(10.0));
    assert_eq!(
        eval.values_json(),
        serde_json::json!({
            "rate": 2,
            "items": [{"id": "a", "qty": 1}, {"id": "b", "qty": 4}],
            "total": 10
        })
    );
}

#[test]
fn tall_expressions_are_parse_errors() {
    let tall = vec!["1"; 10_000].join(" + ");
    let short = vec!["1"; 200].join(" + ");
    let source = format!("```calc\nconst tall = {tall};\nconst short = {short};\n```\n");
    let (parse, eval) = evaluate(&source, &[]);
    assert_eq!(codes_of(&parse), vec![codes::CALC_PARSE_EXPR]);
    assert_eq!(parse[0].message, "Expression is nested too deeply");
    assert_eq!(parse[0].node_name.as_deref(), Some("tall"));
    assert!(!eval.values.contains_key("tall"));
    assert_eq!(eval.values["short"], Value::Number(200.0));
}
