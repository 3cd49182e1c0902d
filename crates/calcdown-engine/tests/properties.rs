use calcdown_engine::{codes, evaluate_program, parse_program, EvalContext, Evaluation, Value};
use indexmap::IndexMap;
use proptest::prelude::*;

fn evaluate(source: &str) -> Evaluation {
    let (program, messages) = parse_program(source);
    assert!(messages.is_empty(), "{messages:?}");
    evaluate_program(&program, &IndexMap::new(), &EvalContext::default())
}

fn table(name: &str, values: &[(i32, i32)]) -> String {
    let rows: String = values
        .iter()
        .enumerate()
        .map(|(i, (a, b))| format!("{{\"id\":\"r{i}\",\"a\":{a},\"b\":{b}}}\n"))
        .collect();
    format!("```data\nname: {name}\nprimaryKey: id\ncolumns:\n  id: string\n  a: number\n  b: number\n---\n{rows}```\n\n")
}

/// A chain `n0 = k0; n1 = n0 + k1; ...` plus a total over every node.
fn chain_decls(steps: &[i32]) -> Vec<String> {
    let mut decls: Vec<String> = steps
        .iter()
        .enumerate()
        .map(|(i, k)| match i {
            0 => format!("const n0 = {k};"),
            _ => format!("const n{i} = n{} + {k};", i - 1),
        })
        .collect();
    let names: Vec<_> = (0..steps.len()).map(|i| format!("n{i}")).collect();
    decls.push(format!("const total = {};", names.join(" + ")));
    decls
}

fn chain_values(decls: &[String]) -> IndexMap<String, Value> {
    let source = format!("```calc\n{}\n```\n", decls.join("\n"));
    let eval = evaluate(&source);
    assert!(eval.messages.is_empty(), "{:?}", eval.messages);
    eval.values
}

proptest! {
    #[test]
    fn declaration_order_does_not_change_results(
        (decls, shuffled) in prop::collection::vec(-50i32..50, 1..8)
            .prop_map(|steps| chain_decls(&steps))
            .prop_flat_map(|decls| (Just(decls.clone()), Just(decls).prop_shuffle()))
    ) {
        let expected = chain_values(&decls);
        let actual = chain_values(&shuffled);
        prop_assert_eq!(expected.len(), actual.len());
        for (name, value) in &expected {
            prop_assert_eq!(Some(value), actual.get(name));
        }
    }

    #[test]
    fn equal_length_columns_combine_elementwise(
        rows in prop::collection::vec((-1000i32..1000, -1000i32..1000), 1..12),
        k in -20i32..20,
    ) {
        let source = format!(
            "{}```calc\nconst s = items.a + items.b;\nconst scaled = items.a * {k};\n```\n",
            table("items", &rows)
        );
        let eval = evaluate(&source);
        prop_assert!(eval.messages.is_empty(), "{:?}", eval.messages);

        let expected_sum: Vec<Value> = rows.iter().map(|(a, b)| Value::Number(f64::from(a + b))).collect();
        let expected_scaled: Vec<Value> = rows.iter().map(|(a, _)| Value::Number(f64::from(a * k))).collect();
        prop_assert_eq!(eval.values["s"].as_array(), Some(expected_sum.as_slice()));
        prop_assert_eq!(eval.values["scaled"].as_array(), Some(expected_scaled.as_slice()));
    }

    #[test]
    fn mismatched_lengths_always_fail(
        left in prop::collection::vec((0i32..10, 0i32..10), 1..6),
        right in prop::collection::vec((0i32..10, 0i32..10), 1..6),
    ) {
        prop_assume!(left.len() != right.len());
        let source = format!(
            "{}{}```calc\nconst z = xs.a - ys.b;\n```\n",
            table("xs", &left),
            table("ys", &right)
        );
        let eval = evaluate(&source);
        prop_assert!(!eval.values.contains_key("z"));
        prop_assert_eq!(eval.messages.len(), 1);
        prop_assert_eq!(eval.messages[0].node_name.as_deref(), Some("z"));
    }

    #[test]
    fn cycles_report_once_and_publish_nothing(len in 2usize..6) {
        let decls: Vec<String> = (0..len)
            .map(|i| format!("const c{i} = c{} + 1;", (i + 1) % len))
            .collect();
        let source = format!("```calc\n{}\nconst free = 1;\n```\n", decls.join("\n"));
        let eval = evaluate(&source);
        let cycles = eval.messages.iter().filter(|m| m.code == codes::CALC_CYCLE).count();
        prop_assert_eq!(cycles, 1);
        prop_assert_eq!(eval.messages.len(), 1);
        for i in 0..len {
            let name = format!("c{i}");
            prop_assert!(!eval.values.contains_key(&name));
        }
        prop_assert_eq!(eval.values.get("free"), Some(&Value::Number(1.0)));
    }
}
