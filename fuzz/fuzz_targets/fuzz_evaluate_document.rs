#![no_main]

use chrono::TimeZone;
use calcdown_engine::{
    apply_patch, evaluate_program, parse_program, validate_views, EvalContext, PatchOp, SourceMap,
};
use indexmap::IndexMap;
use libfuzzer_sys::fuzz_target;

const MAX_INPUT_BYTES: usize = 16 * 1024;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }
    let data = &data[..data.len().min(MAX_INPUT_BYTES)];
    let selector = data[0];
    let source = String::from_utf8_lossy(&data[1..]);

    let (program, _messages) = parse_program(&source);
    let _ = validate_views(&program.blocks);

    let context = EvalContext {
        current_date_time: chrono::Utc.timestamp_opt(0, 0).single(),
        apply_sort_by: selector & 1 == 0,
    };
    let evaluation = evaluate_program(&program, &IndexMap::new(), &context);
    std::hint::black_box(evaluation.values_json());

    // Edits that fail must leave nothing behind; edits that succeed must keep the line count.
    let map = SourceMap::build(&program);
    let edits = program
        .inputs
        .iter()
        .map(|input| PatchOp::UpdateInput {
            name: input.name.clone(),
            value: serde_json::Value::from(i64::from(selector)),
        })
        .chain(program.tables.iter().flat_map(|table| {
            let column = table.columns.keys().last().cloned().unwrap_or_default();
            table.row_map.iter().flatten().map(move |row| PatchOp::UpdateTableCell {
                table_name: table.name.clone(),
                primary_key: serde_json::Value::from(row.primary_key.clone()),
                column: column.clone(),
                value: serde_json::Value::from(i64::from(selector)),
            })
        }));
    for op in edits.take(32) {
        if let Ok(next) = apply_patch(&source, &op, &map) {
            assert_eq!(next.split('\n').count(), source.split('\n').count());
        }
    }
});
