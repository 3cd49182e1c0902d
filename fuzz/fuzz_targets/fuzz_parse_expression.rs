#![no_main]

use libfuzzer_sys::fuzz_target;

/// Keep the harness bounded; calc expressions are short in practice.
const MAX_EXPRESSION_CHARS: usize = 4_096;
const MAX_INPUT_BYTES: usize = MAX_EXPRESSION_CHARS * 4; // max UTF-8 bytes per char

fn truncate_to_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fuzz_target!(|data: &[u8]| {
    let data = &data[..data.len().min(MAX_INPUT_BYTES)];
    let input = String::from_utf8_lossy(data);
    let source = truncate_to_chars(&input, MAX_EXPRESSION_CHARS);

    if let Err(err) = calcdown_engine::parse_expression(source) {
        assert!(err.pos <= source.len(), "error offset {} past end of input", err.pos);
    }

    // Same text as a calc block body: declaration extraction, parsing and validation.
    let (nodes, _messages) = calcdown_engine::calc::compile_calc_block(source, 1);
    for node in &nodes {
        assert!(!node.name.is_empty());
    }
});
