//! Document assembly: markdown fences, `inputs`/`data`/`view` blocks and the [`Program`] they
//! build.

mod data;
mod inputs;
mod markdown;
mod program;
mod views;

pub use data::{
    coerce_rows_to_table, parse_data_block, parse_scalar_by_type, RowCoercer, RowLocation, Table,
};
pub use inputs::{parse_default_value, parse_inputs_block, InputDef};
pub use markdown::{
    extract_fenced_code_blocks, extract_front_matter, parse_markdown, CodeBlock, FrontMatter,
    MarkdownDocument,
};
pub(crate) use markdown::split_lines;
pub use program::{parse_program, Program};
pub use views::{parse_view_block, validate_views, ViewDef, MAX_VIEW_DEPTH, MAX_VIEW_NODES};
