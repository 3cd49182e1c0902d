//! Calc block compilation: declaration extraction, expression parsing and static validation.

mod compile;
mod decl;

pub use compile::{compile_calc_block, free_identifiers, validate_expr, CalcNode};
pub use decl::{extract_declarations, ConstDecl};
