#![forbid(unsafe_code)]

//! `calcdown-model` defines the plain data shared by every layer of a CalcDown
//! toolchain.
//!
//! The crate is intentionally free of parsing and evaluation logic so it can be reused by:
//! - the engine (document assembler, evaluator, patchers)
//! - editor/UI hosts that only need to display diagnostics or table schemas
//! - loaders that fetch external table files and hand their text to the engine

pub mod codes;
mod column_type;
pub mod date;
pub mod delimited;
mod diagnostic;
mod names;
mod source;

pub use column_type::{ColumnType, TypeName};
pub use diagnostic::{Message, Severity};
pub use names::{is_banned_key, is_identifier, BANNED_KEYS, STD_NAME};
pub use source::{HashError, SourceFormat, TableSource};
