#![forbid(unsafe_code)]
#![deny(unreachable_patterns)]

//! Parsing and evaluation of CalcDown documents: Markdown files whose fenced `inputs`, `data`,
//! `calc` and `view` blocks describe a small, deterministic spreadsheet-like model.
//!
//! The usual pipeline is:
//! 1. [`parse_program`] splits the document and builds a [`Program`] (inputs, typed tables,
//!    compiled calc nodes) together with structural diagnostics.
//! 2. Hosts that declare externally hosted tables fetch them and pass the text to
//!    [`load_external_tables`], which yields table overrides.
//! 3. [`evaluate_program`] runs the nodes in dependency order against defaults, overrides and an
//!    [`EvalContext`], applies table patches and returns the value map plus runtime messages.
//! 4. [`validate_views`] checks the `view` blocks of [`Program::blocks`] and normalizes them for
//!    renderers.
//!
//! Editors write changes back with [`apply_patch`], which rewrites a single input line or inline
//! JSONL row and leaves the rest of the document byte-for-byte intact.
//!
//! Every entry point except [`apply_patch`] reports problems as [`Message`]s instead of failing.
//! The library logs through the [`log`] facade and never installs a logger.

pub mod ast;
pub mod calc;
pub mod coercion;
pub mod document;
pub mod editing;
pub mod engine;
pub mod error;
pub mod eval;
pub mod external;
pub mod functions;
pub mod parser;
pub mod patch;
pub mod value;

pub use calcdown_model::{codes, ColumnType, Message, Severity, TypeName};
pub use document::{parse_program, validate_views, Program, Table, ViewDef};
pub use editing::{apply_patch, PatchError, PatchOp, SourceMap};
pub use engine::{evaluate_program, EvalContext, Evaluation};
pub use error::{EvalError, EvalResult};
pub use external::{load_external_tables, sha256_hex, ExternalTables, FetchedSource};
pub use parser::{parse_expression, SyntaxError};
pub use value::Value;
