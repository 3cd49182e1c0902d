//! Runtime evaluation: dependency scheduling, the expression interpreter and operator semantics.

mod graph;
mod interpreter;
mod ops;
mod scope;

pub use graph::{evaluate_nodes, schedule, NodeEvaluation, MISSING_EXPRESSION};
pub use interpreter::{Interpreter, TableKeys};
pub use scope::{Closure, Globals, Scope};
