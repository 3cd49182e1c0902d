use std::collections::{HashMap, VecDeque};

use calcdown_model::{codes, Message};
use indexmap::IndexMap;

use super::interpreter::{Interpreter, TableKeys};
use super::scope::Globals;
use crate::calc::CalcNode;
use crate::functions::StdLib;
use crate::value::{NodeError, Value};

/// Sentinel message published for nodes that never compiled.
pub const MISSING_EXPRESSION: &str = "Invalid or missing expression";

/// Result of scheduling and evaluating the calc nodes of a program.
#[derive(Debug)]
pub struct NodeEvaluation {
    /// Successful node results in evaluation order.
    pub values: IndexMap<String, Value>,
    pub messages: Vec<Message>,
    /// The final environment: the caller's bindings plus node results and error sentinels.
    pub globals: Globals,
}

/// Evaluation order by Kahn's algorithm over node-to-node edges.
///
/// The queue is seeded in declaration order and is FIFO, so independent nodes evaluate in the
/// order they were written. Nodes on (or behind) a cycle are left out.
pub fn schedule(nodes: &[CalcNode]) -> Vec<usize> {
    let index: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, node)| (node.name.as_str(), i))
        .collect();

    let mut indegree = vec![0usize; nodes.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for (i, node) in nodes.iter().enumerate() {
        for dep in &node.dependencies {
            if let Some(&d) = index.get(dep.as_str()) {
                indegree[i] += 1;
                dependents[d].push(i);
            }
        }
    }

    let mut queue: VecDeque<usize> = (0..nodes.len()).filter(|&i| indegree[i] == 0).collect();
    let mut order = Vec::with_capacity(nodes.len());
    while let Some(i) = queue.pop_front() {
        order.push(i);
        for &next in &dependents[i] {
            indegree[next] -= 1;
            if indegree[next] == 0 {
                queue.push_back(next);
            }
        }
    }
    order
}

fn sentinel(node_name: &str, message: impl Into<String>) -> Value {
    Value::Error(NodeError {
        node_name: node_name.to_string(),
        message: message.into(),
    })
}

/// Evaluates every schedulable node against `globals` (inputs and tables).
///
/// A failing node publishes an error sentinel in its place so dependents fail with an upstream
/// error instead of an unknown identifier.
pub fn evaluate_nodes(
    nodes: &[CalcNode],
    mut globals: Globals,
    std: &StdLib,
    tables: &TableKeys,
) -> NodeEvaluation {
    let mut messages = Vec::new();
    let mut values = IndexMap::new();

    for node in nodes.iter().filter(|node| node.expr.is_none()) {
        globals.insert(node.name.clone(), sentinel(&node.name, MISSING_EXPRESSION));
    }

    let order = schedule(nodes);
    log::debug!(
        "scheduled {} of {} calc nodes",
        order.len(),
        nodes.len()
    );
    if order.len() != nodes.len() {
        messages.push(Message::error(
            codes::CALC_CYCLE,
            "Cycle detected in calc nodes (or unresolved dependencies)",
        ));
    }

    for node in order.into_iter().map(|i| &nodes[i]) {
        let Some(expr) = &node.expr else {
            continue;
        };
        let result = Interpreter::new(&globals, std, tables).evaluate(expr);
        match result {
            Ok(value) => {
                log::trace!("node {} evaluated", node.name);
                values.insert(node.name.clone(), value.clone());
                globals.insert(node.name.clone(), value);
            }
            Err(err) => {
                log::trace!("node {} failed: {err}", node.name);
                messages.push(
                    Message::error(err.code(), err.to_string())
                        .at_line(node.line)
                        .for_node(&node.name),
                );
                globals.insert(node.name.clone(), sentinel(&node.name, err.to_string()));
            }
        }
    }

    NodeEvaluation {
        values,
        messages,
        globals,
    }
}
