use std::collections::HashSet;

use calcdown_model::{codes, Message, STD_NAME};

use super::data::{parse_data_block, Table};
use super::inputs::{parse_inputs_block, InputDef};
use super::markdown::{parse_markdown, CodeBlock, FrontMatter};
use crate::calc::{compile_calc_block, CalcNode};

const BLOCK_LANGS: [&str; 4] = ["inputs", "data", "calc", "view"];

/// A parsed CalcDown document.
///
/// Input, table and node names are unique across the whole program and never `std`.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub front_matter: Option<FrontMatter>,
    /// Every fenced block in document order, including the ones that produced nothing.
    pub blocks: Vec<CodeBlock>,
    pub inputs: Vec<InputDef>,
    pub tables: Vec<Table>,
    pub nodes: Vec<CalcNode>,
}

impl Program {
    pub fn input(&self, name: &str) -> Option<&InputDef> {
        self.inputs.iter().find(|input| input.name == name)
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|table| table.name == name)
    }

    pub fn node(&self, name: &str) -> Option<&CalcNode> {
        self.nodes.iter().find(|node| node.name == name)
    }
}

#[derive(Default)]
struct Names {
    inputs: HashSet<String>,
    tables: HashSet<String>,
    nodes: HashSet<String>,
}

fn conflict(code: &str, message: String, line: usize, lang: &str, name: &str) -> Message {
    Message::error(code, message)
        .at_line(line)
        .in_block(lang)
        .for_node(name)
}

impl Names {
    fn admit_input(&mut self, input: &InputDef, lang: &str) -> Result<(), Message> {
        let name = input.name.as_str();
        let fail = |code: &str, message: String| Err(conflict(code, message, input.line, lang, name));
        if name == STD_NAME {
            return fail(
                codes::NAME_RESERVED_STD,
                "The identifier 'std' is reserved and cannot be used as an input name".into(),
            );
        }
        if self.inputs.contains(name) {
            return fail(
                codes::INPUT_DUPLICATE_ACROSS_BLOCKS,
                format!("Duplicate input name across blocks: {name}"),
            );
        }
        if self.nodes.contains(name) {
            return fail(
                codes::NAME_CONFLICT_INPUT_NODE,
                format!("Name conflict: '{name}' is defined as both an input and a calc node"),
            );
        }
        if self.tables.contains(name) {
            return fail(
                codes::NAME_CONFLICT_INPUT_TABLE,
                format!("Name conflict: '{name}' is defined as both an input and a data table"),
            );
        }
        self.inputs.insert(name.to_string());
        Ok(())
    }

    fn admit_table(&mut self, table: &Table, lang: &str) -> Result<(), Message> {
        let name = table.name.as_str();
        let fail = |code: &str, message: String| Err(conflict(code, message, table.line, lang, name));
        if self.tables.contains(name) {
            return fail(
                codes::DATA_DUPLICATE_TABLE_NAME,
                format!("Duplicate table name across data blocks: {name}"),
            );
        }
        if self.inputs.contains(name) {
            return fail(
                codes::NAME_CONFLICT_TABLE_INPUT,
                format!("Name conflict: '{name}' is defined as both a data table and an input"),
            );
        }
        if self.nodes.contains(name) {
            return fail(
                codes::NAME_CONFLICT_TABLE_NODE,
                format!("Name conflict: '{name}' is defined as both a data table and a calc node"),
            );
        }
        self.tables.insert(name.to_string());
        Ok(())
    }

    fn admit_node(&mut self, node: &CalcNode, lang: &str) -> Result<(), Message> {
        let name = node.name.as_str();
        let fail = |code: &str, message: String| Err(conflict(code, message, node.line, lang, name));
        if name == STD_NAME {
            return fail(
                codes::NAME_RESERVED_STD,
                "The identifier 'std' is reserved and cannot be used as a node name".into(),
            );
        }
        if self.nodes.contains(name) {
            return fail(
                codes::CALC_DUPLICATE_NODE_ACROSS_BLOCKS,
                format!("Duplicate node name across calc blocks: {name}"),
            );
        }
        if self.inputs.contains(name) {
            return fail(
                codes::NAME_CONFLICT_NODE_INPUT,
                format!("Name conflict: '{name}' is defined as both a calc node and an input"),
            );
        }
        if self.tables.contains(name) {
            return fail(
                codes::NAME_CONFLICT_NODE_TABLE,
                format!("Name conflict: '{name}' is defined as both a calc node and a data table"),
            );
        }
        self.nodes.insert(name.to_string());
        Ok(())
    }
}

fn check_lang(block: &CodeBlock) -> Option<Message> {
    if BLOCK_LANGS.contains(&block.lang.as_str()) {
        return None;
    }
    let message = if block.lang.is_empty() {
        Message::error(
            codes::BLOCK_MISSING_LANG,
            "Fenced code block is missing a language tag. In .calc.md, fenced code blocks are reserved for CalcDown blocks (inputs|data|calc|view).",
        )
    } else {
        Message::error(
            codes::BLOCK_UNKNOWN_LANG,
            format!(
                "Unknown fenced code block language: {}. In .calc.md, fenced code blocks are reserved for CalcDown blocks (inputs|data|calc|view).",
                block.lang
            ),
        )
        .in_block(&block.lang)
    };
    Some(message.at_line(block.fence_line))
}

/// Parses a CalcDown markdown document into a [`Program`].
///
/// Never fails: every problem becomes a [`Message`] and the offending entity is left out.
/// When two blocks define the same name the later definition is dropped.
pub fn parse_program(markdown: &str) -> (Program, Vec<Message>) {
    let doc = parse_markdown(markdown);
    let mut messages = Vec::new();
    let mut names = Names::default();
    let mut inputs = Vec::new();
    let mut tables = Vec::new();
    let mut nodes = Vec::new();

    for block in &doc.code_blocks {
        messages.extend(check_lang(block));
        match block.lang.as_str() {
            "inputs" => {
                let (parsed, block_messages) = parse_inputs_block(block);
                messages.extend(block_messages);
                for input in parsed {
                    match names.admit_input(&input, &block.lang) {
                        Ok(()) => inputs.push(input),
                        Err(message) => messages.push(message),
                    }
                }
            }
            "data" => {
                let (table, block_messages) = parse_data_block(block);
                messages.extend(block_messages);
                if let Some(table) = table {
                    match names.admit_table(&table, &block.lang) {
                        Ok(()) => tables.push(table),
                        Err(message) => messages.push(message),
                    }
                }
            }
            "calc" => {
                let (compiled, block_messages) = compile_calc_block(&block.content, block.fence_line + 1);
                messages.extend(block_messages.into_iter().map(|m| m.in_block("calc")));
                for node in compiled {
                    match names.admit_node(&node, &block.lang) {
                        Ok(()) => nodes.push(node),
                        Err(message) => messages.push(message),
                    }
                }
            }
            _ => {}
        }
    }

    log::debug!(
        "parsed program: {} blocks, {} inputs, {} tables, {} nodes, {} messages",
        doc.code_blocks.len(),
        inputs.len(),
        tables.len(),
        nodes.len(),
        messages.len()
    );

    let program = Program {
        front_matter: doc.front_matter,
        blocks: doc.code_blocks,
        inputs,
        tables,
        nodes,
    };
    (program, messages)
}
