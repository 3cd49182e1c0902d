use std::sync::OnceLock;

use indexmap::IndexMap;
use regex::Regex;

/// Flat `key: value` metadata between the leading `---` lines of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontMatter {
    pub raw: String,
    pub data: IndexMap<String, String>,
}

/// A fenced code block and where it sits in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    /// First word of the info string; empty when the fence has no info string.
    pub lang: String,
    pub info: String,
    pub content: String,
    /// 1-based line of the opening fence.
    pub fence_line: usize,
    /// 1-based line of the closing fence; `None` for a block left open at end of input.
    pub close_fence_line: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkdownDocument {
    pub front_matter: Option<FrontMatter>,
    pub body: String,
    pub code_blocks: Vec<CodeBlock>,
}

/// Splits on `\n` and `\r\n`.
pub(crate) fn split_lines(text: &str) -> Vec<&str> {
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect()
}

fn parse_flat_yaml(raw: &str) -> IndexMap<String, String> {
    let mut out = IndexMap::new();
    for line in split_lines(raw) {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let Some((key, value)) = trimmed.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        out.insert(key.to_string(), value.trim().to_string());
    }
    out
}

/// Separates front matter from the body.
///
/// Returns the front matter (if the first line is exactly `---` and a later line closes it), the
/// body text and the 1-based document line the body starts on.
pub fn extract_front_matter(markdown: &str) -> (Option<FrontMatter>, String, usize) {
    let lines = split_lines(markdown);
    if lines.first() != Some(&"---") {
        return (None, markdown.to_string(), 1);
    }
    let Some(end) = lines.iter().skip(1).position(|line| *line == "---").map(|i| i + 1) else {
        return (None, markdown.to_string(), 1);
    };
    let raw = lines[1..end].join("\n");
    let data = parse_flat_yaml(&raw);
    let body = lines[end + 1..].join("\n");
    (Some(FrontMatter { raw, data }), body, end + 2)
}

fn is_closing_fence(line: &str, fence: &str) -> bool {
    let trimmed = line.trim_start();
    let Some(fence_char) = fence.chars().next() else {
        return false;
    };
    if !trimmed.starts_with(fence_char) {
        return false;
    }
    let run = trimmed.chars().take_while(|c| *c == fence_char).count();
    if run < fence.len() {
        return false;
    }
    trimmed[run * fence_char.len_utf8()..]
        .chars()
        .all(|c| c == ' ' || c == '\t')
}

/// Collects fenced code blocks from `body`, numbering lines from `base_line`.
pub fn extract_fenced_code_blocks(body: &str, base_line: usize) -> Vec<CodeBlock> {
    static OPEN: OnceLock<Regex> = OnceLock::new();
    let open = OPEN.get_or_init(|| Regex::new(r"^(\s*)(`{3,}|~{3,})(.*)$").expect("valid regex"));

    let lines = split_lines(body);
    let mut blocks = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let Some(caps) = open.captures(lines[i]) else {
            i += 1;
            continue;
        };
        let fence = &caps[2];
        let info = caps[3].trim().to_string();
        let lang = info.split_whitespace().next().unwrap_or_default().to_string();
        let fence_line = base_line + i;

        let mut content = Vec::new();
        let mut close_fence_line = None;
        i += 1;
        while i < lines.len() {
            if is_closing_fence(lines[i], fence) {
                close_fence_line = Some(base_line + i);
                break;
            }
            content.push(lines[i]);
            i += 1;
        }
        blocks.push(CodeBlock {
            lang,
            info,
            content: content.join("\n"),
            fence_line,
            close_fence_line,
        });
        i += 1;
    }
    blocks
}

pub fn parse_markdown(markdown: &str) -> MarkdownDocument {
    let (front_matter, body, body_start_line) = extract_front_matter(markdown);
    let code_blocks = extract_fenced_code_blocks(&body, body_start_line);
    MarkdownDocument {
        front_matter,
        body,
        code_blocks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn front_matter_shifts_block_lines() {
        let doc = parse_markdown(
            "---\ntitle: Budget\n# note\nbad line\nversion: 2\n---\n\n```calc\nconst a = 1;\n```\n",
        );
        let fm = doc.front_matter.expect("front matter");
        assert_eq!(fm.data.get("title").map(String::as_str), Some("Budget"));
        assert_eq!(fm.data.get("version").map(String::as_str), Some("2"));
        assert_eq!(fm.data.len(), 2);
        assert_eq!(doc.code_blocks.len(), 1);
        let block = &doc.code_blocks[0];
        assert_eq!(block.lang, "calc");
        assert_eq!(block.fence_line, 8);
        assert_eq!(block.close_fence_line, Some(10));
        assert_eq!(block.content, "const a = 1;");
    }

    #[test]
    fn unterminated_front_matter_is_body() {
        let (fm, body, start) = extract_front_matter("---\ntitle: x\n");
        assert!(fm.is_none());
        assert_eq!(body, "---\ntitle: x\n");
        assert_eq!(start, 1);
    }

    #[test]
    fn closing_fence_needs_same_char_and_length() {
        let blocks = extract_fenced_code_blocks("````data extra\n```\n~~~~\n  ````` \nafter", 1);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].lang, "data");
        assert_eq!(blocks[0].info, "data extra");
        assert_eq!(blocks[0].content, "```\n~~~~");
        assert_eq!(blocks[0].close_fence_line, Some(4));
    }

    #[test]
    fn missing_lang_and_open_block() {
        let blocks = extract_fenced_code_blocks("text\r\n```\r\nx\r\n", 5);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].lang, "");
        assert_eq!(blocks[0].fence_line, 6);
        assert_eq!(blocks[0].close_fence_line, None);
        assert_eq!(blocks[0].content, "x\n");
    }
}
