//! Extraction of top-level `const name = expr;` declarations from calc block text.

use calcdown_model::{codes, Message};

/// One extracted declaration.
///
/// `expr_text_raw` is the exact text between `=` and `;`; `expr_text` is its trimmed form,
/// starting `expr_trim_start` bytes into the raw text. `expr_start_line`/`expr_start_column`
/// locate the first raw byte in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstDecl {
    pub name: String,
    pub expr_text: String,
    pub expr_text_raw: String,
    pub expr_trim_start: usize,
    pub expr_start_line: usize,
    pub expr_start_column: usize,
    pub line: usize,
}

impl ConstDecl {
    /// Maps a byte offset within [`ConstDecl::expr_text`] to a document `(line, column)`.
    pub fn locate(&self, offset: usize) -> (usize, usize) {
        let raw_offset = (self.expr_trim_start + offset).min(self.expr_text_raw.len());
        let (rel_line, rel_col) = line_col(&self.expr_text_raw, raw_offset);
        let line = self.expr_start_line + rel_line - 1;
        let column = if rel_line == 1 {
            self.expr_start_column + rel_col - 1
        } else {
            rel_col
        };
        (line, column)
    }
}

/// 1-based line and column (in characters) of `offset` within `text`.
pub(crate) fn line_col(text: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut column = 1;
    for (idx, ch) in text.char_indices() {
        if idx >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }
    (line, column)
}

fn is_ident_start(ch: Option<char>) -> bool {
    matches!(ch, Some(c) if c.is_ascii_alphabetic() || c == '_')
}

fn is_ident_char(ch: Option<char>) -> bool {
    matches!(ch, Some(c) if c.is_ascii_alphanumeric() || c == '_')
}

/// Where the scanner currently is relative to strings and comments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Code,
    String(char),
    LineComment,
    BlockComment,
}

struct Scanner<'a> {
    src: &'a str,
    chars: Vec<(usize, char)>,
    i: usize,
    line: usize,
    col: usize,
    paren: usize,
    brace: usize,
    bracket: usize,
    mode: Mode,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str, base_line: usize) -> Self {
        Self {
            src,
            chars: src.char_indices().collect(),
            i: 0,
            line: base_line,
            col: 1,
            paren: 0,
            brace: 0,
            bracket: 0,
            mode: Mode::Code,
        }
    }

    fn peek(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.i + ahead).map(|(_, c)| *c)
    }

    fn byte_offset(&self, idx: usize) -> usize {
        self.chars
            .get(idx)
            .map(|(off, _)| *off)
            .unwrap_or(self.src.len())
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek(0)?;
        self.i += 1;
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn at_end(&self) -> bool {
        self.i >= self.chars.len()
    }

    fn nesting_is_flat(&self) -> bool {
        self.paren == 0 && self.brace == 0 && self.bracket == 0
    }

    /// Consumes one character while tracking strings, comments and bracket depth. Returns
    /// `false` when the current character is plain top-level code and was *not* consumed.
    fn step_structure(&mut self) -> bool {
        let ch = self.peek(0);
        let next = self.peek(1);
        match self.mode {
            Mode::LineComment => {
                if self.advance() == Some('\n') {
                    self.mode = Mode::Code;
                }
                return true;
            }
            Mode::BlockComment => {
                if self.advance() == Some('*') && self.peek(0) == Some('/') {
                    self.advance();
                    self.mode = Mode::Code;
                }
                return true;
            }
            Mode::String(quote) => {
                let c = self.advance();
                if c == Some('\\') {
                    self.advance();
                } else if c == Some(quote) {
                    self.mode = Mode::Code;
                }
                return true;
            }
            Mode::Code => {}
        }
        match (ch, next) {
            (Some('/'), Some('/')) => {
                self.mode = Mode::LineComment;
                self.advance();
                self.advance();
            }
            (Some('/'), Some('*')) => {
                self.mode = Mode::BlockComment;
                self.advance();
                self.advance();
            }
            (Some(q @ ('\'' | '"')), _) => {
                self.mode = Mode::String(q);
                self.advance();
            }
            (Some('('), _) => {
                self.paren += 1;
                self.advance();
            }
            (Some(')'), _) => {
                self.paren = self.paren.saturating_sub(1);
                self.advance();
            }
            (Some('{'), _) => {
                self.brace += 1;
                self.advance();
            }
            (Some('}'), _) => {
                self.brace = self.brace.saturating_sub(1);
                self.advance();
            }
            (Some('['), _) => {
                self.bracket += 1;
                self.advance();
            }
            (Some(']'), _) => {
                self.bracket = self.bracket.saturating_sub(1);
                self.advance();
            }
            _ => return false,
        }
        true
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while matches!(self.peek(0), Some(' ' | '\t' | '\r' | '\n')) {
                self.advance();
            }
            match (self.peek(0), self.peek(1)) {
                (Some('/'), Some('/')) => {
                    while !matches!(self.peek(0), None | Some('\n')) {
                        self.advance();
                    }
                }
                (Some('/'), Some('*')) => {
                    self.advance();
                    self.advance();
                    while let Some(c) = self.advance() {
                        if c == '*' && self.peek(0) == Some('/') {
                            self.advance();
                            break;
                        }
                    }
                }
                _ => return,
            }
        }
    }

    fn read_identifier(&mut self) -> Option<String> {
        if !is_ident_start(self.peek(0)) {
            return None;
        }
        let mut out = String::new();
        while is_ident_char(self.peek(0)) {
            if let Some(c) = self.advance() {
                out.push(c);
            }
        }
        Some(out)
    }

    fn keyword_here(&self, keyword: &str) -> bool {
        let matches = keyword
            .chars()
            .enumerate()
            .all(|(k, c)| self.peek(k) == Some(c));
        let before = self
            .i
            .checked_sub(1)
            .and_then(|idx| self.chars.get(idx))
            .map(|(_, c)| *c);
        matches && !is_ident_char(before) && !is_ident_char(self.peek(keyword.chars().count()))
    }

    /// Scans forward to the next `;` outside any bracket, string or comment and returns its
    /// char index, leaving the cursor on it.
    fn scan_to_top_level_semicolon(&mut self) -> Option<usize> {
        while !self.at_end() {
            if self.step_structure() {
                continue;
            }
            if self.peek(0) == Some(';') && self.nesting_is_flat() {
                return Some(self.i);
            }
            self.advance();
        }
        None
    }
}

/// Scans `source` (a calc block body whose first line is document line `base_line`) for
/// top-level `const` declarations.
pub fn extract_declarations(source: &str, base_line: usize) -> (Vec<ConstDecl>, Vec<Message>) {
    let mut decls = Vec::new();
    let mut messages = Vec::new();
    let mut sc = Scanner::new(source, base_line);

    while !sc.at_end() {
        if sc.step_structure() {
            continue;
        }
        if !sc.nesting_is_flat() || !sc.keyword_here("const") {
            sc.advance();
            continue;
        }

        let decl_line = sc.line;
        for _ in 0.."const".len() {
            sc.advance();
        }
        sc.skip_whitespace_and_comments();
        let Some(name) = sc.read_identifier() else {
            messages.push(
                Message::error(
                    codes::CALC_DECL_EXPECT_IDENTIFIER,
                    "Expected identifier after const",
                )
                .at_line(decl_line),
            );
            continue;
        };
        sc.skip_whitespace_and_comments();
        if sc.peek(0) != Some('=') {
            messages.push(
                Message::error(
                    codes::CALC_DECL_EXPECT_EQUALS,
                    format!("Expected '=' after const {name}"),
                )
                .at_line(decl_line),
            );
            continue;
        }
        sc.advance();

        let expr_start = sc.byte_offset(sc.i);
        let expr_start_line = sc.line;
        let expr_start_column = sc.col;
        let Some(semicolon) = sc.scan_to_top_level_semicolon() else {
            messages.push(
                Message::error(
                    codes::CALC_DECL_MISSING_SEMICOLON,
                    format!("Missing ';' after const {name}"),
                )
                .at_line(decl_line),
            );
            break;
        };
        let raw = &source[expr_start..sc.byte_offset(semicolon)];
        let trimmed_start = raw.len() - raw.trim_start().len();
        decls.push(ConstDecl {
            name,
            expr_text: raw.trim().to_string(),
            expr_text_raw: raw.to_string(),
            expr_trim_start: trimmed_start,
            expr_start_line,
            expr_start_column,
            line: decl_line,
        });
        sc.advance();
    }

    (decls, messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(decls: &[ConstDecl]) -> Vec<&str> {
        decls.iter().map(|d| d.name.as_str()).collect()
    }

    #[test]
    fn extracts_multiline_declarations() {
        let src = "const a = 1 + 2;\n\nconst total = std.math.sum(\n  [1, 2];\n  x\n);\nconst s = \"a;b\"; // const fake = 1;\n";
        let (decls, messages) = extract_declarations(src, 10);
        assert!(messages.is_empty(), "{messages:?}");
        assert_eq!(names(&decls), vec!["a", "total", "s"]);
        assert_eq!(decls[0].expr_text, "1 + 2");
        assert_eq!(decls[0].line, 10);
        assert_eq!((decls[0].expr_start_line, decls[0].expr_start_column), (10, 10));
        assert_eq!(decls[1].line, 12);
        assert_eq!(decls[2].expr_text, "\"a;b\"");
    }

    #[test]
    fn ignores_const_inside_identifiers_strings_and_comments() {
        let src = "/* const a = 1; */ const constant = 'const x = 2;';\nconstx = 3;";
        let (decls, _) = extract_declarations(src, 1);
        assert_eq!(names(&decls), vec!["constant"]);
    }

    #[test]
    fn reports_malformed_declarations() {
        let (decls, messages) = extract_declarations("const = 1;\nconst a 1;\nconst b = 2;\nconst c = 3", 1);
        assert_eq!(names(&decls), vec!["b"]);
        let found: Vec<_> = messages.iter().map(|m| (m.code.as_str(), m.line)).collect();
        assert_eq!(
            found,
            vec![
                (codes::CALC_DECL_EXPECT_IDENTIFIER, Some(1)),
                (codes::CALC_DECL_EXPECT_EQUALS, Some(2)),
                (codes::CALC_DECL_MISSING_SEMICOLON, Some(4)),
            ]
        );
    }

    #[test]
    fn locates_offsets_in_document_coordinates() {
        let src = "const a =\n   1 +\n  ;";
        let (decls, _) = extract_declarations(src, 5);
        let decl = &decls[0];
        assert_eq!(decl.expr_text, "1 +");
        assert_eq!(decl.locate(0), (6, 4));
        assert_eq!(decl.locate(3), (6, 7));

        let (decls, _) = extract_declarations("const x = 1 / ;", 1);
        assert_eq!(decls[0].locate(4), (1, 15));
    }
}
