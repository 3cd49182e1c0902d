use std::fmt;

use super::SyntaxError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    String(String),
    Boolean(bool),
    Identifier(String),
    LParen,
    RParen,
    LBrace,
    RBrace,
    Dot,
    Comma,
    Colon,
    Question,
    Arrow,
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    Ampersand,
    AndAnd,
    OrOr,
    EqEq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    Bang,
    Eof,
}

impl Token {
    fn symbol(&self) -> Option<&'static str> {
        Some(match self {
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::Dot => ".",
            Token::Comma => ",",
            Token::Colon => ":",
            Token::Question => "?",
            Token::Arrow => "=>",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::StarStar => "**",
            Token::Slash => "/",
            Token::Ampersand => "&",
            Token::AndAnd => "&&",
            Token::OrOr => "||",
            Token::EqEq => "==",
            Token::NotEq => "!=",
            Token::Less => "<",
            Token::LessEq => "<=",
            Token::Greater => ">",
            Token::GreaterEq => ">=",
            Token::Bang => "!",
            _ => return None,
        })
    }
}

/// Human readable token description used in syntax error messages.
impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(symbol) = self.symbol() {
            return write!(f, "'{symbol}'");
        }
        match self {
            Token::Number(n) => write!(f, "number {}", crate::value::format_number(*n)),
            Token::String(s) => write!(
                f,
                "string {}",
                serde_json::to_string(s).unwrap_or_else(|_| format!("\"{s}\""))
            ),
            Token::Boolean(b) => write!(f, "boolean {b}"),
            Token::Identifier(name) => write!(f, "identifier {name}"),
            _ => f.write_str("end of expression"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    /// Byte offset of the first character of the token.
    pub pos: usize,
}

/// Saved tokenizer state, see [`Lexer::mark`].
#[derive(Debug, Clone)]
pub struct Mark {
    pos: usize,
    lookahead: Option<Spanned>,
}

/// On-demand tokenizer with one token of lookahead and checkpoint/restore.
pub struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    lookahead: Option<Spanned>,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            lookahead: None,
        }
    }

    pub fn peek(&mut self) -> Result<&Spanned, SyntaxError> {
        let token = match self.lookahead.take() {
            Some(token) => token,
            None => self.next_token()?,
        };
        Ok(self.lookahead.insert(token))
    }

    pub fn next(&mut self) -> Result<Spanned, SyntaxError> {
        match self.lookahead.take() {
            Some(token) => Ok(token),
            None => self.next_token(),
        }
    }

    /// Returns `true` (and consumes the token) when the next token equals `expected`.
    pub fn eat(&mut self, expected: &Token) -> Result<bool, SyntaxError> {
        if self.peek()?.token == *expected {
            self.lookahead = None;
            return Ok(true);
        }
        Ok(false)
    }

    pub fn mark(&self) -> Mark {
        Mark {
            pos: self.pos,
            lookahead: self.lookahead.clone(),
        }
    }

    pub fn reset(&mut self, mark: Mark) {
        self.pos = mark.pos;
        self.lookahead = mark.lookahead;
    }

    fn byte_at(&self, idx: usize) -> Option<u8> {
        self.src.as_bytes().get(idx).copied()
    }

    fn next_token(&mut self) -> Result<Spanned, SyntaxError> {
        self.skip_whitespace_and_comments()?;
        let pos = self.pos;
        let Some(ch) = self.byte_at(pos) else {
            return Ok(Spanned {
                token: Token::Eof,
                pos,
            });
        };
        let next = self.byte_at(pos + 1);
        let third = self.byte_at(pos + 2);

        let (token, len) = match (ch, next, third) {
            (b'(', ..) => (Token::LParen, 1),
            (b')', ..) => (Token::RParen, 1),
            (b'{', ..) => (Token::LBrace, 1),
            (b'}', ..) => (Token::RBrace, 1),
            (b'.', ..) => (Token::Dot, 1),
            (b',', ..) => (Token::Comma, 1),
            (b':', ..) => (Token::Colon, 1),
            (b'?', ..) => (Token::Question, 1),
            (b'=', Some(b'>'), _) => (Token::Arrow, 2),
            (b'=', Some(b'='), Some(b'=')) => (Token::EqEq, 3),
            (b'!', Some(b'='), Some(b'=')) => (Token::NotEq, 3),
            (b'&', Some(b'&'), _) => (Token::AndAnd, 2),
            (b'|', Some(b'|'), _) => (Token::OrOr, 2),
            (b'=', Some(b'='), _) => (Token::EqEq, 2),
            (b'!', Some(b'='), _) => (Token::NotEq, 2),
            (b'>', Some(b'='), _) => (Token::GreaterEq, 2),
            (b'<', Some(b'='), _) => (Token::LessEq, 2),
            (b'*', Some(b'*'), _) => (Token::StarStar, 2),
            (b'*', ..) => (Token::Star, 1),
            (b'/', ..) => (Token::Slash, 1),
            (b'+', ..) => (Token::Plus, 1),
            (b'-', ..) => (Token::Minus, 1),
            (b'&', ..) => (Token::Ampersand, 1),
            (b'<', ..) => (Token::Less, 1),
            (b'>', ..) => (Token::Greater, 1),
            (b'!', ..) => (Token::Bang, 1),
            (b'"' | b'\'', ..) => return self.lex_string(),
            (d, ..) if d.is_ascii_digit() => return self.lex_number(),
            (c, ..) if c.is_ascii_alphabetic() || c == b'_' => return Ok(self.lex_word()),
            _ => {
                let unexpected = self.src[pos..].chars().next().unwrap_or('?');
                return Err(SyntaxError::new(
                    format!("Unsupported token: {unexpected}"),
                    pos,
                ));
            }
        };
        self.pos += len;
        Ok(Spanned { token, pos })
    }

    fn lex_string(&mut self) -> Result<Spanned, SyntaxError> {
        let start = self.pos;
        let mut chars = self.src[start..].char_indices();
        let quote = match chars.next() {
            Some((_, q)) => q,
            None => return Err(SyntaxError::new("Unterminated string", start)),
        };
        let mut out = String::new();
        while let Some((offset, c)) = chars.next() {
            if c == quote {
                self.pos = start + offset + c.len_utf8();
                return Ok(Spanned {
                    token: Token::String(out),
                    pos: start,
                });
            }
            if c == '\\' {
                let Some((_, escaped)) = chars.next() else {
                    return Err(SyntaxError::new("Unterminated string escape", start));
                };
                out.push(match escaped {
                    'n' => '\n',
                    'r' => '\r',
                    't' => '\t',
                    other => other,
                });
                continue;
            }
            out.push(c);
        }
        Err(SyntaxError::new("Unterminated string", start))
    }

    fn lex_number(&mut self) -> Result<Spanned, SyntaxError> {
        let start = self.pos;
        let digits = |lexer: &mut Self| {
            while matches!(lexer.byte_at(lexer.pos), Some(b) if b.is_ascii_digit() || b == b'_') {
                lexer.pos += 1;
            }
        };
        self.pos += 1;
        digits(self);
        if self.byte_at(self.pos) == Some(b'.') {
            self.pos += 1;
            digits(self);
        }
        if matches!(self.byte_at(self.pos), Some(b'e' | b'E')) {
            self.pos += 1;
            if matches!(self.byte_at(self.pos), Some(b'+' | b'-')) {
                self.pos += 1;
            }
            digits(self);
        }
        let raw: String = self.src[start..self.pos]
            .chars()
            .filter(|c| *c != '_')
            .collect();
        match raw.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(Spanned {
                token: Token::Number(value),
                pos: start,
            }),
            _ => Err(SyntaxError::new(format!("Invalid number: {raw}"), start)),
        }
    }

    fn lex_word(&mut self) -> Spanned {
        let start = self.pos;
        while matches!(self.byte_at(self.pos), Some(b) if b.is_ascii_alphanumeric() || b == b'_') {
            self.pos += 1;
        }
        let word = &self.src[start..self.pos];
        let token = match word {
            "true" => Token::Boolean(true),
            "false" => Token::Boolean(false),
            _ => Token::Identifier(word.to_string()),
        };
        Spanned { token, pos: start }
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), SyntaxError> {
        loop {
            match (self.byte_at(self.pos), self.byte_at(self.pos + 1)) {
                (Some(b' ' | b'\t' | b'\n' | b'\r'), _) => self.pos += 1,
                (Some(b'/'), Some(b'/')) => {
                    self.pos += 2;
                    while !matches!(self.byte_at(self.pos), None | Some(b'\n')) {
                        self.pos += 1;
                    }
                }
                (Some(b'/'), Some(b'*')) => {
                    let open = self.pos;
                    match self.src[open + 2..].find("*/") {
                        Some(end) => self.pos = open + 2 + end + 2,
                        None => {
                            return Err(SyntaxError::new("Unterminated block comment", open));
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tokens(src: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(src);
        let mut out = Vec::new();
        loop {
            let tok = lexer.next().unwrap();
            if tok.token == Token::Eof {
                return out;
            }
            out.push(tok.token);
        }
    }

    #[test]
    fn lexes_operators_longest_first() {
        assert_eq!(
            tokens("a === b !== c ** d => e && f || !g <= >= &"),
            vec![
                Token::Identifier("a".into()),
                Token::EqEq,
                Token::Identifier("b".into()),
                Token::NotEq,
                Token::Identifier("c".into()),
                Token::StarStar,
                Token::Identifier("d".into()),
                Token::Arrow,
                Token::Identifier("e".into()),
                Token::AndAnd,
                Token::Identifier("f".into()),
                Token::OrOr,
                Token::Bang,
                Token::Identifier("g".into()),
                Token::LessEq,
                Token::GreaterEq,
                Token::Ampersand,
            ]
        );
    }

    #[test]
    fn lexes_numbers() {
        assert_eq!(
            tokens("1_000 0.5 2.5e3 7E-1 1."),
            vec![
                Token::Number(1000.0),
                Token::Number(0.5),
                Token::Number(2500.0),
                Token::Number(0.7),
                Token::Number(1.0),
            ]
        );
        let err = Lexer::new("1e").next().unwrap_err();
        assert_eq!(err.message, "Invalid number: 1e");
    }

    #[test]
    fn lexes_strings_with_escapes() {
        assert_eq!(
            tokens(r#""a\n\"b" 'it\'s' "é""#),
            vec![
                Token::String("a\n\"b".into()),
                Token::String("it's".into()),
                Token::String("é".into()),
            ]
        );
        assert_eq!(
            Lexer::new("\"abc").next().unwrap_err().message,
            "Unterminated string"
        );
        assert_eq!(
            Lexer::new("'abc\\").next().unwrap_err().message,
            "Unterminated string escape"
        );
    }

    #[test]
    fn skips_comments() {
        assert_eq!(
            tokens("1 // line\n + /* block */ 2"),
            vec![Token::Number(1.0), Token::Plus, Token::Number(2.0)]
        );
        let mut lexer = Lexer::new("1 /* open");
        lexer.next().unwrap();
        assert_eq!(lexer.next().unwrap_err().message, "Unterminated block comment");
    }

    #[test]
    fn rejects_unknown_characters() {
        let mut lexer = Lexer::new("a @ b");
        lexer.next().unwrap();
        let err = lexer.next().unwrap_err();
        assert_eq!(err.message, "Unsupported token: @");
        assert_eq!(err.pos, 2);
    }

    #[test]
    fn mark_and_reset_restore_lookahead() {
        let mut lexer = Lexer::new("x => y");
        let mark = lexer.mark();
        assert_eq!(lexer.next().unwrap().token, Token::Identifier("x".into()));
        assert_eq!(lexer.peek().unwrap().token, Token::Arrow);
        lexer.reset(mark);
        assert_eq!(lexer.next().unwrap().token, Token::Identifier("x".into()));
    }

    #[test]
    fn token_descriptions() {
        assert_eq!(Token::Identifier("foo".into()).to_string(), "identifier foo");
        assert_eq!(Token::String("a\"b".into()).to_string(), "string \"a\\\"b\"");
        assert_eq!(Token::Number(2.0).to_string(), "number 2");
        assert_eq!(Token::Arrow.to_string(), "'=>'");
        assert_eq!(Token::Eof.to_string(), "end of expression");
    }
}
