//! Tokenizer for the SQL dialect.
//!
//! A one-byte lookahead hand-written scanner tracking source position as
//! a single byte offset as it goes, with borrowed slices for identifiers
//! and numbers but an owned `String` for string literals (needed for
//! escape unquoting). Identifiers are upper-cased before keyword
//! comparison so dispatch is case-insensitive.

use crate::error::{Result, SqlError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Id,
    Number,
    QuotedString,
    LParen,
    RParen,
    Comma,
    Dot,
    Star,
    Semicolon,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Plus,
    Minus,
    Slash,
    Percent,
    Pipe,
    Eof,
}

/// One scanned token: its kind, the source text it covers (already
/// case-preserved; callers upper-case for keyword comparison), and the
/// byte offset of its first character.
#[derive(Debug, Clone)]
pub struct Lexeme {
    pub token: Token,
    pub text: String,
    pub position: usize,
}

pub struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    /// One-token pushback buffer, used by the dispatcher to peek the
    /// first keyword before committing to the keyword-executor path
    /// (section 4.1 step 3: "push the token back").
    pushback: Option<Lexeme>,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Lexer {
            src: src.as_bytes(),
            pos: 0,
            pushback: None,
        }
    }

    pub fn push_back(&mut self, lex: Lexeme) {
        debug_assert!(self.pushback.is_none(), "at most one token of pushback");
        self.pushback = Some(lex);
    }

    pub fn next(&mut self) -> Result<Lexeme> {
        if let Some(lex) = self.pushback.take() {
            return Ok(lex);
        }
        self.scan()
    }

    fn peek_byte(&self) -> u8 {
        *self.src.get(self.pos).unwrap_or(&0)
    }

    fn peek_byte_at(&self, offset: usize) -> u8 {
        *self.src.get(self.pos + offset).unwrap_or(&0)
    }

    fn skip_space_and_comments(&mut self) {
        loop {
            match self.peek_byte() {
                b' ' | b'\t' | b'\r' | b'\n' => self.pos += 1,
                b'-' if self.peek_byte_at(1) == b'-' => {
                    while self.peek_byte() != b'\n' && self.peek_byte() != 0 {
                        self.pos += 1;
                    }
                }
                b'/' if self.peek_byte_at(1) == b'*' => {
                    self.pos += 2;
                    while !(self.peek_byte() == b'*' && self.peek_byte_at(1) == b'/')
                        && self.peek_byte() != 0
                    {
                        self.pos += 1;
                    }
                    self.pos = (self.pos + 2).min(self.src.len());
                }
                _ => break,
            }
        }
    }

    fn scan(&mut self) -> Result<Lexeme> {
        self.skip_space_and_comments();
        let start = self.pos;
        let cc = self.peek_byte();

        macro_rules! single {
            ($tok:expr) => {{
                self.pos += 1;
                Ok(Lexeme {
                    token: $tok,
                    text: (cc as char).to_string(),
                    position: start,
                })
            }};
        }

        match cc {
            0 => Ok(Lexeme {
                token: Token::Eof,
                text: String::new(),
                position: start,
            }),
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                while matches!(self.peek_byte(), b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_') {
                    self.pos += 1;
                }
                let text = std::str::from_utf8(&self.src[start..self.pos])
                    .unwrap()
                    .to_string();
                Ok(Lexeme {
                    token: Token::Id,
                    text,
                    position: start,
                })
            }
            b'"' => {
                // Double-quoted identifier (section 6.1: "Identifiers may be double-quoted").
                self.pos += 1;
                let content_start = self.pos;
                while self.peek_byte() != b'"' {
                    if self.peek_byte() == 0 {
                        return Err(SqlError::syntax(start, "unterminated quoted identifier"));
                    }
                    self.pos += 1;
                }
                let text = std::str::from_utf8(&self.src[content_start..self.pos])
                    .unwrap()
                    .to_string();
                self.pos += 1;
                Ok(Lexeme {
                    token: Token::Id,
                    text,
                    position: start,
                })
            }
            b'\'' => {
                // Single-quoted literal with '' escaping for an embedded quote.
                self.pos += 1;
                let mut text = String::new();
                loop {
                    match self.peek_byte() {
                        0 => return Err(SqlError::syntax(start, "unterminated string literal")),
                        b'\'' => {
                            self.pos += 1;
                            if self.peek_byte() == b'\'' {
                                text.push('\'');
                                self.pos += 1;
                            } else {
                                break;
                            }
                        }
                        _ => {
                            let ch_start = self.pos;
                            self.pos += 1;
                            while self.peek_byte() & 0xC0 == 0x80 {
                                self.pos += 1;
                            }
                            text.push_str(
                                std::str::from_utf8(&self.src[ch_start..self.pos]).unwrap(),
                            );
                        }
                    }
                }
                Ok(Lexeme {
                    token: Token::QuotedString,
                    text,
                    position: start,
                })
            }
            b'0'..=b'9' => {
                while matches!(self.peek_byte(), b'0'..=b'9') {
                    self.pos += 1;
                }
                if self.peek_byte() == b'.' && self.peek_byte_at(1).is_ascii_digit() {
                    self.pos += 1;
                    while matches!(self.peek_byte(), b'0'..=b'9') {
                        self.pos += 1;
                    }
                }
                if matches!(self.peek_byte(), b'e' | b'E') {
                    let save = self.pos;
                    self.pos += 1;
                    if matches!(self.peek_byte(), b'+' | b'-') {
                        self.pos += 1;
                    }
                    if self.peek_byte().is_ascii_digit() {
                        while self.peek_byte().is_ascii_digit() {
                            self.pos += 1;
                        }
                    } else {
                        self.pos = save;
                    }
                }
                let text = std::str::from_utf8(&self.src[start..self.pos])
                    .unwrap()
                    .to_string();
                Ok(Lexeme {
                    token: Token::Number,
                    text,
                    position: start,
                })
            }
            b'(' => single!(Token::LParen),
            b')' => single!(Token::RParen),
            b',' => single!(Token::Comma),
            b'.' => single!(Token::Dot),
            b'*' => single!(Token::Star),
            b';' => single!(Token::Semicolon),
            b'+' => single!(Token::Plus),
            b'-' => single!(Token::Minus),
            b'/' => single!(Token::Slash),
            b'%' => single!(Token::Percent),
            b'|' => single!(Token::Pipe),
            b'=' => single!(Token::Eq),
            b'<' => {
                self.pos += 1;
                match self.peek_byte() {
                    b'=' => {
                        self.pos += 1;
                        Ok(Lexeme {
                            token: Token::LtEq,
                            text: "<=".into(),
                            position: start,
                        })
                    }
                    b'>' => {
                        self.pos += 1;
                        Ok(Lexeme {
                            token: Token::NotEq,
                            text: "<>".into(),
                            position: start,
                        })
                    }
                    _ => Ok(Lexeme {
                        token: Token::Lt,
                        text: "<".into(),
                        position: start,
                    }),
                }
            }
            b'>' => {
                self.pos += 1;
                if self.peek_byte() == b'=' {
                    self.pos += 1;
                    Ok(Lexeme {
                        token: Token::GtEq,
                        text: ">=".into(),
                        position: start,
                    })
                } else {
                    Ok(Lexeme {
                        token: Token::Gt,
                        text: ">".into(),
                        position: start,
                    })
                }
            }
            b'!' => {
                self.pos += 1;
                if self.peek_byte() == b'=' {
                    self.pos += 1;
                    Ok(Lexeme {
                        token: Token::NotEq,
                        text: "!=".into(),
                        position: start,
                    })
                } else {
                    Err(SqlError::syntax(start, "unexpected character '!'"))
                }
            }
            other => Err(SqlError::syntax(
                start,
                format!("unexpected character '{}'", other as char),
            )),
        }
    }
}

impl Lexeme {
    /// Upper-cased keyword comparison, per section 6.1: "Keywords are
    /// case-insensitive."
    pub fn is_keyword(&self, kw: &str) -> bool {
        self.token == Token::Id && self.text.eq_ignore_ascii_case(kw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Vec<Token> {
        let mut lx = Lexer::new(src);
        let mut out = Vec::new();
        loop {
            let lex = lx.next().unwrap();
            let done = lex.token == Token::Eof;
            out.push(lex.token);
            if done {
                break;
            }
        }
        out
    }

    #[test]
    fn tokenizes_create_table() {
        let toks = tokens("CREATE TABLE a (x INT)");
        assert_eq!(
            toks,
            vec![
                Token::Id,
                Token::Id,
                Token::Id,
                Token::LParen,
                Token::Id,
                Token::Id,
                Token::RParen,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn keyword_match_is_case_insensitive() {
        let mut lx = Lexer::new("select Select SELECT");
        for _ in 0..3 {
            let lex = lx.next().unwrap();
            assert!(lex.is_keyword("select"));
            assert!(lex.is_keyword("SELECT"));
        }
    }

    #[test]
    fn string_literal_unescapes_doubled_quote() {
        let mut lx = Lexer::new("'it''s'");
        let lex = lx.next().unwrap();
        assert_eq!(lex.token, Token::QuotedString);
        assert_eq!(lex.text, "it's");
    }

    #[test]
    fn pushback_returns_same_lexeme_once() {
        let mut lx = Lexer::new("A B");
        let a = lx.next().unwrap();
        lx.push_back(a.clone());
        let a2 = lx.next().unwrap();
        assert_eq!(a2.text, a.text);
        let b = lx.next().unwrap();
        assert_eq!(b.text, "B");
    }

    #[test]
    fn unterminated_string_is_syntax_error() {
        let mut lx = Lexer::new("'abc");
        let err = lx.next().unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Syntax);
    }

    #[test]
    fn double_quoted_identifier() {
        let mut lx = Lexer::new("\"My Table\"");
        let lex = lx.next().unwrap();
        assert_eq!(lex.token, Token::Id);
        assert_eq!(lex.text, "My Table");
    }

    #[test]
    fn numbers_with_fraction_and_exponent() {
        let toks: Vec<String> = {
            let mut lx = Lexer::new("1577836800000000 3.5 1e10 2E-3");
            let mut out = Vec::new();
            loop {
                let lex = lx.next().unwrap();
                if lex.token == Token::Eof {
                    break;
                }
                out.push(lex.text);
            }
            out
        };
        assert_eq!(toks, vec!["1577836800000000", "3.5", "1e10", "2E-3"]);
    }
}
