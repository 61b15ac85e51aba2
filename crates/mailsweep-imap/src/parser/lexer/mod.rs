//! Tokenizer for server responses (RFC 3501 section 9 grammar).

#![allow(clippy::missing_errors_doc)]

mod token;

pub use token::Token;

use crate::{Error, Result};

/// Byte-level lexer over one complete response.
pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given input.
    #[must_use]
    pub const fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    /// Current byte offset.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Unconsumed input.
    #[must_use]
    pub fn remaining(&self) -> &'a [u8] {
        &self.input[self.pos..]
    }

    /// Returns true if at end of input.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Peeks at the current byte.
    #[must_use]
    pub fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    /// Consumes one byte.
    pub fn advance(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    /// Skips n bytes, stopping at end of input.
    pub fn skip(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.input.len());
    }

    /// Reads the next token.
    pub fn next_token(&mut self) -> Result<Token<'a>> {
        let Some(byte) = self.peek() else {
            return Ok(Token::Eof);
        };

        let single = match byte {
            b' ' => Some(Token::Space),
            b'(' => Some(Token::LParen),
            b')' => Some(Token::RParen),
            b'[' => Some(Token::LBracket),
            b']' => Some(Token::RBracket),
            b'*' => Some(Token::Asterisk),
            b'+' => Some(Token::Plus),
            _ => None,
        };
        if let Some(token) = single {
            self.advance();
            return Ok(token);
        }

        match byte {
            b'\r' if self.peek_at(1) == Some(b'\n') => {
                self.skip(2);
                Ok(Token::Crlf)
            }
            b'\r' => Err(self.error("Expected LF after CR")),
            b'"' => self.read_quoted_string(),
            b'{' => self.read_literal(),
            b'0'..=b'9' => self.read_number_or_atom(),
            _ if is_atom_char(byte) => self.read_atom(),
            _ => Err(self.error(&format!("Unexpected character: {byte:#04x}"))),
        }
    }

    fn read_quoted_string(&mut self) -> Result<Token<'a>> {
        self.advance();
        let mut out = Vec::new();

        loop {
            match self.advance() {
                Some(b'"') => break,
                Some(b'\\') => match self.advance() {
                    Some(c @ (b'"' | b'\\')) => out.push(c),
                    Some(c) => return Err(self.error(&format!("Invalid escape: \\{c}"))),
                    None => return Err(self.error("Unexpected EOF in quoted string")),
                },
                Some(c) => out.push(c),
                None => return Err(self.error("Unexpected EOF in quoted string")),
            }
        }

        // Servers put raw 8-bit header text in quoted strings; keep what we can.
        Ok(Token::QuotedString(
            String::from_utf8_lossy(&out).into_owned(),
        ))
    }

    /// Reads `{n}` or `{n+}`, the CRLF, and then n bytes of payload.
    fn read_literal(&mut self) -> Result<Token<'a>> {
        self.advance();
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.advance();
        }
        let digits = std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|_| self.error("Invalid literal size"))?;
        let size: usize = digits
            .parse()
            .map_err(|_| self.error("Invalid literal size number"))?;

        if self.peek() == Some(b'+') {
            self.advance();
        }
        if self.advance() != Some(b'}') {
            return Err(self.error("Expected } after literal size"));
        }
        if self.advance() != Some(b'\r') || self.advance() != Some(b'\n') {
            return Err(self.error("Expected CRLF after literal size"));
        }

        let end = self
            .pos
            .checked_add(size)
            .filter(|&end| end <= self.input.len())
            .ok_or_else(|| self.error("Incomplete literal data"))?;
        let data = self.input[self.pos..end].to_vec();
        self.pos = end;

        Ok(Token::Literal(data))
    }

    fn read_number_or_atom(&mut self) -> Result<Token<'a>> {
        let s = self.take_atom()?;
        if s.bytes().all(|b| b.is_ascii_digit()) {
            let n: u32 = s.parse().map_err(|_| self.error("Number too large"))?;
            Ok(Token::Number(n))
        } else {
            Ok(Token::Atom(s))
        }
    }

    fn read_atom(&mut self) -> Result<Token<'a>> {
        let s = self.take_atom()?;
        if s.eq_ignore_ascii_case("NIL") {
            Ok(Token::Nil)
        } else {
            Ok(Token::Atom(s))
        }
    }

    fn take_atom(&mut self) -> Result<&'a str> {
        let start = self.pos;
        while self.peek().is_some_and(is_atom_char) {
            self.advance();
        }
        std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|_| self.error("Invalid UTF-8 in atom"))
    }

    fn error(&self, message: &str) -> Error {
        Error::Parse {
            position: self.pos,
            message: message.to_string(),
        }
    }

    /// Consumes a token of the same kind as `expected`.
    #[allow(clippy::needless_pass_by_value)]
    pub fn expect(&mut self, expected: Token<'_>) -> Result<()> {
        let token = self.next_token()?;
        if std::mem::discriminant(&token) == std::mem::discriminant(&expected) {
            Ok(())
        } else {
            Err(self.error(&format!("Expected {expected:?}, got {token:?}")))
        }
    }

    /// Consumes a space.
    pub fn expect_space(&mut self) -> Result<()> {
        self.expect(Token::Space)
    }

    /// Reads a number.
    pub fn read_number(&mut self) -> Result<u32> {
        match self.next_token()? {
            Token::Number(n) => Ok(n),
            token => Err(self.error(&format!("Expected number, got {token:?}"))),
        }
    }

    /// Reads an atom.
    pub fn read_atom_string(&mut self) -> Result<&'a str> {
        match self.next_token()? {
            Token::Atom(s) => Ok(s),
            token => Err(self.error(&format!("Expected atom, got {token:?}"))),
        }
    }
}

/// Returns true if the byte may appear in an atom.
///
/// `\` is accepted so flags like `\Deleted` lex as one atom; `[` is not, so
/// `BODY[...]` splits at the section.
#[must_use]
pub const fn is_atom_char(b: u8) -> bool {
    matches!(b,
        0x21 |
        0x23..=0x24 |
        0x26..=0x27 |
        0x2B..=0x5A |
        0x5C |
        0x5E..=0x7A |
        0x7C |
        0x7E
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_line() {
        let mut lexer = Lexer::new(b"A0001 OK done\r\n");
        assert_eq!(lexer.next_token().unwrap(), Token::Atom("A0001"));
        assert_eq!(lexer.next_token().unwrap(), Token::Space);
        assert_eq!(lexer.next_token().unwrap(), Token::Atom("OK"));
        assert_eq!(lexer.next_token().unwrap(), Token::Space);
        assert_eq!(lexer.next_token().unwrap(), Token::Atom("done"));
        assert_eq!(lexer.next_token().unwrap(), Token::Crlf);
        assert_eq!(lexer.next_token().unwrap(), Token::Eof);
    }

    #[test]
    fn test_numbers_and_mixed_atoms() {
        let mut lexer = Lexer::new(b"42 4x");
        assert_eq!(lexer.next_token().unwrap(), Token::Number(42));
        assert_eq!(lexer.next_token().unwrap(), Token::Space);
        assert_eq!(lexer.next_token().unwrap(), Token::Atom("4x"));
    }

    #[test]
    fn test_quoted_string_with_escapes() {
        let mut lexer = Lexer::new(br#""a \"b\" \\c""#);
        assert_eq!(
            lexer.next_token().unwrap(),
            Token::QuotedString(r#"a "b" \c"#.to_string())
        );
    }

    #[test]
    fn test_quoted_string_with_raw_latin1() {
        let mut lexer = Lexer::new(b"\"Caf\xe9\"");
        match lexer.next_token().unwrap() {
            Token::QuotedString(s) => assert!(s.starts_with("Caf")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_literal_and_literal_plus() {
        let mut lexer = Lexer::new(b"{5}\r\nhello");
        assert_eq!(lexer.next_token().unwrap(), Token::Literal(b"hello".to_vec()));

        let mut lexer = Lexer::new(b"{2+}\r\nhi");
        assert_eq!(lexer.next_token().unwrap(), Token::Literal(b"hi".to_vec()));
    }

    #[test]
    fn test_truncated_literal_is_error() {
        let mut lexer = Lexer::new(b"{10}\r\nshort");
        assert!(lexer.next_token().is_err());
    }

    #[test]
    fn test_body_section_splits() {
        let mut lexer = Lexer::new(b"BODY[HEADER]");
        assert_eq!(lexer.next_token().unwrap(), Token::Atom("BODY"));
        assert_eq!(lexer.next_token().unwrap(), Token::LBracket);
    }

    #[test]
    fn test_flags_and_nil() {
        let mut lexer = Lexer::new(b"(\\Deleted NIL)");
        assert_eq!(lexer.next_token().unwrap(), Token::LParen);
        assert_eq!(lexer.next_token().unwrap(), Token::Atom("\\Deleted"));
        assert_eq!(lexer.next_token().unwrap(), Token::Space);
        assert_eq!(lexer.next_token().unwrap(), Token::Nil);
        assert_eq!(lexer.next_token().unwrap(), Token::RParen);
    }

    #[test]
    fn test_is_atom_char() {
        assert!(is_atom_char(b'A'));
        assert!(is_atom_char(b'.'));
        assert!(is_atom_char(b'\\'));
        assert!(!is_atom_char(b' '));
        assert!(!is_atom_char(b'('));
        assert!(!is_atom_char(b'{'));
        assert!(!is_atom_char(b'"'));
        assert!(!is_atom_char(b'%'));
        assert!(!is_atom_char(b'['));
        assert!(!is_atom_char(b']'));
    }
}
