//! Lexer tokens.

/// Token produced by the lexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    /// Atom (unquoted string without special characters).
    Atom(&'a str),
    /// Quoted string, unescaped.
    QuotedString(String),
    /// Literal payload of a `{n}` string.
    Literal(Vec<u8>),
    /// Number.
    Number(u32),
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// Single space.
    Space,
    /// `*`, the untagged prefix.
    Asterisk,
    /// `+`, the continuation prefix.
    Plus,
    /// NIL
    Nil,
    /// CRLF line ending.
    Crlf,
    /// End of input.
    Eof,
}
