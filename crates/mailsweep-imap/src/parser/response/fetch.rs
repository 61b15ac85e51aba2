//! FETCH response parsing.

use crate::parser::lexer::{Lexer, Token};
use crate::types::Uid;
use crate::{Error, Result};

use super::helpers::parse_flag_list;
use super::types::FetchItem;

/// Parses the parenthesized item list of a FETCH response.
pub fn parse_fetch_response(lexer: &mut Lexer<'_>) -> Result<Vec<FetchItem>> {
    lexer.expect(Token::LParen)?;

    let mut items = Vec::new();

    loop {
        match lexer.next_token()? {
            Token::RParen | Token::Eof => break,
            Token::Atom(name) => match name.to_ascii_uppercase().as_str() {
                "UID" => {
                    lexer.expect_space()?;
                    let n = lexer.read_number()?;
                    let uid = Uid::new(n).ok_or_else(|| Error::Parse {
                        position: lexer.position(),
                        message: "invalid UID value 0".to_string(),
                    })?;
                    items.push(FetchItem::Uid(uid));
                }
                "FLAGS" => {
                    lexer.expect_space()?;
                    items.push(FetchItem::Flags(parse_flag_list(lexer)?));
                }
                "RFC822.SIZE" => {
                    lexer.expect_space()?;
                    items.push(FetchItem::Rfc822Size(lexer.read_number()?));
                }
                "BODY" | "BODY.PEEK" | "RFC822.HEADER" => {
                    let section = parse_section(lexer);
                    lexer.expect_space()?;
                    let data = match lexer.next_token()? {
                        Token::Literal(bytes) => Some(bytes),
                        Token::QuotedString(s) => Some(s.into_bytes()),
                        _ => None,
                    };
                    items.push(FetchItem::Body { section, data });
                }
                _ => skip_fetch_item(lexer)?,
            },
            _ => {}
        }
    }

    Ok(items)
}

/// Reads an optional `[section]` and discards a trailing `<origin>`.
fn parse_section(lexer: &mut Lexer<'_>) -> Option<String> {
    let mut section = None;

    if lexer.peek() == Some(b'[') {
        lexer.advance();
        let mut buf = String::new();
        while let Some(b) = lexer.advance() {
            if b == b']' {
                break;
            }
            buf.push(char::from(b));
        }
        if !buf.is_empty() {
            section = Some(buf);
        }
    }

    if lexer.peek() == Some(b'<') {
        while let Some(b) = lexer.advance() {
            if b == b'>' {
                break;
            }
        }
    }

    section
}

/// Skips the value of an item we do not model.
///
/// Works on tokens so quoted strings and literals containing spaces or
/// parentheses are stepped over whole.
fn skip_fetch_item(lexer: &mut Lexer<'_>) -> Result<()> {
    if lexer.peek() == Some(b' ') {
        lexer.advance();
    }
    if lexer.peek() == Some(b')') {
        return Ok(());
    }

    let mut depth = 0usize;
    loop {
        match lexer.next_token()? {
            Token::LParen => depth += 1,
            Token::RParen => depth = depth.saturating_sub(1),
            Token::Crlf | Token::Eof => return Ok(()),
            _ => {}
        }
        if depth == 0 {
            return Ok(());
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use crate::types::Flag;

    #[test]
    fn test_uid_and_flags() {
        let mut lexer = Lexer::new(b"(UID 123 FLAGS (\\Seen \\Deleted))");
        let items = parse_fetch_response(&mut lexer).unwrap();
        assert_eq!(items[0], FetchItem::Uid(Uid::new(123).unwrap()));
        assert_eq!(items[1], FetchItem::Flags(vec![Flag::Seen, Flag::Deleted]));
    }

    #[test]
    fn test_uid_zero_rejected() {
        let mut lexer = Lexer::new(b"(UID 0)");
        assert!(parse_fetch_response(&mut lexer).is_err());
    }

    #[test]
    fn test_header_fields_literal() {
        let mut lexer =
            Lexer::new(b"(UID 10 BODY[HEADER.FIELDS (SUBJECT)] {20}\r\nSubject: Your bill\r\n)");
        let items = parse_fetch_response(&mut lexer).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(
            items[1],
            FetchItem::Body {
                section: Some("HEADER.FIELDS (SUBJECT)".to_string()),
                data: Some(b"Subject: Your bill\r\n".to_vec()),
            }
        );
    }

    #[test]
    fn test_header_fields_quoted_and_nil() {
        let mut lexer = Lexer::new(b"(BODY[HEADER.FIELDS (SUBJECT)] \"\")");
        let items = parse_fetch_response(&mut lexer).unwrap();
        assert_eq!(
            items[0],
            FetchItem::Body {
                section: Some("HEADER.FIELDS (SUBJECT)".to_string()),
                data: Some(Vec::new()),
            }
        );

        let mut lexer = Lexer::new(b"(BODY[TEXT]<0> NIL)");
        let items = parse_fetch_response(&mut lexer).unwrap();
        assert_eq!(
            items[0],
            FetchItem::Body {
                section: Some("TEXT".to_string()),
                data: None,
            }
        );
    }

    #[test]
    fn test_unknown_items_are_skipped() {
        let mut lexer =
            Lexer::new(b"(INTERNALDATE \"17-Jul-1996 02:44:25 -0700\" X-GM-LABELS (\\Inbox) UID 7)");
        let items = parse_fetch_response(&mut lexer).unwrap();
        assert_eq!(items, vec![FetchItem::Uid(Uid::new(7).unwrap())]);
    }
}
