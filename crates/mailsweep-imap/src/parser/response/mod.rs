//! Response parser.

#![allow(clippy::missing_errors_doc)]

mod fetch;
mod helpers;
mod types;

pub use types::{FetchItem, UntaggedResponse};

use crate::parser::lexer::{Lexer, Token};
use crate::types::{ResponseCode, SeqNum, Status, Tag};
use crate::{Error, Result};

use helpers::{
    parse_capability_data, parse_flag_list, parse_response_code, parse_search_response,
    read_text_until_crlf,
};

/// A parsed server response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Command completion.
    Tagged {
        /// The command tag.
        tag: Tag,
        /// Completion status.
        status: Status,
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// Server data.
    Untagged(UntaggedResponse),
    /// Continuation request; the text is the raw (often base64) payload.
    Continuation {
        /// Optional text after `+ `.
        text: Option<String>,
    },
}

/// Response parser.
pub struct ResponseParser;

impl ResponseParser {
    /// Parses one complete framed response.
    pub fn parse(input: &[u8]) -> Result<Response> {
        let mut lexer = Lexer::new(input);

        match lexer.next_token()? {
            Token::Asterisk => Self::parse_untagged(&mut lexer),
            Token::Plus => Ok(Self::parse_continuation(&mut lexer)),
            Token::Atom(tag) => Self::parse_tagged(&mut lexer, tag),
            token => Err(Error::Parse {
                position: 0,
                message: format!("Expected *, +, or tag, got {token:?}"),
            }),
        }
    }

    fn parse_tagged(lexer: &mut Lexer<'_>, tag: &str) -> Result<Response> {
        lexer.expect_space()?;
        let status = Self::parse_status(lexer)?;
        let (code, text) = Self::parse_resp_text(lexer)?;

        Ok(Response::Tagged {
            tag: Tag::new(tag),
            status,
            code,
            text,
        })
    }

    fn parse_untagged(lexer: &mut Lexer<'_>) -> Result<Response> {
        lexer.expect_space()?;

        let untagged = match lexer.next_token()? {
            Token::Atom(keyword) => match keyword.to_ascii_uppercase().as_str() {
                "OK" => {
                    let (code, text) = Self::parse_resp_text(lexer)?;
                    UntaggedResponse::Ok { code, text }
                }
                "NO" => {
                    let (code, text) = Self::parse_resp_text(lexer)?;
                    UntaggedResponse::No { code, text }
                }
                "BAD" => {
                    let (code, text) = Self::parse_resp_text(lexer)?;
                    UntaggedResponse::Bad { code, text }
                }
                "PREAUTH" => {
                    let (code, text) = Self::parse_resp_text(lexer)?;
                    UntaggedResponse::PreAuth { code, text }
                }
                "BYE" => {
                    let (code, text) = Self::parse_resp_text(lexer)?;
                    UntaggedResponse::Bye { code, text }
                }
                "CAPABILITY" => UntaggedResponse::Capability(parse_capability_data(lexer)?),
                "FLAGS" => {
                    lexer.expect_space()?;
                    UntaggedResponse::Flags(parse_flag_list(lexer)?)
                }
                "SEARCH" => UntaggedResponse::Search(parse_search_response(lexer)?),
                _ => {
                    return Err(Error::Parse {
                        position: lexer.position(),
                        message: format!("Unknown untagged response: {keyword}"),
                    });
                }
            },
            Token::Number(n) => {
                lexer.expect_space()?;
                let keyword = lexer.read_atom_string()?;
                match keyword.to_ascii_uppercase().as_str() {
                    "EXISTS" => UntaggedResponse::Exists(n),
                    "RECENT" => UntaggedResponse::Recent(n),
                    "EXPUNGE" => UntaggedResponse::Expunge(Self::seq(lexer, n)?),
                    "FETCH" => {
                        let seq = Self::seq(lexer, n)?;
                        lexer.expect_space()?;
                        let items = fetch::parse_fetch_response(lexer)?;
                        UntaggedResponse::Fetch { seq, items }
                    }
                    _ => {
                        return Err(Error::Parse {
                            position: lexer.position(),
                            message: format!("Unknown message data: {keyword}"),
                        });
                    }
                }
            }
            token => {
                return Err(Error::Parse {
                    position: lexer.position(),
                    message: format!("Unexpected token in untagged response: {token:?}"),
                });
            }
        };

        Ok(Response::Untagged(untagged))
    }

    fn seq(lexer: &Lexer<'_>, n: u32) -> Result<SeqNum> {
        SeqNum::new(n).ok_or_else(|| Error::Parse {
            position: lexer.position(),
            message: "Invalid sequence number 0".to_string(),
        })
    }

    fn parse_continuation(lexer: &mut Lexer<'_>) -> Response {
        if lexer.peek() == Some(b' ') {
            lexer.advance();
        }
        let text = read_text_until_crlf(lexer);

        Response::Continuation {
            text: (!text.is_empty()).then_some(text),
        }
    }

    fn parse_status(lexer: &mut Lexer<'_>) -> Result<Status> {
        let s = lexer.read_atom_string()?;
        match s.to_ascii_uppercase().as_str() {
            "OK" => Ok(Status::Ok),
            "NO" => Ok(Status::No),
            "BAD" => Ok(Status::Bad),
            "PREAUTH" => Ok(Status::PreAuth),
            "BYE" => Ok(Status::Bye),
            _ => Err(Error::Parse {
                position: lexer.position(),
                message: format!("Invalid status: {s}"),
            }),
        }
    }

    /// Parses `[code] text`. The space before the text is optional since
    /// some servers send a bare `A0001 OK\r\n`.
    fn parse_resp_text(lexer: &mut Lexer<'_>) -> Result<(Option<ResponseCode>, String)> {
        if lexer.peek() == Some(b' ') {
            lexer.advance();
        }

        let code = if lexer.peek() == Some(b'[') {
            Some(parse_response_code(lexer)?)
        } else {
            None
        };

        if lexer.peek() == Some(b' ') {
            lexer.advance();
        }

        Ok((code, read_text_until_crlf(lexer)))
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
    use crate::types::{Capability, Flag, Uid};

    #[test]
    fn test_parse_greeting_with_capabilities() {
        let input = b"* OK [CAPABILITY IMAP4rev1 AUTH=XOAUTH2 SASL-IR] Outlook ready\r\n";
        match ResponseParser::parse(input).unwrap() {
            Response::Untagged(UntaggedResponse::Ok {
                code: Some(ResponseCode::Capability(caps)),
                text,
            }) => {
                assert!(caps.contains(&Capability::SaslIr));
                assert!(caps.iter().any(|c| c.is_auth("XOAUTH2")));
                assert_eq!(text, "Outlook ready");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_parse_tagged_ok() {
        let response = ResponseParser::parse(b"A0001 OK AUTHENTICATE completed.\r\n").unwrap();
        assert_eq!(
            response,
            Response::Tagged {
                tag: Tag::new("A0001"),
                status: Status::Ok,
                code: None,
                text: "AUTHENTICATE completed.".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_tagged_without_text() {
        match ResponseParser::parse(b"A0004 OK\r\n").unwrap() {
            Response::Tagged { status, text, .. } => {
                assert_eq!(status, Status::Ok);
                assert!(text.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_parse_tagged_no_lowercase() {
        match ResponseParser::parse(b"A0002 no invalid credentials\r\n").unwrap() {
            Response::Tagged { status, text, .. } => {
                assert_eq!(status, Status::No);
                assert_eq!(text, "invalid credentials");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_parse_tagged_read_write_code() {
        match ResponseParser::parse(b"A0001 OK [READ-WRITE] SELECT completed.\r\n").unwrap() {
            Response::Tagged { code, text, .. } => {
                assert_eq!(code, Some(ResponseCode::ReadWrite));
                assert_eq!(text, "SELECT completed.");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_parse_continuation() {
        assert_eq!(
            ResponseParser::parse(b"+ eyJzdGF0dXMiOiI0MDEifQ==\r\n").unwrap(),
            Response::Continuation {
                text: Some("eyJzdGF0dXMiOiI0MDEifQ==".to_string())
            }
        );
        assert_eq!(
            ResponseParser::parse(b"+\r\n").unwrap(),
            Response::Continuation { text: None }
        );
    }

    #[test]
    fn test_parse_exists_and_expunge() {
        assert_eq!(
            ResponseParser::parse(b"* 23 EXISTS\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Exists(23))
        );
        assert_eq!(
            ResponseParser::parse(b"* 4 EXPUNGE\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Expunge(SeqNum::new(4).unwrap()))
        );
    }

    #[test]
    fn test_parse_flags() {
        let input = b"* FLAGS (\\Seen \\Answered \\Flagged \\Deleted \\Draft $MDNSent)\r\n";
        match ResponseParser::parse(input).unwrap() {
            Response::Untagged(UntaggedResponse::Flags(flags)) => {
                assert!(flags.contains(&Flag::Deleted));
                assert!(flags.contains(&Flag::Keyword("$MDNSent".to_string())));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_parse_search() {
        assert_eq!(
            ResponseParser::parse(b"* SEARCH 10 11\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Search(vec![10, 11]))
        );
        assert_eq!(
            ResponseParser::parse(b"* SEARCH\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Search(vec![]))
        );
    }

    #[test]
    fn test_parse_fetch_with_literal() {
        let input = b"* 3 FETCH (UID 10 BODY[HEADER.FIELDS (SUBJECT)] {16}\r\nSubject: Promo\r\n)\r\n";
        match ResponseParser::parse(input).unwrap() {
            Response::Untagged(UntaggedResponse::Fetch { seq, items }) => {
                assert_eq!(seq.get(), 3);
                assert_eq!(items[0].as_uid(), Uid::new(10));
                assert!(matches!(
                    &items[1],
                    FetchItem::Body { data: Some(d), .. } if d.as_slice() == b"Subject: Promo\r\n"
                ));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_parse_bye() {
        match ResponseParser::parse(b"* BYE Session expired\r\n").unwrap() {
            Response::Untagged(UntaggedResponse::Bye { text, .. }) => {
                assert_eq!(text, "Session expired");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unknown_untagged_is_error() {
        assert!(ResponseParser::parse(b"* LIST (\\HasNoChildren) \"/\" Inbox\r\n").is_err());
    }
}
