//! Parser helper functions.

use crate::parser::lexer::{Lexer, Token};
use crate::types::{Capability, Flag, ResponseCode, SeqNum, Uid, UidValidity};
use crate::{Error, Result};

fn nonzero<T>(lexer: &Lexer<'_>, value: Option<T>, what: &str) -> Result<T> {
    value.ok_or_else(|| Error::Parse {
        position: lexer.position(),
        message: format!("Invalid {what} 0"),
    })
}

/// Parses a bracketed response code.
pub fn parse_response_code(lexer: &mut Lexer<'_>) -> Result<ResponseCode> {
    lexer.expect(Token::LBracket)?;

    let atom = lexer.read_atom_string()?;
    let code = match atom.to_ascii_uppercase().as_str() {
        "ALERT" => ResponseCode::Alert,
        "PARSE" => ResponseCode::Parse,
        "READ-ONLY" => ResponseCode::ReadOnly,
        "READ-WRITE" => ResponseCode::ReadWrite,
        "TRYCREATE" => ResponseCode::TryCreate,
        "UIDNEXT" => {
            lexer.expect_space()?;
            let n = lexer.read_number()?;
            ResponseCode::UidNext(nonzero(lexer, Uid::new(n), "UID")?)
        }
        "UIDVALIDITY" => {
            lexer.expect_space()?;
            let n = lexer.read_number()?;
            ResponseCode::UidValidity(nonzero(lexer, UidValidity::new(n), "UIDVALIDITY")?)
        }
        "UNSEEN" => {
            lexer.expect_space()?;
            let n = lexer.read_number()?;
            ResponseCode::Unseen(nonzero(lexer, SeqNum::new(n), "sequence number")?)
        }
        "CAPABILITY" => ResponseCode::Capability(parse_capability_data(lexer)?),
        "PERMANENTFLAGS" => {
            lexer.expect_space()?;
            ResponseCode::PermanentFlags(parse_flag_list(lexer)?)
        }
        _ => ResponseCode::Unknown(atom.to_string()),
    };

    // Unknown codes may carry arguments we do not model.
    while lexer.peek() != Some(b']') && !lexer.is_eof() {
        lexer.advance();
    }
    lexer.expect(Token::RBracket)?;

    Ok(code)
}

/// Parses space-separated capability atoms.
pub fn parse_capability_data(lexer: &mut Lexer<'_>) -> Result<Vec<Capability>> {
    let mut caps = Vec::new();

    while lexer.peek() == Some(b' ') {
        lexer.advance();
        if let Token::Atom(s) = lexer.next_token()? {
            caps.push(Capability::parse(s));
        }
    }

    Ok(caps)
}

/// Parses a parenthesized flag list.
pub fn parse_flag_list(lexer: &mut Lexer<'_>) -> Result<Vec<Flag>> {
    lexer.expect(Token::LParen)?;

    let mut flags = Vec::new();
    loop {
        match lexer.next_token()? {
            Token::RParen => break,
            Token::Atom(s) => flags.push(Flag::parse(s)),
            // `\*` lexes as `\` followed by an asterisk
            Token::Space | Token::Asterisk => {}
            token => {
                return Err(Error::Parse {
                    position: lexer.position(),
                    message: format!("Unexpected token in flag list: {token:?}"),
                });
            }
        }
    }

    Ok(flags)
}

/// Parses the numbers of a SEARCH response.
pub fn parse_search_response(lexer: &mut Lexer<'_>) -> Result<Vec<u32>> {
    let mut nums = Vec::new();

    while lexer.peek() == Some(b' ') {
        lexer.advance();
        match lexer.next_token()? {
            Token::Number(n) if n > 0 => nums.push(n),
            // Outlook sometimes ends the list with a trailing space
            Token::Crlf | Token::Eof => break,
            _ => {}
        }
    }

    Ok(nums)
}

/// Reads text until CRLF, lossily decoded.
pub fn read_text_until_crlf(lexer: &mut Lexer<'_>) -> String {
    let remaining = lexer.remaining();
    let end = remaining
        .windows(2)
        .position(|w| w == b"\r\n")
        .unwrap_or(remaining.len());

    lexer.skip(end + 2);
    String::from_utf8_lossy(&remaining[..end]).into_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_uidvalidity_code() {
        let mut lexer = Lexer::new(b"[UIDVALIDITY 14]");
        assert_eq!(
            parse_response_code(&mut lexer).unwrap(),
            ResponseCode::UidValidity(UidValidity::new(14).unwrap())
        );
    }

    #[test]
    fn test_unknown_code_with_arguments() {
        let mut lexer = Lexer::new(b"[HIGHESTMODSEQ 9000] rest");
        assert_eq!(
            parse_response_code(&mut lexer).unwrap(),
            ResponseCode::Unknown("HIGHESTMODSEQ".to_string())
        );
        assert_eq!(lexer.remaining(), b" rest");
    }

    #[test]
    fn test_permanent_flags_with_wildcard() {
        let mut lexer = Lexer::new(b"[PERMANENTFLAGS (\\Deleted \\Seen \\*)]");
        match parse_response_code(&mut lexer).unwrap() {
            ResponseCode::PermanentFlags(flags) => {
                assert!(flags.contains(&Flag::Deleted));
                assert!(flags.contains(&Flag::Seen));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_search_numbers() {
        let mut lexer = Lexer::new(b" 10 11 \r\n");
        assert_eq!(parse_search_response(&mut lexer).unwrap(), vec![10, 11]);

        let mut lexer = Lexer::new(b"\r\n");
        assert!(parse_search_response(&mut lexer).unwrap().is_empty());
    }

    #[test]
    fn test_read_text_until_crlf() {
        let mut lexer = Lexer::new(b"LOGIN completed\r\n");
        assert_eq!(read_text_until_crlf(&mut lexer), "LOGIN completed");
        assert!(lexer.is_eof());
    }
}
