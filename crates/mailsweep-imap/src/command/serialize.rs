//! Wire encoding of command arguments.

use super::types::{FetchAttribute, SearchCriteria, StoreAction};

/// Writes an astring: an atom when possible, a quoted string otherwise.
pub fn write_astring(buf: &mut Vec<u8>, s: &str) {
    if s.is_empty() || s.bytes().any(needs_quoting) {
        write_quoted(buf, s);
    } else {
        buf.extend_from_slice(s.as_bytes());
    }
}

/// Writes a quoted string, escaping `"` and `\`.
pub fn write_quoted(buf: &mut Vec<u8>, s: &str) {
    buf.push(b'"');
    for b in s.bytes() {
        if b == b'"' || b == b'\\' {
            buf.push(b'\\');
        }
        buf.push(b);
    }
    buf.push(b'"');
}

/// Literal bookkeeping for one command.
///
/// With `non_sync` set, literals go out as `{n+}` (RFC 7888). Otherwise each
/// `{n}\r\n` offset is recorded in `waits`; the sender must wait for a `+`
/// continuation there before sending the rest.
#[derive(Debug, Default)]
pub struct Literals {
    /// Server advertised LITERAL+.
    pub non_sync: bool,
    /// Offsets just past each synchronizing literal's marker.
    pub waits: Vec<usize>,
}

/// Writes a search string: quoted when 7-bit, a literal otherwise.
///
/// Quoted strings may not carry 8-bit text or line breaks, so anything
/// outside ASCII, like a sender named `Telefónica`, is sent as a literal.
pub fn write_search_string(buf: &mut Vec<u8>, s: &str, literals: &mut Literals) {
    if !s.bytes().any(needs_literal) {
        write_quoted(buf, s);
        return;
    }

    let marker = if literals.non_sync {
        format!("{{{}+}}\r\n", s.len())
    } else {
        format!("{{{}}}\r\n", s.len())
    };
    buf.extend_from_slice(marker.as_bytes());
    if !literals.non_sync {
        literals.waits.push(buf.len());
    }
    buf.extend_from_slice(s.as_bytes());
}

const fn needs_literal(b: u8) -> bool {
    b >= 0x80 || b == b'\r' || b == b'\n'
}

const fn needs_quoting(b: u8) -> bool {
    matches!(
        b,
        b' ' | b'"' | b'\\' | b'(' | b')' | b'{' | b'%' | b'*' | b']'
    ) || b < 0x20
        || b >= 0x7F
}

/// Writes a parenthesized FETCH item list.
///
/// Always parenthesized, even for a single item; some servers reject a bare
/// `BODY.PEEK[...]`.
pub fn write_fetch_attributes(buf: &mut Vec<u8>, items: &[FetchAttribute]) {
    buf.push(b'(');
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            buf.push(b' ');
        }
        match item {
            FetchAttribute::HeaderFields { fields, peek } => {
                if *peek {
                    buf.extend_from_slice(b"BODY.PEEK[HEADER.FIELDS (");
                } else {
                    buf.extend_from_slice(b"BODY[HEADER.FIELDS (");
                }
                for (j, field) in fields.iter().enumerate() {
                    if j > 0 {
                        buf.push(b' ');
                    }
                    write_astring(buf, &field.to_ascii_uppercase());
                }
                buf.extend_from_slice(b")]");
            }
        }
    }
    buf.push(b')');
}

/// Writes a STORE action.
///
/// A single flag goes out bare (`+FLAGS \Deleted`), several as a list.
pub fn write_store_action(buf: &mut Vec<u8>, action: &StoreAction) {
    let StoreAction::AddFlags(flags) = action;
    buf.extend_from_slice(b"+FLAGS ");

    if let [flag] = flags.as_slice() {
        buf.extend_from_slice(flag.as_str().as_bytes());
        return;
    }
    buf.push(b'(');
    for (i, flag) in flags.iter().enumerate() {
        if i > 0 {
            buf.push(b' ');
        }
        buf.extend_from_slice(flag.as_str().as_bytes());
    }
    buf.push(b')');
}

/// Writes SEARCH criteria, without the surrounding parentheses.
///
/// Text arguments are never sent as atoms so names with spaces survive
/// intact.
pub fn write_search_criteria(
    buf: &mut Vec<u8>,
    criteria: &SearchCriteria,
    literals: &mut Literals,
) {
    match criteria {
        SearchCriteria::All => buf.extend_from_slice(b"ALL"),
        SearchCriteria::From(s) => {
            buf.extend_from_slice(b"FROM ");
            write_search_string(buf, s, literals);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Flag;

    fn render(f: impl FnOnce(&mut Vec<u8>)) -> String {
        let mut buf = Vec::new();
        f(&mut buf);
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_astring_quotes_only_when_needed() {
        assert_eq!(render(|b| write_astring(b, "INBOX")), "INBOX");
        assert_eq!(render(|b| write_astring(b, "Junk Email")), "\"Junk Email\"");
        assert_eq!(render(|b| write_astring(b, "")), "\"\"");
    }

    #[test]
    fn test_quoted_escapes() {
        assert_eq!(
            render(|b| write_quoted(b, r#"say "hi" \o/"#)),
            r#""say \"hi\" \\o/""#
        );
    }

    fn criteria(c: &SearchCriteria, literals: &mut Literals) -> String {
        render(|b| write_search_criteria(b, c, literals))
    }

    #[test]
    fn test_search_criteria() {
        let mut literals = Literals::default();
        assert_eq!(
            criteria(&SearchCriteria::from_sender("Netflix"), &mut literals),
            "FROM \"Netflix\""
        );
        assert_eq!(
            criteria(&SearchCriteria::from_sender("Deep \"Blue\""), &mut literals),
            "FROM \"Deep \\\"Blue\\\"\""
        );
        assert_eq!(criteria(&SearchCriteria::All, &mut literals), "ALL");
        assert!(literals.waits.is_empty());
    }

    #[test]
    fn test_eight_bit_search_text_is_a_literal() {
        let sender = SearchCriteria::from_sender("Telefónica");

        let mut sync = Literals::default();
        assert_eq!(criteria(&sender, &mut sync), "FROM {11}\r\nTelefónica");
        assert_eq!(sync.waits, [11]);

        let mut non_sync = Literals {
            non_sync: true,
            ..Literals::default()
        };
        assert_eq!(criteria(&sender, &mut non_sync), "FROM {11+}\r\nTelefónica");
        assert!(non_sync.waits.is_empty());
    }

    #[test]
    fn test_line_break_forces_literal() {
        let mut literals = Literals::default();
        let text = criteria(&SearchCriteria::from_sender("a\r\nb"), &mut literals);
        assert_eq!(text, "FROM {4}\r\na\r\nb");
    }

    #[test]
    fn test_fetch_attributes_always_parenthesized() {
        let items = [FetchAttribute::peek_header_fields(["Subject"])];
        assert_eq!(
            render(|b| write_fetch_attributes(b, &items)),
            "(BODY.PEEK[HEADER.FIELDS (SUBJECT)])"
        );
        let items = [FetchAttribute::peek_header_fields(["from", "subject"])];
        assert_eq!(
            render(|b| write_fetch_attributes(b, &items)),
            "(BODY.PEEK[HEADER.FIELDS (FROM SUBJECT)])"
        );
    }

    #[test]
    fn test_store_action_forms() {
        let single = StoreAction::AddFlags(vec![Flag::Deleted]);
        assert_eq!(
            render(|b| write_store_action(b, &single)),
            "+FLAGS \\Deleted"
        );
        let many = StoreAction::AddFlags(vec![Flag::Deleted, Flag::Seen]);
        assert_eq!(
            render(|b| write_store_action(b, &many)),
            "+FLAGS (\\Deleted \\Seen)"
        );
    }
}
