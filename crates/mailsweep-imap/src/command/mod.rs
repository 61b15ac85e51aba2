//! IMAP commands and their wire encoding.

mod serialize;
mod tag_generator;
mod types;

use crate::types::Uid;

pub use tag_generator::TagGenerator;
pub use types::{FetchAttribute, SearchCriteria, StoreAction};

use serialize::{
    Literals, write_astring, write_fetch_attributes, write_search_criteria, write_store_action,
};

/// IMAP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// NOOP, used as the liveness probe.
    Noop,
    /// LOGOUT
    Logout,
    /// AUTHENTICATE with an optional SASL initial response (RFC 4959).
    Authenticate {
        /// SASL mechanism name.
        mechanism: String,
        /// Base64 initial response.
        initial_response: Option<String>,
    },
    /// SELECT (read-write).
    Select {
        /// Mailbox name.
        mailbox: String,
    },
    /// CLOSE: deselect, silently expunging `\Deleted` messages.
    Close,
    /// EXPUNGE
    Expunge,
    /// UID SEARCH with an optional CHARSET.
    UidSearch {
        /// Criteria, sent parenthesized.
        criteria: SearchCriteria,
        /// Character set of the criteria strings.
        charset: Option<String>,
    },
    /// UID FETCH for a single message.
    UidFetch {
        /// Message UID.
        uid: Uid,
        /// Data items, sent parenthesized.
        items: Vec<FetchAttribute>,
    },
    /// UID STORE for a single message.
    UidStore {
        /// Message UID.
        uid: Uid,
        /// Flag change.
        action: StoreAction,
    },
}

impl Command {
    /// Serializes the command with the given tag, CRLF included.
    ///
    /// Any literal is written in the non-synchronizing `{n+}` form; use
    /// [`Command::encode`] for servers without LITERAL+.
    #[must_use]
    pub fn serialize(&self, tag: &str) -> Vec<u8> {
        let mut literals = Literals {
            non_sync: true,
            ..Literals::default()
        };
        self.write(tag, &mut literals)
    }

    /// Serializes the command, split at each synchronizing literal.
    ///
    /// Every part but the last ends in `{n}\r\n`, and the server's `+`
    /// continuation must arrive before the next part is sent. With
    /// `literal_plus` the result is always a single part.
    #[must_use]
    pub fn encode(&self, tag: &str, literal_plus: bool) -> Vec<Vec<u8>> {
        let mut literals = Literals {
            non_sync: literal_plus,
            ..Literals::default()
        };
        let buf = self.write(tag, &mut literals);

        let mut parts = Vec::with_capacity(literals.waits.len() + 1);
        let mut start = 0;
        for end in literals.waits {
            parts.push(buf[start..end].to_vec());
            start = end;
        }
        parts.push(buf[start..].to_vec());
        parts
    }

    fn write(&self, tag: &str, literals: &mut Literals) -> Vec<u8> {
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(tag.as_bytes());
        buf.push(b' ');

        match self {
            Self::Noop => buf.extend_from_slice(b"NOOP"),
            Self::Logout => buf.extend_from_slice(b"LOGOUT"),
            Self::Authenticate {
                mechanism,
                initial_response,
            } => {
                buf.extend_from_slice(b"AUTHENTICATE ");
                buf.extend_from_slice(mechanism.as_bytes());
                if let Some(ir) = initial_response {
                    buf.push(b' ');
                    // RFC 4959: a zero-length initial response is sent as "="
                    if ir.is_empty() {
                        buf.push(b'=');
                    } else {
                        buf.extend_from_slice(ir.as_bytes());
                    }
                }
            }
            Self::Select { mailbox } => {
                buf.extend_from_slice(b"SELECT ");
                write_astring(&mut buf, mailbox);
            }
            Self::Close => buf.extend_from_slice(b"CLOSE"),
            Self::Expunge => buf.extend_from_slice(b"EXPUNGE"),
            Self::UidSearch { criteria, charset } => {
                buf.extend_from_slice(b"UID SEARCH ");
                if let Some(charset) = charset {
                    buf.extend_from_slice(b"CHARSET ");
                    write_astring(&mut buf, charset);
                    buf.push(b' ');
                }
                buf.push(b'(');
                write_search_criteria(&mut buf, criteria, literals);
                buf.push(b')');
            }
            Self::UidFetch { uid, items } => {
                buf.extend_from_slice(format!("UID FETCH {uid} ").as_bytes());
                write_fetch_attributes(&mut buf, items);
            }
            Self::UidStore { uid, action } => {
                buf.extend_from_slice(format!("UID STORE {uid} ").as_bytes());
                write_store_action(&mut buf, action);
            }
        }

        buf.extend_from_slice(b"\r\n");
        buf
    }
}

/// A client continuation line: the data followed by CRLF.
#[must_use]
pub fn continuation(data: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(data.len() + 2);
    buf.extend_from_slice(data.as_bytes());
    buf.extend_from_slice(b"\r\n");
    buf
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

    fn wire(cmd: &Command, tag: &str) -> String {
        String::from_utf8(cmd.serialize(tag)).unwrap()
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(wire(&Command::Noop, "A0003"), "A0003 NOOP\r\n");
        assert_eq!(wire(&Command::Logout, "A0004"), "A0004 LOGOUT\r\n");
        assert_eq!(wire(&Command::Expunge, "A0005"), "A0005 EXPUNGE\r\n");
        assert_eq!(wire(&Command::Close, "A0006"), "A0006 CLOSE\r\n");
    }

    #[test]
    fn test_authenticate_forms() {
        let bare = Command::Authenticate {
            mechanism: "XOAUTH2".into(),
            initial_response: None,
        };
        assert_eq!(wire(&bare, "A0000"), "A0000 AUTHENTICATE XOAUTH2\r\n");

        let with_ir = Command::Authenticate {
            mechanism: "XOAUTH2".into(),
            initial_response: Some("dXNlcj0=".into()),
        };
        assert_eq!(
            wire(&with_ir, "A0000"),
            "A0000 AUTHENTICATE XOAUTH2 dXNlcj0=\r\n"
        );

        let empty_ir = Command::Authenticate {
            mechanism: "XOAUTH2".into(),
            initial_response: Some(String::new()),
        };
        assert_eq!(wire(&empty_ir, "A0000"), "A0000 AUTHENTICATE XOAUTH2 =\r\n");
    }

    #[test]
    fn test_select() {
        let cmd = Command::Select {
            mailbox: "Inbox".into(),
        };
        assert_eq!(wire(&cmd, "A0001"), "A0001 SELECT Inbox\r\n");

        let cmd = Command::Select {
            mailbox: "Deleted Items".into(),
        };
        assert_eq!(wire(&cmd, "A0001"), "A0001 SELECT \"Deleted Items\"\r\n");
    }

    #[test]
    fn test_uid_search_with_and_without_charset() {
        let criteria = SearchCriteria::from_sender("Netflix");
        let utf8 = Command::UidSearch {
            criteria: criteria.clone(),
            charset: Some("UTF-8".into()),
        };
        assert_eq!(
            wire(&utf8, "A0002"),
            "A0002 UID SEARCH CHARSET UTF-8 (FROM \"Netflix\")\r\n"
        );

        let plain = Command::UidSearch {
            criteria,
            charset: None,
        };
        assert_eq!(wire(&plain, "A0003"), "A0003 UID SEARCH (FROM \"Netflix\")\r\n");

        let all = Command::UidSearch {
            criteria: SearchCriteria::All,
            charset: None,
        };
        assert_eq!(wire(&all, "A0004"), "A0004 UID SEARCH (ALL)\r\n");
    }

    #[test]
    fn test_uid_search_non_ascii_sender() {
        let cmd = Command::UidSearch {
            criteria: SearchCriteria::from_sender("Telefónica"),
            charset: Some("UTF-8".into()),
        };
        assert_eq!(
            wire(&cmd, "A0002"),
            "A0002 UID SEARCH CHARSET UTF-8 (FROM {11+}\r\nTelefónica)\r\n"
        );

        let parts = cmd.encode("A0002", false);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], b"A0002 UID SEARCH CHARSET UTF-8 (FROM {11}\r\n");
        assert_eq!(parts[1], "Telefónica)\r\n".as_bytes());
    }

    #[test]
    fn test_encode_without_literals_is_one_part() {
        let cmd = Command::UidSearch {
            criteria: SearchCriteria::from_sender("Netflix"),
            charset: Some("UTF-8".into()),
        };
        assert_eq!(cmd.encode("A0002", false), vec![cmd.serialize("A0002")]);
        assert_eq!(cmd.encode("A0002", true), vec![cmd.serialize("A0002")]);
    }

    #[test]
    fn test_uid_fetch_subject() {
        let cmd = Command::UidFetch {
            uid: Uid::new(10).unwrap(),
            items: vec![FetchAttribute::peek_header_fields(["SUBJECT"])],
        };
        assert_eq!(
            wire(&cmd, "A0005"),
            "A0005 UID FETCH 10 (BODY.PEEK[HEADER.FIELDS (SUBJECT)])\r\n"
        );
    }

    #[test]
    fn test_uid_store_deleted() {
        let cmd = Command::UidStore {
            uid: Uid::new(10).unwrap(),
            action: StoreAction::AddFlags(vec![Flag::Deleted]),
        };
        assert_eq!(wire(&cmd, "A0006"), "A0006 UID STORE 10 +FLAGS \\Deleted\r\n");
    }

    #[test]
    fn test_continuation_line() {
        assert_eq!(continuation("dXNlcj0="), b"dXNlcj0=\r\n".to_vec());
        assert_eq!(continuation(""), b"\r\n".to_vec());
    }
}
