//! Implementation for the authenticated state.

use tokio::io::{AsyncRead, AsyncWrite};

use super::Client;
use super::states::{Authenticated, Selected};
use crate::Result;
use crate::command::Command;
use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::types::{MailboxStatus, ResponseCode};

impl<S> Client<S, Authenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Selects a mailbox for read-write access.
    ///
    /// Consumes self and returns a selected client on success. A server that
    /// answers `[READ-ONLY]` still yields a selected client; the flag is
    /// reported in the returned status.
    pub async fn select(mut self, mailbox: &str) -> Result<(Client<S, Selected>, MailboxStatus)> {
        let responses = self
            .execute(&Command::Select {
                mailbox: mailbox.to_string(),
            })
            .await?;
        let status = parse_mailbox_status(&responses);

        Ok((self.transition(Selected::new(mailbox)), status))
    }
}

/// Builds the mailbox snapshot from SELECT responses.
pub(super) fn parse_mailbox_status(responses: &[Vec<u8>]) -> MailboxStatus {
    let mut status = MailboxStatus::default();

    for response_bytes in responses {
        match ResponseParser::parse(response_bytes) {
            Ok(Response::Untagged(untagged)) => match untagged {
                UntaggedResponse::Exists(n) => status.exists = n,
                UntaggedResponse::Recent(n) => status.recent = n,
                UntaggedResponse::Ok {
                    code: Some(code), ..
                } => match code {
                    ResponseCode::UidValidity(v) => status.uid_validity = Some(v),
                    ResponseCode::UidNext(v) => status.uid_next = Some(v),
                    ResponseCode::Unseen(v) => status.unseen = Some(v),
                    _ => {}
                },
                _ => {}
            },
            Ok(Response::Tagged {
                code: Some(ResponseCode::ReadOnly),
                ..
            }) => status.read_only = true,
            _ => {}
        }
    }

    status
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
    use crate::types::{SeqNum, Uid, UidValidity};

    fn lines(raw: &[&[u8]]) -> Vec<Vec<u8>> {
        raw.iter().map(|l| l.to_vec()).collect()
    }

    #[test]
    fn test_parse_mailbox_status() {
        let responses = lines(&[
            b"* 172 EXISTS\r\n",
            b"* 1 RECENT\r\n",
            b"* OK [UNSEEN 12] Message 12 is first unseen\r\n",
            b"* OK [UIDVALIDITY 3857529045] UIDs valid\r\n",
            b"* OK [UIDNEXT 4392] Predicted next UID\r\n",
            b"* FLAGS (\\Answered \\Flagged \\Deleted \\Seen \\Draft)\r\n",
            b"A0001 OK [READ-WRITE] SELECT completed\r\n",
        ]);

        let status = parse_mailbox_status(&responses);
        assert_eq!(status.exists, 172);
        assert_eq!(status.recent, 1);
        assert_eq!(status.unseen, SeqNum::new(12));
        assert_eq!(status.uid_validity, UidValidity::new(3857529045));
        assert_eq!(status.uid_next, Uid::new(4392));
        assert!(!status.read_only);
    }

    #[test]
    fn test_parse_mailbox_status_read_only() {
        let responses = lines(&[
            b"* 3 EXISTS\r\n",
            b"A0001 OK [READ-ONLY] SELECT completed\r\n",
        ]);
        assert!(parse_mailbox_status(&responses).read_only);
    }
}
