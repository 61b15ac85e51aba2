//! Implementation for the selected state.
//!
//! Every message-addressing command here is the UID form; sequence numbers
//! shift under EXPUNGE and are never used across requests.

use tokio::io::{AsyncRead, AsyncWrite};

use super::Client;
use super::states::Selected;
use crate::Result;
use crate::command::{Command, FetchAttribute, SearchCriteria, StoreAction};
use crate::parser::{FetchItem, Response, ResponseParser, UntaggedResponse};
use crate::types::{SeqNum, Uid};

impl<S> Client<S, Selected>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns the selected mailbox.
    #[must_use]
    pub fn mailbox(&self) -> &str {
        self.state.mailbox()
    }

    /// Runs `UID SEARCH`, optionally declaring a CHARSET.
    ///
    /// Returns UIDs in the order the server listed them.
    pub async fn uid_search(
        &mut self,
        criteria: &SearchCriteria,
        charset: Option<&str>,
    ) -> Result<Vec<Uid>> {
        let responses = self
            .execute(&Command::UidSearch {
                criteria: criteria.clone(),
                charset: charset.map(str::to_string),
            })
            .await?;

        let mut uids = Vec::new();
        for response_bytes in &responses {
            if let Ok(Response::Untagged(UntaggedResponse::Search(ids))) =
                ResponseParser::parse(response_bytes)
            {
                uids.extend(ids.into_iter().filter_map(Uid::new));
            }
        }

        Ok(uids)
    }

    /// Fetches data items for one message by UID.
    ///
    /// Returns a vector of (sequence number, fetch items) pairs. Servers may
    /// interleave unsolicited FETCH responses for other messages.
    pub async fn uid_fetch(
        &mut self,
        uid: Uid,
        items: Vec<FetchAttribute>,
    ) -> Result<Vec<(SeqNum, Vec<FetchItem>)>> {
        let responses = self.execute(&Command::UidFetch { uid, items }).await?;

        let mut results = Vec::new();
        for response_bytes in &responses {
            if let Ok(Response::Untagged(UntaggedResponse::Fetch { seq, items })) =
                ResponseParser::parse(response_bytes)
            {
                results.push((seq, items));
            }
        }

        Ok(results)
    }

    /// Fetches the named header fields of one message without setting `\Seen`.
    ///
    /// Returns the raw header block, or `None` if the server sent no body
    /// data for the UID (for example because it was already expunged).
    pub async fn uid_fetch_header_fields(
        &mut self,
        uid: Uid,
        fields: &[&str],
    ) -> Result<Option<Vec<u8>>> {
        let fetched = self
            .uid_fetch(uid, vec![FetchAttribute::peek_header_fields(fields.iter().copied())])
            .await?;

        Ok(select_header_block(fetched, uid))
    }

    /// Runs `UID STORE` for one message.
    pub async fn uid_store(&mut self, uid: Uid, action: StoreAction) -> Result<()> {
        self.execute(&Command::UidStore { uid, action }).await?;
        Ok(())
    }

    /// Permanently removes messages marked `\Deleted`.
    ///
    /// Returns the sequence numbers the server reported as expunged.
    pub async fn expunge(&mut self) -> Result<Vec<SeqNum>> {
        let responses = self.execute(&Command::Expunge).await?;

        let mut expunged = Vec::new();
        for response_bytes in &responses {
            if let Ok(Response::Untagged(UntaggedResponse::Expunge(seq))) =
                ResponseParser::parse(response_bytes)
            {
                expunged.push(seq);
            }
        }

        Ok(expunged)
    }
}

/// Picks the header block for `uid` out of a FETCH result.
///
/// Prefers the response whose UID item matches; falls back to the first
/// response carrying body data.
fn select_header_block(fetched: Vec<(SeqNum, Vec<FetchItem>)>, uid: Uid) -> Option<Vec<u8>> {
    let body_of = |items: Vec<FetchItem>| {
        items.into_iter().find_map(|item| match item {
            FetchItem::Body { data, .. } => data,
            _ => None,
        })
    };

    let (matching, others): (Vec<_>, Vec<_>) = fetched
        .into_iter()
        .map(|(_, items)| items)
        .partition(|items| items.iter().any(|i| i.as_uid() == Some(uid)));

    matching
        .into_iter()
        .chain(others)
        .find_map(body_of)
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
    use crate::types::{Capability, Flag};
    use tokio_test::io::Builder;

    fn seq(n: u32) -> SeqNum {
        SeqNum::new(n).unwrap()
    }

    fn uid(n: u32) -> Uid {
        Uid::new(n).unwrap()
    }

    fn body(bytes: &[u8]) -> FetchItem {
        FetchItem::Body {
            section: Some("HEADER.FIELDS (SUBJECT)".into()),
            data: Some(bytes.to_vec()),
        }
    }

    fn selected_client(mock: tokio_test::io::Mock) -> Client<tokio_test::io::Mock, Selected> {
        Client {
            stream: crate::connection::framed::FramedStream::new(mock),
            tag_gen: crate::command::TagGenerator::default(),
            capabilities: Vec::new(),
            state: Selected::new("Inbox"),
        }
    }

    #[test]
    fn test_select_header_block_prefers_matching_uid() {
        let fetched = vec![
            (seq(1), vec![FetchItem::Uid(uid(9)), body(b"Subject: other\r\n\r\n")]),
            (seq(2), vec![FetchItem::Uid(uid(10)), body(b"Subject: mine\r\n\r\n")]),
        ];
        assert_eq!(
            select_header_block(fetched, uid(10)).unwrap(),
            b"Subject: mine\r\n\r\n"
        );
    }

    #[test]
    fn test_select_header_block_without_uid_item() {
        let fetched = vec![(seq(4), vec![body(b"Subject: x\r\n\r\n")])];
        assert!(select_header_block(fetched, uid(10)).is_some());
        assert!(select_header_block(Vec::new(), uid(10)).is_none());
    }

    #[tokio::test]
    async fn test_uid_search_with_charset() {
        let mock = Builder::new()
            .write(b"A0000 UID SEARCH CHARSET UTF-8 (FROM \"Netflix\")\r\n")
            .read(b"* SEARCH 10 11\r\n")
            .read(b"A0000 OK SEARCH completed\r\n")
            .build();
        let mut client = selected_client(mock);

        let uids = client
            .uid_search(&SearchCriteria::from_sender("Netflix"), Some("UTF-8"))
            .await
            .unwrap();
        assert_eq!(uids, vec![uid(10), uid(11)]);
    }

    #[tokio::test]
    async fn test_uid_search_no_matches() {
        let mock = Builder::new()
            .write(b"A0000 UID SEARCH (FROM \"Nobody\")\r\n")
            .read(b"* SEARCH\r\n")
            .read(b"A0000 OK SEARCH completed\r\n")
            .build();
        let mut client = selected_client(mock);

        let uids = client
            .uid_search(&SearchCriteria::from_sender("Nobody"), None)
            .await
            .unwrap();
        assert!(uids.is_empty());
    }

    #[tokio::test]
    async fn test_uid_search_non_ascii_waits_for_continuation() {
        let mock = Builder::new()
            .write(b"A0000 UID SEARCH CHARSET UTF-8 (FROM {11}\r\n")
            .read(b"+ Ready for literal data\r\n")
            .write("Telefónica)\r\n".as_bytes())
            .read(b"* SEARCH 7\r\n")
            .read(b"A0000 OK SEARCH completed\r\n")
            .build();
        let mut client = selected_client(mock);

        let uids = client
            .uid_search(&SearchCriteria::from_sender("Telefónica"), Some("UTF-8"))
            .await
            .unwrap();
        assert_eq!(uids, vec![uid(7)]);
    }

    #[tokio::test]
    async fn test_uid_search_non_ascii_with_literal_plus() {
        let mock = Builder::new()
            .write("A0000 UID SEARCH CHARSET UTF-8 (FROM {11+}\r\nTelefónica)\r\n".as_bytes())
            .read(b"* SEARCH 7\r\n")
            .read(b"A0000 OK SEARCH completed\r\n")
            .build();
        let mut client = selected_client(mock);
        client.capabilities = vec![Capability::LiteralPlus];

        let uids = client
            .uid_search(&SearchCriteria::from_sender("Telefónica"), Some("UTF-8"))
            .await
            .unwrap();
        assert_eq!(uids, vec![uid(7)]);
    }

    #[tokio::test]
    async fn test_literal_refused_before_continuation() {
        let mock = Builder::new()
            .write(b"A0000 UID SEARCH CHARSET UTF-8 (FROM {11}\r\n")
            .read(b"A0000 NO [BADCHARSET (US-ASCII)] charset not supported\r\n")
            .build();
        let mut client = selected_client(mock);

        let err = client
            .uid_search(&SearchCriteria::from_sender("Telefónica"), Some("UTF-8"))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::No(_)));
    }

    #[tokio::test]
    async fn test_uid_fetch_header_fields() {
        let mock = Builder::new()
            .write(b"A0000 UID FETCH 10 (BODY.PEEK[HEADER.FIELDS (SUBJECT)])\r\n")
            .read(b"* 3 FETCH (UID 10 BODY[HEADER.FIELDS (SUBJECT)] {20}\r\n")
            .read(b"Subject: Your bill\r\n)\r\n")
            .read(b"A0000 OK FETCH completed\r\n")
            .build();
        let mut client = selected_client(mock);

        let header = client
            .uid_fetch_header_fields(uid(10), &["SUBJECT"])
            .await
            .unwrap();
        assert_eq!(header.unwrap(), b"Subject: Your bill\r\n");
    }

    #[tokio::test]
    async fn test_uid_store_and_expunge() {
        let mock = Builder::new()
            .write(b"A0000 UID STORE 10 +FLAGS \\Deleted\r\n")
            .read(b"* 3 FETCH (UID 10 FLAGS (\\Deleted))\r\n")
            .read(b"A0000 OK STORE completed\r\n")
            .write(b"A0001 EXPUNGE\r\n")
            .read(b"* 3 EXPUNGE\r\n")
            .read(b"A0001 OK EXPUNGE completed\r\n")
            .build();
        let mut client = selected_client(mock);

        client
            .uid_store(uid(10), StoreAction::AddFlags(vec![Flag::Deleted]))
            .await
            .unwrap();
        assert_eq!(client.expunge().await.unwrap(), vec![seq(3)]);
    }

    #[tokio::test]
    async fn test_store_rejected() {
        let mock = Builder::new()
            .write(b"A0000 UID STORE 10 +FLAGS \\Deleted\r\n")
            .read(b"A0000 NO [READ-ONLY] mailbox is read-only\r\n")
            .build();
        let mut client = selected_client(mock);

        let err = client
            .uid_store(uid(10), StoreAction::AddFlags(vec![Flag::Deleted]))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::No(_)));
    }
}
