//! Integration tests for the IMAP client and session.
//!
//! These tests use a mock stream to simulate IMAP server responses
//! without requiring a real server connection.

use std::io::{self, Cursor};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use mailsweep_imap::{
    AuthMode, AuthStrategy, BearerCredential, Capability, Client, Connector, Error, Response,
    ResponseParser, SearchCriteria, Session, SessionConfig, SessionPhase, Uid, UntaggedResponse,
};

/// Mock stream that returns predefined responses and records what was sent.
struct MockStream {
    /// Responses to return (in order).
    responses: Cursor<Vec<u8>>,
    /// Captured commands sent by the client.
    sent: Arc<Mutex<Vec<u8>>>,
}

impl MockStream {
    fn new(responses: &[u8]) -> (Self, Arc<Mutex<Vec<u8>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let stream = Self {
            responses: Cursor::new(responses.to_vec()),
            sent: Arc::clone(&sent),
        };
        (stream, sent)
    }
}

impl AsyncRead for MockStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let data = self.responses.get_ref();
        let pos = usize::try_from(self.responses.position()).unwrap();

        if pos >= data.len() {
            return Poll::Ready(Ok(()));
        }

        let remaining = &data[pos..];
        let to_read = remaining.len().min(buf.remaining());
        buf.put_slice(&remaining[..to_read]);
        self.responses.set_position((pos + to_read) as u64);

        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MockStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.sent.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Hands out one pre-scripted stream per connect.
struct ScriptedServer {
    scripts: Mutex<Vec<MockStream>>,
}

impl ScriptedServer {
    fn new(mut scripts: Vec<MockStream>) -> Self {
        scripts.reverse();
        Self {
            scripts: Mutex::new(scripts),
        }
    }
}

impl Connector for ScriptedServer {
    type Stream = MockStream;

    async fn connect(&self) -> mailsweep_imap::Result<MockStream> {
        self.scripts
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| Error::ConnectionLost("no server".into()))
    }

    fn describe(&self) -> String {
        "mock:993".to_string()
    }
}

fn sent_lines(sent: &Arc<Mutex<Vec<u8>>>) -> Vec<String> {
    String::from_utf8(sent.lock().unwrap().clone())
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

fn credential() -> BearerCredential {
    BearerCredential::new("user@outlook.com", "EwB4A8l6")
}

const GREETING: &[u8] = b"* OK [CAPABILITY IMAP4rev1 SASL-IR AUTH=XOAUTH2 AUTH=PLAIN] Outlook ready\r\n";

#[test]
fn test_parser_capability() {
    let response = b"* CAPABILITY IMAP4rev1 IDLE SASL-IR AUTH=XOAUTH2\r\n";
    let parsed = ResponseParser::parse(response).unwrap();

    match parsed {
        Response::Untagged(UntaggedResponse::Capability(caps)) => {
            assert!(caps.contains(&Capability::Imap4Rev1));
            assert!(caps.contains(&Capability::Idle));
            assert!(caps.iter().any(|c| c.is_auth("XOAUTH2")));
        }
        _ => panic!("Expected capability response"),
    }
}

#[test]
fn test_parser_search() {
    let parsed = ResponseParser::parse(b"* SEARCH 10 11\r\n").unwrap();
    assert_eq!(
        parsed,
        Response::Untagged(UntaggedResponse::Search(vec![10, 11]))
    );
}

#[tokio::test]
async fn test_client_greeting() {
    let (stream, _) = MockStream::new(GREETING);
    let client = Client::from_stream(stream).await.unwrap();

    assert!(client.supports_sasl_ir());
    assert!(client.supports_auth("XOAUTH2"));
    assert!(client.supports_auth("PLAIN"));
}

#[tokio::test]
async fn test_client_select_and_search() {
    let script = [
        GREETING,
        b"A0000 OK AUTHENTICATE completed.\r\n",
        b"* 12 EXISTS\r\n* OK [UIDVALIDITY 14] UIDs valid\r\nA0001 OK [READ-WRITE] SELECT completed\r\n",
        b"* SEARCH 10 11\r\nA0002 OK SEARCH completed\r\n",
    ]
    .concat();
    let (stream, sent) = MockStream::new(&script);

    let client = Client::from_stream(stream).await.unwrap();
    let mut mechanism = mailsweep_imap::auth::XOAuth2::new(&credential());
    let client = client.authenticate(&mut mechanism).await.map_err(|(e, _)| e).unwrap();
    let (mut client, status) = client.select("Inbox").await.unwrap();
    assert_eq!(status.exists, 12);

    let uids = client
        .uid_search(&SearchCriteria::from_sender("Netflix"), Some("UTF-8"))
        .await
        .unwrap();
    assert_eq!(uids, vec![Uid::new(10).unwrap(), Uid::new(11).unwrap()]);

    let lines = sent_lines(&sent);
    assert!(lines[0].starts_with("A0000 AUTHENTICATE XOAUTH2 "));
    assert_eq!(lines[1], "A0001 SELECT Inbox");
    assert_eq!(lines[2], "A0002 UID SEARCH CHARSET UTF-8 (FROM \"Netflix\")");
}

#[tokio::test]
async fn test_session_search_then_delete() {
    let script = [
        GREETING,
        b"A0000 OK AUTHENTICATE completed.\r\n",
        b"* 2 EXISTS\r\nA0001 OK [READ-WRITE] SELECT completed\r\n",
        b"* SEARCH 10 11\r\nA0002 OK SEARCH completed\r\n",
        b"* 1 FETCH (UID 10 BODY[HEADER.FIELDS (SUBJECT)] {22}\r\nSubject: Your bill\r\n\r\n)\r\nA0003 OK FETCH completed\r\n",
        b"* 1 FETCH (UID 10 FLAGS (\\Deleted))\r\nA0004 OK STORE completed\r\n",
        b"* 2 FETCH (UID 11 FLAGS (\\Deleted))\r\nA0005 OK STORE completed\r\n",
        b"* 2 EXPUNGE\r\n* 1 EXPUNGE\r\nA0006 OK EXPUNGE completed\r\n",
        b"A0007 OK CLOSE completed\r\n",
        b"* BYE logging out\r\nA0008 OK LOGOUT completed\r\n",
    ]
    .concat();
    let (stream, sent) = MockStream::new(&script);

    let mut session = Session::open(
        ScriptedServer::new(vec![stream]),
        credential(),
        SessionConfig::default().mailbox("Inbox"),
    )
    .await
    .unwrap();
    assert_eq!(session.phase(), SessionPhase::Selected);

    let uids = session
        .uid_search(&SearchCriteria::from_sender("Netflix"), Some("UTF-8"))
        .await
        .unwrap();
    assert_eq!(uids.len(), 2);

    let header = session
        .uid_fetch_header_fields(uids[0], &["SUBJECT"])
        .await
        .unwrap()
        .unwrap();
    assert!(header.starts_with(b"Subject: Your bill"));

    for uid in &uids {
        session.uid_store_deleted(*uid).await.unwrap();
    }
    assert_eq!(session.expunge().await.unwrap().len(), 2);
    session.close().await;

    let lines = sent_lines(&sent);
    let stores: Vec<_> = lines.iter().filter(|l| l.contains("UID STORE")).collect();
    assert_eq!(stores.len(), 2);
    assert_eq!(stores[0], "A0004 UID STORE 10 +FLAGS \\Deleted");
    assert_eq!(
        lines.iter().filter(|l| l.ends_with(" EXPUNGE")).count(),
        1
    );
    assert_eq!(lines[3], "A0003 UID FETCH 10 (BODY.PEEK[HEADER.FIELDS (SUBJECT)])");
    assert_eq!(lines.last().unwrap(), "A0008 LOGOUT");
}

#[tokio::test]
async fn test_session_manual_mode() {
    let script = [
        GREETING,
        b"+ \r\n",
        b"A0000 OK AUTHENTICATE completed.\r\n",
        b"A0001 OK [READ-WRITE] SELECT completed\r\n",
    ]
    .concat();
    let (stream, sent) = MockStream::new(&script);

    let session = Session::open(
        ScriptedServer::new(vec![stream]),
        credential(),
        SessionConfig::default().auth_mode(AuthMode::Manual),
    )
    .await
    .unwrap();
    assert_eq!(session.auth_strategy(), Some(AuthStrategy::Manual));

    let lines = sent_lines(&sent);
    assert_eq!(lines[0], "A0000 AUTHENTICATE XOAUTH2");
    assert_eq!(lines[1], credential().sasl_response());
    assert_eq!(lines[2], "A0001 SELECT INBOX");
}

#[tokio::test]
async fn test_session_reconnects_after_server_drop() {
    let first = [
        GREETING,
        b"A0000 OK AUTHENTICATE completed.\r\n",
        b"A0001 OK [READ-WRITE] SELECT completed\r\n",
        b"* BYE Server shutting down\r\n",
    ]
    .concat();
    let second = [
        GREETING,
        b"A0000 OK AUTHENTICATE completed.\r\n",
        b"A0001 OK [READ-WRITE] SELECT completed\r\n",
        b"A0002 OK NOOP completed\r\n",
    ]
    .concat();
    let (first, _) = MockStream::new(&first);
    let (second, second_sent) = MockStream::new(&second);

    let mut session = Session::open(
        ScriptedServer::new(vec![first, second]),
        credential(),
        SessionConfig::default(),
    )
    .await
    .unwrap();

    assert!(!session.is_alive().await);
    assert_eq!(session.phase(), SessionPhase::Disconnected);

    session.ensure_alive().await.unwrap();
    assert_eq!(session.reconnects(), 1);
    assert!(session.is_alive().await);

    // Tags restart on the new connection.
    assert_eq!(sent_lines(&second_sent)[2], "A0002 NOOP");
}
