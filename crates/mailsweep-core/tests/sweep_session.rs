//! Full sweeps against a scripted IMAP server.

#![allow(clippy::unwrap_used)]

use std::io::{self, Cursor};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use mailsweep_core::{SearchEngine, SenderNameFilter, SweepOptions, sweep};
use mailsweep_imap::{BearerCredential, Connector, Error, Session, SessionConfig};

struct MockStream {
    responses: Cursor<Vec<u8>>,
    sent: Arc<Mutex<Vec<u8>>>,
}

impl AsyncRead for MockStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let pos = usize::try_from(self.responses.position()).unwrap();
        let data = self.responses.get_ref();
        if pos < data.len() {
            let n = (data.len() - pos).min(buf.remaining());
            buf.put_slice(&data[pos..pos + n]);
            self.responses.set_position((pos + n) as u64);
        }
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

/// One scripted connection; a second connect fails.
struct OneShot {
    stream: Mutex<Option<MockStream>>,
}

impl Connector for OneShot {
    type Stream = MockStream;

    async fn connect(&self) -> mailsweep_imap::Result<MockStream> {
        self.stream
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| Error::ConnectionLost("no server".into()))
    }

    fn describe(&self) -> String {
        "mock:993".to_string()
    }
}

async fn open(script: &[&[u8]]) -> (Session<OneShot>, Arc<Mutex<Vec<u8>>>) {
    let sent = Arc::new(Mutex::new(Vec::new()));
    let stream = MockStream {
        responses: Cursor::new(script.concat()),
        sent: Arc::clone(&sent),
    };
    let session = Session::open(
        OneShot {
            stream: Mutex::new(Some(stream)),
        },
        BearerCredential::new("user@outlook.com", "EwB4A8l6"),
        SessionConfig::default().mailbox("Inbox"),
    )
    .await
    .unwrap();
    (session, sent)
}

fn commands(sent: &Arc<Mutex<Vec<u8>>>) -> Vec<String> {
    String::from_utf8(sent.lock().unwrap().clone())
        .unwrap()
        .lines()
        .filter_map(|line| line.split_once(' ').map(|(_, rest)| rest.to_string()))
        .collect()
}

const GREETING: &[u8] = b"* OK [CAPABILITY IMAP4rev1 SASL-IR AUTH=XOAUTH2] ready\r\n";
const LOGIN: &[&[u8]] = &[
    GREETING,
    b"A0000 OK AUTHENTICATE completed.\r\n",
    b"* 2 EXISTS\r\nA0001 OK [READ-WRITE] SELECT completed\r\n",
];

#[tokio::test]
async fn test_sweep_finds_and_deletes_netflix() {
    let rest: &[&[u8]] = &[
        b"A0002 OK NOOP completed\r\n",
        b"* SEARCH 10 11\r\nA0003 OK SEARCH completed\r\n",
        b"* 1 FETCH (UID 10 BODY[HEADER.FIELDS (SUBJECT)] {22}\r\nSubject: Your bill\r\n\r\n)\r\nA0004 OK FETCH completed\r\n",
        b"* 2 FETCH (UID 11 BODY[HEADER.FIELDS (SUBJECT)] {21}\r\nSubject: New show\r\n\r\n)\r\nA0005 OK FETCH completed\r\n",
        b"A0006 OK NOOP completed\r\n",
        b"A0007 OK NOOP completed\r\n",
        b"A0008 OK STORE completed\r\n",
        b"A0009 OK NOOP completed\r\n",
        b"A0010 OK STORE completed\r\n",
        b"A0011 OK NOOP completed\r\n",
        b"* 2 EXPUNGE\r\n* 1 EXPUNGE\r\nA0012 OK EXPUNGE completed\r\n",
        b"A0013 OK CLOSE completed\r\n",
        b"* BYE logging out\r\nA0014 OK LOGOUT completed\r\n",
    ];
    let (mut session, sent) = open(&[LOGIN, rest].concat()).await;

    let mut out = Vec::new();
    let options = SweepOptions {
        delete: true,
        batch_size: 100,
    };
    let report = sweep(
        &mut session,
        &mut SearchEngine::new(),
        &SenderNameFilter::new(["Netflix"]),
        options,
        &mut out,
    )
    .await
    .unwrap();
    session.close().await;

    assert_eq!(report.matched(), 2);
    assert_eq!(report.deleted(), 2);
    assert_eq!(report.records[0].subject, "Your bill");
    assert_eq!(report.records[1].subject, "New show");

    let sent = commands(&sent);
    assert_eq!(sent[3], "UID SEARCH CHARSET UTF-8 (FROM \"Netflix\")");
    assert_eq!(
        sent.iter().filter(|c| c.starts_with("UID STORE")).count(),
        2
    );
    assert_eq!(sent.iter().filter(|c| *c == "EXPUNGE").count(), 1);
    assert!(sent.contains(&"UID STORE 11 +FLAGS \\Deleted".to_string()));

    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("[MATCH] 'Netflix' | Subject: Your bill..."));
    assert!(text.contains("Found 2 emails"));
}

#[tokio::test]
async fn test_sweep_falls_back_when_charset_rejected() {
    let rest: &[&[u8]] = &[
        b"A0002 OK NOOP completed\r\n",
        b"A0003 NO [BADCHARSET (US-ASCII)] charset not supported\r\n",
        b"A0004 OK NOOP completed\r\n",
        b"* SEARCH\r\nA0005 OK SEARCH completed\r\n",
    ];
    let (mut session, sent) = open(&[LOGIN, rest].concat()).await;

    let mut out = Vec::new();
    let report = sweep(
        &mut session,
        &mut SearchEngine::new(),
        &SenderNameFilter::new(["Netflix"]),
        SweepOptions::default(),
        &mut out,
    )
    .await
    .unwrap();

    assert_eq!(report.matched(), 0);
    let sent = commands(&sent);
    assert_eq!(sent[5], "UID SEARCH (FROM \"Netflix\")");
    assert!(String::from_utf8(out).unwrap().contains("Found 0 emails"));
}
