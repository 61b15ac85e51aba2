//! Line framing for the IMAP wire protocol.
//!
//! Responses are CRLF-terminated lines that may embed `{n}` literals; a
//! literal's bytes follow the line that announces it and the response
//! continues after them.

#![allow(clippy::missing_errors_doc)]

use std::io;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::{Error, Result};

const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Upper bound for a single line.
const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Upper bound for a single literal.
const MAX_LITERAL_SIZE: usize = 100 * 1024 * 1024;

/// Buffered, literal-aware reader/writer over a byte stream.
pub struct FramedStream<S> {
    reader: BufReader<S>,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new framed stream.
    pub fn new(stream: S) -> Self {
        Self {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, stream),
        }
    }

    /// Reads one complete response, literals included.
    pub async fn read_response(&mut self) -> Result<Vec<u8>> {
        let mut response = Vec::new();

        loop {
            let line = self.read_line().await?;
            response.extend_from_slice(&line);

            let Some(literal_len) = parse_literal_length(&line) else {
                break;
            };
            if literal_len > MAX_LITERAL_SIZE {
                return Err(Error::Protocol(format!(
                    "literal too large: {literal_len} bytes (max {MAX_LITERAL_SIZE})"
                )));
            }
            let start = response.len();
            response.resize(start + literal_len, 0);
            self.reader.read_exact(&mut response[start..]).await?;
        }

        Ok(response)
    }

    /// Reads responses until the completion for `tag`, returning all of them.
    ///
    /// An untagged BYE followed by end of stream surfaces as [`Error::Bye`]
    /// rather than a bare EOF.
    pub async fn read_until_tagged(&mut self, tag: &str) -> Result<Vec<Vec<u8>>> {
        let mut responses = Vec::new();
        let mut bye = None;

        loop {
            let response = match self.read_response().await {
                Ok(response) => response,
                Err(err) => return Err(bye.map_or(err, Error::Bye)),
            };

            if is_tagged(&response, tag) {
                responses.push(response);
                return Ok(responses);
            }

            if response.starts_with(b"* BYE")
                && let Ok(Response::Untagged(UntaggedResponse::Bye { text, .. })) =
                    ResponseParser::parse(&response)
            {
                bye = Some(text);
            }
            responses.push(response);
        }
    }

    async fn read_line(&mut self) -> Result<Vec<u8>> {
        let mut line = Vec::new();

        loop {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed",
                )));
            }

            // A CR may end one chunk with its LF at the start of the next.
            let scan_from = line.len().saturating_sub(1);
            line.extend_from_slice(buf);
            if let Some(pos) = find_crlf(&line[scan_from..]) {
                let end = scan_from + pos + 2;
                let consumed = buf.len() - (line.len() - end);
                self.reader.consume(consumed);
                line.truncate(end);
                return Ok(line);
            }

            let len = buf.len();
            self.reader.consume(len);

            if line.len() > MAX_LINE_LENGTH {
                return Err(Error::Protocol("line too long".to_string()));
            }
        }
    }

    /// Writes and flushes a serialized command.
    pub async fn write_command(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.reader.get_mut();
        stream.write_all(data).await?;
        stream.flush().await?;
        Ok(())
    }
}

/// Returns true if `response` is the completion line for `tag`.
pub(crate) fn is_tagged(response: &[u8], tag: &str) -> bool {
    response
        .strip_prefix(tag.as_bytes())
        .is_some_and(|rest| rest.first() == Some(&b' '))
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// Literal length announced at the end of a line: `{123}` or `{123+}`.
fn parse_literal_length(line: &[u8]) -> Option<usize> {
    let line = line.strip_suffix(b"\r\n")?;
    let line = line.strip_suffix(b"}")?;
    let line = line.strip_suffix(b"+").unwrap_or(line);
    let open = line.iter().rposition(|&b| b == b'{')?;
    let digits = &line[open + 1..];
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
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
    use tokio_test::io::Builder;

    #[test]
    fn test_parse_literal_length() {
        assert_eq!(parse_literal_length(b"BODY[] {123}\r\n"), Some(123));
        assert_eq!(parse_literal_length(b"BODY[] {123+}\r\n"), Some(123));
        assert_eq!(parse_literal_length(b"{0}\r\n"), Some(0));
        assert_eq!(parse_literal_length(b"no literal\r\n"), None);
        assert_eq!(parse_literal_length(b"incomplete {123"), None);
        assert_eq!(parse_literal_length(b"wrong {abc}\r\n"), None);
        assert_eq!(parse_literal_length(b"empty {}\r\n"), None);
    }

    #[test]
    fn test_is_tagged() {
        assert!(is_tagged(b"A0001 OK done\r\n", "A0001"));
        assert!(!is_tagged(b"A00011 OK done\r\n", "A0001"));
        assert!(!is_tagged(b"* OK A0001\r\n", "A0001"));
    }

    #[tokio::test]
    async fn test_read_simple_line() {
        let mock = Builder::new().read(b"* OK ready\r\n").build();
        let mut framed = FramedStream::new(mock);

        assert_eq!(framed.read_response().await.unwrap(), b"* OK ready\r\n");
    }

    #[tokio::test]
    async fn test_read_line_split_across_chunks() {
        let mock = Builder::new()
            .read(b"* OK rea")
            .read(b"dy\r")
            .read(b"\n* 1 EXISTS\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        assert_eq!(framed.read_response().await.unwrap(), b"* OK ready\r\n");
        assert_eq!(framed.read_response().await.unwrap(), b"* 1 EXISTS\r\n");
    }

    #[tokio::test]
    async fn test_read_with_literal() {
        let mock = Builder::new()
            .read(b"* 1 FETCH (BODY[HEADER.FIELDS (SUBJECT)] {13}\r\n")
            .read(b"Subject: x\r\n\r\n")
            .read(b")\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        assert_eq!(
            framed.read_response().await.unwrap(),
            b"* 1 FETCH (BODY[HEADER.FIELDS (SUBJECT)] {13}\r\nSubject: x\r\n\r\n)\r\n"
        );
    }

    #[tokio::test]
    async fn test_write_command() {
        let mock = Builder::new().write(b"A0000 NOOP\r\n").build();
        let mut framed = FramedStream::new(mock);

        framed.write_command(b"A0000 NOOP\r\n").await.unwrap();
    }

    #[tokio::test]
    async fn test_read_until_tagged() {
        let mock = Builder::new()
            .read(b"* SEARCH 10 11\r\n")
            .read(b"A0002 OK SEARCH completed\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        let responses = framed.read_until_tagged("A0002").await.unwrap();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[1], b"A0002 OK SEARCH completed\r\n");
    }

    #[tokio::test]
    async fn test_stale_completion_is_skipped() {
        let mock = Builder::new()
            .read(b"A0004 OK late answer\r\n")
            .read(b"A0005 OK NOOP completed\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        let responses = framed.read_until_tagged("A0005").await.unwrap();
        assert_eq!(responses.len(), 2);
    }

    #[tokio::test]
    async fn test_bye_then_eof_is_bye() {
        let mock = Builder::new()
            .read(b"* BYE Session invalidated\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        let err = framed.read_until_tagged("A0003").await.unwrap_err();
        assert!(matches!(err, Error::Bye(ref text) if text == "Session invalidated"));
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_eof_is_io_error() {
        let mock = Builder::new().build();
        let mut framed = FramedStream::new(mock);

        let err = framed.read_response().await.unwrap_err();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == io::ErrorKind::UnexpectedEof));
    }

    #[tokio::test]
    async fn test_literal_size_limit() {
        let header = format!("* 1 FETCH (BODY[] {{{}}}\r\n", MAX_LITERAL_SIZE + 1);
        let mock = Builder::new().read(header.as_bytes()).build();
        let mut framed = FramedStream::new(mock);

        let err = framed.read_response().await.unwrap_err();
        assert!(err.to_string().contains("literal too large"));
    }

    #[tokio::test]
    async fn test_line_length_limit() {
        let long_line = "A".repeat(MAX_LINE_LENGTH + 100);
        let mock = Builder::new().read(long_line.as_bytes()).build();
        let mut framed = FramedStream::new(mock);

        let err = framed.read_response().await.unwrap_err();
        assert!(err.to_string().contains("line too long"));
    }

    proptest::proptest! {
        #[test]
        fn prop_chunking_does_not_change_framing(split in 1usize..60) {
            let wire: &[u8] =
                b"* 1 FETCH (UID 7 BODY[HEADER.FIELDS (SUBJECT)] {14}\r\nSubject: a\r\n\r\n)\r\nA0001 OK done\r\n";
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let mut builder = Builder::new();
            for chunk in wire.chunks(split) {
                builder.read(chunk);
            }
            let mut framed = FramedStream::new(builder.build());

            let lines = runtime.block_on(framed.read_until_tagged("A0001")).unwrap();

            proptest::prop_assert_eq!(lines.len(), 2);
            proptest::prop_assert_eq!(lines.concat(), wire.to_vec());
        }
    }
}
