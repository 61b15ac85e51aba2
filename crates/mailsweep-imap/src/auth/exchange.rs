//! Manual XOAUTH2 exchange.
//!
//! Some servers reject or mishandle the generic AUTHENTICATE path. The manual
//! exchange drives the conversation line by line instead: the protocol logic
//! lives in [`ManualExchange`], which never touches a socket, and
//! [`authenticate_manually`] feeds it from a live client.

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use crate::command::{Command, continuation};
use crate::connection::{Authenticated, Client, NotAuthenticated, is_tagged};
use crate::{Error, Result};
use mailsweep_oauth::sasl::XOAUTH2;

/// Lines read after the payload before giving up on a tagged completion.
pub const MAX_COMPLETION_LINES: usize = 10;

/// Where the exchange stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    /// Command sent; the server must answer with a `+` continuation.
    AwaitingContinuation,
    /// Payload sent; reading until the tagged completion.
    AwaitingCompletion {
        /// Lines consumed so far in this phase.
        lines_read: usize,
    },
    /// Finished, successfully or not.
    Done,
}

/// What the driver must do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Write these bytes, then read the next line.
    Send(Vec<u8>),
    /// Read the next line.
    ReadMore,
    /// The server accepted the credential.
    Authenticated,
}

/// Sans-I/O state machine for `AUTHENTICATE XOAUTH2` without an initial
/// response.
#[derive(Clone)]
pub struct ManualExchange {
    tag: String,
    payload: String,
    state: ExchangeState,
    transcript: String,
}

impl ManualExchange {
    /// Starts an exchange under `tag` that will send the base64 `payload`.
    #[must_use]
    pub fn new(tag: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            payload: payload.into(),
            state: ExchangeState::AwaitingContinuation,
            transcript: String::new(),
        }
    }

    /// The command line that opens the exchange.
    #[must_use]
    pub fn command(&self) -> Vec<u8> {
        Command::Authenticate {
            mechanism: XOAUTH2.to_string(),
            initial_response: None,
        }
        .serialize(&self.tag)
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> ExchangeState {
        self.state
    }

    /// Every server line seen so far, concatenated.
    #[must_use]
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    /// Feeds one server line and returns the next step.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the first line is not a continuation,
    /// and [`Error::Auth`] carrying the full transcript if the completion is
    /// not OK or never arrives.
    pub fn on_line(&mut self, line: &[u8]) -> Result<Action> {
        let text = String::from_utf8_lossy(line);
        self.transcript.push_str(&text);

        match self.state {
            ExchangeState::AwaitingContinuation => {
                if line.starts_with(b"+") {
                    self.state = ExchangeState::AwaitingCompletion { lines_read: 0 };
                    Ok(Action::Send(continuation(&self.payload)))
                } else {
                    self.state = ExchangeState::Done;
                    Err(Error::Protocol(format!(
                        "expected continuation after AUTHENTICATE, got: {}",
                        text.trim_end()
                    )))
                }
            }
            ExchangeState::AwaitingCompletion { lines_read } => {
                let lines_read = lines_read + 1;

                if is_tagged(line, &self.tag) {
                    self.state = ExchangeState::Done;
                    return if status_is_ok(&text, &self.tag) {
                        Ok(Action::Authenticated)
                    } else {
                        Err(self.failure())
                    };
                }

                if lines_read >= MAX_COMPLETION_LINES {
                    self.state = ExchangeState::Done;
                    return Err(Error::Auth(format!(
                        "no completion for {} after {MAX_COMPLETION_LINES} lines: {}",
                        self.tag,
                        self.transcript.trim_end()
                    )));
                }

                self.state = ExchangeState::AwaitingCompletion { lines_read };
                if line.starts_with(b"+") {
                    // Error challenge: an empty response lets the server finish with NO.
                    Ok(Action::Send(continuation("")))
                } else {
                    Ok(Action::ReadMore)
                }
            }
            ExchangeState::Done => Err(Error::InvalidState(
                "authentication exchange already finished".to_string(),
            )),
        }
    }

    fn failure(&self) -> Error {
        Error::Auth(self.transcript.trim_end().to_string())
    }
}

impl std::fmt::Debug for ManualExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualExchange")
            .field("tag", &self.tag)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// The status token is the word right after the tag.
fn status_is_ok(line: &str, tag: &str) -> bool {
    line.strip_prefix(tag)
        .and_then(|rest| rest.split_whitespace().next())
        .is_some_and(|status| status.eq_ignore_ascii_case("OK"))
}

/// Runs the manual exchange on a live connection.
///
/// # Errors
///
/// Returns the exchange's error, or any I/O error from the connection.
pub async fn authenticate_manually<S>(
    mut client: Client<S, NotAuthenticated>,
    payload: &str,
) -> Result<Client<S, Authenticated>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let tag = client.tag_gen.next_tag();
    let mut exchange = ManualExchange::new(tag.as_str(), payload);
    debug!(tag = %tag, "starting manual XOAUTH2 exchange");
    client.stream.write_command(&exchange.command()).await?;

    let mut lines = Vec::new();
    loop {
        let line = client.stream.read_response().await?;
        let action = exchange.on_line(&line)?;
        lines.push(line);

        match action {
            Action::Send(bytes) => client.stream.write_command(&bytes).await?,
            Action::ReadMore => {}
            Action::Authenticated => break,
        }
    }

    client.absorb_capabilities(&lines);
    Ok(client.into_authenticated())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[test]
    fn test_command_form() {
        let exchange = ManualExchange::new("A0000", "cGF5bG9hZA==");
        assert_eq!(exchange.command(), b"A0000 AUTHENTICATE XOAUTH2\r\n");
        assert_eq!(exchange.state(), ExchangeState::AwaitingContinuation);
    }

    #[test]
    fn test_success() {
        let mut exchange = ManualExchange::new("A0000", "cGF5bG9hZA==");

        let action = exchange.on_line(b"+ \r\n").unwrap();
        assert_eq!(action, Action::Send(b"cGF5bG9hZA==\r\n".to_vec()));
        assert_eq!(
            exchange.state(),
            ExchangeState::AwaitingCompletion { lines_read: 0 }
        );

        assert_eq!(
            exchange.on_line(b"* CAPABILITY IMAP4rev1\r\n").unwrap(),
            Action::ReadMore
        );
        assert_eq!(
            exchange.on_line(b"A0000 OK AUTHENTICATE completed.\r\n").unwrap(),
            Action::Authenticated
        );
        assert_eq!(exchange.state(), ExchangeState::Done);
    }

    #[test]
    fn test_status_is_case_insensitive() {
        let mut exchange = ManualExchange::new("A0000", "x");
        exchange.on_line(b"+\r\n").unwrap();
        assert_eq!(
            exchange.on_line(b"A0000 ok done\r\n").unwrap(),
            Action::Authenticated
        );
    }

    #[test]
    fn test_rejection_carries_server_text() {
        let mut exchange = ManualExchange::new("A0000", "x");
        exchange.on_line(b"+ \r\n").unwrap();

        let err = exchange.on_line(b"A0000 NO invalid\r\n").unwrap_err();
        assert!(matches!(err, Error::Auth(ref text) if text.contains("A0000 NO invalid")));
    }

    #[test]
    fn test_ok_elsewhere_in_line_is_not_success() {
        let mut exchange = ManualExchange::new("A0000", "x");
        exchange.on_line(b"+ \r\n").unwrap();
        assert!(exchange.on_line(b"A0000 NO not OK\r\n").is_err());
    }

    #[test]
    fn test_missing_continuation() {
        let mut exchange = ManualExchange::new("A0000", "x");
        let err = exchange
            .on_line(b"A0000 BAD mechanism not supported\r\n")
            .unwrap_err();
        assert!(matches!(err, Error::Protocol(ref text) if text.contains("not supported")));
        assert_eq!(exchange.state(), ExchangeState::Done);
        assert!(matches!(
            exchange.on_line(b"+\r\n"),
            Err(Error::InvalidState(_))
        ));
    }

    #[test]
    fn test_error_challenge_gets_empty_response() {
        let mut exchange = ManualExchange::new("A0000", "x");
        exchange.on_line(b"+ \r\n").unwrap();
        assert_eq!(
            exchange.on_line(b"+ eyJzdGF0dXMiOiI0MDEifQ==\r\n").unwrap(),
            Action::Send(b"\r\n".to_vec())
        );
        assert!(exchange.on_line(b"A0000 NO AUTHENTICATE failed\r\n").is_err());
    }

    #[test]
    fn test_completion_line_limit() {
        let mut exchange = ManualExchange::new("A0000", "x");
        exchange.on_line(b"+ \r\n").unwrap();

        for _ in 1..MAX_COMPLETION_LINES {
            assert_eq!(
                exchange.on_line(b"* OK still working\r\n").unwrap(),
                Action::ReadMore
            );
        }
        let err = exchange.on_line(b"* OK still working\r\n").unwrap_err();
        assert!(matches!(err, Error::Auth(ref text) if text.contains("no completion")));
    }

    #[tokio::test]
    async fn test_authenticate_manually() {
        let mock = Builder::new()
            .read(b"* OK IMAP4rev1 ready\r\n")
            .write(b"A0000 AUTHENTICATE XOAUTH2\r\n")
            .read(b"+ \r\n")
            .write(b"cGF5bG9hZA==\r\n")
            .read(b"A0000 OK [CAPABILITY IMAP4rev1 UIDPLUS] done\r\n")
            .build();
        let client = Client::from_stream(mock).await.unwrap();

        let client = authenticate_manually(client, "cGF5bG9hZA==").await.unwrap();
        assert!(client.has_capability(&crate::types::Capability::UidPlus));
    }
}
