//! Type-state IMAP client.
//!
//! The connection states this tool walks through are:
//!
//! - `NotAuthenticated`: after the greeting
//! - `Authenticated`: after a successful AUTHENTICATE
//! - `Selected`: after a successful SELECT
//!
//! Each state only exposes the commands that are valid in it, and every
//! transition consumes the client.

#![allow(clippy::missing_errors_doc)]

mod authenticated;
mod not_authenticated;
mod selected;
mod states;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::trace;

pub use self::states::{Authenticated, NotAuthenticated, Selected};
use super::framed::{FramedStream, is_tagged};
use crate::command::{Command, TagGenerator};
use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::types::{Capability, ResponseCode, Status};
use crate::{Error, Result};

/// IMAP client connection with type-state.
///
/// The type parameter `State` tracks the connection state at compile time.
pub struct Client<S, State> {
    pub(crate) stream: FramedStream<S>,
    pub(crate) tag_gen: TagGenerator,
    pub(crate) capabilities: Vec<Capability>,
    pub(crate) state: State,
}

impl<S, State> std::fmt::Debug for Client<S, State>
where
    State: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("tag_gen", &self.tag_gen)
            .field("capabilities", &self.capabilities)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Shared implementation for all states.
impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns the server capabilities.
    #[must_use]
    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    /// Checks if the server has a specific capability.
    #[must_use]
    pub fn has_capability(&self, cap: &Capability) -> bool {
        self.capabilities.contains(cap)
    }

    /// Returns true if the server accepts a SASL initial response (RFC 4959).
    #[must_use]
    pub fn supports_sasl_ir(&self) -> bool {
        self.has_capability(&Capability::SaslIr)
    }

    /// Returns true if the server advertises `AUTH=<mechanism>`.
    #[must_use]
    pub fn supports_auth(&self, mechanism: &str) -> bool {
        self.capabilities.iter().any(|c| c.is_auth(mechanism))
    }

    /// Sends a NOOP command. Used as the liveness probe.
    pub async fn noop(&mut self) -> Result<()> {
        self.execute(&Command::Noop).await?;
        Ok(())
    }

    /// Sends LOGOUT. The server's answer, BYE included, is not inspected.
    pub async fn logout(mut self) -> Result<()> {
        let tag = self.tag_gen.next_tag();
        self.stream
            .write_command(&Command::Logout.serialize(&tag))
            .await?;

        let _ = self.read_until_tagged(&tag).await;
        Ok(())
    }

    /// Sends a command and waits for its completion, which must be OK.
    ///
    /// Synchronizing literals wait for the server's `+` before the rest of
    /// the command goes out, unless the server advertised LITERAL+.
    ///
    /// Returns every response line received, the tagged one last.
    pub(crate) async fn execute(&mut self, command: &Command) -> Result<Vec<Vec<u8>>> {
        let tag = self.tag_gen.next_tag();
        let parts = command.encode(&tag, self.has_capability(&Capability::LiteralPlus));
        trace!(tag = %tag, parts = parts.len(), "sending command");

        let mut responses = Vec::new();
        let mut parts = parts.iter().peekable();
        while let Some(part) = parts.next() {
            self.stream.write_command(part).await?;
            if parts.peek().is_some() {
                self.await_continuation(&tag, &mut responses).await?;
            }
        }

        responses.extend(self.read_until_tagged(&tag).await?);
        Self::check_tagged_ok(&responses, &tag)?;
        Ok(responses)
    }

    /// Waits for the `+` that lets a literal through.
    ///
    /// Untagged lines seen meanwhile are kept in `responses`. A tagged
    /// completion here means the server refused the command.
    async fn await_continuation(
        &mut self,
        tag: &str,
        responses: &mut Vec<Vec<u8>>,
    ) -> Result<()> {
        loop {
            let line = self.stream.read_response().await?;
            if line.starts_with(b"+") {
                return Ok(());
            }
            let done = is_tagged(&line, tag);
            responses.push(line);
            if done {
                Self::check_tagged_ok(responses, tag)?;
                return Err(Error::Protocol(
                    "command completed before its literal was sent".to_string(),
                ));
            }
        }
    }

    /// Reads responses until we get a tagged response matching our tag.
    pub(crate) async fn read_until_tagged(&mut self, tag: &str) -> Result<Vec<Vec<u8>>> {
        self.stream.read_until_tagged(tag).await
    }

    /// Replaces the stored capabilities with any listing in `responses`.
    ///
    /// Servers may send an untagged CAPABILITY or attach a `[CAPABILITY ...]`
    /// code to the tagged OK after authentication.
    pub(crate) fn absorb_capabilities(&mut self, responses: &[Vec<u8>]) {
        for response_bytes in responses {
            match ResponseParser::parse(response_bytes) {
                Ok(
                    Response::Untagged(UntaggedResponse::Capability(caps))
                    | Response::Tagged {
                        code: Some(ResponseCode::Capability(caps)),
                        ..
                    },
                ) => self.capabilities = caps,
                _ => {}
            }
        }
    }

    /// Moves the connection into another state.
    pub(crate) fn transition<Next>(self, state: Next) -> Client<S, Next> {
        Client {
            stream: self.stream,
            tag_gen: self.tag_gen,
            capabilities: self.capabilities,
            state,
        }
    }

    /// Checks that the tagged response is OK.
    pub(crate) fn check_tagged_ok(responses: &[Vec<u8>], tag: &str) -> Result<()> {
        for response_bytes in responses.iter().rev() {
            if let Ok(Response::Tagged {
                tag: resp_tag,
                status,
                code: _,
                text,
            }) = ResponseParser::parse(response_bytes)
                && resp_tag.as_str() == tag
            {
                return match status {
                    Status::Ok | Status::PreAuth => Ok(()),
                    Status::No => Err(Error::No(text)),
                    Status::Bad => Err(Error::Bad(text)),
                    Status::Bye => Err(Error::Bye(text)),
                };
            }
        }

        Err(Error::Protocol("missing tagged response".to_string()))
    }
}
