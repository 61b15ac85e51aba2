//! Implementation for the not-authenticated state.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use super::Client;
use super::states::{Authenticated, NotAuthenticated};
use crate::auth::SaslMechanism;
use crate::command::{Command, TagGenerator, continuation};
use crate::connection::framed::{FramedStream, is_tagged};
use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::types::ResponseCode;
use crate::{Error, Result};

/// Continuation rounds answered before the exchange is declared runaway.
const MAX_SASL_ROUNDS: usize = 4;

impl<S> Client<S, NotAuthenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new client from a connected stream.
    ///
    /// Reads the server greeting and any capabilities it carries.
    pub async fn from_stream(stream: S) -> Result<Self> {
        let mut framed = FramedStream::new(stream);

        let greeting = framed.read_response().await?;
        let response = ResponseParser::parse(&greeting)?;

        let mut capabilities = Vec::new();
        match response {
            Response::Untagged(
                UntaggedResponse::Ok { code, .. } | UntaggedResponse::PreAuth { code, .. },
            ) => {
                if let Some(ResponseCode::Capability(caps)) = code {
                    capabilities = caps;
                }
            }
            Response::Untagged(UntaggedResponse::Bye { text, .. }) => {
                return Err(Error::Bye(text));
            }
            _ => {
                return Err(Error::Protocol(format!(
                    "unexpected greeting: {}",
                    String::from_utf8_lossy(&greeting).trim_end()
                )));
            }
        }

        Ok(Self {
            stream: framed,
            tag_gen: TagGenerator::default(),
            capabilities,
            state: NotAuthenticated,
        })
    }

    /// Runs `AUTHENTICATE <mechanism>`, answering every challenge with the
    /// mechanism's responder.
    ///
    /// The initial response rides on the command line when the server
    /// advertises `SASL-IR`. On failure the unauthenticated client is handed
    /// back together with the error so another strategy can be tried on the
    /// same connection.
    pub async fn authenticate<M>(
        mut self,
        mechanism: &mut M,
    ) -> std::result::Result<Client<S, Authenticated>, (Error, Self)>
    where
        M: SaslMechanism + ?Sized,
    {
        match self.run_sasl(mechanism).await {
            Ok(()) => Ok(self.into_authenticated()),
            Err(err) => Err((err, self)),
        }
    }

    /// Promotes the client after an exchange completed out of band.
    pub(crate) fn into_authenticated(self) -> Client<S, Authenticated> {
        self.transition(Authenticated)
    }

    async fn run_sasl<M>(&mut self, mechanism: &mut M) -> Result<()>
    where
        M: SaslMechanism + ?Sized,
    {
        let tag = self.tag_gen.next_tag();
        let initial_response = if self.supports_sasl_ir() {
            mechanism.initial_response()
        } else {
            None
        };
        let cmd = Command::Authenticate {
            mechanism: mechanism.name().to_string(),
            initial_response,
        }
        .serialize(&tag);

        debug!(mechanism = mechanism.name(), tag = %tag, "starting SASL exchange");
        self.stream.write_command(&cmd).await?;

        let mut responses = Vec::new();
        let mut rounds = 0;
        loop {
            let line = self.stream.read_response().await?;
            if is_tagged(&line, &tag) {
                responses.push(line);
                break;
            }

            if line.starts_with(b"+") {
                rounds += 1;
                if rounds > MAX_SASL_ROUNDS {
                    return Err(Error::Protocol(format!(
                        "SASL exchange exceeded {MAX_SASL_ROUNDS} rounds"
                    )));
                }

                let challenge = match ResponseParser::parse(&line)? {
                    Response::Continuation { text: Some(text) } => {
                        STANDARD.decode(text.trim()).unwrap_or_else(|_| text.into_bytes())
                    }
                    _ => Vec::new(),
                };
                let reply = mechanism.respond(&challenge);
                self.stream.write_command(&continuation(&reply)).await?;
                continue;
            }

            responses.push(line);
        }

        Self::check_tagged_ok(&responses, &tag)?;
        self.absorb_capabilities(&responses);
        Ok(())
    }
}
