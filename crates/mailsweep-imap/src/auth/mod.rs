//! XOAUTH2 authentication with strategy selection.
//!
//! Two ways in:
//!
//! - **Generic**: the client's `AUTHENTICATE` entry point with an
//!   [`XOAuth2`] responder, using SASL-IR when the server offers it.
//! - **Manual**: a line-by-line exchange ([`ManualExchange`]) for servers
//!   that reject or mishandle the generic path.
//!
//! In [`AuthMode::Auto`] the first authentication probes `AUTH=XOAUTH2` and
//! pins the resulting [`AuthStrategy`] for every later reconnection.

mod exchange;
mod mechanism;

use std::str::FromStr;

use thiserror::Error as ThisError;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use crate::connection::{Authenticated, Client, NotAuthenticated};
use crate::{Error, Result};
use mailsweep_oauth::sasl::{XOAUTH2, xoauth2_response};

pub use exchange::{
    Action, ExchangeState, MAX_COMPLETION_LINES, ManualExchange, authenticate_manually,
};
pub use mechanism::{SaslMechanism, XOAuth2};

/// An access token plus the identity it authenticates.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerCredential {
    identity: String,
    token: String,
}

impl BearerCredential {
    /// Creates a credential.
    #[must_use]
    pub fn new(identity: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            token: token.into(),
        }
    }

    /// The mailbox identity, usually an email address.
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// The raw access token.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Base64 XOAUTH2 payload for this credential.
    #[must_use]
    pub fn sasl_response(&self) -> String {
        xoauth2_response(&self.identity, &self.token)
    }
}

impl std::fmt::Debug for BearerCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerCredential")
            .field("identity", &self.identity)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Configured authentication mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthMode {
    /// Probe capabilities on first use.
    #[default]
    Auto,
    /// Generic path only.
    Generic,
    /// Manual exchange only.
    Manual,
}

/// Error returned when parsing an unknown [`AuthMode`].
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
#[error("unknown auth mode {0:?}, expected one of: auto, generic, manual")]
pub struct ParseAuthModeError(String);

impl FromStr for AuthMode {
    type Err = ParseAuthModeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "generic" => Ok(Self::Generic),
            "manual" => Ok(Self::Manual),
            _ => Err(ParseAuthModeError(s.to_string())),
        }
    }
}

/// Strategy actually used for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStrategy {
    /// Generic path; failures are final.
    Generic,
    /// Generic path, then the manual exchange on a mechanism-level failure.
    GenericWithFallback,
    /// Manual exchange only.
    Manual,
}

/// Authenticates fresh connections, remembering the chosen strategy.
#[derive(Debug, Clone, Default)]
pub struct Authenticator {
    mode: AuthMode,
    pinned: Option<AuthStrategy>,
}

impl Authenticator {
    /// Creates an authenticator for a mode.
    #[must_use]
    pub const fn new(mode: AuthMode) -> Self {
        Self { mode, pinned: None }
    }

    /// Configured mode.
    #[must_use]
    pub const fn mode(&self) -> AuthMode {
        self.mode
    }

    /// Strategy pinned by the first authentication, if any.
    #[must_use]
    pub const fn pinned(&self) -> Option<AuthStrategy> {
        self.pinned
    }

    /// Authenticates `client` with `credential`.
    ///
    /// # Errors
    ///
    /// Every failure, transport errors included, is reported as
    /// [`Error::Auth`] with the underlying message.
    pub async fn authenticate<S>(
        &mut self,
        client: Client<S, NotAuthenticated>,
        credential: &BearerCredential,
    ) -> Result<Client<S, Authenticated>>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let strategy = self.strategy_for(&client);
        debug!(?strategy, identity = credential.identity(), "authenticating");

        let outcome = match strategy {
            AuthStrategy::Generic => {
                let mut mechanism = XOAuth2::new(credential);
                client.authenticate(&mut mechanism).await.map_err(|(err, _)| err)
            }
            AuthStrategy::Manual => {
                authenticate_manually(client, &credential.sasl_response()).await
            }
            AuthStrategy::GenericWithFallback => {
                let mut mechanism = XOAuth2::new(credential);
                match client.authenticate(&mut mechanism).await {
                    Ok(client) => Ok(client),
                    Err((err, client)) if is_mechanism_failure(&err) => {
                        warn!(error = %err, "generic AUTHENTICATE failed, trying manual exchange");
                        let result =
                            authenticate_manually(client, &credential.sasl_response()).await;
                        if result.is_ok() {
                            self.pinned = Some(AuthStrategy::Manual);
                        }
                        result
                    }
                    Err((err, _)) => Err(err),
                }
            }
        };

        outcome.map_err(into_auth_error)
    }

    fn strategy_for<S, State>(&mut self, client: &Client<S, State>) -> AuthStrategy
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        if let Some(strategy) = self.pinned {
            return strategy;
        }

        let strategy = match self.mode {
            AuthMode::Generic => AuthStrategy::Generic,
            AuthMode::Manual => AuthStrategy::Manual,
            AuthMode::Auto if client.supports_auth(XOAUTH2) => AuthStrategy::GenericWithFallback,
            AuthMode::Auto => AuthStrategy::Manual,
        };
        info!(?strategy, mode = ?self.mode, "authentication strategy pinned");
        self.pinned = Some(strategy);
        strategy
    }
}

/// Failures that say the mechanism was refused, as opposed to a broken link.
fn is_mechanism_failure(err: &Error) -> bool {
    matches!(
        err,
        Error::No(_) | Error::Bad(_) | Error::Parse { .. } | Error::Protocol(_)
    )
}

fn into_auth_error(err: Error) -> Error {
    match err {
        Error::Auth(_) => err,
        other => Error::Auth(other.to_string()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    const PAYLOAD: &str = "dXNlcj11c2VyQGV4YW1wbGUuY29tAWF1dGg9QmVhcmVyIHRva2VuAQE=";

    fn credential() -> BearerCredential {
        BearerCredential::new("user@example.com", "token")
    }

    fn wire(line: &str) -> Vec<u8> {
        format!("{line}\r\n").into_bytes()
    }

    #[test]
    fn test_sasl_response_round_trip() {
        let decoded = mailsweep_oauth::sasl::decode_xoauth2(&credential().sasl_response());
        assert_eq!(
            decoded,
            Some(("user@example.com".to_string(), "token".to_string()))
        );
    }

    #[test]
    fn test_credential_debug_redacts_token() {
        let debug = format!("{:?}", BearerCredential::new("me@example.com", "s3cret"));
        assert!(debug.contains("me@example.com"));
        assert!(!debug.contains("s3cret"));
    }

    #[test]
    fn test_auth_mode_from_str() {
        assert_eq!("auto".parse::<AuthMode>().unwrap(), AuthMode::Auto);
        assert_eq!(" Manual ".parse::<AuthMode>().unwrap(), AuthMode::Manual);
        assert_eq!("GENERIC".parse::<AuthMode>().unwrap(), AuthMode::Generic);
        assert!("plain".parse::<AuthMode>().is_err());
    }

    #[tokio::test]
    async fn test_auto_uses_generic_when_advertised() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 SASL-IR AUTH=XOAUTH2] ready\r\n")
            .write(&wire(&format!("A0000 AUTHENTICATE XOAUTH2 {PAYLOAD}")))
            .read(b"A0000 OK AUTHENTICATE completed.\r\n")
            .build();
        let client = Client::from_stream(mock).await.unwrap();

        let mut auth = Authenticator::new(AuthMode::Auto);
        auth.authenticate(client, &credential()).await.unwrap();
        assert_eq!(auth.pinned(), Some(AuthStrategy::GenericWithFallback));
    }

    #[tokio::test]
    async fn test_auto_goes_manual_when_not_advertised() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 AUTH=PLAIN] ready\r\n")
            .write(b"A0000 AUTHENTICATE XOAUTH2\r\n")
            .read(b"+ \r\n")
            .write(&wire(PAYLOAD))
            .read(b"A0000 OK AUTHENTICATE completed.\r\n")
            .build();
        let client = Client::from_stream(mock).await.unwrap();

        let mut auth = Authenticator::new(AuthMode::Auto);
        auth.authenticate(client, &credential()).await.unwrap();
        assert_eq!(auth.pinned(), Some(AuthStrategy::Manual));
    }

    #[tokio::test]
    async fn test_generic_rejection_falls_back_and_repins() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 AUTH=XOAUTH2] ready\r\n")
            .write(b"A0000 AUTHENTICATE XOAUTH2\r\n")
            .read(b"A0000 BAD command not understood\r\n")
            .write(b"A0001 AUTHENTICATE XOAUTH2\r\n")
            .read(b"+ \r\n")
            .write(&wire(PAYLOAD))
            .read(b"A0001 OK AUTHENTICATE completed.\r\n")
            .build();
        let client = Client::from_stream(mock).await.unwrap();

        let mut auth = Authenticator::new(AuthMode::Auto);
        auth.authenticate(client, &credential()).await.unwrap();
        assert_eq!(auth.pinned(), Some(AuthStrategy::Manual));
    }

    #[tokio::test]
    async fn test_transport_failure_does_not_fall_back() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 SASL-IR AUTH=XOAUTH2] ready\r\n")
            .write(&wire(&format!("A0000 AUTHENTICATE XOAUTH2 {PAYLOAD}")))
            .read_error(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "reset by peer",
            ))
            .build();
        let client = Client::from_stream(mock).await.unwrap();

        let mut auth = Authenticator::new(AuthMode::Auto);
        let err = auth.authenticate(client, &credential()).await.unwrap_err();
        assert!(matches!(err, Error::Auth(ref text) if text.contains("reset by peer")));
        assert_eq!(auth.pinned(), Some(AuthStrategy::GenericWithFallback));
    }

    #[tokio::test]
    async fn test_manual_rejection_is_auth_error() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0000 AUTHENTICATE XOAUTH2\r\n")
            .read(b"+ \r\n")
            .write(&wire(PAYLOAD))
            .read(b"A0000 NO invalid\r\n")
            .build();
        let client = Client::from_stream(mock).await.unwrap();

        let mut auth = Authenticator::new(AuthMode::Manual);
        let err = auth.authenticate(client, &credential()).await.unwrap_err();
        assert!(matches!(err, Error::Auth(ref text) if text.contains("NO invalid")));
    }

    #[tokio::test]
    async fn test_pinned_strategy_survives_reconnect() {
        let first = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 AUTH=PLAIN] ready\r\n")
            .write(b"A0000 AUTHENTICATE XOAUTH2\r\n")
            .read(b"+ \r\n")
            .write(&wire(PAYLOAD))
            .read(b"A0000 OK done\r\n")
            .build();
        // The second server advertises XOAUTH2, but the pinned strategy wins.
        let second = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 SASL-IR AUTH=XOAUTH2] ready\r\n")
            .write(b"A0000 AUTHENTICATE XOAUTH2\r\n")
            .read(b"+ \r\n")
            .write(&wire(PAYLOAD))
            .read(b"A0000 OK done\r\n")
            .build();

        let mut auth = Authenticator::new(AuthMode::Auto);
        let client = Client::from_stream(first).await.unwrap();
        auth.authenticate(client, &credential()).await.unwrap();
        let client = Client::from_stream(second).await.unwrap();
        auth.authenticate(client, &credential()).await.unwrap();
        assert_eq!(auth.pinned(), Some(AuthStrategy::Manual));
    }
}
