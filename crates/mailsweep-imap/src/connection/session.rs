//! Resilient IMAP session.
//!
//! `Session` owns the one live connection and hides the type-state client
//! behind a `&mut self` API. It never retries on its own: callers probe with
//! [`Session::is_alive`] and decide when to [`Session::reconnect`], so every
//! retry budget stays with the code that owns the unit of work.
//!
//! ## Example
//!
//! ```ignore
//! use mailsweep_imap::{BearerCredential, SearchCriteria, Session, SessionConfig, TlsEndpoint};
//!
//! let credential = BearerCredential::new("user@outlook.com", access_token);
//! let mut session = Session::open(
//!     TlsEndpoint::new("outlook.office365.com"),
//!     credential,
//!     SessionConfig::default(),
//! )
//! .await?;
//!
//! let uids = session
//!     .uid_search(&SearchCriteria::from_sender("Netflix"), Some("UTF-8"))
//!     .await?;
//! session.close().await;
//! ```

use std::future::Future;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::client::{Authenticated, Client, NotAuthenticated, Selected};
use super::connector::{Connector, TlsEndpoint};
use crate::auth::{AuthMode, AuthStrategy, Authenticator, BearerCredential};
use crate::command::{Command, SearchCriteria, StoreAction};
use crate::types::{Flag, SeqNum, Uid};
use crate::{Error, Result};

/// Default mailbox to select.
pub const DEFAULT_MAILBOX: &str = "INBOX";

/// Configuration for an IMAP session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Mailbox selected read-write after authentication.
    pub mailbox: String,
    /// How to authenticate.
    pub auth_mode: AuthMode,
    /// Bound for the TCP/TLS handshake and the greeting.
    pub connect_timeout: Duration,
    /// Bound for every command round trip.
    pub command_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mailbox: DEFAULT_MAILBOX.to_string(),
            auth_mode: AuthMode::Auto,
            connect_timeout: Duration::from_secs(30),
            command_timeout: Duration::from_secs(60),
        }
    }
}

impl SessionConfig {
    /// Sets the mailbox to select.
    #[must_use]
    pub fn mailbox(mut self, mailbox: impl Into<String>) -> Self {
        self.mailbox = mailbox.into();
        self
    }

    /// Sets the authentication mode.
    #[must_use]
    pub const fn auth_mode(mut self, mode: AuthMode) -> Self {
        self.auth_mode = mode;
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the command timeout.
    #[must_use]
    pub const fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }
}

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No connection.
    Disconnected,
    /// Greeting received.
    Connected,
    /// Authenticated, no mailbox selected.
    Authenticated,
    /// Mailbox selected; mailbox operations are available.
    Selected,
}

enum SessionState<S> {
    Disconnected,
    Connected(Client<S, NotAuthenticated>),
    Authenticated(Client<S, Authenticated>),
    Selected(Client<S, Selected>),
}

impl<S> SessionState<S> {
    const fn phase(&self) -> SessionPhase {
        match self {
            Self::Disconnected => SessionPhase::Disconnected,
            Self::Connected(_) => SessionPhase::Connected,
            Self::Authenticated(_) => SessionPhase::Authenticated,
            Self::Selected(_) => SessionPhase::Selected,
        }
    }
}

/// One authenticated, mailbox-selected connection that can be rebuilt.
pub struct Session<C: Connector = TlsEndpoint> {
    connector: C,
    credential: BearerCredential,
    config: SessionConfig,
    authenticator: Authenticator,
    state: SessionState<C::Stream>,
    reconnects: u32,
}

impl<C: Connector> Session<C> {
    /// Creates a disconnected session.
    #[must_use]
    pub fn new(connector: C, credential: BearerCredential, config: SessionConfig) -> Self {
        Self {
            authenticator: Authenticator::new(config.auth_mode),
            connector,
            credential,
            config,
            state: SessionState::Disconnected,
            reconnects: 0,
        }
    }

    /// Creates a session and connects it.
    ///
    /// # Errors
    ///
    /// Returns the first error from [`Session::connect`].
    pub async fn open(
        connector: C,
        credential: BearerCredential,
        config: SessionConfig,
    ) -> Result<Self> {
        let mut session = Self::new(connector, credential, config);
        session.connect().await?;
        Ok(session)
    }

    /// Current lifecycle phase.
    #[must_use]
    pub const fn phase(&self) -> SessionPhase {
        self.state.phase()
    }

    /// Returns the selected mailbox, if any.
    #[must_use]
    pub fn selected_mailbox(&self) -> Option<&str> {
        match &self.state {
            SessionState::Selected(client) => Some(client.mailbox()),
            _ => None,
        }
    }

    /// Number of reconnections performed so far.
    #[must_use]
    pub const fn reconnects(&self) -> u32 {
        self.reconnects
    }

    /// Authentication strategy pinned by the first successful probe.
    #[must_use]
    pub const fn auth_strategy(&self) -> Option<AuthStrategy> {
        self.authenticator.pinned()
    }

    /// Session configuration.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Opens a connection, authenticates, and selects the mailbox.
    ///
    /// Any existing connection is dropped first. On failure the session is
    /// left disconnected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if a step exceeds its bound, [`Error::Auth`]
    /// if the credential is refused, or the transport/protocol error that
    /// stopped the handshake.
    pub async fn connect(&mut self) -> Result<()> {
        self.state = SessionState::Disconnected;
        info!(server = %self.connector.describe(), mailbox = %self.config.mailbox, "connecting");

        let result = async {
            self.do_connect().await?;
            self.do_authenticate().await?;
            self.do_select().await
        }
        .await;

        if let Err(e) = &result {
            warn!(error = %e, "connection setup failed");
            self.state = SessionState::Disconnected;
        }
        result
    }

    /// Probes the connection with NOOP under the command timeout.
    ///
    /// Any error means "not alive". A transport failure also drops the
    /// connection so the next reconnect does not talk to a dead socket.
    pub async fn is_alive(&mut self) -> bool {
        let timeout = self.config.command_timeout;
        let result = match &mut self.state {
            SessionState::Disconnected => return false,
            SessionState::Connected(client) => bounded(timeout, client.noop()).await,
            SessionState::Authenticated(client) => bounded(timeout, client.noop()).await,
            SessionState::Selected(client) => bounded(timeout, client.noop()).await,
        };

        match self.settle(result) {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "liveness probe failed");
                false
            }
        }
    }

    /// Tears the connection down and builds a new one from scratch.
    ///
    /// # Errors
    ///
    /// Returns the error from the new [`Session::connect`].
    pub async fn reconnect(&mut self) -> Result<()> {
        self.reconnects += 1;
        info!(reconnects = self.reconnects, "reconnecting");
        self.teardown().await;
        self.connect().await
    }

    /// Reconnects if the liveness probe fails.
    ///
    /// # Errors
    ///
    /// Returns the reconnect error.
    pub async fn ensure_alive(&mut self) -> Result<()> {
        if self.is_alive().await {
            return Ok(());
        }
        self.reconnect().await
    }

    /// Best-effort CLOSE and LOGOUT. Safe to call repeatedly.
    pub async fn close(&mut self) {
        self.teardown().await;
    }

    /// `UID SEARCH` on the selected mailbox.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] when no mailbox is selected, or the
    /// command's error. Transport errors drop the connection.
    pub async fn uid_search(
        &mut self,
        criteria: &SearchCriteria,
        charset: Option<&str>,
    ) -> Result<Vec<Uid>> {
        let timeout = self.config.command_timeout;
        let client = self.selected_mut()?;
        let result = bounded(timeout, client.uid_search(criteria, charset)).await;
        self.settle(result)
    }

    /// Peeks the named header fields of one message.
    ///
    /// # Errors
    ///
    /// As for [`Session::uid_search`].
    pub async fn uid_fetch_header_fields(
        &mut self,
        uid: Uid,
        fields: &[&str],
    ) -> Result<Option<Vec<u8>>> {
        let timeout = self.config.command_timeout;
        let client = self.selected_mut()?;
        let result = bounded(timeout, client.uid_fetch_header_fields(uid, fields)).await;
        self.settle(result)
    }

    /// `UID STORE <uid> +FLAGS \Deleted`.
    ///
    /// # Errors
    ///
    /// As for [`Session::uid_search`].
    pub async fn uid_store_deleted(&mut self, uid: Uid) -> Result<()> {
        let timeout = self.config.command_timeout;
        let client = self.selected_mut()?;
        let result = bounded(
            timeout,
            client.uid_store(uid, StoreAction::AddFlags(vec![Flag::Deleted])),
        )
        .await;
        self.settle(result)
    }

    /// EXPUNGE on the selected mailbox.
    ///
    /// # Errors
    ///
    /// As for [`Session::uid_search`].
    pub async fn expunge(&mut self) -> Result<Vec<SeqNum>> {
        let timeout = self.config.command_timeout;
        let client = self.selected_mut()?;
        let result = bounded(timeout, client.expunge()).await;
        self.settle(result)
    }

    // === Private helpers ===

    async fn do_connect(&mut self) -> Result<()> {
        let timeout = self.config.connect_timeout;
        let stream = bounded(timeout, self.connector.connect()).await?;
        let client = bounded(timeout, Client::from_stream(stream)).await?;
        debug!(capabilities = ?client.capabilities(), "greeting received");
        self.state = SessionState::Connected(client);
        Ok(())
    }

    async fn do_authenticate(&mut self) -> Result<()> {
        let SessionState::Connected(client) =
            std::mem::replace(&mut self.state, SessionState::Disconnected)
        else {
            return Err(Error::InvalidState("not connected".into()));
        };

        let authenticated = bounded(
            self.config.command_timeout,
            self.authenticator.authenticate(client, &self.credential),
        )
        .await?;
        info!(identity = self.credential.identity(), "authenticated");
        self.state = SessionState::Authenticated(authenticated);
        Ok(())
    }

    async fn do_select(&mut self) -> Result<()> {
        let SessionState::Authenticated(client) =
            std::mem::replace(&mut self.state, SessionState::Disconnected)
        else {
            return Err(Error::InvalidState("not authenticated".into()));
        };

        let (selected, status) =
            bounded(self.config.command_timeout, client.select(&self.config.mailbox)).await?;
        if status.read_only {
            warn!(mailbox = %self.config.mailbox, "mailbox opened read-only, deletions will fail");
        }
        info!(mailbox = %self.config.mailbox, exists = status.exists, "mailbox selected");
        self.state = SessionState::Selected(selected);
        Ok(())
    }

    async fn teardown(&mut self) {
        let timeout = self.config.command_timeout;
        match std::mem::replace(&mut self.state, SessionState::Disconnected) {
            SessionState::Selected(mut client) => {
                if let Err(e) = bounded(timeout, client.execute(&Command::Close)).await {
                    debug!(error = %e, "CLOSE during teardown failed");
                }
                if let Err(e) = bounded(timeout, client.logout()).await {
                    debug!(error = %e, "LOGOUT during teardown failed");
                }
            }
            SessionState::Authenticated(client) => {
                if let Err(e) = bounded(timeout, client.logout()).await {
                    debug!(error = %e, "LOGOUT during teardown failed");
                }
            }
            SessionState::Connected(client) => {
                if let Err(e) = bounded(timeout, client.logout()).await {
                    debug!(error = %e, "LOGOUT during teardown failed");
                }
            }
            SessionState::Disconnected => {}
        }
    }

    fn selected_mut(&mut self) -> Result<&mut Client<C::Stream, Selected>> {
        match &mut self.state {
            SessionState::Selected(client) => Ok(client),
            _ => Err(Error::InvalidState("no mailbox selected".into())),
        }
    }

    /// Drops the connection when `result` carries a transport error.
    fn settle<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result
            && e.is_transport()
        {
            warn!(error = %e, "connection lost");
            self.state = SessionState::Disconnected;
        }
        result
    }
}

impl<C: Connector> std::fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("server", &self.connector.describe())
            .field("identity", &self.credential.identity())
            .field("phase", &self.phase())
            .field("reconnects", &self.reconnects)
            .finish_non_exhaustive()
    }
}

/// Runs `fut`, mapping an elapsed `limit` to [`Error::Timeout`].
async fn bounded<T>(limit: Duration, fut: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| Error::Timeout(limit))?
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
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio_test::io::{Builder, Mock};

    const PAYLOAD: &str = "dXNlcj11c2VyQGV4YW1wbGUuY29tAWF1dGg9QmVhcmVyIHRva2VuAQE=";

    struct Scripted(Mutex<VecDeque<Mock>>);

    impl Scripted {
        fn new(mocks: Vec<Mock>) -> Self {
            Self(Mutex::new(mocks.into()))
        }
    }

    impl Connector for Scripted {
        type Stream = Mock;

        async fn connect(&self) -> Result<Mock> {
            self.0
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| Error::ConnectionLost("connection refused".into()))
        }

        fn describe(&self) -> String {
            "scripted".to_string()
        }
    }

    /// Greeting, SASL-IR authentication and SELECT: tags A0000 and A0001.
    fn handshake(builder: &mut Builder) -> &mut Builder {
        builder
            .read(b"* OK [CAPABILITY IMAP4rev1 SASL-IR AUTH=XOAUTH2] ready\r\n")
            .write(format!("A0000 AUTHENTICATE XOAUTH2 {PAYLOAD}\r\n").as_bytes())
            .read(b"A0000 OK AUTHENTICATE completed.\r\n")
            .write(b"A0001 SELECT Inbox\r\n")
            .read(b"* 2 EXISTS\r\n")
            .read(b"* OK [UIDVALIDITY 42] UIDs valid\r\n")
            .read(b"A0001 OK [READ-WRITE] SELECT completed\r\n")
    }

    fn session(mocks: Vec<Mock>) -> Session<Scripted> {
        Session::new(
            Scripted::new(mocks),
            BearerCredential::new("user@example.com", "token"),
            SessionConfig::default().mailbox("Inbox"),
        )
    }

    #[test]
    fn test_config_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.mailbox, "INBOX");
        assert_eq!(config.auth_mode, AuthMode::Auto);
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.command_timeout, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_connect_selects_mailbox() {
        let mock = handshake(&mut Builder::new()).build();
        let mut session = session(vec![mock]);

        session.connect().await.unwrap();
        assert_eq!(session.phase(), SessionPhase::Selected);
        assert_eq!(session.selected_mailbox(), Some("Inbox"));
        assert_eq!(
            session.auth_strategy(),
            Some(AuthStrategy::GenericWithFallback)
        );
    }

    #[tokio::test]
    async fn test_failed_select_leaves_disconnected() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 SASL-IR AUTH=XOAUTH2] ready\r\n")
            .write(format!("A0000 AUTHENTICATE XOAUTH2 {PAYLOAD}\r\n").as_bytes())
            .read(b"A0000 OK done\r\n")
            .write(b"A0001 SELECT Inbox\r\n")
            .read(b"A0001 NO [NONEXISTENT] Unknown mailbox\r\n")
            .build();
        let mut session = session(vec![mock]);

        let err = session.connect().await.unwrap_err();
        assert!(matches!(err, Error::No(_)));
        assert_eq!(session.phase(), SessionPhase::Disconnected);
    }

    #[tokio::test]
    async fn test_failed_auth_leaves_disconnected() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 SASL-IR] ready\r\n")
            .write(b"A0000 AUTHENTICATE XOAUTH2\r\n")
            .read(b"+ \r\n")
            .write(format!("{PAYLOAD}\r\n").as_bytes())
            .read(b"A0000 NO AUTHENTICATE failed.\r\n")
            .build();
        let mut session = session(vec![mock]);

        let err = session.connect().await.unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
        assert_eq!(session.phase(), SessionPhase::Disconnected);
    }

    #[tokio::test]
    async fn test_operations_require_selection() {
        let mut session = session(Vec::new());
        let err = session
            .uid_search(&SearchCriteria::from_sender("x"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
        assert!(!session.is_alive().await);
    }

    #[tokio::test]
    async fn test_dead_probe_then_single_reconnect() {
        let first = handshake(&mut Builder::new())
            .write(b"A0002 NOOP\r\n")
            .read(b"* BYE Session expired\r\n")
            .build();
        let second = handshake(&mut Builder::new())
            .write(b"A0002 UID SEARCH CHARSET UTF-8 (FROM \"Netflix\")\r\n")
            .read(b"* SEARCH 10 11\r\n")
            .read(b"A0002 OK SEARCH completed\r\n")
            .build();
        let mut session = session(vec![first, second]);
        session.connect().await.unwrap();

        session.ensure_alive().await.unwrap();
        assert_eq!(session.reconnects(), 1);
        assert_eq!(session.phase(), SessionPhase::Selected);

        let uids = session
            .uid_search(&SearchCriteria::from_sender("Netflix"), Some("UTF-8"))
            .await
            .unwrap();
        assert_eq!(uids, vec![Uid::new(10).unwrap(), Uid::new(11).unwrap()]);
    }

    #[tokio::test]
    async fn test_transport_error_drops_connection() {
        let mock = handshake(&mut Builder::new())
            .write(b"A0002 EXPUNGE\r\n")
            .read_error(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "reset",
            ))
            .build();
        let mut session = session(vec![mock]);
        session.connect().await.unwrap();

        let err = session.expunge().await.unwrap_err();
        assert!(err.is_transport());
        assert_eq!(session.phase(), SessionPhase::Disconnected);
    }

    #[tokio::test]
    async fn test_server_refusal_keeps_connection() {
        let mock = handshake(&mut Builder::new())
            .write(b"A0002 UID STORE 10 +FLAGS \\Deleted\r\n")
            .read(b"A0002 NO STORE failed\r\n")
            .build();
        let mut session = session(vec![mock]);
        session.connect().await.unwrap();

        let err = session
            .uid_store_deleted(Uid::new(10).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::No(_)));
        assert_eq!(session.phase(), SessionPhase::Selected);
    }

    #[tokio::test]
    async fn test_reconnect_failure_leaves_disconnected() {
        let mock = handshake(&mut Builder::new())
            .write(b"A0002 CLOSE\r\n")
            .read(b"A0002 OK CLOSE completed\r\n")
            .write(b"A0003 LOGOUT\r\n")
            .read(b"* BYE logging out\r\n")
            .read(b"A0003 OK LOGOUT completed\r\n")
            .build();
        let mut session = session(vec![mock]);
        session.connect().await.unwrap();

        assert!(session.reconnect().await.is_err());
        assert_eq!(session.reconnects(), 1);
        assert_eq!(session.phase(), SessionPhase::Disconnected);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let mock = handshake(&mut Builder::new())
            .write(b"A0002 CLOSE\r\n")
            .read(b"A0002 OK CLOSE completed\r\n")
            .write(b"A0003 LOGOUT\r\n")
            .read(b"* BYE logging out\r\n")
            .read(b"A0003 OK LOGOUT completed\r\n")
            .build();
        let mut session = session(vec![mock]);
        session.connect().await.unwrap();

        session.close().await;
        session.close().await;
        assert_eq!(session.phase(), SessionPhase::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_times_out() {
        let limit = Duration::from_secs(5);
        let err = bounded(limit, std::future::pending::<Result<()>>())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(d) if d == limit));
    }
}
