//! Error types for the IMAP session.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while talking to an IMAP server.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error during network operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS handshake or encryption error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Invalid DNS name for TLS.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// Response could not be parsed.
    #[error("Protocol error at position {position}: {message}")]
    Parse {
        /// Byte position where the error occurred.
        position: usize,
        /// Description of what went wrong.
        message: String,
    },

    /// SASL exchange failed. Carries the server's response text.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Server returned NO.
    #[error("Server returned NO: {0}")]
    No(String),

    /// Server returned BAD.
    #[error("Server returned BAD: {0}")]
    Bad(String),

    /// Server sent BYE and closed the connection.
    #[error("Server sent BYE: {0}")]
    Bye(String),

    /// Operation timed out.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// The connection is gone and could not be re-established.
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Invalid state for the requested operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Protocol violation or unexpected data.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl Error {
    /// Returns true if the error means the connection itself is unusable.
    ///
    /// Transport errors call for a liveness probe or a reconnect; everything
    /// else is a server-side or mechanism-level refusal on a healthy link.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::Tls(_) | Self::Timeout(_) | Self::Bye(_) | Self::ConnectionLost(_)
        )
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
