//! Error types for the core library.

use thiserror::Error;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// IMAP operation failed.
    #[error("IMAP error: {0}")]
    Imap(#[from] mailsweep_imap::Error),

    /// Token endpoint or device flow failed.
    #[error("OAuth2 error: {0}")]
    OAuth(#[from] mailsweep_oauth::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// No access token could be obtained.
    #[error("Token acquisition failed: {0}")]
    Auth(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
