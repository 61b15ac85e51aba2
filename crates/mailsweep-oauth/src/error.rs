//! Error types for `OAuth2` operations.

/// Result type alias for `OAuth2` operations.
pub type Result<T> = std::result::Result<T, Error>;

/// `OAuth2` error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// `OAuth2` error returned by the identity provider.
    #[error("OAuth2 error: {error} - {description}")]
    OAuth {
        /// Error code (e.g., `invalid_grant`).
        error: String,
        /// Human-readable description.
        description: String,
    },

    /// The device code expired before the user finished signing in.
    #[error("Device code expired before authorization completed")]
    DeviceCodeExpired,

    /// No refresh token available.
    #[error("No refresh token available")]
    NoRefreshToken,

    /// Polling gave up.
    #[error("Authorization timed out after {0} seconds")]
    Timeout(u64),

    /// User denied authorization.
    #[error("User denied authorization")]
    AccessDenied,

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// URL parsing error.
    #[error("URL error: {0}")]
    UrlError(#[from] url::ParseError),
}

impl Error {
    /// Creates an OAuth error from error code and description.
    #[must_use]
    pub fn oauth_error(error: impl Into<String>, description: impl Into<String>) -> Self {
        Self::OAuth {
            error: error.into(),
            description: description.into(),
        }
    }

    /// Returns true for the device-flow codes that mean "keep polling".
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::OAuth { error, .. } if error == "authorization_pending" || error == "slow_down")
    }
}
