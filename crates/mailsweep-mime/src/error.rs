//! Error types for header decoding internals.
//!
//! The public decoding entry points never fail; these errors only travel
//! between the encoded-word parser and its callers, which fall back to the
//! literal text when they see one.

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// MIME error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed RFC 2047 encoded word.
    #[error("Invalid encoded word: {0}")]
    InvalidEncodedWord(String),

    /// Unknown encoded-word transfer encoding (only `B` and `Q` exist).
    #[error("Unknown encoding: {0}")]
    UnknownEncoding(char),

    /// Base64 decode error.
    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),
}
