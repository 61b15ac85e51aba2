//! Pluggable transport factory.
//!
//! A [`Session`](super::Session) reconnects from scratch, so it holds a
//! factory rather than a stream. Production code dials TLS; tests hand out
//! scripted in-memory streams.

use std::future::Future;

use tokio::io::{AsyncRead, AsyncWrite};

use super::stream::{ImapStream, connect_tls};
use crate::Result;

/// Default port for IMAP over implicit TLS.
pub const DEFAULT_TLS_PORT: u16 = 993;

/// Opens fresh transport streams on demand.
pub trait Connector {
    /// Stream type handed to the IMAP client.
    type Stream: AsyncRead + AsyncWrite + Unpin;

    /// Opens a new stream. Called once per connect or reconnect.
    fn connect(&self) -> impl Future<Output = Result<Self::Stream>>;

    /// Human-readable peer, for logs.
    fn describe(&self) -> String;
}

/// A host and port reached over implicit TLS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsEndpoint {
    /// Server hostname, also used for SNI and certificate checks.
    pub host: String,
    /// Server port.
    pub port: u16,
}

impl TlsEndpoint {
    /// Creates an endpoint on the default IMAPS port.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_TLS_PORT,
        }
    }

    /// Overrides the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

impl Connector for TlsEndpoint {
    type Stream = ImapStream;

    async fn connect(&self) -> Result<ImapStream> {
        connect_tls(&self.host, self.port).await
    }

    fn describe(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_defaults() {
        let endpoint = TlsEndpoint::new("outlook.office365.com");
        assert_eq!(endpoint.port, 993);
        assert_eq!(endpoint.describe(), "outlook.office365.com:993");
        assert_eq!(endpoint.port(1993).port, 1993);
    }
}
