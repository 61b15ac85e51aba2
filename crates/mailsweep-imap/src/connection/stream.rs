//! TLS transport for IMAP connections.

#![allow(clippy::missing_errors_doc)]

use std::sync::Arc;

use rustls::pki_types::ServerName;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tracing::debug;

use crate::Result;

/// Implicit-TLS IMAP stream.
pub type ImapStream = TlsStream<TcpStream>;

/// Creates a TLS connector trusting the bundled web PKI roots.
///
/// The crypto provider is pinned to `ring` so the process-wide default is
/// never consulted.
pub fn create_tls_connector() -> Result<TlsConnector> {
    let root_store = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Ok(TlsConnector::from(Arc::new(config)))
}

/// Opens a TCP connection and performs the TLS handshake.
pub async fn connect_tls(host: &str, port: u16) -> Result<ImapStream> {
    let server_name = ServerName::try_from(host.to_string())?;
    let tcp = TcpStream::connect((host, port)).await?;
    tcp.set_nodelay(true)?;
    debug!(host, port, "tcp connected, starting tls handshake");

    let connector = create_tls_connector()?;
    Ok(connector.connect(server_name, tcp).await?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_create_tls_connector() {
        assert!(create_tls_connector().is_ok());
    }

    #[test]
    fn test_connector_is_reusable_without_process_provider() {
        assert!(rustls::crypto::CryptoProvider::get_default().is_none());
        assert!(create_tls_connector().is_ok());
        assert!(create_tls_connector().is_ok());
    }

    #[tokio::test]
    async fn test_invalid_server_name_fails_before_connecting() {
        let err = connect_tls("not a host name", 993).await.unwrap_err();
        assert!(matches!(err, Error::InvalidDnsName(_)));
    }
}
