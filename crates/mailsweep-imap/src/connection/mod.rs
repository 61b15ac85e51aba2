//! IMAP connection management.
//!
//! This module provides:
//! - The TLS transport and a pluggable [`Connector`]
//! - Literal-aware framed I/O
//! - The type-state [`Client`]
//! - The resilient [`Session`] with liveness probing and reconnection

mod client;
mod connector;
mod framed;
mod session;
mod stream;

pub use client::{Authenticated, Client, NotAuthenticated, Selected};
pub use connector::{Connector, DEFAULT_TLS_PORT, TlsEndpoint};
pub use framed::FramedStream;
pub(crate) use framed::is_tagged;
pub use session::{DEFAULT_MAILBOX, Session, SessionConfig, SessionPhase};
pub use stream::{ImapStream, connect_tls, create_tls_connector};
