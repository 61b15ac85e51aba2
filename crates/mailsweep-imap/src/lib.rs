//! # mailsweep-imap
//!
//! The IMAP side of mailsweep: just enough of RFC 3501 to authenticate with
//! an OAuth2 bearer token, search a mailbox by sender, and delete what was
//! found, on a connection that may drop at any moment.
//!
//! ## Features
//!
//! - **Type-state client**: `NotAuthenticated` → `Authenticated` → `Selected`
//!   enforced at compile time
//! - **XOAUTH2**: generic SASL path with SASL-IR, plus a manual exchange for
//!   servers that mishandle it, chosen once per session
//! - **Resilient session**: bounded commands, NOOP liveness probes and
//!   reconnection from scratch
//! - **TLS via rustls**: no OpenSSL dependency
//! - **Sans-I/O parser**: protocol parsing separated from network I/O
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailsweep_imap::{BearerCredential, SearchCriteria, Session, SessionConfig, TlsEndpoint};
//!
//! #[tokio::main]
//! async fn main() -> mailsweep_imap::Result<()> {
//!     let credential = BearerCredential::new("user@outlook.com", "EwB4A8l6...");
//!     let mut session = Session::open(
//!         TlsEndpoint::new("outlook.office365.com"),
//!         credential,
//!         SessionConfig::default().mailbox("Inbox"),
//!     )
//!     .await?;
//!
//!     let criteria = SearchCriteria::from_sender("Netflix");
//!     for uid in session.uid_search(&criteria, Some("UTF-8")).await? {
//!         session.uid_store_deleted(uid).await?;
//!     }
//!     session.expunge().await?;
//!     session.close().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! ┌─────────────────────┐
//! │   NotAuthenticated  │ ─── authenticate() ───→ Authenticated
//! └─────────────────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │    Authenticated    │ ─── select() ───→ Selected
//! └─────────────────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │      Selected       │ ─── logout() ───→ (closed)
//! └─────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`auth`]: XOAUTH2 mechanisms and strategy selection
//! - [`command`]: IMAP command types and wire encoding
//! - [`connection`]: Transport, type-state client and session
//! - [`parser`]: Sans-I/O response parser
//! - [`types`]: Core IMAP types (flags, identifiers, capabilities)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod auth;
pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

pub use auth::{AuthMode, AuthStrategy, Authenticator, BearerCredential};
pub use command::{Command, FetchAttribute, SearchCriteria, StoreAction, TagGenerator};
pub use connection::{
    Authenticated, Client, Connector, DEFAULT_MAILBOX, DEFAULT_TLS_PORT, FramedStream, ImapStream,
    NotAuthenticated, Selected, Session, SessionConfig, SessionPhase, TlsEndpoint,
};
pub use error::{Error, Result};
pub use parser::{FetchItem, Response, ResponseParser, UntaggedResponse};
pub use types::{
    Capability, Flag, MailboxStatus, ResponseCode, SeqNum, Status, Tag, Uid, UidValidity,
};
