//! # mailsweep-oauth
//!
//! `OAuth2` plumbing for signing in to Outlook/Microsoft 365 over IMAP.
//!
//! ## Features
//!
//! - **Device flow**: RFC 8628 device authorization grant, suited to a terminal
//! - **Token management**: expiry checks and refresh-token exchange
//! - **Microsoft provider**: tenant-aware endpoints with the IMAP scope
//! - **SASL**: XOAUTH2 initial-response payloads
//!
//! ## Device Flow
//!
//! ```ignore
//! use mailsweep_oauth::{DeviceFlow, OAuthClient, Provider};
//!
//! let client = OAuthClient::new("your_client_id", Provider::microsoft("consumers")?);
//! let flow = DeviceFlow::new(client);
//!
//! let auth = flow.request_device_authorization().await?;
//! eprintln!("Visit {} and enter {}", auth.verification_uri, auth.user_code);
//!
//! let token = flow.wait_for_token(&auth, 120).await?;
//! ```
//!
//! ## Building the IMAP payload
//!
//! ```
//! use mailsweep_oauth::sasl::xoauth2_response;
//!
//! let payload = xoauth2_response("user@outlook.com", "EwB4A8l6...");
//! // Send after: AUTHENTICATE XOAUTH2
//! assert!(!payload.contains("user@outlook.com"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod error;
pub mod flow;
pub mod provider;
pub mod sasl;
pub mod token;

pub use error::{Error, Result};
pub use flow::{DeviceAuthorization, DeviceFlow, OAuthClient};
pub use provider::Provider;
pub use token::Token;
