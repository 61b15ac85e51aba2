//! # mailsweep-core
//!
//! Engines behind the `mailsweep` command.
//!
//! This crate provides:
//! - **Search** - server-side `FROM` search with per-run deduplication, plus a
//!   client-side scan for predicates the server cannot evaluate
//! - **Deletion** - batched `\Deleted` flagging with a single EXPUNGE
//! - **Match predicates** - sender-name and subject filters
//! - **Token providers** - cached device-flow sign-in for Microsoft accounts
//! - **Sweep** - the locate, report and delete run
//!
//! Engines talk to the mailbox through [`MailStore`], which
//! [`mailsweep_imap::Session`] implements.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod delete;
mod error;
pub mod filter;
pub mod record;
pub mod search;
pub mod store;
pub mod sweep;
#[cfg(test)]
mod testing;
pub mod token;
pub mod token_cache;

pub use delete::{DEFAULT_BATCH_SIZE, MutationEngine};
pub use error::{Error, Result};
pub use filter::{Candidate, MatchPredicate, SenderNameFilter, SubjectFilter};
pub use record::{DeletionReport, MessageRecord};
pub use search::SearchEngine;
pub use store::MailStore;
pub use sweep::{SweepOptions, SweepReport, sweep};
pub use token::{
    ConfiguredProvider, DEFAULT_TENANT, OAuthTokenProvider, StaticTokenProvider, TokenProvider,
    TokenSettings, UnconfiguredTokenProvider,
};
pub use token_cache::TokenCache;
