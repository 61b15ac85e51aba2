//! Sans-I/O parser for server responses.
//!
//! The [`lexer`] turns one framed response (literals included) into tokens;
//! [`response`] builds typed responses from them. Nothing here touches the
//! network, so every piece is testable on byte slices.
//!
//! ```
//! use mailsweep_imap::parser::{Response, ResponseParser, UntaggedResponse};
//!
//! let response = ResponseParser::parse(b"* SEARCH 10 11\r\n").unwrap();
//! assert_eq!(
//!     response,
//!     Response::Untagged(UntaggedResponse::Search(vec![10, 11]))
//! );
//! ```

pub mod lexer;
pub mod response;

pub use lexer::{Lexer, Token};
pub use response::{FetchItem, Response, ResponseParser, UntaggedResponse};
