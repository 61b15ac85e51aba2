//! # mailsweep-mime
//!
//! Forgiving header decoding for mail fetched over IMAP.
//!
//! Header bytes coming off the wire are frequently mislabelled: a subject may
//! declare `unknown-8bit`, claim UTF-8 while carrying Latin-1, or skip RFC 2047
//! entirely. Everything in this crate degrades instead of failing.
//!
//! ## Decoding a header value
//!
//! ```
//! use mailsweep_mime::decode_header;
//!
//! assert_eq!(decode_header(b"=?utf-8?B?SMOpbGxv?="), "Héllo");
//! assert_eq!(decode_header(b"Plain subject"), "Plain subject");
//! assert_eq!(decode_header(b""), "");
//! ```
//!
//! ## Reading fields from a fetched header block
//!
//! ```
//! use mailsweep_mime::Headers;
//!
//! let block = b"Subject: =?iso-8859-1?Q?Caf=E9?=\r\nFrom: \"Netflix\" <info@netflix.com>\r\n\r\n";
//! let headers = Headers::parse(block);
//! assert_eq!(headers.subject(), "Café");
//! assert_eq!(headers.sender_name(), "Netflix");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod charset;
mod error;
mod header;

pub mod encoding;

pub use charset::{Charset, decode_with_fallback};
pub use encoding::decode_header;
pub use error::{Error, Result};
pub use header::{Headers, NO_SUBJECT, display_name};
