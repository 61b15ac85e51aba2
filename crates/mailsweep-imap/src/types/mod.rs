//! Core IMAP types.
//!
//! Only the subset of RFC 3501 data the sweep needs: identifiers, flags,
//! capabilities, response codes and the SELECT summary.

#![allow(clippy::missing_const_for_fn)]

mod capability;
mod flags;
mod identifiers;
mod mailbox;
mod response_code;

pub use capability::{Capability, Status};
pub use flags::Flag;
pub use identifiers::{SeqNum, Tag, Uid, UidValidity};
pub use mailbox::MailboxStatus;
pub use response_code::ResponseCode;
