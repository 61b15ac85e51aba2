//! Response data types.

use crate::types::{Capability, Flag, ResponseCode, SeqNum, Uid};

/// FETCH response item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchItem {
    /// UID.
    Uid(Uid),
    /// Message flags.
    Flags(Vec<Flag>),
    /// RFC822 size.
    Rfc822Size(u32),
    /// `BODY[section]` data.
    Body {
        /// Section specifier, e.g. `HEADER.FIELDS (SUBJECT)`.
        section: Option<String>,
        /// Section bytes; `None` for NIL.
        data: Option<Vec<u8>>,
    },
}

/// Untagged response data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UntaggedResponse {
    /// OK with optional code.
    Ok {
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// NO
    No {
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// BAD
    Bad {
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// PREAUTH greeting.
    PreAuth {
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// BYE
    Bye {
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// CAPABILITY listing.
    Capability(Vec<Capability>),
    /// FLAGS defined for the selected mailbox.
    Flags(Vec<Flag>),
    /// EXISTS: message count.
    Exists(u32),
    /// RECENT count.
    Recent(u32),
    /// EXPUNGE of a sequence number.
    Expunge(SeqNum),
    /// FETCH data.
    Fetch {
        /// Message sequence number.
        seq: SeqNum,
        /// Fetch data items.
        items: Vec<FetchItem>,
    },
    /// SEARCH hits. Under `UID SEARCH` these are UIDs.
    Search(Vec<u32>),
}

impl FetchItem {
    /// Returns the UID if this item is one.
    #[must_use]
    pub const fn as_uid(&self) -> Option<Uid> {
        match self {
            Self::Uid(uid) => Some(*uid),
            _ => None,
        }
    }
}
