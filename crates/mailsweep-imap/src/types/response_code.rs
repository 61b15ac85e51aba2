//! Bracketed response codes.

use super::{Capability, Flag, SeqNum, Uid, UidValidity};

/// Response code carried by a status response, e.g. `[UIDVALIDITY 3857529045]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseCode {
    /// ALERT: text that must be shown to the user.
    Alert,
    /// CAPABILITY list, usually in the greeting or after authentication.
    Capability(Vec<Capability>),
    /// PARSE: the server could not parse a message.
    Parse,
    /// PERMANENTFLAGS: flags the client may change permanently.
    PermanentFlags(Vec<Flag>),
    /// READ-ONLY
    ReadOnly,
    /// READ-WRITE
    ReadWrite,
    /// TRYCREATE
    TryCreate,
    /// UIDNEXT
    UidNext(Uid),
    /// UIDVALIDITY
    UidValidity(UidValidity),
    /// UNSEEN: first unseen sequence number.
    Unseen(SeqNum),
    /// Unknown response code.
    Unknown(String),
}
