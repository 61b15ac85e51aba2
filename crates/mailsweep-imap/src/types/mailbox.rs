//! Mailbox summary returned by SELECT.

use super::{SeqNum, Uid, UidValidity};

/// Untagged data collected while selecting a mailbox.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailboxStatus {
    /// Number of messages in the mailbox.
    pub exists: u32,
    /// Number of recent messages.
    pub recent: u32,
    /// First unseen message sequence number.
    pub unseen: Option<SeqNum>,
    /// Next UID to be assigned.
    pub uid_next: Option<Uid>,
    /// UIDVALIDITY value.
    pub uid_validity: Option<UidValidity>,
    /// Whether the server opened the mailbox read-only.
    pub read_only: bool,
}
