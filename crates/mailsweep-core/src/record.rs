//! Values produced by a sweep.

use mailsweep_imap::Uid;

/// Subject recorded when the subject fetch itself failed.
pub const SUBJECT_UNAVAILABLE: &str = "(error fetching subject)";

/// One located message.
///
/// Messages are addressed by UID only; sequence numbers shift under EXPUNGE
/// and across reconnections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    /// Persistent message UID.
    pub uid: Uid,
    /// The criterion that matched.
    pub criterion: String,
    /// Decoded subject, best effort.
    pub subject: String,
    /// Decoded sender display name, when it was fetched.
    pub sender: Option<String>,
}

impl MessageRecord {
    /// Creates a record found by server-side search.
    #[must_use]
    pub fn new(uid: Uid, criterion: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            uid,
            criterion: criterion.into(),
            subject: subject.into(),
            sender: None,
        }
    }

    /// Attaches the sender display name.
    #[must_use]
    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    /// The subject cut to `max_chars` characters.
    #[must_use]
    pub fn subject_preview(&self, max_chars: usize) -> String {
        self.subject.chars().take(max_chars).collect()
    }
}

/// Outcome of a flag-and-expunge pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionReport {
    /// Size of each batch, in submission order.
    pub batches: Vec<usize>,
    /// UIDs flagged `\Deleted`.
    pub flagged: Vec<Uid>,
    /// UIDs that could not be flagged.
    pub failed: Vec<Uid>,
    /// Whether EXPUNGE completed.
    pub expunged: bool,
}

impl DeletionReport {
    /// Number of messages flagged.
    #[must_use]
    pub fn flagged_count(&self) -> usize {
        self.flagged.len()
    }

    /// True when every requested UID was flagged and the expunge committed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.expunged
    }
}
