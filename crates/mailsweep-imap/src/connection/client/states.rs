//! Type-state markers for the IMAP client.

use std::sync::Arc;

/// Greeting received; only AUTHENTICATE is meaningful.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotAuthenticated;

/// Authenticated; a mailbox can be selected.
#[derive(Debug, Clone, Copy, Default)]
pub struct Authenticated;

/// A mailbox is selected read-write.
#[derive(Debug, Clone)]
pub struct Selected {
    pub(crate) mailbox: Arc<str>,
}

impl Selected {
    /// Creates a new Selected state.
    #[must_use]
    pub fn new(mailbox: impl Into<Arc<str>>) -> Self {
        Self {
            mailbox: mailbox.into(),
        }
    }

    /// Returns the name of the selected mailbox.
    #[must_use]
    pub fn mailbox(&self) -> &str {
        &self.mailbox
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    fn _assert_send<T: Send>() {}
    fn _assert_sync<T: Sync>() {}

    #[test]
    fn test_state_markers_are_send_sync() {
        _assert_send::<NotAuthenticated>();
        _assert_sync::<NotAuthenticated>();
        _assert_send::<Authenticated>();
        _assert_sync::<Authenticated>();
        _assert_send::<Selected>();
        _assert_sync::<Selected>();
    }

    #[test]
    fn test_selected_mailbox_name() {
        let selected = Selected::new("Deleted Items");
        assert_eq!(selected.mailbox(), "Deleted Items");
    }
}
