//! The mailbox operations the engines need.
//!
//! Engines borrow a store for one call and never keep a client handle, so a
//! reconnect inside the store is invisible to them apart from the UIDs, which
//! stay valid.

use std::future::Future;

use mailsweep_imap::connection::Connector;
use mailsweep_imap::{Result, SearchCriteria, Session, Uid};

/// A selected mailbox reachable over a connection that can be rebuilt.
pub trait MailStore {
    /// Probes the connection. Any failure means "not alive".
    fn is_alive(&mut self) -> impl Future<Output = bool>;

    /// Tears down and re-establishes the connection.
    fn reconnect(&mut self) -> impl Future<Output = Result<()>>;

    /// `UID SEARCH`, optionally with a CHARSET.
    fn uid_search(
        &mut self,
        criteria: &SearchCriteria,
        charset: Option<&str>,
    ) -> impl Future<Output = Result<Vec<Uid>>>;

    /// Peeks header fields of one message. `None` if the server sent no data.
    fn fetch_header_fields(
        &mut self,
        uid: Uid,
        fields: &[&str],
    ) -> impl Future<Output = Result<Option<Vec<u8>>>>;

    /// Flags one message `\Deleted`.
    fn store_deleted(&mut self, uid: Uid) -> impl Future<Output = Result<()>>;

    /// Commits deletions.
    fn expunge(&mut self) -> impl Future<Output = Result<()>>;

    /// Reconnects if the liveness probe fails.
    fn ensure_alive(&mut self) -> impl Future<Output = Result<()>> {
        async move {
            if self.is_alive().await {
                Ok(())
            } else {
                self.reconnect().await
            }
        }
    }
}

impl<C: Connector> MailStore for Session<C> {
    async fn is_alive(&mut self) -> bool {
        Session::is_alive(self).await
    }

    async fn reconnect(&mut self) -> Result<()> {
        Session::reconnect(self).await
    }

    async fn uid_search(
        &mut self,
        criteria: &SearchCriteria,
        charset: Option<&str>,
    ) -> Result<Vec<Uid>> {
        Session::uid_search(self, criteria, charset).await
    }

    async fn fetch_header_fields(&mut self, uid: Uid, fields: &[&str]) -> Result<Option<Vec<u8>>> {
        self.uid_fetch_header_fields(uid, fields).await
    }

    async fn store_deleted(&mut self, uid: Uid) -> Result<()> {
        self.uid_store_deleted(uid).await
    }

    async fn expunge(&mut self) -> Result<()> {
        Session::expunge(self).await.map(|_| ())
    }
}
