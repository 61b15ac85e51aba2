//! Server-side sender search and client-side scans.

use std::collections::HashSet;

use mailsweep_imap::{SearchCriteria, Uid};
use mailsweep_mime::{Headers, NO_SUBJECT};
use tracing::{debug, error, info, warn};

use crate::filter::{Candidate, MatchPredicate};
use crate::record::{MessageRecord, SUBJECT_UNAVAILABLE};
use crate::store::MailStore;

/// Charset tried first for non-ASCII sender names.
pub const SEARCH_CHARSET: &str = "UTF-8";

/// Locates messages and remembers which UIDs were already recorded this run.
#[derive(Debug, Default)]
pub struct SearchEngine {
    seen: HashSet<Uid>,
}

impl SearchEngine {
    /// Creates an engine with an empty dedup set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct UIDs recorded so far.
    #[must_use]
    pub fn recorded(&self) -> usize {
        self.seen.len()
    }

    /// `UID SEARCH FROM` for one criterion, in server order.
    ///
    /// Tries `CHARSET UTF-8` first, then no charset. Returns an empty list
    /// when both attempts fail.
    pub async fn search_by_sender<S: MailStore>(&self, store: &mut S, criterion: &str) -> Vec<Uid> {
        let criteria = SearchCriteria::from_sender(criterion);

        for charset in [Some(SEARCH_CHARSET), None] {
            let attempt = match store.ensure_alive().await {
                Ok(()) => store.uid_search(&criteria, charset).await,
                Err(e) => Err(e),
            };
            match attempt {
                Ok(uids) => {
                    debug!(criterion, ?charset, count = uids.len(), "search complete");
                    return uids;
                }
                Err(e) => warn!(criterion, ?charset, error = %e, "search attempt failed"),
            }
        }

        error!(criterion, "search failed with and without charset");
        Vec::new()
    }

    /// Searches each sender criterion and records every new match.
    ///
    /// A criterion interrupted by a dead connection is retried once after a
    /// reconnect. Already-recorded UIDs are skipped on the retry.
    pub async fn search_senders<S: MailStore>(
        &mut self,
        store: &mut S,
        criteria: &[String],
    ) -> Vec<MessageRecord> {
        let mut records = Vec::new();

        for criterion in criteria {
            info!(criterion = %criterion, "searching sender");
            let before = records.len();

            if let Err(e) = self.collect(store, criterion, &mut records).await {
                warn!(criterion = %criterion, error = %e, "connection lost, retrying criterion");
                match store.reconnect().await {
                    Ok(()) => {
                        if let Err(e) = self.collect(store, criterion, &mut records).await {
                            error!(criterion = %criterion, error = %e, "criterion abandoned");
                        }
                    }
                    Err(e) => error!(criterion = %criterion, error = %e, "reconnect failed"),
                }
            }

            info!(criterion = %criterion, found = records.len() - before, "sender searched");
        }

        records
    }

    /// Fetches every message's sender and subject and keeps what `predicate` matches.
    ///
    /// Used for predicates that cannot be expressed as a server search.
    pub async fn scan<S, P>(&mut self, store: &mut S, predicate: &P) -> Vec<MessageRecord>
    where
        S: MailStore,
        P: MatchPredicate + ?Sized,
    {
        let mut records = Vec::new();

        if let Err(e) = self.scan_once(store, predicate, &mut records).await {
            warn!(error = %e, "connection lost during scan, retrying");
            match store.reconnect().await {
                Ok(()) => {
                    if let Err(e) = self.scan_once(store, predicate, &mut records).await {
                        error!(error = %e, "scan abandoned");
                    }
                }
                Err(e) => error!(error = %e, "reconnect failed"),
            }
        }

        records
    }

    /// Records the subject of each new UID matching `criterion`.
    ///
    /// Returns an error only when the connection died mid-way.
    async fn collect<S: MailStore>(
        &mut self,
        store: &mut S,
        criterion: &str,
        records: &mut Vec<MessageRecord>,
    ) -> mailsweep_imap::Result<()> {
        for uid in self.search_by_sender(store, criterion).await {
            if self.seen.contains(&uid) {
                debug!(uid = %uid, criterion, "[SKIP] already recorded");
                continue;
            }

            let subject = match store.fetch_header_fields(uid, &["SUBJECT"]).await {
                Ok(Some(raw)) => Headers::parse(&raw).subject(),
                Ok(None) => NO_SUBJECT.to_string(),
                Err(e) => {
                    if e.is_transport() && !store.is_alive().await {
                        return Err(e);
                    }
                    warn!(uid = %uid, error = %e, "subject fetch failed");
                    SUBJECT_UNAVAILABLE.to_string()
                }
            };

            debug!(uid = %uid, criterion, "[MATCH]");
            self.seen.insert(uid);
            records.push(MessageRecord::new(uid, criterion, subject));
        }
        Ok(())
    }

    async fn scan_once<S, P>(
        &mut self,
        store: &mut S,
        predicate: &P,
        records: &mut Vec<MessageRecord>,
    ) -> mailsweep_imap::Result<()>
    where
        S: MailStore,
        P: MatchPredicate + ?Sized,
    {
        store.ensure_alive().await?;
        let uids = store.uid_search(&SearchCriteria::All, None).await?;
        info!(count = uids.len(), "scanning mailbox");

        for uid in uids {
            if self.seen.contains(&uid) {
                continue;
            }

            let raw = match store.fetch_header_fields(uid, &["FROM", "SUBJECT"]).await {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(e) => {
                    if e.is_transport() && !store.is_alive().await {
                        return Err(e);
                    }
                    warn!(uid = %uid, error = %e, "header fetch failed");
                    continue;
                }
            };

            let headers = Headers::parse(&raw);
            let candidate = Candidate {
                uid,
                sender: headers.sender_name(),
                subject: headers.subject(),
            };

            if let Some(term) = predicate.matches(&candidate) {
                debug!(uid = %uid, term = %term, "[MATCH]");
                self.seen.insert(uid);
                records.push(
                    MessageRecord::new(uid, term, candidate.subject).with_sender(candidate.sender),
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::filter::SubjectFilter;
    use crate::testing::{FakeStore, uid};

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[tokio::test]
    async fn test_search_prefers_utf8_charset() {
        let mut store = FakeStore::default().with_sender("Netflix", &[10, 11]);
        let engine = SearchEngine::new();

        let uids = engine.search_by_sender(&mut store, "Netflix").await;
        assert_eq!(uids, vec![uid(10), uid(11)]);
        assert_eq!(store.calls, ["NOOP", "SEARCH Some(\"UTF-8\")"]);
    }

    #[tokio::test]
    async fn test_search_falls_back_without_charset() {
        let mut store = FakeStore {
            reject_charset: true,
            ..FakeStore::default()
        }
        .with_sender("Netflix", &[7]);

        let uids = SearchEngine::new()
            .search_by_sender(&mut store, "Netflix")
            .await;
        assert_eq!(uids, vec![uid(7)]);
        assert_eq!(store.count("SEARCH"), 2);
        assert_eq!(store.calls.last().unwrap(), "SEARCH None");
    }

    #[tokio::test]
    async fn test_search_both_attempts_fail() {
        let mut store = FakeStore {
            reject_search: true,
            ..FakeStore::default()
        };
        let uids = SearchEngine::new()
            .search_by_sender(&mut store, "Netflix")
            .await;
        assert!(uids.is_empty());
        assert_eq!(store.count("SEARCH"), 2);
    }

    #[tokio::test]
    async fn test_dead_probe_reconnects_before_search() {
        let mut store = FakeStore::default().with_sender("Netflix", &[3]);
        store.probes.push_back(false);

        let uids = SearchEngine::new()
            .search_by_sender(&mut store, "Netflix")
            .await;
        assert_eq!(uids, vec![uid(3)]);
        assert_eq!(store.calls[..3], ["NOOP", "RECONNECT", "SEARCH Some(\"UTF-8\")"]);
    }

    #[tokio::test]
    async fn test_overlapping_criteria_record_once() {
        let mut store = FakeStore::default()
            .with_sender("Netflix", &[42])
            .with_sender("Flix", &[42, 43])
            .with_message(42, "Netflix <info@netflix.com>", "New arrivals")
            .with_message(43, "Flix Bus <bus@flix.com>", "Your ticket");

        let mut engine = SearchEngine::new();
        let records = engine
            .search_senders(&mut store, &names(&["Netflix", "Flix"]))
            .await;

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].uid, uid(42));
        assert_eq!(records[0].criterion, "Netflix");
        assert_eq!(records[0].subject, "New arrivals");
        assert_eq!(records[1].uid, uid(43));
        assert_eq!(store.count("FETCH 42"), 1);
        assert_eq!(engine.recorded(), 2);
    }

    #[tokio::test]
    async fn test_subject_fetch_error_is_substituted() {
        let mut store = FakeStore::default()
            .with_sender("Shop", &[5, 6])
            .with_message(6, "Shop", "Sale");
        store.fetch_failures.insert(uid(5), false);

        let records = SearchEngine::new()
            .search_senders(&mut store, &names(&["Shop"]))
            .await;

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].subject, SUBJECT_UNAVAILABLE);
        assert_eq!(records[1].subject, "Sale");
        assert_eq!(store.count("RECONNECT"), 0);
    }

    #[tokio::test]
    async fn test_missing_subject_uses_placeholder() {
        let mut store = FakeStore::default().with_sender("Shop", &[9]);
        let records = SearchEngine::new()
            .search_senders(&mut store, &names(&["Shop"]))
            .await;
        assert_eq!(records[0].subject, NO_SUBJECT);
    }

    #[tokio::test]
    async fn test_dead_connection_retries_criterion_once() {
        let mut store = FakeStore::default()
            .with_sender("Shop", &[1, 2, 3])
            .with_message(1, "Shop", "one")
            .with_message(2, "Shop", "two")
            .with_message(3, "Shop", "three");
        store.fetch_failures.insert(uid(2), true);

        let records = SearchEngine::new()
            .search_senders(&mut store, &names(&["Shop"]))
            .await;

        let subjects: Vec<_> = records.iter().map(|r| r.subject.as_str()).collect();
        assert_eq!(subjects, ["one", "two", "three"]);
        assert_eq!(store.count("RECONNECT"), 1);
        assert_eq!(store.count("FETCH 1"), 1);
        assert_eq!(store.count("FETCH 2"), 2);
    }

    #[tokio::test]
    async fn test_failed_reconnect_moves_to_next_criterion() {
        let mut store = FakeStore::default()
            .with_sender("Shop", &[1])
            .with_sender("News", &[8])
            .with_message(8, "News", "Daily");
        store.fetch_failures.insert(uid(1), true);
        store.reconnect_failures = 1;

        let records = SearchEngine::new()
            .search_senders(&mut store, &names(&["Shop", "News"]))
            .await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].uid, uid(8));
    }

    #[tokio::test]
    async fn test_scan_applies_predicate() {
        let mut store = FakeStore::default()
            .with_message(1, "\"Shop\" <a@shop.com>", "Big SALE")
            .with_message(2, "Friend <f@x.com>", "Lunch?")
            .with_message(3, "News <n@x.com>", "=?UTF-8?Q?Flash_sale?=");

        let filter = SubjectFilter::new(["sale"]);
        let records = SearchEngine::new().scan(&mut store, &filter).await;

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].sender.as_deref(), Some("Shop"));
        assert_eq!(records[0].criterion, "sale");
        assert_eq!(records[1].subject, "Flash sale");
    }
}
