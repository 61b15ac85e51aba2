//! One cleanup run: locate, report, optionally delete.

use std::io::Write;

use chrono::{DateTime, Utc};
use mailsweep_imap::Uid;
use tracing::info;

use crate::delete::{DEFAULT_BATCH_SIZE, MutationEngine};
use crate::error::Result;
use crate::filter::MatchPredicate;
use crate::record::{DeletionReport, MessageRecord};
use crate::search::SearchEngine;
use crate::store::MailStore;

/// Characters of the subject shown per match.
pub const SUBJECT_PREVIEW_CHARS: usize = 50;

/// How a run treats its matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepOptions {
    /// Flag and expunge matches; otherwise only list them.
    pub delete: bool,
    /// UIDs per deletion batch.
    pub batch_size: usize,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            delete: false,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// What a run found and did.
#[derive(Debug, Clone)]
pub struct SweepReport {
    /// Matches in discovery order.
    pub records: Vec<MessageRecord>,
    /// Present when deletion ran.
    pub deletion: Option<DeletionReport>,
    /// Run start.
    pub started_at: DateTime<Utc>,
    /// Run end.
    pub finished_at: DateTime<Utc>,
}

impl SweepReport {
    /// Number of matches.
    #[must_use]
    pub fn matched(&self) -> usize {
        self.records.len()
    }

    /// Number of messages flagged for deletion.
    #[must_use]
    pub fn deleted(&self) -> usize {
        self.deletion.as_ref().map_or(0, DeletionReport::flagged_count)
    }
}

/// Runs `predicate` against the mailbox and writes the results to `out`.
///
/// Senders are searched server-side; other predicates scan every message.
/// UIDs already recorded by `search` are skipped, so one engine shared across
/// predicates reports each message once per run.
///
/// # Errors
///
/// Only writing to `out` can fail; mailbox errors are logged and skipped.
pub async fn sweep<S, P, W>(
    store: &mut S,
    search: &mut SearchEngine,
    predicate: &P,
    options: SweepOptions,
    out: &mut W,
) -> Result<SweepReport>
where
    S: MailStore,
    P: MatchPredicate + ?Sized,
    W: Write,
{
    let started_at = Utc::now();
    writeln!(out, "[*] {}", predicate.describe())?;
    writeln!(out)?;

    let records = match predicate.server_terms() {
        Some(terms) => search.search_senders(store, terms).await,
        None => search.scan(store, predicate).await,
    };

    for record in &records {
        write_match(out, record)?;
    }
    writeln!(out)?;
    writeln!(out, "[*] Summary: Found {} emails to process.", records.len())?;

    let deletion = if options.delete && !records.is_empty() {
        let uids: Vec<Uid> = records.iter().map(|r| r.uid).collect();
        let report = MutationEngine::new(options.batch_size)
            .delete_and_commit(store, &uids)
            .await;
        write_deletion(out, &report)?;
        Some(report)
    } else {
        writeln!(out, "[INFO] Read-only mode or no matches found. No changes made.")?;
        None
    };

    let finished_at = Utc::now();
    info!(
        matched = records.len(),
        elapsed_ms = (finished_at - started_at).num_milliseconds(),
        "sweep finished"
    );

    Ok(SweepReport {
        records,
        deletion,
        started_at,
        finished_at,
    })
}

fn write_match<W: Write>(out: &mut W, record: &MessageRecord) -> Result<()> {
    let subject = record.subject_preview(SUBJECT_PREVIEW_CHARS);
    match &record.sender {
        Some(sender) => writeln!(
            out,
            "  [MATCH] '{}' in sender '{}' | Subject: {}...",
            record.criterion, sender, subject
        )?,
        None => writeln!(
            out,
            "  [MATCH] '{}' | Subject: {}...",
            record.criterion, subject
        )?,
    }
    Ok(())
}

fn write_deletion<W: Write>(out: &mut W, report: &DeletionReport) -> Result<()> {
    writeln!(
        out,
        "[*] Flagged {} emails as deleted in {} batch(es).",
        report.flagged_count(),
        report.batches.len()
    )?;
    if !report.failed.is_empty() {
        writeln!(out, "[WARN] {} emails could not be flagged.", report.failed.len())?;
    }
    if report.expunged {
        writeln!(out, "[*] Deletions committed.")?;
    } else {
        writeln!(out, "[WARN] Expunge failed; flagged emails remain in the mailbox.")?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::filter::{SenderNameFilter, SubjectFilter};
    use crate::testing::{FakeStore, uid};

    fn netflix_store() -> FakeStore {
        FakeStore::default()
            .with_sender("Netflix", &[10, 11])
            .with_message(10, "Netflix <info@netflix.com>", "New on Netflix this week")
            .with_message(11, "Netflix <info@netflix.com>", "Your bill")
    }

    #[tokio::test]
    async fn test_sweep_deletes_matches() {
        let mut store = netflix_store();
        let filter = SenderNameFilter::new(["Netflix"]);
        let mut out = Vec::new();
        let options = SweepOptions {
            delete: true,
            ..SweepOptions::default()
        };
        let mut search = SearchEngine::new();

        let report = sweep(&mut store, &mut search, &filter, options, &mut out)
            .await
            .unwrap();

        assert_eq!(report.matched(), 2);
        assert_eq!(report.deleted(), 2);
        assert_eq!(store.count("STORE"), 2);
        assert_eq!(store.count("EXPUNGE"), 1);
        assert_eq!(store.flagged, [uid(10), uid(11)]);

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("[*] Senders containing: Netflix\n"));
        assert!(text.contains("  [MATCH] 'Netflix' | Subject: New on Netflix this week..."));
        assert!(text.contains("[*] Summary: Found 2 emails to process."));
        assert!(text.contains("Flagged 2 emails as deleted in 1 batch(es)."));
    }

    #[tokio::test]
    async fn test_read_only_sweep_leaves_mailbox() {
        let mut store = netflix_store();
        let filter = SenderNameFilter::new(["Netflix"]);
        let mut out = Vec::new();
        let mut search = SearchEngine::new();

        let report = sweep(
            &mut store,
            &mut search,
            &filter,
            SweepOptions::default(),
            &mut out,
        )
        .await
        .unwrap();

        assert_eq!(report.matched(), 2);
        assert!(report.deletion.is_none());
        assert_eq!(store.count("STORE"), 0);
        assert_eq!(store.count("EXPUNGE"), 0);
        assert!(String::from_utf8(out).unwrap().contains("Read-only mode"));
    }

    #[tokio::test]
    async fn test_subject_sweep_scans_and_truncates() {
        let long = "SALE ".repeat(20);
        let mut store = FakeStore::default()
            .with_message(1, "Shop <s@shop.com>", &long)
            .with_message(2, "Friend <f@x.com>", "hello");
        let filter = SubjectFilter::new(["sale"]);
        let mut out = Vec::new();
        let mut search = SearchEngine::new();

        let report = sweep(
            &mut store,
            &mut search,
            &filter,
            SweepOptions::default(),
            &mut out,
        )
        .await
        .unwrap();

        assert_eq!(report.matched(), 1);
        let text = String::from_utf8(out).unwrap();
        let expected = format!(
            "  [MATCH] 'sale' in sender 'Shop' | Subject: {}...",
            &long[..SUBJECT_PREVIEW_CHARS]
        );
        assert!(text.contains(&expected));
        assert!(text.contains("Subjects containing: SALE"));
    }

    #[tokio::test]
    async fn test_shared_engine_reports_message_once_across_predicates() {
        let mut store = FakeStore::default()
            .with_sender("Netflix", &[42])
            .with_message(42, "Netflix <info@netflix.com>", "Big sale");
        let mut search = SearchEngine::new();
        let mut out = Vec::new();

        let senders = SenderNameFilter::new(["Netflix"]);
        let first = sweep(&mut store, &mut search, &senders, Default::default(), &mut out)
            .await
            .unwrap();
        let subjects = SubjectFilter::new(["sale"]);
        let second = sweep(&mut store, &mut search, &subjects, Default::default(), &mut out)
            .await
            .unwrap();

        assert_eq!(first.matched(), 1);
        assert_eq!(second.matched(), 0);
        assert_eq!(first.matched() + second.matched(), 1);
        assert_eq!(search.recorded(), 1);
    }
}
