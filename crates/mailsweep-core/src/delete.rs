//! Batched flag-and-expunge.

use mailsweep_imap::Uid;
use tracing::{debug, error, info, warn};

use crate::record::DeletionReport;
use crate::store::MailStore;

/// Default number of UIDs per batch.
pub const DEFAULT_BATCH_SIZE: usize = 100;

enum Flagging {
    Flagged,
    Failed,
    ConnectionDead,
}

/// Flags messages `\Deleted` in bounded batches, then commits with EXPUNGE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationEngine {
    batch_size: usize,
}

impl Default for MutationEngine {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

impl MutationEngine {
    /// Creates an engine. A batch size of 0 is treated as 1.
    #[must_use]
    pub const fn new(batch_size: usize) -> Self {
        Self {
            batch_size: if batch_size == 0 { 1 } else { batch_size },
        }
    }

    /// Effective batch size.
    #[must_use]
    pub const fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Flags every UID and expunges once at the end.
    ///
    /// Failures are logged and reported, never returned. A store that fails
    /// is retried once after a forced reconnect; if that reconnect fails the
    /// remainder of the batch is reported as failed. EXPUNGE gets the same
    /// single retry.
    pub async fn delete_and_commit<S: MailStore>(
        &self,
        store: &mut S,
        uids: &[Uid],
    ) -> DeletionReport {
        let mut report = DeletionReport::default();

        if uids.is_empty() {
            info!("nothing to delete");
            return report;
        }

        let total = uids.len().div_ceil(self.batch_size);
        for (index, batch) in uids.chunks(self.batch_size).enumerate() {
            report.batches.push(batch.len());
            info!(batch = index + 1, total, size = batch.len(), "flagging batch");

            if let Err(e) = store.ensure_alive().await {
                error!(batch = index + 1, error = %e, "connection unavailable, batch skipped");
                report.failed.extend_from_slice(batch);
                continue;
            }

            let mut pending = batch.iter().copied();
            while let Some(uid) = pending.next() {
                match flag(store, uid).await {
                    Flagging::Flagged => report.flagged.push(uid),
                    Flagging::Failed => report.failed.push(uid),
                    Flagging::ConnectionDead => {
                        report.failed.push(uid);
                        report.failed.extend(pending.by_ref());
                        error!(batch = index + 1, "connection lost, rest of batch abandoned");
                    }
                }
            }
        }

        if report.flagged.is_empty() {
            warn!(failed = report.failed.len(), "no message was flagged, skipping expunge");
            return report;
        }

        report.expunged = commit(store).await;
        info!(
            flagged = report.flagged.len(),
            failed = report.failed.len(),
            expunged = report.expunged,
            "deletion finished"
        );
        report
    }
}

async fn flag<S: MailStore>(store: &mut S, uid: Uid) -> Flagging {
    let first = match store.ensure_alive().await {
        Ok(()) => store.store_deleted(uid).await,
        Err(e) => Err(e),
    };
    let Err(e) = first else {
        debug!(uid = %uid, "flagged");
        return Flagging::Flagged;
    };

    warn!(uid = %uid, error = %e, "store failed, reconnecting");
    if let Err(e) = store.reconnect().await {
        error!(uid = %uid, error = %e, "reconnect failed");
        return Flagging::ConnectionDead;
    }

    match store.store_deleted(uid).await {
        Ok(()) => {
            debug!(uid = %uid, "flagged on retry");
            Flagging::Flagged
        }
        Err(e) => {
            error!(uid = %uid, error = %e, "store failed after retry");
            Flagging::Failed
        }
    }
}

async fn commit<S: MailStore>(store: &mut S) -> bool {
    let first = match store.ensure_alive().await {
        Ok(()) => store.expunge().await,
        Err(e) => Err(e),
    };
    let Err(e) = first else {
        return true;
    };

    warn!(error = %e, "expunge failed, reconnecting");
    let retry = match store.reconnect().await {
        Ok(()) => store.expunge().await,
        Err(e) => Err(e),
    };
    match retry {
        Ok(()) => true,
        Err(e) => {
            error!(error = %e, "expunge failed after retry");
            false
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::{FakeStore, uid};

    fn uids(range: std::ops::RangeInclusive<u32>) -> Vec<Uid> {
        range.map(uid).collect()
    }

    #[test]
    fn test_zero_batch_size_is_one() {
        assert_eq!(MutationEngine::new(0).batch_size(), 1);
        assert_eq!(MutationEngine::default().batch_size(), DEFAULT_BATCH_SIZE);
    }

    #[tokio::test]
    async fn test_empty_input_is_noop() {
        let mut store = FakeStore::default();
        let report = MutationEngine::default()
            .delete_and_commit(&mut store, &[])
            .await;
        assert_eq!(report, DeletionReport::default());
        assert!(store.calls.is_empty());
    }

    #[tokio::test]
    async fn test_batches_partition_input() {
        let mut store = FakeStore::default();
        let input = uids(1..=250);

        let report = MutationEngine::new(100)
            .delete_and_commit(&mut store, &input)
            .await;

        assert_eq!(report.batches, [100, 100, 50]);
        assert_eq!(report.flagged, input);
        assert_eq!(store.flagged, input);
        assert_eq!(store.count("STORE"), 250);
        assert_eq!(store.count("EXPUNGE"), 1);
        assert!(report.is_complete());
    }

    #[tokio::test]
    async fn test_dead_probe_reconnects_once_before_store() {
        let mut store = FakeStore::default();
        // Batch probe passes, the per-store probe fails.
        store.probes.extend([true, false]);

        let report = MutationEngine::default()
            .delete_and_commit(&mut store, &[uid(4)])
            .await;

        assert_eq!(store.calls[..4], ["NOOP", "NOOP", "RECONNECT", "STORE 4"]);
        assert_eq!(store.count("RECONNECT"), 1);
        assert_eq!(report.flagged, [uid(4)]);
    }

    #[tokio::test]
    async fn test_failed_store_retried_once() {
        let mut store = FakeStore::default();
        store.store_failures.insert(uid(2), 1);
        store.store_failures.insert(uid(3), 2);

        let report = MutationEngine::default()
            .delete_and_commit(&mut store, &uids(1..=4))
            .await;

        assert_eq!(report.flagged, [uid(1), uid(2), uid(4)]);
        assert_eq!(report.failed, [uid(3)]);
        assert_eq!(store.count("STORE 2"), 2);
        assert_eq!(store.count("STORE 3"), 2);
        assert!(report.expunged);
        assert!(!report.is_complete());
    }

    #[tokio::test]
    async fn test_dead_reconnect_abandons_rest_of_batch() {
        let mut store = FakeStore::default();
        store.store_failures.insert(uid(2), 1);
        store.reconnect_failures = 1;

        let report = MutationEngine::new(3)
            .delete_and_commit(&mut store, &uids(1..=5))
            .await;

        assert_eq!(report.batches, [3, 2]);
        assert_eq!(report.failed, [uid(2), uid(3)]);
        assert_eq!(report.flagged, [uid(1), uid(4), uid(5)]);
        assert_eq!(store.count("STORE 3"), 0);
        assert!(report.expunged);
    }

    #[tokio::test]
    async fn test_expunge_retried_once() {
        let mut store = FakeStore {
            expunge_failures: 1,
            ..FakeStore::default()
        };
        let report = MutationEngine::default()
            .delete_and_commit(&mut store, &[uid(1)])
            .await;
        assert!(report.expunged);
        assert_eq!(store.count("EXPUNGE"), 2);

        let mut store = FakeStore {
            expunge_failures: 2,
            ..FakeStore::default()
        };
        let report = MutationEngine::default()
            .delete_and_commit(&mut store, &[uid(1)])
            .await;
        assert!(!report.expunged);
        assert_eq!(store.count("EXPUNGE"), 2);
    }
}
