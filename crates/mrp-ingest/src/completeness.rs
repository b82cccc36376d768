//! Per-(source, sol) completeness ledger
//!
//! Ingestion runs for months and gets interrupted; this ledger is what
//! makes that survivable. Every sol attempt lands here as success, empty,
//! or failed, so a later run can tell at a glance which sols still need
//! work and which have been flaky.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::models::{CompletenessRecord, CompletenessStatus, CompletenessSummary, Source};
use crate::store::{CompletenessStore, PhotoStore, StoreResult};

/// Maintains the completeness ledger around each sol ingestion attempt
pub struct CompletenessTracker {
    store: Arc<dyn CompletenessStore>,
}

impl CompletenessTracker {
    pub fn new(store: Arc<dyn CompletenessStore>) -> Self {
        Self { store }
    }

    async fn load_or_new(&self, source: Source, sol: i32) -> StoreResult<CompletenessRecord> {
        Ok(self
            .store
            .get(source, sol)
            .await?
            .unwrap_or_else(|| CompletenessRecord::new(source, sol)))
    }

    /// Record a successful fetch of a sol
    ///
    /// A successful fetch that found nothing is `Empty`, not `Success`.
    /// Any success clears the trailing failure run and the stored error.
    pub async fn record_success(
        &self,
        source: Source,
        sol: i32,
        photo_count: i64,
        expected_count: Option<i64>,
    ) -> StoreResult<CompletenessRecord> {
        let mut record = self.load_or_new(source, sol).await?;
        let now = Utc::now();

        record.photo_count = photo_count;
        record.expected_count = expected_count.or(record.expected_count);
        record.status = if photo_count > 0 {
            CompletenessStatus::Success
        } else {
            CompletenessStatus::Empty
        };
        record.last_attempt_at = Some(now);
        record.last_success_at = Some(now);
        record.attempt_count += 1;
        record.consecutive_failures = 0;
        record.last_error = None;

        self.store.upsert(&record).await?;
        debug!(
            source = %source,
            sol,
            photo_count,
            status = %record.status,
            "Recorded sol success"
        );
        Ok(record)
    }

    /// Record a failed fetch of a sol
    pub async fn record_failure(
        &self,
        source: Source,
        sol: i32,
        error: &str,
    ) -> StoreResult<CompletenessRecord> {
        let mut record = self.load_or_new(source, sol).await?;

        record.status = CompletenessStatus::Failed;
        record.last_attempt_at = Some(Utc::now());
        record.attempt_count += 1;
        record.consecutive_failures += 1;
        record.last_error = Some(error.to_string());

        self.store.upsert(&record).await?;
        warn!(
            source = %source,
            sol,
            consecutive_failures = record.consecutive_failures,
            error,
            "Recorded sol failure"
        );
        Ok(record)
    }

    /// Aggregate ledger health for one source
    pub async fn summarize(&self, source: Source) -> StoreResult<CompletenessSummary> {
        let mut summary = CompletenessSummary::default();

        for record in self.store.list(source).await? {
            match record.status {
                CompletenessStatus::Pending => summary.pending += 1,
                CompletenessStatus::Success => summary.success += 1,
                CompletenessStatus::Partial => summary.partial += 1,
                CompletenessStatus::Failed => summary.failed += 1,
                CompletenessStatus::Empty => summary.empty += 1,
            }
            summary.total_photos += record.photo_count;
            if record.last_attempt_at > summary.last_attempt_at {
                summary.last_attempt_at = record.last_attempt_at;
            }
        }

        Ok(summary)
    }

    /// Reconcile ledger counts against what the canonical store actually holds
    ///
    /// Used after out-of-band data repair. Counts are corrected for every
    /// sol with stored photos; recorded terminal statuses are kept, except
    /// `Empty` with a nonzero stored count, which the count itself refutes.
    /// Sols with photos but no ledger entry get a `Success` entry. Returns
    /// the number of records written.
    pub async fn backfill(
        &self,
        source: Source,
        photos: &dyn PhotoStore,
    ) -> StoreResult<u64> {
        let mut written = 0u64;

        for (sol, count) in photos.sol_counts(source).await? {
            let mut record = self.load_or_new(source, sol).await?;
            let mut dirty = false;

            if record.photo_count != count {
                record.photo_count = count;
                dirty = true;
            }

            let refuted_empty =
                record.status == CompletenessStatus::Empty && count > 0;
            if record.status == CompletenessStatus::Pending || refuted_empty {
                record.status = CompletenessStatus::Success;
                dirty = true;
            }

            if dirty {
                self.store.upsert(&record).await?;
                written += 1;
            }
        }

        if written > 0 {
            info!(source = %source, records = written, "Backfilled completeness ledger");
        }
        Ok(written)
    }
}
