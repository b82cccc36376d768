//! Storage boundary for the ingestion core
//!
//! The ingestion pipeline only ever talks to these traits. The Postgres
//! implementation is the production canonical store; the in-memory one
//! backs tests and dry runs with identical semantics, including the
//! per-`source_id` insert guard.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use std::collections::HashSet;
use uuid::Uuid;

use crate::models::{CanonicalPhoto, CompletenessRecord, JobRun, Source};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Result type alias for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Canonical photo store
///
/// `source_id` is globally unique; `insert_photos` must tolerate concurrent
/// overlapping runs by enforcing uniqueness at the storage boundary rather
/// than trusting the caller's pre-check read.
#[async_trait]
pub trait PhotoStore: Send + Sync {
    /// Which of `ids` already exist, as one batched check
    async fn existing_ids(&self, source: Source, ids: &[String]) -> StoreResult<HashSet<String>>;

    /// Insert photos, ignoring `source_id` conflicts; returns the number
    /// actually inserted
    async fn insert_photos(&self, photos: &[CanonicalPhoto]) -> StoreResult<u64>;

    /// Stored photo count for one (source, sol)
    async fn count_for_sol(&self, source: Source, sol: i32) -> StoreResult<i64>;

    /// Per-sol stored photo counts for a source, ascending by sol
    async fn sol_counts(&self, source: Source) -> StoreResult<Vec<(i32, i64)>>;

    /// Highest sol with at least one stored photo
    async fn max_sol(&self, source: Source) -> StoreResult<Option<i32>>;
}

/// Per-(source, sol) completeness ledger
#[async_trait]
pub trait CompletenessStore: Send + Sync {
    async fn get(&self, source: Source, sol: i32) -> StoreResult<Option<CompletenessRecord>>;

    async fn upsert(&self, record: &CompletenessRecord) -> StoreResult<()>;

    /// All records for a source, ascending by sol
    async fn list(&self, source: Source) -> StoreResult<Vec<CompletenessRecord>>;
}

/// Job run persistence
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Record a newly started run
    async fn insert_run(&self, run: &JobRun) -> StoreResult<()>;

    /// Set the completion fields and per-source details, exactly once
    async fn complete_run(&self, run: &JobRun) -> StoreResult<()>;

    async fn get_run(&self, id: Uuid) -> StoreResult<Option<JobRun>>;
}
