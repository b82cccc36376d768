//! In-memory store
//!
//! Mirrors the Postgres semantics closely enough for tests and dry runs:
//! inserts are per-`source_id` compare-and-set under one lock, so two
//! overlapping ingestion runs cannot double-insert.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use uuid::Uuid;

use crate::models::{CanonicalPhoto, CompletenessRecord, JobRun, Source};

use super::{CompletenessStore, JobStore, PhotoStore, StoreResult};

/// In-memory implementation of all store traits
#[derive(Debug, Default)]
pub struct MemoryStore {
    photos: Mutex<HashMap<(Source, String), CanonicalPhoto>>,
    completeness: Mutex<BTreeMap<(Source, i32), CompletenessRecord>>,
    runs: Mutex<HashMap<Uuid, JobRun>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total stored photos (test helper)
    pub fn photo_count(&self) -> usize {
        lock(&self.photos).len()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl PhotoStore for MemoryStore {
    async fn existing_ids(&self, source: Source, ids: &[String]) -> StoreResult<HashSet<String>> {
        let photos = lock(&self.photos);
        Ok(ids
            .iter()
            .filter(|id| photos.contains_key(&(source, (*id).clone())))
            .cloned()
            .collect())
    }

    async fn insert_photos(&self, photos: &[CanonicalPhoto]) -> StoreResult<u64> {
        let mut stored = lock(&self.photos);
        let mut inserted = 0;

        for photo in photos {
            let key = (photo.source, photo.source_id.clone());
            // Existing records are never updated; re-ingest is a no-op
            if let std::collections::hash_map::Entry::Vacant(entry) = stored.entry(key) {
                entry.insert(photo.clone());
                inserted += 1;
            }
        }

        Ok(inserted)
    }

    async fn count_for_sol(&self, source: Source, sol: i32) -> StoreResult<i64> {
        let photos = lock(&self.photos);
        Ok(photos
            .values()
            .filter(|photo| photo.source == source && photo.sol == sol)
            .count() as i64)
    }

    async fn sol_counts(&self, source: Source) -> StoreResult<Vec<(i32, i64)>> {
        let photos = lock(&self.photos);
        let mut counts: BTreeMap<i32, i64> = BTreeMap::new();

        for photo in photos.values().filter(|photo| photo.source == source) {
            *counts.entry(photo.sol).or_insert(0) += 1;
        }

        Ok(counts.into_iter().collect())
    }

    async fn max_sol(&self, source: Source) -> StoreResult<Option<i32>> {
        let photos = lock(&self.photos);
        Ok(photos
            .values()
            .filter(|photo| photo.source == source)
            .map(|photo| photo.sol)
            .max())
    }
}

#[async_trait]
impl CompletenessStore for MemoryStore {
    async fn get(&self, source: Source, sol: i32) -> StoreResult<Option<CompletenessRecord>> {
        Ok(lock(&self.completeness).get(&(source, sol)).cloned())
    }

    async fn upsert(&self, record: &CompletenessRecord) -> StoreResult<()> {
        lock(&self.completeness).insert((record.source, record.sol), record.clone());
        Ok(())
    }

    async fn list(&self, source: Source) -> StoreResult<Vec<CompletenessRecord>> {
        Ok(lock(&self.completeness)
            .values()
            .filter(|record| record.source == source)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn insert_run(&self, run: &JobRun) -> StoreResult<()> {
        lock(&self.runs).insert(run.id, run.clone());
        Ok(())
    }

    async fn complete_run(&self, run: &JobRun) -> StoreResult<()> {
        let mut runs = lock(&self.runs);
        // Completion fields are written once; a finished run stays as-is
        match runs.get(&run.id) {
            Some(existing) if existing.is_finished() => {},
            _ => {
                runs.insert(run.id, run.clone());
            },
        }
        Ok(())
    }

    async fn get_run(&self, id: Uuid) -> StoreResult<Option<JobRun>> {
        Ok(lock(&self.runs).get(&id).cloned())
    }
}
