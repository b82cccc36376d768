//! Batch deduplication against the canonical store
//!
//! The feed has no "new since" cursor, so every page is re-fetched and
//! filtered here. One batched existence check per page keeps this at a
//! single round trip regardless of page size; the store's insert guard
//! remains the last line of defense against concurrent runs.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::models::{CanonicalPhoto, Source};
use crate::store::{PhotoStore, StoreResult};

/// Result of splitting a parsed batch into new and already-stored photos
#[derive(Debug, Default)]
pub struct DedupOutcome {
    /// Photos not yet in the canonical store, in feed order
    pub new: Vec<CanonicalPhoto>,
    /// Count of photos dropped as already stored or repeated in the batch
    pub duplicates: u64,
}

/// Filters parsed photos down to the ones worth inserting
pub struct Deduplicator {
    store: Arc<dyn PhotoStore>,
}

impl Deduplicator {
    pub fn new(store: Arc<dyn PhotoStore>) -> Self {
        Self { store }
    }

    /// Split `photos` into new records and duplicates with one store query
    ///
    /// Duplicates within the batch itself (the feed occasionally repeats an
    /// item across page boundaries) are also dropped, keeping the first.
    pub async fn split(
        &self,
        source: Source,
        photos: Vec<CanonicalPhoto>,
    ) -> StoreResult<DedupOutcome> {
        if photos.is_empty() {
            return Ok(DedupOutcome::default());
        }

        let ids: Vec<String> = photos.iter().map(|p| p.source_id.clone()).collect();
        let existing = self.store.existing_ids(source, &ids).await?;

        let mut seen: HashSet<String> = HashSet::with_capacity(photos.len());
        let mut outcome = DedupOutcome::default();

        for photo in photos {
            if existing.contains(&photo.source_id) || !seen.insert(photo.source_id.clone()) {
                outcome.duplicates += 1;
            } else {
                outcome.new.push(photo);
            }
        }

        if outcome.duplicates > 0 {
            debug!(
                source = %source,
                new = outcome.new.len(),
                duplicates = outcome.duplicates,
                "Filtered batch against canonical store"
            );
        }

        Ok(outcome)
    }
}
