//! Per-sol scrape pipeline
//!
//! One `scrape_sol` call walks a single (source, sol) through the full
//! pipeline: paginate the feed, normalize every raw item through the
//! source adapter, deduplicate against the canonical store, insert the
//! survivors, and settle the completeness ledger. Item-level problems are
//! counted and skipped; a transport failure aborts the sol, lands in the
//! ledger as a failure, and surfaces to the caller.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::completeness::CompletenessTracker;
use crate::config::IngestConfig;
use crate::dedup::Deduplicator;
use crate::feed::{FeedClient, FeedError, FetchOutcome};
use crate::models::{CanonicalPhoto, CompletenessStatus, Source};
use crate::sources::{adapter, ParseError, ParsedItem};
use crate::store::{CompletenessStore, PhotoStore, StoreError};

/// Error type for sol scraping
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("malformed feed page: {0}")]
    Page(#[from] ParseError),
}

/// Result type alias for sol scraping
pub type ScrapeResult<T> = std::result::Result<T, ScrapeError>;

/// Outcome of one (source, sol) scrape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolOutcome {
    /// Ledger status this scrape settled on (`Success` or `Empty`)
    pub status: CompletenessStatus,
    /// Photos newly inserted into the canonical store
    pub inserted: u64,
    /// Items dropped as thumbnails or unparsable (not failures)
    pub skipped: u64,
    /// Items dropped as already stored or repeated in the feed
    pub duplicates: u64,
    /// Adapter errors among the skipped items
    pub item_errors: u64,
    /// Stored photo total for this sol after the scrape
    pub photo_count: i64,
    /// Upstream's expected photo count, when the feed reports one
    pub expected: Option<i64>,
}

/// Scrapes one sol at a time from an upstream feed
pub struct SolScraper {
    config: Arc<IngestConfig>,
    client: FeedClient,
    photos: Arc<dyn PhotoStore>,
    dedup: Deduplicator,
    tracker: CompletenessTracker,
}

impl SolScraper {
    pub fn new(
        config: Arc<IngestConfig>,
        photos: Arc<dyn PhotoStore>,
        completeness: Arc<dyn CompletenessStore>,
    ) -> ScrapeResult<Self> {
        let client = FeedClient::new(std::time::Duration::from_secs(
            config.request_timeout_secs,
        ))?;

        Ok(Self {
            config,
            client,
            photos: photos.clone(),
            dedup: Deduplicator::new(photos),
            tracker: CompletenessTracker::new(completeness),
        })
    }

    /// Current latest sol reported by the source
    pub async fn latest_sol(&self, source: Source) -> ScrapeResult<u32> {
        let adapter = adapter(source);
        let url = adapter.latest_sol_url(self.config.base_url(source));

        match self.client.fetch_page(&url).await? {
            FetchOutcome::Json(body) => Ok(adapter.parse_latest_sol(&body)?),
            FetchOutcome::NotFound => Err(FeedError::Status {
                status: 404,
                url,
            }
            .into()),
        }
    }

    /// Ingest one sol end to end
    ///
    /// Every fetch failure is recorded in the completeness ledger before it
    /// is returned, so the ledger never silently misses an attempt.
    pub async fn scrape_sol(&self, source: Source, sol: u32) -> ScrapeResult<SolOutcome> {
        match self.fetch_and_ingest(source, sol).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                self.tracker
                    .record_failure(source, sol as i32, &err.to_string())
                    .await?;
                Err(err)
            },
        }
    }

    async fn fetch_and_ingest(&self, source: Source, sol: u32) -> ScrapeResult<SolOutcome> {
        let adapter = adapter(source);
        let base_url = self.config.base_url(source);

        let mut candidates: Vec<CanonicalPhoto> = Vec::new();
        let mut skipped = 0u64;
        let mut item_errors = 0u64;
        let mut expected: Option<i64> = None;

        for page in 0..self.config.max_pages_per_sol {
            let url = adapter.page_url(base_url, sol, page, self.config.per_page);

            let body = match self.client.fetch_page(&url).await? {
                FetchOutcome::Json(body) => body,
                FetchOutcome::NotFound if page == 0 && adapter.empty_sol_on_not_found() => {
                    // Genuinely empty sol for this source family
                    let record = self.tracker.record_success(source, sol as i32, 0, None).await?;
                    debug!(source = %source, sol, "Sol has no images");
                    return Ok(SolOutcome {
                        status: record.status,
                        inserted: 0,
                        skipped: 0,
                        duplicates: 0,
                        item_errors: 0,
                        photo_count: 0,
                        expected: None,
                    });
                },
                // Past the last page, but only where 404 means "no data"
                FetchOutcome::NotFound if page > 0 && adapter.empty_sol_on_not_found() => break,
                FetchOutcome::NotFound => {
                    return Err(FeedError::Status { status: 404, url }.into());
                },
            };

            let feed_page = adapter.parse_page(&body)?;

            if page == 0 {
                expected = feed_page
                    .total
                    .map(|total| adapter.expected_from_total(total) as i64);
            }

            if feed_page.items.is_empty() {
                break;
            }

            let page_len = feed_page.items.len();
            for raw in &feed_page.items {
                match adapter.parse_item(raw) {
                    Ok(ParsedItem::Photo(photo)) => candidates.push(*photo),
                    Ok(ParsedItem::Skip(reason)) => {
                        skipped += 1;
                        debug!(source = %source, sol, reason, "Skipped feed item");
                    },
                    Err(err) => {
                        skipped += 1;
                        item_errors += 1;
                        warn!(source = %source, sol, error = %err, "Unparsable feed item");
                    },
                }
            }

            if (page_len as u32) < self.config.per_page {
                break;
            }

            if page + 1 == self.config.max_pages_per_sol {
                warn!(
                    source = %source,
                    sol,
                    max_pages = self.config.max_pages_per_sol,
                    "Stopping pagination at page cap"
                );
            }
        }

        let split = self.dedup.split(source, candidates).await?;
        let inserted = self.photos.insert_photos(&split.new).await?;
        let photo_count = self.photos.count_for_sol(source, sol as i32).await?;

        let record = self
            .tracker
            .record_success(source, sol as i32, photo_count, expected)
            .await?;

        info!(
            source = %source,
            sol,
            inserted,
            skipped,
            duplicates = split.duplicates,
            photo_count,
            "Scraped sol"
        );

        Ok(SolOutcome {
            status: record.status,
            inserted,
            skipped,
            duplicates: split.duplicates,
            item_errors,
            photo_count,
            expected,
        })
    }
}
