//! MRP Ingest Library
//!
//! Ingestion core for Mars rover raw-image metadata. Each supported rover
//! exposes its own independently-shaped JSON feed; this crate normalizes
//! them into one canonical photo record, deduplicates against the canonical
//! store, and keeps a persistent per-(source, sol) completeness ledger so
//! that months-long incremental scrapes never lose track of which sols have
//! been fully, partially, or never captured.
//!
//! # Supported Sources
//!
//! - **MSL**: Curiosity raw image feed (`{items, total}` envelope)
//! - **Mars2020**: Perseverance raw image feed (`{images, total_images}` envelope)
//!
//! # Example
//!
//! ```no_run
//! use mrp_ingest::config::IngestConfig;
//! use mrp_ingest::models::Source;
//! use mrp_ingest::scraper::SolScraper;
//! use mrp_ingest::store::memory::MemoryStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Arc::new(MemoryStore::new());
//!     let config = Arc::new(IngestConfig::default());
//!     let scraper = SolScraper::new(config, store.clone(), store.clone())?;
//!
//!     let outcome = scraper.scrape_sol(Source::Msl, 1000).await?;
//!     println!("inserted {} photos", outcome.inserted);
//!     Ok(())
//! }
//! ```

pub mod completeness;
pub mod config;
pub mod dedup;
pub mod feed;
pub mod jobs;
pub mod models;
pub mod orchestrator;
pub mod scraper;
pub mod sources;
pub mod store;
