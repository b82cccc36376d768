//! Ingestion configuration

use serde::{Deserialize, Serialize};

use crate::models::Source;

// ============================================================================
// Ingestion Configuration Constants
// ============================================================================

/// Default MSL (Curiosity) raw image feed base URL.
pub const DEFAULT_MSL_FEED_URL: &str = "https://mars.nasa.gov/api/v1";

/// Default Mars 2020 (Perseverance) raw image feed base URL.
pub const DEFAULT_MARS2020_FEED_URL: &str = "https://mars.nasa.gov/rss/api/v1";

/// Default page size requested from the upstream feeds.
pub const DEFAULT_PER_PAGE: u32 = 100;

/// Default upstream request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default delay between consecutive sols in milliseconds.
///
/// The upstream feeds are rate-limited; the delay is a politeness contract,
/// not a performance knob.
pub const DEFAULT_INTER_SOL_DELAY_MS: u64 = 1_000;

/// Default starting sol for a full scrape.
pub const DEFAULT_FULL_START_SOL: u32 = 0;

/// Default upper bound on pages fetched for one sol.
pub const DEFAULT_MAX_PAGES_PER_SOL: u32 = 200;

/// Ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub msl_feed_url: String,
    pub mars2020_feed_url: String,
    pub per_page: u32,
    pub request_timeout_secs: u64,
    pub inter_sol_delay_ms: u64,
    pub full_start_sol: u32,
    pub max_pages_per_sol: u32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            msl_feed_url: DEFAULT_MSL_FEED_URL.to_string(),
            mars2020_feed_url: DEFAULT_MARS2020_FEED_URL.to_string(),
            per_page: DEFAULT_PER_PAGE,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            inter_sol_delay_ms: DEFAULT_INTER_SOL_DELAY_MS,
            full_start_sol: DEFAULT_FULL_START_SOL,
            max_pages_per_sol: DEFAULT_MAX_PAGES_PER_SOL,
        }
    }
}

impl IngestConfig {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let config = Self {
            msl_feed_url: std::env::var("MSL_FEED_URL").unwrap_or(defaults.msl_feed_url),
            mars2020_feed_url: std::env::var("MARS2020_FEED_URL")
                .unwrap_or(defaults.mars2020_feed_url),
            per_page: env_parse("INGEST_PER_PAGE", defaults.per_page),
            request_timeout_secs: env_parse(
                "INGEST_REQUEST_TIMEOUT",
                defaults.request_timeout_secs,
            ),
            inter_sol_delay_ms: env_parse("INGEST_INTER_SOL_DELAY_MS", defaults.inter_sol_delay_ms),
            full_start_sol: env_parse("INGEST_FULL_START_SOL", defaults.full_start_sol),
            max_pages_per_sol: env_parse("INGEST_MAX_PAGES_PER_SOL", defaults.max_pages_per_sol),
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.per_page == 0 {
            anyhow::bail!("per_page must be greater than 0");
        }

        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than 0");
        }

        if self.max_pages_per_sol == 0 {
            anyhow::bail!("max_pages_per_sol must be greater than 0");
        }

        if self.msl_feed_url.is_empty() || self.mars2020_feed_url.is_empty() {
            anyhow::bail!("Feed base URLs cannot be empty");
        }

        Ok(())
    }

    /// Feed base URL for a source
    pub fn base_url(&self, source: Source) -> &str {
        match source {
            Source::Msl => &self.msl_feed_url,
            Source::Mars2020 => &self.mars2020_feed_url,
        }
    }
}

fn env_parse<T: std::str::FromStr>(var: &str, default: T) -> T {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
