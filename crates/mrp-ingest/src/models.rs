//! Data models for ingestion
//!
//! Canonical photo records, per-sol completeness tracking, and job run
//! bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A supported rover imagery feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Curiosity (Mars Science Laboratory) raw image feed
    Msl,
    /// Perseverance (Mars 2020) raw image feed
    Mars2020,
}

impl Source {
    pub const ALL: [Source; 2] = [Source::Msl, Source::Mars2020];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Msl => "msl",
            Source::Mars2020 => "mars2020",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Source {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "msl" | "curiosity" => Ok(Source::Msl),
            "mars2020" | "m20" | "perseverance" => Ok(Source::Mars2020),
            _ => Err(anyhow::anyhow!("Unknown source: {}", s)),
        }
    }
}

/// Image sample type reported by the upstream feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SampleType {
    #[default]
    Full,
    Thumbnail,
    Subframe,
}

impl SampleType {
    /// Classify the raw feed string (case-insensitive)
    pub fn from_feed(s: &str) -> Self {
        let lower = s.to_lowercase();
        if lower.contains("thumb") {
            SampleType::Thumbnail
        } else if lower.contains("subframe") {
            SampleType::Subframe
        } else {
            SampleType::Full
        }
    }

    pub fn is_thumbnail(&self) -> bool {
        matches!(self, SampleType::Thumbnail)
    }

    /// Coarse dimension estimate when the feed gives no subframe rectangle
    ///
    /// Thumbnails are 160x144-class, full frames 1200x1200-class. A subframe
    /// without its rectangle has no usable estimate.
    pub fn inferred_dimensions(&self) -> Option<(i32, i32)> {
        match self {
            SampleType::Thumbnail => Some((160, 144)),
            SampleType::Full => Some((1200, 1200)),
            SampleType::Subframe => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SampleType::Full => "full",
            SampleType::Thumbnail => "thumbnail",
            SampleType::Subframe => "subframe",
        }
    }
}

/// Image URLs by size; sources provide different subsets
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUrls {
    pub small: Option<String>,
    pub medium: Option<String>,
    pub large: Option<String>,
    pub full: Option<String>,
}

impl ImageUrls {
    pub fn is_empty(&self) -> bool {
        self.small.is_none() && self.medium.is_none() && self.large.is_none() && self.full.is_none()
    }
}

/// Rover position at capture time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// One ingested, normalized photo record
///
/// `source_id` is globally unique in the canonical store; re-ingesting an
/// existing `source_id` is a no-op, never an update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalPhoto {
    pub source: Source,
    /// External unique ID from the upstream feed
    pub source_id: String,
    /// Mars solar day index, the ingestion partition key
    pub sol: i32,
    pub captured_at_utc: DateTime<Utc>,
    /// Source-local (Mars) timestamp string, as reported
    pub captured_at_local: Option<String>,
    pub image_urls: ImageUrls,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub sample_type: SampleType,
    pub site: Option<i32>,
    pub drive: Option<i32>,
    pub position: Option<Position>,
    pub azimuth: Option<f64>,
    pub elevation: Option<f64>,
    pub camera_id: String,
    /// Opaque raw payload, preserved for future reprocessing
    pub source_ref: serde_json::Value,
}

/// Ingestion outcome for one (source, sol) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CompletenessStatus {
    #[default]
    Pending,
    Success,
    Partial,
    Failed,
    Empty,
}

impl CompletenessStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletenessStatus::Pending => "pending",
            CompletenessStatus::Success => "success",
            CompletenessStatus::Partial => "partial",
            CompletenessStatus::Failed => "failed",
            CompletenessStatus::Empty => "empty",
        }
    }
}

impl std::fmt::Display for CompletenessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for CompletenessStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(CompletenessStatus::Pending),
            "success" => Ok(CompletenessStatus::Success),
            "partial" => Ok(CompletenessStatus::Partial),
            "failed" => Ok(CompletenessStatus::Failed),
            "empty" => Ok(CompletenessStatus::Empty),
            _ => Err(anyhow::anyhow!("Invalid completeness status: {}", s)),
        }
    }
}

/// Persistent completeness ledger entry for one (source, sol) pair
///
/// Invariants: `Success` requires `photo_count > 0`; `Empty` requires
/// `photo_count == 0` with a successful fetch; `consecutive_failures`
/// strictly reflects the trailing run of failures ending at
/// `last_attempt_at` and resets to 0 on any success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletenessRecord {
    pub source: Source,
    pub sol: i32,
    pub photo_count: i64,
    /// Upstream's authoritative total, when the source exposes one
    pub expected_count: Option<i64>,
    pub status: CompletenessStatus,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub attempt_count: i32,
    pub consecutive_failures: i32,
    pub last_error: Option<String>,
}

impl CompletenessRecord {
    /// Fresh record for a never-attempted sol
    pub fn new(source: Source, sol: i32) -> Self {
        Self {
            source,
            sol,
            photo_count: 0,
            expected_count: None,
            status: CompletenessStatus::Pending,
            last_attempt_at: None,
            last_success_at: None,
            attempt_count: 0,
            consecutive_failures: 0,
            last_error: None,
        }
    }
}

/// Aggregated completeness health for one source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletenessSummary {
    pub pending: i64,
    pub success: i64,
    pub partial: i64,
    pub failed: i64,
    pub empty: i64,
    pub total_photos: i64,
    pub last_attempt_at: Option<DateTime<Utc>>,
}

impl CompletenessSummary {
    pub fn total_sols(&self) -> i64 {
        self.pending + self.success + self.partial + self.failed + self.empty
    }
}

/// Terminal state of a job run or a per-source detail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Success,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Success => "success",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "running" => Ok(JobStatus::Running),
            "success" => Ok(JobStatus::Success),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            _ => Err(anyhow::anyhow!("Invalid job status: {}", s)),
        }
    }
}

/// Per-source outcome within one job run
///
/// A source detail is a hard failure only when the source could not begin
/// at all (no determinable starting sol). Individual sol failures inside
/// the range land in `failed_sols` without flipping the detail status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSourceDetail {
    pub source: Source,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub sols_attempted: i64,
    pub sols_succeeded: i64,
    pub sols_failed: i64,
    pub photos_added: i64,
    pub failed_sols: Vec<i32>,
    pub error: Option<String>,
}

impl JobSourceDetail {
    pub fn new(source: Source) -> Self {
        Self {
            source,
            status: JobStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            sols_attempted: 0,
            sols_succeeded: 0,
            sols_failed: 0,
            photos_added: 0,
            failed_sols: Vec::new(),
            error: None,
        }
    }
}

/// One orchestrated ingestion invocation (manual or scheduled)
///
/// Append-only: completion fields are set exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRun {
    pub id: Uuid,
    pub mode: String,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub sols_attempted: i64,
    pub sols_succeeded: i64,
    pub sols_failed: i64,
    pub photos_added: i64,
    pub duration_ms: Option<i64>,
    pub sources: Vec<JobSourceDetail>,
}

impl JobRun {
    pub fn new(mode: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            mode: mode.into(),
            status: JobStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            sols_attempted: 0,
            sols_succeeded: 0,
            sols_failed: 0,
            photos_added: 0,
            duration_ms: None,
            sources: Vec::new(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.completed_at.is_some()
    }
}
