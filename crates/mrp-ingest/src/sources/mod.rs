//! Per-source feed adapters
//!
//! Each rover feed has its own JSON shape. An adapter converts one feed's
//! raw items into [`CanonicalPhoto`] records; heterogeneity never leaks past
//! this boundary. Adapters are a closed set of variants behind the
//! [`SourceAdapter`] trait, selected through an explicit registry keyed by
//! [`Source`].
//!
//! Adapters are pure transforms: parse failures are returned as
//! [`ParseError`], never used for control flow, and nothing here performs IO.

pub mod cameras;
pub mod mars2020;
pub mod msl;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

use crate::models::{CanonicalPhoto, Position, SampleType, Source};

pub use mars2020::Mars2020Adapter;
pub use msl::MslAdapter;

/// Error type for adapter parsing
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid {field}: {value}")]
    InvalidField { field: &'static str, value: String },

    #[error("invalid UTC timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("malformed page envelope: {0}")]
    Envelope(String),
}

/// One parsed envelope page: raw items plus the total when the source
/// exposes an authoritative count
#[derive(Debug, Default)]
pub struct FeedPage {
    pub items: Vec<Value>,
    pub total: Option<u64>,
}

/// Outcome of parsing one raw feed item
#[derive(Debug)]
pub enum ParsedItem {
    Photo(Box<CanonicalPhoto>),
    /// Low-value variant (e.g. thumbnail), flagged rather than stored
    Skip(&'static str),
}

/// Capability interface for one source family
pub trait SourceAdapter: Send + Sync {
    fn source(&self) -> Source;

    /// URL of one page of the per-sol listing
    fn page_url(&self, base_url: &str, sol: u32, page: u32, per_page: u32) -> String;

    /// URL of the current-sol lookup
    fn latest_sol_url(&self, base_url: &str) -> String;

    /// Whether a 404 on page 0 means "this sol has zero items"
    ///
    /// The heuristic is source-specific and must not be assumed globally.
    fn empty_sol_on_not_found(&self) -> bool;

    /// Parse a page envelope into raw items and the reported total
    fn parse_page(&self, body: &Value) -> Result<FeedPage, ParseError>;

    /// Parse one raw item into a canonical record or a skip flag
    fn parse_item(&self, raw: &Value) -> Result<ParsedItem, ParseError>;

    /// Parse the current-sol lookup payload
    fn parse_latest_sol(&self, body: &Value) -> Result<u32, ParseError>;

    /// Convert the reported total into an expected photo count
    ///
    /// Some sources count thumbnail and full variants as one total.
    fn expected_from_total(&self, total: u64) -> u64 {
        total
    }
}

static MSL: MslAdapter = MslAdapter;
static MARS2020: Mars2020Adapter = Mars2020Adapter;

/// Adapter registry keyed by source
pub fn adapter(source: Source) -> &'static dyn SourceAdapter {
    match source {
        Source::Msl => &MSL,
        Source::Mars2020 => &MARS2020,
    }
}

/// Look up an adapter by source name
pub fn adapter_by_name(name: &str) -> Option<&'static dyn SourceAdapter> {
    name.parse::<Source>().ok().map(adapter)
}

// ============================================================================
// Shared parsing helpers
// ============================================================================

/// Parse a required UTC timestamp
///
/// An absent or unparsable timestamp rejects the record; it is never
/// defaulted.
pub(crate) fn parse_utc_timestamp(value: &str) -> Result<DateTime<Utc>, ParseError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(naive.and_utc());
        }
    }

    Err(ParseError::InvalidTimestamp(value.to_string()))
}

/// Parse a sub-frame rectangle string `"(x,y,w,h)"` into (width, height)
///
/// Malformed rectangles yield `None` so the caller falls back to sample-type
/// inference.
pub(crate) fn parse_subframe_rect(value: &str) -> Option<(i32, i32)> {
    let parts = parse_paren_tuple(value)?;
    if parts.len() != 4 {
        return None;
    }

    let width = parts[2] as i32;
    let height = parts[3] as i32;
    if width <= 0 || height <= 0 {
        return None;
    }

    Some((width, height))
}

/// Parse a position string `"(x,y,z)"`
pub(crate) fn parse_xyz(value: &str) -> Option<Position> {
    let parts = parse_paren_tuple(value)?;
    if parts.len() != 3 {
        return None;
    }

    Some(Position {
        x: parts[0],
        y: parts[1],
        z: parts[2],
    })
}

fn parse_paren_tuple(value: &str) -> Option<Vec<f64>> {
    let inner = value.trim().strip_prefix('(')?.strip_suffix(')')?;
    inner
        .split(',')
        .map(|part| part.trim().parse::<f64>().ok())
        .collect()
}

/// Resolve photo dimensions from an optional sub-frame rectangle, falling
/// back to sample-type inference
///
/// The feeds also carry a scale factor field; it is a downsampling divisor,
/// not a dimension, and must never be read here. Treating it as one was a
/// known defect class.
pub(crate) fn resolve_dimensions(
    subframe_rect: Option<&str>,
    sample_type: SampleType,
) -> (Option<i32>, Option<i32>) {
    if let Some((width, height)) = subframe_rect.and_then(parse_subframe_rect) {
        return (Some(width), Some(height));
    }

    match sample_type.inferred_dimensions() {
        Some((width, height)) => (Some(width), Some(height)),
        None => (None, None),
    }
}

/// Fetch a string field from a JSON object
pub(crate) fn str_field<'a>(raw: &'a Value, field: &'static str) -> Option<&'a str> {
    raw.get(field).and_then(Value::as_str)
}

/// Fetch a required string field
pub(crate) fn required_str<'a>(raw: &'a Value, field: &'static str) -> Result<&'a str, ParseError> {
    str_field(raw, field).ok_or(ParseError::MissingField(field))
}

/// Fetch an integer field that may arrive as a number or a numeric string
pub(crate) fn int_field(raw: &Value, field: &str) -> Option<i64> {
    match raw.get(field) {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Fetch a float field that may arrive as a number or a numeric string
pub(crate) fn float_field(raw: &Value, field: &str) -> Option<f64> {
    match raw.get(field) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_utc_timestamp_formats() {
        assert!(parse_utc_timestamp("2021-02-22T18:33:17Z").is_ok());
        assert!(parse_utc_timestamp("2021-02-22T18:33:17+00:00").is_ok());
        assert!(parse_utc_timestamp("2021-02-22T18:33:17.123").is_ok());
        assert!(parse_utc_timestamp("2021-02-22 18:33:17").is_ok());
        assert!(parse_utc_timestamp("Sol-00100M15:10:05").is_err());
        assert!(parse_utc_timestamp("").is_err());
    }

    #[test]
    fn test_parse_subframe_rect() {
        assert_eq!(parse_subframe_rect("(1,1,1648,1200)"), Some((1648, 1200)));
        assert_eq!(parse_subframe_rect("(1, 1, 640, 480)"), Some((640, 480)));
        assert_eq!(parse_subframe_rect("(1,1,0,1200)"), None);
        assert_eq!(parse_subframe_rect("(1,1,1648)"), None);
        assert_eq!(parse_subframe_rect("1,1,1648,1200"), None);
        assert_eq!(parse_subframe_rect("garbage"), None);
    }

    #[test]
    fn test_parse_xyz() {
        let position = parse_xyz("(7.25,-31.1,0.85)").unwrap();
        assert_eq!(position.x, 7.25);
        assert_eq!(position.y, -31.1);
        assert_eq!(position.z, 0.85);
        assert!(parse_xyz("(1,2)").is_none());
    }

    #[test]
    fn test_resolve_dimensions_prefers_rect() {
        let (w, h) = resolve_dimensions(Some("(1,1,1648,1200)"), SampleType::Full);
        assert_eq!((w, h), (Some(1648), Some(1200)));
    }

    #[test]
    fn test_resolve_dimensions_falls_back_to_sample_type() {
        let (w, h) = resolve_dimensions(None, SampleType::Thumbnail);
        assert_eq!((w, h), (Some(160), Some(144)));

        let (w, h) = resolve_dimensions(Some("not a rect"), SampleType::Full);
        assert_eq!((w, h), (Some(1200), Some(1200)));

        let (w, h) = resolve_dimensions(None, SampleType::Subframe);
        assert_eq!((w, h), (None, None));
    }

    #[test]
    fn test_registry_selects_by_source() {
        assert_eq!(adapter(Source::Msl).source(), Source::Msl);
        assert_eq!(adapter(Source::Mars2020).source(), Source::Mars2020);
        assert!(adapter_by_name("msl").is_some());
        assert!(adapter_by_name("viking").is_none());
    }
}
