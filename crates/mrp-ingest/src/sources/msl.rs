//! MSL (Curiosity) feed adapter
//!
//! Envelope shape: `{"items": [...], "total": N}`. The MSL feed answers a
//! sol with no images with a 404 on page 0; that 404 is the only reliable
//! empty-sol signal for this family.

use serde_json::Value;

use crate::models::{CanonicalPhoto, ImageUrls, SampleType, Source};

use super::{
    cameras::canonical_camera_id, float_field, int_field, parse_utc_timestamp, parse_xyz,
    required_str, resolve_dimensions, str_field, FeedPage, ParseError, ParsedItem, SourceAdapter,
};

/// Adapter for the MSL raw image feed
pub struct MslAdapter;

impl SourceAdapter for MslAdapter {
    fn source(&self) -> Source {
        Source::Msl
    }

    fn page_url(&self, base_url: &str, sol: u32, page: u32, per_page: u32) -> String {
        format!(
            "{}/msl/sols/{}/photos?page={}&per_page={}",
            base_url.trim_end_matches('/'),
            sol,
            page,
            per_page
        )
    }

    fn latest_sol_url(&self, base_url: &str) -> String {
        format!("{}/msl/latest_sols?limit=1", base_url.trim_end_matches('/'))
    }

    fn empty_sol_on_not_found(&self) -> bool {
        true
    }

    fn parse_page(&self, body: &Value) -> Result<FeedPage, ParseError> {
        let items = body
            .get("items")
            .and_then(Value::as_array)
            .ok_or_else(|| ParseError::Envelope("missing items array".to_string()))?;

        Ok(FeedPage {
            items: items.clone(),
            total: body.get("total").and_then(Value::as_u64),
        })
    }

    fn parse_item(&self, raw: &Value) -> Result<ParsedItem, ParseError> {
        let sample_type = str_field(raw, "sample_type")
            .map(SampleType::from_feed)
            .unwrap_or_default();

        if sample_type.is_thumbnail() {
            return Ok(ParsedItem::Skip("thumbnail"));
        }

        let source_id = required_str(raw, "imageid")?.to_string();
        let sol = int_field(raw, "sol").ok_or(ParseError::MissingField("sol"))? as i32;
        let captured_at_utc = parse_utc_timestamp(required_str(raw, "date_taken_utc")?)?;

        let instrument = required_str(raw, "instrument")?;
        // Only the subframe rectangle may supply dimensions here; the feed's
        // scale_factor is a downsampling divisor and is deliberately ignored.
        let (width, height) = resolve_dimensions(str_field(raw, "subframe_rect"), sample_type);

        let photo = CanonicalPhoto {
            source: Source::Msl,
            source_id,
            sol,
            captured_at_utc,
            captured_at_local: str_field(raw, "date_taken_mars").map(str::to_string),
            image_urls: ImageUrls {
                small: None,
                medium: None,
                large: None,
                full: str_field(raw, "https_url").map(str::to_string),
            },
            width,
            height,
            sample_type,
            site: int_field(raw, "site").map(|v| v as i32),
            drive: int_field(raw, "drive").map(|v| v as i32),
            position: str_field(raw, "xyz").and_then(parse_xyz),
            azimuth: float_field(raw, "mast_az"),
            elevation: float_field(raw, "mast_el"),
            camera_id: canonical_camera_id(instrument),
            source_ref: raw.clone(),
        };

        Ok(ParsedItem::Photo(Box::new(photo)))
    }

    fn parse_latest_sol(&self, body: &Value) -> Result<u32, ParseError> {
        body.get("latest_sols")
            .and_then(Value::as_array)
            .and_then(|sols| sols.first())
            .and_then(|entry| entry.get("sol"))
            .and_then(Value::as_u64)
            .map(|sol| sol as u32)
            .ok_or_else(|| ParseError::Envelope("missing latest_sols".to_string()))
    }
}
