//! Mars 2020 (Perseverance) feed adapter
//!
//! Envelope shape: `{"images": [...], "total_images": N}`. Unlike MSL, a
//! 404 from this feed is a failure, not an empty sol: empty sols come back
//! as a 200 with an empty `images` array. The reported total counts the
//! thumbnail and full variant of each frame as one entry each, so the
//! expected photo count is half of it.

use serde_json::Value;

use crate::models::{CanonicalPhoto, ImageUrls, SampleType, Source};

use super::{
    cameras::canonical_camera_id, int_field, parse_utc_timestamp, parse_xyz, required_str,
    resolve_dimensions, str_field, FeedPage, ParseError, ParsedItem, SourceAdapter,
};

/// Adapter for the Mars 2020 raw image feed
pub struct Mars2020Adapter;

impl Mars2020Adapter {
    /// The `extended` object carries subframe rect, position, and pointing
    fn extended<'a>(raw: &'a Value, field: &'static str) -> Option<&'a Value> {
        raw.get("extended").and_then(|ext| ext.get(field))
    }

    fn extended_str<'a>(raw: &'a Value, field: &'static str) -> Option<&'a str> {
        Self::extended(raw, field).and_then(Value::as_str)
    }

    fn extended_float(raw: &Value, field: &'static str) -> Option<f64> {
        match Self::extended(raw, field) {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl SourceAdapter for Mars2020Adapter {
    fn source(&self) -> Source {
        Source::Mars2020
    }

    fn page_url(&self, base_url: &str, sol: u32, page: u32, per_page: u32) -> String {
        format!(
            "{}/mars2020/sols/{}/photos?page={}&per_page={}",
            base_url.trim_end_matches('/'),
            sol,
            page,
            per_page
        )
    }

    fn latest_sol_url(&self, base_url: &str) -> String {
        format!("{}/mars2020/latest_sol", base_url.trim_end_matches('/'))
    }

    fn empty_sol_on_not_found(&self) -> bool {
        false
    }

    fn parse_page(&self, body: &Value) -> Result<FeedPage, ParseError> {
        let images = body
            .get("images")
            .and_then(Value::as_array)
            .ok_or_else(|| ParseError::Envelope("missing images array".to_string()))?;

        Ok(FeedPage {
            items: images.clone(),
            total: body.get("total_images").and_then(Value::as_u64),
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

        let instrument = raw
            .get("camera")
            .and_then(|camera| camera.get("instrument"))
            .and_then(Value::as_str)
            .ok_or(ParseError::MissingField("camera.instrument"))?;

        let image_files = raw.get("image_files");
        let file_url = |size: &str| -> Option<String> {
            image_files
                .and_then(|files| files.get(size))
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        // The extended block also carries scaleFactor; it is a downsampling
        // divisor and is deliberately ignored for dimensions.
        let (width, height) =
            resolve_dimensions(Self::extended_str(raw, "subframeRect"), sample_type);

        let photo = CanonicalPhoto {
            source: Source::Mars2020,
            source_id,
            sol,
            captured_at_utc,
            captured_at_local: str_field(raw, "date_taken_mars").map(str::to_string),
            image_urls: ImageUrls {
                small: file_url("small"),
                medium: file_url("medium"),
                large: file_url("large"),
                full: file_url("full_res"),
            },
            width,
            height,
            sample_type,
            site: int_field(raw, "site").map(|v| v as i32),
            drive: int_field(raw, "drive").map(|v| v as i32),
            position: Self::extended_str(raw, "xyz").and_then(parse_xyz),
            azimuth: Self::extended_float(raw, "mastAz"),
            elevation: Self::extended_float(raw, "mastEl"),
            camera_id: canonical_camera_id(instrument),
            source_ref: raw.clone(),
        };

        Ok(ParsedItem::Photo(Box::new(photo)))
    }

    fn parse_latest_sol(&self, body: &Value) -> Result<u32, ParseError> {
        body.get("latest_sol")
            .and_then(Value::as_u64)
            .map(|sol| sol as u32)
            .ok_or_else(|| ParseError::Envelope("missing latest_sol".to_string()))
    }

    /// The feed counts thumbnail and full variants as one total
    fn expected_from_total(&self, total: u64) -> u64 {
        total.div_ceil(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_item() -> Value {
        json!({
            "imageid": "NLF_0100_0667129440_000ECM_N0040000NCAM00500_01_295J",
            "sol": 100,
            "camera": {
                "instrument": "NAVCAM_LEFT",
                "camera_position": "(0.8,0.5,-1.9)"
            },
            "sample_type": "Full",
            "date_taken_utc": "2021-06-01T11:22:33Z",
            "date_taken_mars": "Sol-00100M14:02:11",
            "image_files": {
                "small": "https://example.com/small.jpg",
                "medium": "https://example.com/medium.jpg",
                "large": "https://example.com/large.jpg",
                "full_res": "https://example.com/full.png"
            },
            "extended": {
                "scaleFactor": "4",
                "subframeRect": "(1,1,1648,1200)",
                "xyz": "(12.1,4.2,-0.3)",
                "mastAz": "118.5",
                "mastEl": "-12.0"
            },
            "site": 4,
            "drive": 512
        })
    }

    fn parse_photo(raw: &Value) -> CanonicalPhoto {
        match Mars2020Adapter.parse_item(raw).unwrap() {
            ParsedItem::Photo(photo) => *photo,
            ParsedItem::Skip(reason) => panic!("unexpected skip: {}", reason),
        }
    }

    #[test]
    fn test_parse_full_item() {
        let photo = parse_photo(&full_item());

        assert_eq!(photo.source, Source::Mars2020);
        assert_eq!(photo.sol, 100);
        assert_eq!(photo.camera_id, "NAVCAM");
        assert_eq!(photo.width, Some(1648));
        assert_eq!(photo.height, Some(1200));
        assert_eq!(photo.azimuth, Some(118.5));
        assert_eq!(photo.elevation, Some(-12.0));
        assert_eq!(photo.image_urls.small.as_deref(), Some("https://example.com/small.jpg"));
        assert_eq!(photo.image_urls.full.as_deref(), Some("https://example.com/full.png"));
        assert_eq!(photo.position.map(|p| p.x), Some(12.1));
    }

    #[test]
    fn test_thumbnail_is_skipped() {
        let mut item = full_item();
        item["sample_type"] = json!("Thumbnail");
        assert!(matches!(
            Mars2020Adapter.parse_item(&item).unwrap(),
            ParsedItem::Skip("thumbnail")
        ));
    }

    #[test]
    fn test_scale_factor_is_never_a_dimension() {
        let mut item = full_item();
        item["extended"]
            .as_object_mut()
            .unwrap()
            .remove("subframeRect");
        item["extended"]["scaleFactor"] = json!(16);

        let photo = parse_photo(&item);
        assert_eq!(photo.width, Some(1200));
        assert_eq!(photo.height, Some(1200));
        assert_ne!(photo.width, Some(16));
    }

    #[test]
    fn test_missing_instrument_is_rejected() {
        let mut item = full_item();
        item.as_object_mut().unwrap().remove("camera");
        assert!(matches!(
            Mars2020Adapter.parse_item(&item),
            Err(ParseError::MissingField("camera.instrument"))
        ));
    }

    #[test]
    fn test_missing_timestamp_is_rejected() {
        let mut item = full_item();
        item.as_object_mut().unwrap().remove("date_taken_utc");
        assert!(Mars2020Adapter.parse_item(&item).is_err());
    }

    #[test]
    fn test_parse_page_envelope() {
        let body = json!({"images": [full_item()], "total_images": 10});
        let page = Mars2020Adapter.parse_page(&body).unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.total, Some(10));

        assert!(Mars2020Adapter.parse_page(&json!({"items": []})).is_err());
    }

    #[test]
    fn test_expected_from_total_halves() {
        assert_eq!(Mars2020Adapter.expected_from_total(10), 5);
        assert_eq!(Mars2020Adapter.expected_from_total(11), 6);
        assert_eq!(Mars2020Adapter.expected_from_total(0), 0);
    }

    #[test]
    fn test_parse_latest_sol() {
        assert_eq!(
            Mars2020Adapter
                .parse_latest_sol(&json!({"latest_sol": 1500}))
                .unwrap(),
            1500
        );
        assert!(Mars2020Adapter.parse_latest_sol(&json!({})).is_err());
    }
}
