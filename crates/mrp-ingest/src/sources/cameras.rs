//! Instrument-name to camera-ID canonicalization
//!
//! Feed items name the physical instrument (e.g. `MAST_LEFT`,
//! `NAVCAM_LEFT`); the canonical store groups photos by camera. Mapping is
//! prefix-based against a fixed table; unmapped instrument names pass
//! through unchanged so new instruments degrade gracefully instead of
//! rejecting records.

use tracing::debug;

/// Prefix table, checked in order; first match wins.
///
/// Longer prefixes come before shorter ones sharing a stem (`NAVCAM_`
/// before `NAV_`).
const CAMERA_PREFIXES: &[(&str, &str)] = &[
    // MSL (Curiosity)
    ("MAST_", "MAST"),
    ("NAVCAM_", "NAVCAM"),
    ("NAV_", "NAVCAM"),
    ("CHEMCAM_", "CHEMCAM"),
    ("FHAZ_", "FHAZ"),
    ("RHAZ_", "RHAZ"),
    ("MAHLI", "MAHLI"),
    ("MARDI", "MARDI"),
    // Mars 2020 (Perseverance)
    ("MCZ_", "MCZ"),
    ("SUPERCAM_", "SUPERCAM"),
    ("FRONT_HAZCAM_", "FRONT_HAZCAM"),
    ("REAR_HAZCAM_", "REAR_HAZCAM"),
    ("EDL_", "EDL"),
    ("SKYCAM", "SKYCAM"),
    ("SHERLOC_", "SHERLOC"),
];

/// Canonical camera ID for an instrument name
pub fn canonical_camera_id(instrument: &str) -> String {
    for (prefix, camera) in CAMERA_PREFIXES {
        if instrument.starts_with(prefix) {
            return (*camera).to_string();
        }
    }

    debug!(instrument = %instrument, "Unmapped instrument name, passing through");
    instrument.to_string()
}
