//! Quota window arithmetic
//!
//! A quota window is a fixed-length time bucket (hour or day) identified by
//! its wall-clock start. A counter lives exactly as long as its window.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Window type for a quota counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    Hour,
    Day,
}

impl WindowKind {
    /// Window length
    pub fn length(&self) -> Duration {
        match self {
            WindowKind::Hour => Duration::hours(1),
            WindowKind::Day => Duration::days(1),
        }
    }

    /// Start of the window containing `now`
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let len = self.length().num_seconds();
        let secs = now.timestamp();
        let start = secs - secs.rem_euclid(len);

        DateTime::from_timestamp(start, 0).unwrap_or(now)
    }

    /// Wall-clock end of the window containing `now`
    ///
    /// Computed from the window start, never cached.
    pub fn reset_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.window_start(now) + self.length()
    }
}

impl std::fmt::Display for WindowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WindowKind::Hour => write!(f, "hour"),
            WindowKind::Day => write!(f, "day"),
        }
    }
}
