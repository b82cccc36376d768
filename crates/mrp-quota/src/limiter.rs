//! Tiered quota decision engine
//!
//! One [`RateLimiter`] instance holds the shared counters for every caller.
//! The counters are the one genuinely concurrent mutable resource in the
//! system: requests for the same caller can arrive simultaneously, so the
//! increment-then-compare over both windows runs inside a single critical
//! section. A check-then-increment split would leave a window where two
//! concurrent requests both observe remaining capacity and both proceed.
//!
//! Counters are keyed by (caller, window kind, window start) and expire with
//! their window. Expiry is lazy: a new window simply gets a new key, and
//! [`RateLimiter::prune`] drops elapsed entries.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::tiers::{QuotaConfig, TierLimits};
use crate::window::WindowKind;

/// Outcome of one quota check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaDecision {
    pub allowed: bool,
    pub hourly_remaining: u64,
    /// `None` when the caller's daily window is unlimited
    pub daily_remaining: Option<u64>,
    pub hourly_reset_at: DateTime<Utc>,
    pub daily_reset_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct WindowKey {
    caller: String,
    kind: WindowKind,
    window_start: DateTime<Utc>,
}

/// Tiered fixed-window rate limiter
#[derive(Debug)]
pub struct RateLimiter {
    config: QuotaConfig,
    counters: Mutex<HashMap<WindowKey, u64>>,
}

impl RateLimiter {
    pub fn new(config: QuotaConfig) -> Self {
        Self {
            config,
            counters: Mutex::new(HashMap::new()),
        }
    }

    /// Check and count one request for `caller_id`
    ///
    /// The request is allowed only if both the hourly and the daily window
    /// have remaining capacity. The counters are incremented exactly once
    /// per call regardless of the outcome, so denied requests still burn
    /// against the window. An unrecognized tier string is treated as the
    /// most restrictive configured tier.
    pub fn check(&self, caller_id: &str, tier: &str) -> QuotaDecision {
        self.check_at(caller_id, tier, Utc::now())
    }

    /// Check one request at an explicit instant
    pub fn check_at(&self, caller_id: &str, tier: &str, now: DateTime<Utc>) -> QuotaDecision {
        let tier = self.config.resolve(tier);
        let limits = self.config.limits(tier);

        let hour_key = window_key(caller_id, WindowKind::Hour, now);
        let day_key = window_key(caller_id, WindowKind::Day, now);

        // Both increments and the comparison happen under one lock so that
        // concurrent checks for the same caller serialize.
        let (hour_count, day_count) = {
            let mut counters = lock_counters(&self.counters);

            let hour_count = increment(&mut counters, hour_key);
            let day_count = increment(&mut counters, day_key);

            (hour_count, day_count)
        };

        decision(limits, hour_count, day_count, now)
    }

    /// Drop counters whose window has elapsed
    ///
    /// Callers that stop sending requests leave their last windows behind;
    /// run this periodically to reclaim them.
    pub fn prune(&self, now: DateTime<Utc>) {
        let mut counters = lock_counters(&self.counters);
        counters.retain(|key, _| key.window_start + key.kind.length() > now);
    }

    /// Number of live counters (for observability)
    pub fn counter_count(&self) -> usize {
        lock_counters(&self.counters).len()
    }
}

fn window_key(caller_id: &str, kind: WindowKind, now: DateTime<Utc>) -> WindowKey {
    WindowKey {
        caller: caller_id.to_string(),
        kind,
        window_start: kind.window_start(now),
    }
}

fn lock_counters(
    counters: &Mutex<HashMap<WindowKey, u64>>,
) -> std::sync::MutexGuard<'_, HashMap<WindowKey, u64>> {
    // A poisoned lock only means another check panicked mid-update; the
    // counter map itself is still coherent (u64 writes cannot be torn).
    counters.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn increment(counters: &mut HashMap<WindowKey, u64>, key: WindowKey) -> u64 {
    let count = counters.entry(key).or_insert(0);
    *count += 1;
    *count
}

fn decision(
    limits: TierLimits,
    hour_count: u64,
    day_count: u64,
    now: DateTime<Utc>,
) -> QuotaDecision {
    let hour_ok = hour_count <= limits.hourly;
    let day_ok = match limits.daily {
        Some(daily) => day_count <= daily,
        None => true,
    };

    QuotaDecision {
        allowed: hour_ok && day_ok,
        hourly_remaining: limits.hourly.saturating_sub(hour_count),
        daily_remaining: limits.daily.map(|daily| daily.saturating_sub(day_count)),
        hourly_reset_at: WindowKind::Hour.reset_at(now),
        daily_reset_at: WindowKind::Day.reset_at(now),
    }
}
