//! Subscription tiers and their quota limits
//!
//! The numeric limits are configuration, not contract: they have changed
//! between deployments and must never be hard-coded at call sites. Load them
//! from the environment or construct a [`QuotaConfig`] explicitly.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Default hourly request limit for the free tier.
pub const DEFAULT_FREE_HOURLY: u64 = 60;

/// Default daily request limit for the free tier.
pub const DEFAULT_FREE_DAILY: u64 = 500;

/// Default hourly request limit for the standard tier.
pub const DEFAULT_STANDARD_HOURLY: u64 = 1_000;

/// Default daily request limit for the standard tier.
pub const DEFAULT_STANDARD_DAILY: u64 = 10_000;

/// Default hourly request limit for the enterprise tier (daily is unlimited).
pub const DEFAULT_ENTERPRISE_HOURLY: u64 = 10_000;

/// A caller's subscription class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Standard,
    Enterprise,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Free => write!(f, "free"),
            Tier::Standard => write!(f, "standard"),
            Tier::Enterprise => write!(f, "enterprise"),
        }
    }
}

impl std::str::FromStr for Tier {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "free" => Ok(Tier::Free),
            "standard" => Ok(Tier::Standard),
            "enterprise" => Ok(Tier::Enterprise),
            _ => Err(anyhow::anyhow!("Invalid tier: {}", s)),
        }
    }
}

/// Request limits for one tier
///
/// `daily: None` means the daily window is unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierLimits {
    pub hourly: u64,
    pub daily: Option<u64>,
}

/// Tier-to-limits mapping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    pub free: TierLimits,
    pub standard: TierLimits,
    pub enterprise: TierLimits,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            free: TierLimits {
                hourly: DEFAULT_FREE_HOURLY,
                daily: Some(DEFAULT_FREE_DAILY),
            },
            standard: TierLimits {
                hourly: DEFAULT_STANDARD_HOURLY,
                daily: Some(DEFAULT_STANDARD_DAILY),
            },
            enterprise: TierLimits {
                hourly: DEFAULT_ENTERPRISE_HOURLY,
                daily: None,
            },
        }
    }
}

impl QuotaConfig {
    /// Load limits from environment variables, falling back to defaults
    ///
    /// Environment variables:
    /// - `QUOTA_FREE_HOURLY` / `QUOTA_FREE_DAILY`
    /// - `QUOTA_STANDARD_HOURLY` / `QUOTA_STANDARD_DAILY`
    /// - `QUOTA_ENTERPRISE_HOURLY` (enterprise daily stays unlimited)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            free: TierLimits {
                hourly: env_limit("QUOTA_FREE_HOURLY", defaults.free.hourly),
                daily: Some(env_limit(
                    "QUOTA_FREE_DAILY",
                    DEFAULT_FREE_DAILY,
                )),
            },
            standard: TierLimits {
                hourly: env_limit("QUOTA_STANDARD_HOURLY", defaults.standard.hourly),
                daily: Some(env_limit(
                    "QUOTA_STANDARD_DAILY",
                    DEFAULT_STANDARD_DAILY,
                )),
            },
            enterprise: TierLimits {
                hourly: env_limit("QUOTA_ENTERPRISE_HOURLY", defaults.enterprise.hourly),
                daily: None,
            },
        }
    }

    /// Limits for a known tier
    pub fn limits(&self, tier: Tier) -> TierLimits {
        match tier {
            Tier::Free => self.free,
            Tier::Standard => self.standard,
            Tier::Enterprise => self.enterprise,
        }
    }

    /// The tier with the smallest hourly allowance
    ///
    /// Used as the fallback when a caller presents an unrecognized tier.
    pub fn most_restrictive(&self) -> Tier {
        let mut tier = Tier::Free;
        let mut hourly = self.free.hourly;

        for candidate in [Tier::Standard, Tier::Enterprise] {
            let limits = self.limits(candidate);
            if limits.hourly < hourly {
                tier = candidate;
                hourly = limits.hourly;
            }
        }

        tier
    }

    /// Resolve a tier string supplied by the caller
    ///
    /// An unrecognized tier is logged and treated as the most restrictive
    /// known tier rather than rejected.
    pub fn resolve(&self, tier: &str) -> Tier {
        match tier.parse() {
            Ok(tier) => tier,
            Err(_) => {
                let fallback = self.most_restrictive();
                warn!(tier = %tier, fallback = %fallback, "Unknown tier, using most restrictive");
                fallback
            },
        }
    }
}

fn env_limit(var: &str, default: u64) -> u64 {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_from_str() {
        assert_eq!("free".parse::<Tier>().unwrap(), Tier::Free);
        assert_eq!("Standard".parse::<Tier>().unwrap(), Tier::Standard);
        assert_eq!("ENTERPRISE".parse::<Tier>().unwrap(), Tier::Enterprise);
        assert!("platinum".parse::<Tier>().is_err());
    }

    #[test]
    fn test_default_limits() {
        let config = QuotaConfig::default();
        assert_eq!(config.limits(Tier::Free).hourly, DEFAULT_FREE_HOURLY);
        assert_eq!(config.limits(Tier::Free).daily, Some(DEFAULT_FREE_DAILY));
        assert_eq!(config.limits(Tier::Enterprise).daily, None);
    }

    #[test]
    fn test_resolve_unknown_tier_falls_back() {
        let config = QuotaConfig::default();
        assert_eq!(config.resolve("platinum"), Tier::Free);
        assert_eq!(config.resolve("standard"), Tier::Standard);
    }

    #[test]
    fn test_most_restrictive_follows_config() {
        let mut config = QuotaConfig::default();
        config.standard.hourly = 10;
        assert_eq!(config.most_restrictive(), Tier::Standard);
    }
}
