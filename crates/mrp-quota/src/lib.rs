//! MRP Quota Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Tiered fixed-window request quotas for the MRP API surface.
//!
//! Every inbound API request is checked against two counters per caller, an
//! hourly one and a daily one, before any query work begins. The caller's
//! subscription tier selects the limits; the HTTP layer translates the
//! resulting [`QuotaDecision`] into response headers and status codes.
//!
//! # Example
//!
//! ```rust
//! use mrp_quota::{QuotaConfig, RateLimiter};
//!
//! let limiter = RateLimiter::new(QuotaConfig::default());
//! let decision = limiter.check("api-key-123", "free");
//! if decision.allowed {
//!     // serve the request
//! }
//! ```

pub mod limiter;
pub mod tiers;
pub mod window;

// Re-export commonly used types
pub use limiter::{QuotaDecision, RateLimiter};
pub use tiers::{QuotaConfig, Tier, TierLimits};
pub use window::WindowKind;
