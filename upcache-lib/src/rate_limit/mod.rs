//! Outbound rate limiting.

mod config;
mod governor;

pub use config::RateLimitConfig;
pub use governor::RateGovernor;
