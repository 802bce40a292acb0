//! Rate governor configuration

use std::time::Duration;

/// Limits applied to every call made to one upstream service.
///
/// Both limits hold at the same time: at most `max_per_window` grants per
/// `window`, and at least `min_spacing` between two consecutive grants.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use upcache_lib::rate_limit::RateLimitConfig;
///
/// let config = RateLimitConfig::default()
///     .with_max_per_window(30)
///     .with_min_spacing(Duration::from_secs(2));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Length of one counting window.
    ///
    /// Default: 60 seconds
    pub window: Duration,

    /// Grants allowed per window. Kept below the upstream's documented quota.
    ///
    /// Default: 55 (Reddit allows 60 per minute)
    pub max_per_window: u32,

    /// Minimum gap between two consecutive grants.
    ///
    /// Default: 1.1 seconds
    pub min_spacing: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            max_per_window: 55,
            min_spacing: Duration::from_millis(1100),
        }
    }
}

impl RateLimitConfig {
    /// Creates a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the window length.
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Sets the number of grants per window.
    pub fn with_max_per_window(mut self, max: u32) -> Self {
        self.max_per_window = max;
        self
    }

    /// Sets the minimum spacing between grants.
    pub fn with_min_spacing(mut self, spacing: Duration) -> Self {
        self.min_spacing = spacing;
        self
    }

    /// A config that never makes callers wait. Useful in tests.
    pub fn unlimited() -> Self {
        Self {
            window: Duration::from_secs(60),
            max_per_window: u32::MAX,
            min_spacing: Duration::ZERO,
        }
    }
}
