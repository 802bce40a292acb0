//! Cache configuration

use std::time::Duration;

/// Configuration for one resource cache.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use upcache_lib::cache::CacheConfig;
///
/// let config = CacheConfig::posts()
///     .with_ttl(Duration::from_secs(600))
///     .with_version(6);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// How long an entry counts as valid.
    ///
    /// Default: 30 minutes
    pub ttl: Duration,

    /// Minimum entry age before a forced refresh is honored.
    ///
    /// Default: 2 minutes
    pub min_refresh_interval: Duration,

    /// Cache version stamped on new entries. Entries written under another
    /// version are invalid.
    ///
    /// Default: 1
    pub version: u32,

    /// Upper bound on the number of keys. `None` means unbounded. Enforced
    /// approximately under concurrent writes.
    ///
    /// Default: [`CacheConfig::DEFAULT_MAX_ENTRIES`]
    pub max_entries: Option<usize>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30 * 60),                  // 30 minutes
            min_refresh_interval: Duration::from_secs(2 * 60), // 2 minutes
            version: 1,
            max_entries: Some(Self::DEFAULT_MAX_ENTRIES),
        }
    }
}

impl CacheConfig {
    /// Default key bound. Keys come from request parameters, so every cache
    /// is bounded unless explicitly opened up with [`unbounded`](Self::unbounded).
    pub const DEFAULT_MAX_ENTRIES: usize = 1_000;

    /// Creates a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Preset for subreddit post listings (30 minute TTL).
    pub fn posts() -> Self {
        Self::default()
    }

    /// Preset for post comment threads (30 minute TTL).
    pub fn comments() -> Self {
        Self::default()
    }

    /// Preset for subreddit flair lists (24 hour TTL).
    pub fn flairs() -> Self {
        Self::default().with_ttl(Duration::from_secs(24 * 60 * 60))
    }

    /// Sets the TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets the minimum refresh interval.
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// Sets the cache version.
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Bounds the number of cached keys.
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = Some(max);
        self
    }

    /// Removes the key bound.
    pub fn unbounded(mut self) -> Self {
        self.max_entries = None;
        self
    }
}
