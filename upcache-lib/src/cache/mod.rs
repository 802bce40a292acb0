//! Response caching layer
//!
//! Provides a per-key, in-memory cache of normalized upstream payloads.
//! Entries carry the instant they were fetched and the cache version they
//! were written under, so they can be aged out by TTL or invalidated all at
//! once by bumping the version. Invalid entries are kept around: they are the
//! stale data served when a refresh fails.

mod config;
mod memory;

pub use config::*;
pub use memory::*;

use std::time::Duration;

use tokio::time::Instant;

/// One cached payload.
///
/// Entries are immutable; a refresh replaces the whole entry.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
    /// The resource key (e.g. subreddit name, or `subreddit:post_id`).
    pub key: String,
    /// The normalized payload.
    pub data: T,
    /// When this entry was populated.
    pub fetched_at: Instant,
    /// Cache version current when the entry was written.
    pub version: u32,
}

impl<T> CacheEntry<T> {
    /// Creates a new entry.
    pub fn new(key: impl Into<String>, data: T, fetched_at: Instant, version: u32) -> Self {
        Self {
            key: key.into(),
            data,
            fetched_at,
            version,
        }
    }

    /// How long ago the entry was fetched.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.fetched_at)
    }
}
