//! In-memory response cache using DashMap

use std::sync::Arc;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;
use std::time::Duration;

use dashmap::DashMap;

use super::CacheConfig;
use super::CacheEntry;
use crate::clock::Clock;
use crate::clock::SystemClock;

/// An in-memory cache of normalized payloads, keyed by resource key.
///
/// `get` returns entries whether or not they are still valid; use
/// [`is_valid`](Self::is_valid) to decide between serving and refreshing.
/// Data is lost when the process exits.
///
/// # Example
///
/// ```
/// use upcache_lib::cache::{CacheConfig, ResponseCache};
///
/// let cache: ResponseCache<Vec<String>> = ResponseCache::new(&CacheConfig::posts());
/// let entry = cache.put("rust", vec!["hello".to_string()]);
/// assert!(cache.is_valid(&entry));
///
/// cache.bump_version();
/// assert!(cache.is_stale(&cache.get("rust").unwrap()));
/// ```
pub struct ResponseCache<T> {
    store: DashMap<String, Arc<CacheEntry<T>>>,
    version: AtomicU32,
    ttl: Duration,
    max_entries: Option<usize>,
    clock: Arc<dyn Clock>,
}

impl<T> ResponseCache<T> {
    /// Creates an empty cache on the system clock.
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates an empty cache on the given clock.
    pub fn with_clock(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: DashMap::new(),
            version: AtomicU32::new(config.version),
            ttl: config.ttl,
            max_entries: config.max_entries,
            clock,
        }
    }

    /// Returns the entry for `key`, valid or not.
    pub fn get(&self, key: &str) -> Option<Arc<CacheEntry<T>>> {
        self.store.get(key).map(|entry| entry.value().clone())
    }

    /// Stores `data` under `key`, replacing any previous entry.
    ///
    /// With a key bound, inserting a new key first evicts the oldest entries.
    /// The bound is approximate: concurrent puts of new keys can briefly
    /// overshoot it by the number of racing writers. Eviction scans every
    /// entry.
    pub fn put(&self, key: &str, data: T) -> Arc<CacheEntry<T>> {
        let entry = Arc::new(CacheEntry::new(
            key,
            data,
            self.clock.now(),
            self.version(),
        ));

        if let Some(max) = self.max_entries {
            if !self.store.contains_key(key) {
                while self.store.len() >= max.max(1) {
                    if !self.evict_oldest() {
                        break;
                    }
                }
            }
        }

        self.store.insert(key.to_string(), entry.clone());
        entry
    }

    /// Returns `true` if the entry is younger than the TTL and was written
    /// under the current version.
    pub fn is_valid(&self, entry: &CacheEntry<T>) -> bool {
        entry.version == self.version() && self.age(entry) < self.ttl
    }

    /// Returns `true` if the entry exists but is no longer valid.
    pub fn is_stale(&self, entry: &CacheEntry<T>) -> bool {
        !self.is_valid(entry)
    }

    /// Returns the entry's age on this cache's clock.
    pub fn age(&self, entry: &CacheEntry<T>) -> Duration {
        entry.age(self.clock.now())
    }

    /// Returns the current cache version.
    pub fn version(&self) -> u32 {
        self.version.load(Ordering::SeqCst)
    }

    /// Invalidates every entry by moving to the next version.
    ///
    /// Entries stay in storage and can still be served as stale data.
    /// Returns the new version.
    pub fn bump_version(&self) -> u32 {
        let new = self.version.fetch_add(1, Ordering::SeqCst).wrapping_add(1);
        log::info!("cache version bumped to {}", new);
        new
    }

    /// Returns the configured TTL.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the number of entries (including invalid ones).
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Returns `true` if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    fn evict_oldest(&self) -> bool {
        let oldest = self
            .store
            .iter()
            .min_by_key(|entry| entry.value().fetched_at)
            .map(|entry| entry.key().clone());

        match oldest {
            Some(key) => {
                log::debug!("evicting cache entry {}", key);
                self.store.remove(&key);
                true
            }
            None => false,
        }
    }
}

impl<T> std::fmt::Debug for ResponseCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("entries", &self.store.len())
            .field("version", &self.version())
            .field("ttl", &self.ttl)
            .field("max_entries", &self.max_entries)
            .finish()
    }
}
