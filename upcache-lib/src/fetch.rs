//! Fetch orchestration
//!
//! A [`Fetcher`] is the one entry point for reading a [`Resource`]. Per call
//! it decides between serving the cache and refreshing from the upstream,
//! and on failure falls back to stale or empty data instead of returning an
//! error.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::BoxFuture;
use futures::future::Shared;

use crate::auth::TokenProvider;
use crate::cache::CacheConfig;
use crate::cache::CacheEntry;
use crate::cache::ResponseCache;
use crate::client::Upstream;
use crate::clock::Clock;
use crate::clock::SystemClock;
use crate::error::Error;
use crate::error::UpstreamError;
use crate::rate_limit::RateGovernor;
use crate::resource::Resource;
use crate::response::Response;

type RefreshResult<T> = Result<Arc<CacheEntry<T>>, Arc<Error>>;
type RefreshFuture<T> = Shared<BoxFuture<'static, RefreshResult<T>>>;

/// Optional fetcher behavior.
#[derive(Clone)]
pub struct FetcherOptions {
    /// Collapse concurrent refreshes of one key into a single upstream call.
    ///
    /// Default: enabled
    pub dedupe: bool,

    /// Clock used to age cache entries.
    ///
    /// Default: [`SystemClock`]
    pub clock: Arc<dyn Clock>,
}

impl Default for FetcherOptions {
    fn default() -> Self {
        Self {
            dedupe: true,
            clock: Arc::new(SystemClock),
        }
    }
}

impl FetcherOptions {
    /// Creates options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables in-flight de-duplication.
    pub fn with_dedupe(mut self, dedupe: bool) -> Self {
        self.dedupe = dedupe;
        self
    }

    /// Sets the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

impl std::fmt::Debug for FetcherOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetcherOptions")
            .field("dedupe", &self.dedupe)
            .finish_non_exhaustive()
    }
}

/// Cache-first reader for one kind of resource.
///
/// For each call to [`fetch`](Self::fetch):
///
/// 1. A valid entry is served as-is, unless a forced refresh was asked for
///    and the entry is at least `min_refresh_interval` old.
/// 2. Otherwise the entry is refreshed: token, rate-limit grant, upstream
///    call, projection, cache write.
/// 3. If the refresh fails, the existing entry is served even if invalid;
///    with no entry at all, `R::Data::default()` is served.
///
/// The fetcher is cheap to clone and all clones share one cache.
///
/// # Example
///
/// ```ignore
/// use upcache_lib::fetch::Fetcher;
/// use upcache_lib::reddit::{Posts, PostsParams};
///
/// let posts: Fetcher<Posts> = Fetcher::new(&CacheConfig::posts(), upstream, tokens, governor);
/// let response = posts.fetch(&PostsParams::new("rust"), false).await;
/// ```
pub struct Fetcher<R: Resource> {
    inner: Arc<FetcherInner<R>>,
}

struct FetcherInner<R: Resource> {
    cache: ResponseCache<R::Data>,
    upstream: Arc<dyn Upstream>,
    tokens: Arc<dyn TokenProvider>,
    governor: RateGovernor,
    min_refresh_interval: Duration,
    dedupe: bool,
    in_flight: DashMap<String, RefreshFuture<R::Data>>,
}

impl<R: Resource> Fetcher<R> {
    /// Creates a fetcher with default options.
    pub fn new(
        config: &CacheConfig,
        upstream: Arc<dyn Upstream>,
        tokens: Arc<dyn TokenProvider>,
        governor: RateGovernor,
    ) -> Self {
        Self::with_options(config, upstream, tokens, governor, FetcherOptions::default())
    }

    /// Creates a fetcher with the given options.
    pub fn with_options(
        config: &CacheConfig,
        upstream: Arc<dyn Upstream>,
        tokens: Arc<dyn TokenProvider>,
        governor: RateGovernor,
        options: FetcherOptions,
    ) -> Self {
        Self {
            inner: Arc::new(FetcherInner {
                cache: ResponseCache::with_clock(config, options.clock),
                upstream,
                tokens,
                governor,
                min_refresh_interval: config.min_refresh_interval,
                dedupe: options.dedupe,
                in_flight: DashMap::new(),
            }),
        }
    }

    /// Returns data for `params`, from cache or upstream.
    ///
    /// Never fails; see the type-level docs for the decision order.
    pub async fn fetch(&self, params: &R::Params, force_refresh: bool) -> Response<R::Data> {
        let key = R::cache_key(params);
        let cache = &self.inner.cache;

        if let Some(entry) = cache.get(&key) {
            if cache.is_valid(&entry) {
                let age = cache.age(&entry);
                let can_refresh = age >= self.inner.min_refresh_interval;
                if !force_refresh || !can_refresh {
                    if force_refresh {
                        log::debug!(
                            "{} {}: refresh suppressed, entry is {}s old",
                            R::NAME,
                            key,
                            age.as_secs()
                        );
                    } else {
                        log::debug!("{} {}: cache hit ({}s old)", R::NAME, key, age.as_secs());
                    }
                    return Response::cached(entry.data.clone(), age, force_refresh);
                }
            }
        }

        match self.refresh(&key, params).await {
            Ok(entry) => Response::live(entry.data.clone()),
            Err(error) => self.fallback(&key, &error),
        }
    }

    /// Invalidates every cached entry of this resource. Returns the new version.
    pub fn invalidate(&self) -> u32 {
        self.inner.cache.bump_version()
    }

    /// Returns the underlying cache.
    pub fn cache(&self) -> &ResponseCache<R::Data> {
        &self.inner.cache
    }

    /// Returns the number of refreshes currently in flight.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.len()
    }

    async fn refresh(&self, key: &str, params: &R::Params) -> RefreshResult<R::Data> {
        if !self.inner.dedupe {
            return self.inner.load(key, params).await.map_err(Arc::new);
        }

        let refresh = match self.inner.in_flight.entry(key.to_string()) {
            Entry::Occupied(entry) => {
                log::debug!("{} {}: joining in-flight refresh", R::NAME, key);
                entry.get().clone()
            }
            Entry::Vacant(entry) => {
                let inner = self.inner.clone();
                let key = key.to_string();
                let params = params.clone();
                // Detached: the refresh runs to completion even when every
                // caller awaiting it is dropped.
                let task = tokio::spawn(async move {
                    let _slot = InFlightSlot {
                        map: &inner.in_flight,
                        key: &key,
                    };
                    inner.load(&key, &params).await.map_err(Arc::new)
                });
                let refresh = task
                    .map(|joined| {
                        joined.unwrap_or_else(|e| Err(Arc::new(Error::Refresh(e.to_string()))))
                    })
                    .boxed()
                    .shared();
                entry.insert(refresh.clone());
                refresh
            }
        };

        refresh.await
    }

    fn fallback(&self, key: &str, error: &Error) -> Response<R::Data> {
        let cache = &self.inner.cache;
        match cache.get(key) {
            Some(entry) => {
                let age = cache.age(&entry);
                log::warn!(
                    "{} {}: refresh failed ({}), serving stale data ({}s old)",
                    R::NAME,
                    key,
                    error,
                    age.as_secs()
                );
                Response::stale(entry.data.clone(), age, error.to_string())
            }
            None => {
                log::warn!(
                    "{} {}: refresh failed ({}), nothing cached, serving empty result",
                    R::NAME,
                    key,
                    error
                );
                Response::empty(R::Data::default(), error.to_string())
            }
        }
    }
}

impl<R: Resource> FetcherInner<R> {
    async fn load(&self, key: &str, params: &R::Params) -> Result<Arc<CacheEntry<R::Data>>, Error> {
        log::info!("{} {}: refreshing from upstream", R::NAME, key);

        let token = self.tokens.get_token().await?;
        self.governor.acquire().await;

        let path = R::path(params);
        let query = R::query(params);
        let json = self.upstream.get_json(&path, &query, &token).await?;

        let data = {
            let raw: R::Raw = serde_json::from_value(json)
                .map_err(|e| UpstreamError::parse(format!("unexpected {} payload: {e}", R::NAME)))?;
            R::transform(raw)
        };

        let entry = self.cache.put(key, data);
        log::info!("{} {}: cached fresh data", R::NAME, key);
        Ok(entry)
    }
}

/// Clears a key's in-flight slot when its refresh task ends, including by
/// panic or runtime shutdown.
struct InFlightSlot<'a, T> {
    map: &'a DashMap<String, RefreshFuture<T>>,
    key: &'a str,
}

impl<T> Drop for InFlightSlot<'_, T> {
    fn drop(&mut self) {
        self.map.remove(self.key);
    }
}

impl<R: Resource> Clone for Fetcher<R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<R: Resource> std::fmt::Debug for Fetcher<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("resource", &R::NAME)
            .field("cache", &self.inner.cache)
            .field("min_refresh_interval", &self.inner.min_refresh_interval)
            .field("dedupe", &self.inner.dedupe)
            .finish_non_exhaustive()
    }
}
