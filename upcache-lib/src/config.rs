//! Gateway configuration
//!
//! Everything tunable about the gateway lives in [`GatewayConfig`]. It can be
//! built in code with the `with_*` methods or loaded from the environment
//! (and an optional `.env` file) with [`GatewayConfig::from_env`].

use std::str::FromStr;
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::error::ConfigError;
use crate::rate_limit::RateLimitConfig;

/// Reddit's OAuth token endpoint.
pub const DEFAULT_AUTH_URL: &str = "https://www.reddit.com/api/v1/access_token";

/// Reddit's authenticated API host.
pub const DEFAULT_API_URL: &str = "https://oauth.reddit.com";

/// `User-Agent` sent when none is configured.
pub const DEFAULT_USER_AGENT: &str = concat!("upcache/", env!("CARGO_PKG_VERSION"));

pub const ENV_CLIENT_ID: &str = "REDDIT_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "REDDIT_CLIENT_SECRET";
pub const ENV_USER_AGENT: &str = "REDDIT_USER_AGENT";
pub const ENV_AUTH_URL: &str = "REDDIT_AUTH_URL";
pub const ENV_API_URL: &str = "REDDIT_API_URL";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "UPCACHE_REQUEST_TIMEOUT_SECS";
pub const ENV_TOKEN_TTL_SECS: &str = "UPCACHE_TOKEN_TTL_SECS";
pub const ENV_RATE_WINDOW_SECS: &str = "UPCACHE_RATE_WINDOW_SECS";
pub const ENV_RATE_MAX_PER_WINDOW: &str = "UPCACHE_RATE_MAX_PER_WINDOW";
pub const ENV_RATE_MIN_SPACING_MS: &str = "UPCACHE_RATE_MIN_SPACING_MS";
pub const ENV_POSTS_TTL_SECS: &str = "UPCACHE_POSTS_TTL_SECS";
pub const ENV_COMMENTS_TTL_SECS: &str = "UPCACHE_COMMENTS_TTL_SECS";
pub const ENV_FLAIRS_TTL_SECS: &str = "UPCACHE_FLAIRS_TTL_SECS";
pub const ENV_MIN_REFRESH_SECS: &str = "UPCACHE_MIN_REFRESH_SECS";
pub const ENV_CACHE_VERSION: &str = "UPCACHE_CACHE_VERSION";
pub const ENV_CACHE_MAX_ENTRIES: &str = "UPCACHE_CACHE_MAX_ENTRIES";

/// Configuration for a [`RedditGateway`](crate::gateway::RedditGateway).
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use upcache_lib::config::GatewayConfig;
///
/// let config = GatewayConfig::new("client-id", "client-secret")
///     .with_user_agent("my-app/1.0")
///     .with_request_timeout(Duration::from_secs(10));
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone)]
pub struct GatewayConfig {
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// `User-Agent` sent with every upstream call.
    pub user_agent: String,
    /// Token endpoint URL.
    pub auth_url: String,
    /// Base URL for resource calls.
    pub api_base_url: String,
    /// Per-request timeout for upstream calls.
    pub request_timeout: Duration,
    /// How long a token is reused before a new exchange.
    pub token_ttl: Duration,
    /// Shared outbound rate limits.
    pub rate_limit: RateLimitConfig,
    /// Cache settings for post listings.
    pub posts: CacheConfig,
    /// Cache settings for comment threads.
    pub comments: CacheConfig,
    /// Cache settings for flair lists.
    pub flairs: CacheConfig,
    /// Collapse concurrent refreshes of one key into a single upstream call.
    pub dedupe_in_flight: bool,
}

impl GatewayConfig {
    /// Longest accepted rate-limit window.
    pub const MAX_RATE_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

    /// Creates a config with the given credentials and defaults elsewhere.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            auth_url: DEFAULT_AUTH_URL.to_string(),
            api_base_url: DEFAULT_API_URL.to_string(),
            request_timeout: Duration::from_secs(15),
            token_ttl: Duration::from_secs(55 * 60),
            rate_limit: RateLimitConfig::default(),
            posts: CacheConfig::posts(),
            comments: CacheConfig::comments(),
            flairs: CacheConfig::flairs(),
            dedupe_in_flight: true,
        }
    }

    /// Loads configuration from the process environment.
    ///
    /// A `.env` file in the working directory is read first if present.
    /// Fails if the client id or secret is missing, or if any numeric
    /// setting does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let client_id = lookup(ENV_CLIENT_ID).ok_or(ConfigError::Missing(ENV_CLIENT_ID))?;
        let client_secret =
            lookup(ENV_CLIENT_SECRET).ok_or(ConfigError::Missing(ENV_CLIENT_SECRET))?;

        let mut config = Self::new(client_id, client_secret);

        if let Some(user_agent) = lookup(ENV_USER_AGENT) {
            config.user_agent = user_agent;
        }
        if let Some(url) = lookup(ENV_AUTH_URL) {
            config.auth_url = url;
        }
        if let Some(url) = lookup(ENV_API_URL) {
            config.api_base_url = url;
        }
        if let Some(secs) = parse::<u64>(&lookup, ENV_REQUEST_TIMEOUT_SECS)? {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse::<u64>(&lookup, ENV_TOKEN_TTL_SECS)? {
            config.token_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = parse::<u64>(&lookup, ENV_RATE_WINDOW_SECS)? {
            config.rate_limit.window = Duration::from_secs(secs);
        }
        if let Some(max) = parse::<u32>(&lookup, ENV_RATE_MAX_PER_WINDOW)? {
            config.rate_limit.max_per_window = max;
        }
        if let Some(ms) = parse::<u64>(&lookup, ENV_RATE_MIN_SPACING_MS)? {
            config.rate_limit.min_spacing = Duration::from_millis(ms);
        }
        if let Some(secs) = parse::<u64>(&lookup, ENV_POSTS_TTL_SECS)? {
            config.posts.ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = parse::<u64>(&lookup, ENV_COMMENTS_TTL_SECS)? {
            config.comments.ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = parse::<u64>(&lookup, ENV_FLAIRS_TTL_SECS)? {
            config.flairs.ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = parse::<u64>(&lookup, ENV_MIN_REFRESH_SECS)? {
            let interval = Duration::from_secs(secs);
            for cache in config.caches_mut() {
                cache.min_refresh_interval = interval;
            }
        }
        if let Some(version) = parse::<u32>(&lookup, ENV_CACHE_VERSION)? {
            for cache in config.caches_mut() {
                cache.version = version;
            }
        }
        if let Some(max) = parse::<usize>(&lookup, ENV_CACHE_MAX_ENTRIES)? {
            for cache in config.caches_mut() {
                cache.max_entries = Some(max);
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks the settings for values that would stall or disable the gateway.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client_id.trim().is_empty() {
            return Err(ConfigError::Missing(ENV_CLIENT_ID));
        }
        if self.client_secret.trim().is_empty() {
            return Err(ConfigError::Missing(ENV_CLIENT_SECRET));
        }
        if self.rate_limit.window.is_zero() {
            return Err(ConfigError::invalid(ENV_RATE_WINDOW_SECS, "0", "window must be non-zero"));
        }
        if self.rate_limit.window > Self::MAX_RATE_WINDOW {
            return Err(ConfigError::invalid(
                ENV_RATE_WINDOW_SECS,
                self.rate_limit.window.as_secs().to_string(),
                "window must be at most 86400 seconds",
            ));
        }
        if self.rate_limit.max_per_window == 0 {
            return Err(ConfigError::invalid(
                ENV_RATE_MAX_PER_WINDOW,
                "0",
                "at least one request per window is required",
            ));
        }
        if self.token_ttl.is_zero() {
            return Err(ConfigError::invalid(ENV_TOKEN_TTL_SECS, "0", "token TTL must be non-zero"));
        }
        for (key, cache) in [
            (ENV_POSTS_TTL_SECS, &self.posts),
            (ENV_COMMENTS_TTL_SECS, &self.comments),
            (ENV_FLAIRS_TTL_SECS, &self.flairs),
        ] {
            if cache.ttl.is_zero() {
                return Err(ConfigError::invalid(key, "0", "cache TTL must be non-zero"));
            }
            if cache.max_entries == Some(0) {
                return Err(ConfigError::invalid(
                    ENV_CACHE_MAX_ENTRIES,
                    "0",
                    "cache bound must be at least 1",
                ));
            }
        }
        Ok(())
    }

    /// Sets the `User-Agent`.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the token endpoint URL.
    pub fn with_auth_url(mut self, url: impl Into<String>) -> Self {
        self.auth_url = url.into();
        self
    }

    /// Sets the base URL for resource calls.
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Sets the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the token TTL.
    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    /// Sets the rate limits.
    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    /// Sets the post listing cache config.
    pub fn with_posts_cache(mut self, config: CacheConfig) -> Self {
        self.posts = config;
        self
    }

    /// Sets the comment thread cache config.
    pub fn with_comments_cache(mut self, config: CacheConfig) -> Self {
        self.comments = config;
        self
    }

    /// Sets the flair list cache config.
    pub fn with_flairs_cache(mut self, config: CacheConfig) -> Self {
        self.flairs = config;
        self
    }

    /// Enables or disables in-flight de-duplication.
    pub fn with_dedupe_in_flight(mut self, enabled: bool) -> Self {
        self.dedupe_in_flight = enabled;
        self
    }

    fn caches_mut(&mut self) -> [&mut CacheConfig; 3] {
        [&mut self.posts, &mut self.comments, &mut self.flairs]
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("client_id", &self.client_id)
            .field("user_agent", &self.user_agent)
            .field("auth_url", &self.auth_url)
            .field("api_base_url", &self.api_base_url)
            .field("request_timeout", &self.request_timeout)
            .field("token_ttl", &self.token_ttl)
            .field("rate_limit", &self.rate_limit)
            .field("posts", &self.posts)
            .field("comments", &self.comments)
            .field("flairs", &self.flairs)
            .field("dedupe_in_flight", &self.dedupe_in_flight)
            .finish_non_exhaustive()
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::invalid(key, raw.clone(), e.to_string())),
    }
}
