//! Reddit gateway
//!
//! Wires one rate governor, one token cache and one upstream client into the
//! three Reddit fetchers, so that every outbound call (token exchanges
//! included) is paced by the same governor.

use std::sync::Arc;

use crate::auth::ClientCredentialsFlow;
use crate::auth::TokenCache;
use crate::auth::TokenProvider;
use crate::client::Upstream;
use crate::client::UpstreamClient;
use crate::clock::Clock;
use crate::clock::SystemClock;
use crate::config::GatewayConfig;
use crate::error::Error;
use crate::error::UpstreamError;
use crate::fetch::Fetcher;
use crate::fetch::FetcherOptions;
use crate::rate_limit::RateGovernor;
use crate::reddit::Comment;
use crate::reddit::Comments;
use crate::reddit::CommentsParams;
use crate::reddit::Flair;
use crate::reddit::Flairs;
use crate::reddit::FlairsParams;
use crate::reddit::Post;
use crate::reddit::Posts;
use crate::reddit::PostsParams;
use crate::resource::Resource;
use crate::response::Response;

/// The cached resource types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Posts,
    Comments,
    Flairs,
}

impl ResourceKind {
    /// Every kind, in a stable order.
    pub const ALL: [ResourceKind; 3] = [Self::Posts, Self::Comments, Self::Flairs];

    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Posts => Posts::NAME,
            Self::Comments => Comments::NAME,
            Self::Flairs => Flairs::NAME,
        }
    }

    /// Looks a kind up by its lowercase name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cached, rate-limited access to Reddit posts, comments and flairs.
///
/// # Example
///
/// ```ignore
/// use upcache_lib::{GatewayConfig, RedditGateway};
/// use upcache_lib::reddit::PostsParams;
///
/// let gateway = RedditGateway::new(GatewayConfig::from_env()?)?;
/// let posts = gateway.posts(&PostsParams::new("rust"), false).await;
/// println!("{} posts ({})", posts.data().len(), posts.freshness);
/// ```
#[derive(Debug, Clone)]
pub struct RedditGateway {
    posts: Fetcher<Posts>,
    comments: Fetcher<Comments>,
    flairs: Fetcher<Flairs>,
    governor: RateGovernor,
}

impl RedditGateway {
    /// Builds a gateway that talks to Reddit over HTTP.
    pub fn new(config: GatewayConfig) -> Result<Self, Error> {
        config.validate()?;

        let http_client = reqwest::Client::builder()
            .build()
            .map_err(UpstreamError::Network)?;

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let governor = RateGovernor::with_clock(config.rate_limit.clone(), clock.clone());

        let flow = ClientCredentialsFlow::new(&config.client_id, &config.client_secret)
            .token_url(&config.auth_url)
            .user_agent(&config.user_agent)
            .timeout(config.request_timeout)
            .http_client(http_client.clone());
        let tokens = TokenCache::new(flow, governor.clone())
            .with_ttl(config.token_ttl)
            .with_clock(clock.clone());

        let upstream = UpstreamClient::builder()
            .base_url(&config.api_base_url)
            .user_agent(&config.user_agent)
            .timeout(config.request_timeout)
            .http_client(http_client)
            .build()?;

        log::info!(
            "gateway ready: {} ({} requests per {:?})",
            config.api_base_url,
            config.rate_limit.max_per_window,
            config.rate_limit.window
        );

        Ok(Self::with_parts(
            &config,
            Arc::new(upstream),
            Arc::new(tokens),
            governor,
            clock,
        ))
    }

    /// Builds a gateway from pre-made parts.
    ///
    /// Only the cache settings and de-duplication flag are read from
    /// `config`; the credentials and URLs belong to the parts.
    pub fn with_parts(
        config: &GatewayConfig,
        upstream: Arc<dyn Upstream>,
        tokens: Arc<dyn TokenProvider>,
        governor: RateGovernor,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let options = FetcherOptions::new()
            .with_dedupe(config.dedupe_in_flight)
            .with_clock(clock);

        Self {
            posts: Fetcher::with_options(
                &config.posts,
                upstream.clone(),
                tokens.clone(),
                governor.clone(),
                options.clone(),
            ),
            comments: Fetcher::with_options(
                &config.comments,
                upstream.clone(),
                tokens.clone(),
                governor.clone(),
                options.clone(),
            ),
            flairs: Fetcher::with_options(&config.flairs, upstream, tokens, governor.clone(), options),
            governor,
        }
    }

    /// Hot posts of a subreddit.
    pub async fn posts(&self, params: &PostsParams, force_refresh: bool) -> Response<Vec<Post>> {
        self.posts.fetch(params, force_refresh).await
    }

    /// Top-level comments of a post.
    pub async fn comments(
        &self,
        params: &CommentsParams,
        force_refresh: bool,
    ) -> Response<Vec<Comment>> {
        self.comments.fetch(params, force_refresh).await
    }

    /// Link flairs of a subreddit.
    pub async fn flairs(&self, params: &FlairsParams, force_refresh: bool) -> Response<Vec<Flair>> {
        self.flairs.fetch(params, force_refresh).await
    }

    /// Invalidates every cached entry of `kind`. Returns the new version.
    pub fn invalidate(&self, kind: ResourceKind) -> u32 {
        match kind {
            ResourceKind::Posts => self.posts.invalidate(),
            ResourceKind::Comments => self.comments.invalidate(),
            ResourceKind::Flairs => self.flairs.invalidate(),
        }
    }

    /// Returns the current cache version of `kind`.
    pub fn version(&self, kind: ResourceKind) -> u32 {
        match kind {
            ResourceKind::Posts => self.posts.cache().version(),
            ResourceKind::Comments => self.comments.cache().version(),
            ResourceKind::Flairs => self.flairs.cache().version(),
        }
    }

    /// Returns the number of cached entries of `kind`, valid or not.
    pub fn cached_entries(&self, kind: ResourceKind) -> usize {
        match kind {
            ResourceKind::Posts => self.posts.cache().len(),
            ResourceKind::Comments => self.comments.cache().len(),
            ResourceKind::Flairs => self.flairs.cache().len(),
        }
    }

    /// Returns the shared rate governor.
    pub fn governor(&self) -> &RateGovernor {
        &self.governor
    }
}
