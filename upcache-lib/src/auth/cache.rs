//! Bearer token caching.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::AccessToken;
use super::TokenGrant;
use super::TokenProvider;
use crate::clock::Clock;
use crate::clock::SystemClock;
use crate::error::AuthError;
use crate::rate_limit::RateGovernor;

/// One credential exchange against the upstream's token endpoint.
///
/// Implementations do no caching of their own; wrap them in a
/// [`TokenCache`].
#[async_trait]
pub trait AuthFlow: Send + Sync {
    /// Returns `false` when required credentials are absent, so callers can
    /// fail before spending a rate-limit grant.
    fn is_configured(&self) -> bool {
        true
    }

    /// Performs the exchange and returns the new token.
    async fn authenticate(&self) -> Result<TokenGrant, AuthError>;
}

/// A token provider that caches the bearer token for a fixed TTL.
///
/// - Returns the cached token while it is younger than the TTL, without any
///   network call or rate-limit grant
/// - Otherwise takes a grant from the shared [`RateGovernor`], runs the flow
///   and caches the result
/// - Failed exchanges are returned as-is and never cached
///
/// The TTL should sit below the token's real lifetime (55 minutes for a
/// 60 minute token) so a token never expires in the middle of a call.
///
/// # Example
///
/// ```ignore
/// use upcache_lib::auth::{ClientCredentialsFlow, TokenCache, TokenProvider};
/// use upcache_lib::rate_limit::RateGovernor;
///
/// let governor = RateGovernor::default();
/// let flow = ClientCredentialsFlow::new(client_id, client_secret);
/// let tokens = TokenCache::new(flow, governor.clone());
///
/// let token = tokens.get_token().await?;
/// ```
pub struct TokenCache<F> {
    flow: F,
    token: RwLock<Option<AccessToken>>,
    ttl: Duration,
    governor: RateGovernor,
    clock: Arc<dyn Clock>,
}

impl<F: AuthFlow> TokenCache<F> {
    /// Default token TTL: 55 minutes.
    pub const DEFAULT_TTL: Duration = Duration::from_secs(55 * 60);

    /// Creates an empty token cache with the default TTL.
    pub fn new(flow: F, governor: RateGovernor) -> Self {
        Self {
            flow,
            token: RwLock::new(None),
            ttl: Self::DEFAULT_TTL,
            governor,
            clock: Arc::new(SystemClock),
        }
    }

    /// Sets the TTL after which a new token is exchanged.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets the clock used to age tokens.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the configured TTL.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the cached token, fresh or not.
    pub async fn cached(&self) -> Option<AccessToken> {
        self.token.read().await.clone()
    }

    /// Forgets the cached token, forcing an exchange on next request.
    pub async fn clear(&self) {
        let mut token = self.token.write().await;
        *token = None;
    }

    fn fresh(&self, token: &Option<AccessToken>) -> Option<AccessToken> {
        token
            .as_ref()
            .filter(|t| t.is_fresh(self.clock.now(), self.ttl))
            .cloned()
    }
}

#[async_trait]
impl<F: AuthFlow> TokenProvider for TokenCache<F> {
    async fn get_token(&self) -> Result<AccessToken, AuthError> {
        // Fast path: check if we have a valid cached token
        if let Some(token) = self.fresh(&*self.token.read().await) {
            log::debug!("using cached upstream token");
            return Ok(token);
        }

        let mut token_guard = self.token.write().await;

        // Double-check after acquiring write lock (another task may have refreshed)
        if let Some(token) = self.fresh(&token_guard) {
            return Ok(token);
        }

        if !self.flow.is_configured() {
            return Err(AuthError::MissingCredentials);
        }

        log::info!("fetching new upstream token");
        self.governor.acquire().await;
        let obtained_at = self.clock.now();
        let token = self.flow.authenticate().await?.into_access_token(obtained_at);

        *token_guard = Some(token.clone());
        log::info!("upstream token cached for {:?}", self.ttl);
        Ok(token)
    }
}

impl<F> std::fmt::Debug for TokenCache<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCache")
            .field("ttl", &self.ttl)
            .field("governor", &self.governor)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::clock::ManualClock;
    use crate::rate_limit::RateLimitConfig;

    #[derive(Default)]
    struct CountingFlow {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl AuthFlow for CountingFlow {
        async fn authenticate(&self) -> Result<TokenGrant, AuthError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail {
                return Err(AuthError::Rejected {
                    status: 401,
                    message: "Unauthorized".into(),
                });
            }
            Ok(TokenGrant::new(format!("token-{n}")))
        }
    }

    struct Unconfigured;

    #[async_trait]
    impl AuthFlow for Unconfigured {
        fn is_configured(&self) -> bool {
            false
        }

        async fn authenticate(&self) -> Result<TokenGrant, AuthError> {
            panic!("must not be called without credentials");
        }
    }

    fn cache<F: AuthFlow>(flow: F, clock: Arc<ManualClock>) -> TokenCache<F> {
        let governor = RateGovernor::with_clock(RateLimitConfig::unlimited(), clock.clone());
        TokenCache::new(flow, governor).with_clock(clock)
    }

    #[tokio::test]
    async fn test_token_reused_within_ttl() {
        let clock = Arc::new(ManualClock::new());
        let tokens = cache(CountingFlow::default(), clock.clone());

        let first = tokens.get_token().await.unwrap();
        clock.advance(Duration::from_secs(54 * 60));
        let second = tokens.get_token().await.unwrap();

        assert_eq!(first.access_token, "token-1");
        assert_eq!(second.access_token, "token-1");
        assert_eq!(tokens.flow.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_token_refreshed_after_ttl() {
        let clock = Arc::new(ManualClock::new());
        let tokens = cache(CountingFlow::default(), clock.clone());

        tokens.get_token().await.unwrap();
        clock.advance(TokenCache::<CountingFlow>::DEFAULT_TTL);
        let refreshed = tokens.get_token().await.unwrap();

        assert_eq!(refreshed.access_token, "token-2");
        assert_eq!(tokens.flow.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let clock = Arc::new(ManualClock::new());
        let flow = CountingFlow {
            fail: true,
            ..Default::default()
        };
        let tokens = cache(flow, clock);

        assert!(tokens.get_token().await.is_err());
        assert!(tokens.get_token().await.is_err());
        assert!(tokens.cached().await.is_none());
        assert_eq!(tokens.flow.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_missing_credentials_skip_exchange() {
        let clock = Arc::new(ManualClock::new());
        let tokens = cache(Unconfigured, clock);

        let result = tokens.get_token().await;
        assert!(matches!(result, Err(AuthError::MissingCredentials)));
    }

    #[tokio::test]
    async fn test_clear_forces_exchange() {
        let clock = Arc::new(ManualClock::new());
        let tokens = cache(CountingFlow::default(), clock);

        tokens.get_token().await.unwrap();
        tokens.clear().await;
        let token = tokens.get_token().await.unwrap();

        assert_eq!(token.access_token, "token-2");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_share_one_exchange() {
        let clock = Arc::new(ManualClock::new());
        let tokens = Arc::new(cache(CountingFlow::default(), clock));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let tokens = tokens.clone();
            handles.push(tokio::spawn(async move { tokens.get_token().await.unwrap() }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().access_token, "token-1");
        }

        assert_eq!(tokens.flow.calls.load(Ordering::SeqCst), 1);
    }
}
