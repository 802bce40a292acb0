//! Fetch orchestration against in-process fakes.
//!
//! The upstream and the token exchange are replaced by counting fakes, and
//! time is driven by a `ManualClock`, so every decision of the fetcher can be
//! checked without a network or real waiting.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use upcache_lib::Freshness;
use upcache_lib::Upstream;
use upcache_lib::auth::AccessToken;
use upcache_lib::auth::AuthFlow;
use upcache_lib::auth::TokenCache;
use upcache_lib::auth::TokenGrant;
use upcache_lib::cache::CacheConfig;
use upcache_lib::clock::ManualClock;
use upcache_lib::error::AuthError;
use upcache_lib::error::UpstreamError;
use upcache_lib::fetch::Fetcher;
use upcache_lib::fetch::FetcherOptions;
use upcache_lib::rate_limit::RateGovernor;
use upcache_lib::rate_limit::RateLimitConfig;
use upcache_lib::reddit::Posts;
use upcache_lib::reddit::PostsParams;

const MINUTE: Duration = Duration::from_secs(60);

// =============================================================================
// Fakes
// =============================================================================

#[derive(Default)]
struct FakeUpstream {
    calls: AtomicUsize,
    failing: AtomicBool,
    latency: Option<Duration>,
    paths: Mutex<Vec<String>>,
}

impl FakeUpstream {
    fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Default::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Upstream for FakeUpstream {
    async fn get_json(
        &self,
        path: &str,
        _query: &[(&'static str, String)],
        token: &AccessToken,
    ) -> Result<serde_json::Value, UpstreamError> {
        assert_eq!(token.access_token, "token-1");
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.paths.lock().unwrap().push(path.to_string());

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(UpstreamError::http(503, "service unavailable"));
        }

        Ok(json!({
            "kind": "Listing",
            "data": {"children": [{
                "kind": "t3",
                "data": {
                    "id": format!("post-{call}"),
                    "author": "ferris",
                    "created_utc": 1700000000.0,
                    "title": format!("Call {call}"),
                    "ups": 1,
                    "num_comments": 0,
                    "permalink": format!("/r/rust/comments/{call}/")
                }
            }]}
        }))
    }
}

#[derive(Clone, Default)]
struct CountingFlow {
    exchanges: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
    latency: Option<Duration>,
}

#[async_trait]
impl AuthFlow for CountingFlow {
    async fn authenticate(&self) -> Result<TokenGrant, AuthError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(AuthError::Rejected {
                status: 401,
                message: "invalid_client".to_string(),
            });
        }
        let n = self.exchanges.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(TokenGrant::new(format!("token-{n}")))
    }
}

struct Harness {
    clock: Arc<ManualClock>,
    upstream: Arc<FakeUpstream>,
    flow: CountingFlow,
    posts: Fetcher<Posts>,
}

impl Harness {
    fn new() -> Self {
        Self::build(FakeUpstream::default(), true)
    }

    fn build(upstream: FakeUpstream, dedupe: bool) -> Self {
        Self::with_flow(upstream, CountingFlow::default(), dedupe)
    }

    fn with_flow(upstream: FakeUpstream, flow: CountingFlow, dedupe: bool) -> Self {
        let clock = Arc::new(ManualClock::new());
        let governor = RateGovernor::with_clock(RateLimitConfig::unlimited(), clock.clone());
        let tokens = TokenCache::new(flow.clone(), governor.clone()).with_clock(clock.clone());
        let upstream = Arc::new(upstream);

        let posts = Fetcher::with_options(
            &CacheConfig::posts(),
            upstream.clone(),
            Arc::new(tokens),
            governor,
            FetcherOptions::new()
                .with_dedupe(dedupe)
                .with_clock(clock.clone()),
        );

        Self {
            clock,
            upstream,
            flow,
            posts,
        }
    }

    fn exchanges(&self) -> usize {
        self.flow.exchanges.load(Ordering::SeqCst)
    }
}

fn titles(posts: &[upcache_lib::reddit::Post]) -> Vec<&str> {
    posts.iter().map(|p| p.title.as_str()).collect()
}

// =============================================================================
// Decision table
// =============================================================================

#[tokio::test]
async fn test_first_fetch_is_live_and_cached() {
    let h = Harness::new();
    let params = PostsParams::new("subA");

    let response = h.posts.fetch(&params, false).await;

    assert!(response.is_live());
    assert_eq!(titles(response.data()), vec!["Call 1"]);
    assert_eq!(h.upstream.calls(), 1);
    assert_eq!(h.upstream.paths.lock().unwrap()[0], "/r/subA/hot");

    let entry = h.posts.cache().get("subA").unwrap();
    assert!(h.posts.cache().is_valid(&entry));
    assert_eq!(h.posts.cache().len(), 1);
}

#[tokio::test]
async fn test_valid_entry_served_without_upstream_call() {
    let h = Harness::new();
    let params = PostsParams::new("rust");

    h.posts.fetch(&params, false).await;
    h.clock.advance(10 * MINUTE);
    let response = h.posts.fetch(&params, false).await;

    assert_eq!(
        response.freshness,
        Freshness::Cached {
            age: 10 * MINUTE,
            refresh_suppressed: false
        }
    );
    assert_eq!(titles(response.data()), vec!["Call 1"]);
    assert_eq!(h.upstream.calls(), 1);
}

#[tokio::test]
async fn test_forced_refresh_throttled() {
    let h = Harness::new();
    let params = PostsParams::new("rust");

    h.posts.fetch(&params, true).await;
    h.clock.advance(MINUTE);

    let response = h.posts.fetch(&params, true).await;
    assert_eq!(h.upstream.calls(), 1);
    assert_eq!(
        response.freshness,
        Freshness::Cached {
            age: MINUTE,
            refresh_suppressed: true
        }
    );

    h.clock.advance(MINUTE);
    let response = h.posts.fetch(&params, true).await;
    assert!(response.is_live());
    assert_eq!(titles(response.data()), vec!["Call 2"]);
    assert_eq!(h.upstream.calls(), 2);
}

#[tokio::test]
async fn test_expired_entry_refreshed() {
    let h = Harness::new();
    let params = PostsParams::new("rust");

    h.posts.fetch(&params, false).await;
    h.clock.advance(30 * MINUTE);
    let response = h.posts.fetch(&params, false).await;

    assert!(response.is_live());
    assert_eq!(h.upstream.calls(), 2);
}

#[tokio::test]
async fn test_version_bump_triggers_refresh() {
    let h = Harness::new();
    let params = PostsParams::new("rust");

    h.posts.fetch(&params, false).await;
    assert_eq!(h.posts.invalidate(), 2);

    let response = h.posts.fetch(&params, false).await;
    assert!(response.is_live());
    assert_eq!(titles(response.data()), vec!["Call 2"]);
    assert_eq!(h.posts.cache().get("rust").unwrap().version, 2);
}

#[tokio::test]
async fn test_limit_not_part_of_key() {
    let h = Harness::new();

    h.posts.fetch(&PostsParams::new("rust").with_limit(10), false).await;
    let response = h.posts.fetch(&PostsParams::new("rust").with_limit(25), false).await;

    assert!(response.is_cached());
    assert_eq!(h.upstream.calls(), 1);
}

// =============================================================================
// Failure handling
// =============================================================================

#[tokio::test]
async fn test_stale_entry_served_when_refresh_fails() {
    let h = Harness::new();
    let params = PostsParams::new("subA");

    h.posts.fetch(&params, false).await;
    let before = h.posts.cache().get("subA").unwrap();

    h.clock.advance(40 * MINUTE);
    h.upstream.fail(true);
    let response = h.posts.fetch(&params, false).await;

    assert!(response.is_stale());
    assert_eq!(response.age(), Some(40 * MINUTE));
    assert_eq!(titles(response.data()), vec!["Call 1"]);
    assert!(
        response
            .freshness
            .error()
            .is_some_and(|e| e.contains("503"))
    );

    // the entry is left exactly as it was
    let after = h.posts.cache().get("subA").unwrap();
    assert!(Arc::ptr_eq(&before, &after));
}

#[tokio::test]
async fn test_forced_refresh_failure_serves_existing_data() {
    let h = Harness::new();
    let params = PostsParams::new("rust");

    h.posts.fetch(&params, false).await;
    h.clock.advance(5 * MINUTE);
    h.upstream.fail(true);

    let response = h.posts.fetch(&params, true).await;
    assert!(response.is_stale());
    assert_eq!(titles(response.data()), vec!["Call 1"]);
    assert_eq!(h.upstream.calls(), 2);
}

#[tokio::test]
async fn test_empty_result_when_nothing_cached() {
    let h = Harness::new();
    h.upstream.fail(true);

    let response = h.posts.fetch(&PostsParams::new("subC"), false).await;

    assert!(response.is_empty());
    assert!(response.data().is_empty());
    assert!(h.posts.cache().get("subC").is_none());
}

#[tokio::test]
async fn test_token_failure_skips_upstream() {
    let h = Harness::new();
    h.flow.failing.store(true, Ordering::SeqCst);

    let response = h.posts.fetch(&PostsParams::new("rust"), false).await;

    assert!(response.is_empty());
    assert_eq!(h.upstream.calls(), 0);
    assert!(
        response
            .freshness
            .error()
            .is_some_and(|e| e.contains("401"))
    );
}

#[tokio::test]
async fn test_recovers_after_failure() {
    let h = Harness::new();
    let params = PostsParams::new("rust");

    h.upstream.fail(true);
    assert!(h.posts.fetch(&params, false).await.is_empty());

    h.upstream.fail(false);
    let response = h.posts.fetch(&params, false).await;
    assert!(response.is_live());
    assert_eq!(titles(response.data()), vec!["Call 2"]);
}

// =============================================================================
// Shared state
// =============================================================================

#[tokio::test]
async fn test_token_reused_across_fetches() {
    let h = Harness::new();

    h.posts.fetch(&PostsParams::new("rust"), false).await;
    h.clock.advance(20 * MINUTE);
    h.posts.fetch(&PostsParams::new("programming"), false).await;

    assert_eq!(h.upstream.calls(), 2);
    assert_eq!(h.exchanges(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_refreshes_collapse() {
    let h = Harness::build(FakeUpstream::with_latency(Duration::from_millis(200)), true);
    let params = PostsParams::new("rust");

    let responses =
        futures::future::join_all((0..5).map(|_| h.posts.fetch(&params, false))).await;

    assert_eq!(h.upstream.calls(), 1);
    assert_eq!(h.exchanges(), 1);
    assert_eq!(h.posts.in_flight(), 0);
    for response in responses {
        assert!(response.is_live());
        assert_eq!(titles(response.data()), vec!["Call 1"]);
    }
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_refreshes_without_dedupe() {
    let h = Harness::build(FakeUpstream::with_latency(Duration::from_millis(200)), false);
    let params = PostsParams::new("rust");

    futures::future::join_all((0..5).map(|_| h.posts.fetch(&params, false))).await;

    assert_eq!(h.upstream.calls(), 5);
    assert_eq!(h.exchanges(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_collapsed_refresh_failure_shared() {
    let h = Harness::build(FakeUpstream::with_latency(Duration::from_millis(200)), true);
    h.upstream.fail(true);
    let params = PostsParams::new("rust");

    let responses =
        futures::future::join_all((0..3).map(|_| h.posts.fetch(&params, false))).await;

    assert_eq!(h.upstream.calls(), 1);
    assert!(responses.iter().all(|r| r.is_empty()));
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_refresh_does_not_block_other_keys() {
    let flow = CountingFlow {
        latency: Some(Duration::from_millis(200)),
        ..Default::default()
    };
    let h = Harness::with_flow(FakeUpstream::default(), flow, true);

    // Drop the only caller while it is in the middle of the token exchange
    let posts = h.posts.clone();
    let abandoned = tokio::spawn(async move { posts.fetch(&PostsParams::new("a"), false).await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    abandoned.abort();

    let response = tokio::time::timeout(
        Duration::from_secs(3),
        h.posts.fetch(&PostsParams::new("b"), false),
    )
    .await
    .expect("fetch of another key stalled");
    assert!(response.is_live());

    tokio::time::timeout(Duration::from_secs(3), async {
        while h.posts.in_flight() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("in-flight slot never cleared");

    assert!(h.posts.cache().get("a").is_some());
    assert_eq!(h.exchanges(), 1);
    assert_eq!(h.upstream.calls(), 2);
}
