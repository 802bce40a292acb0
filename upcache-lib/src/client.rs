//! Upstream HTTP adapter

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::USER_AGENT;
use url::Url;

use crate::auth::AccessToken;
use crate::config::DEFAULT_USER_AGENT;
use crate::error::UpstreamError;

/// An authenticated JSON API that fetchers read resources from.
///
/// `path` is appended to the API's base URL; `query` pairs are URL-encoded.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Performs `GET path?query` with the bearer token and returns the JSON body.
    async fn get_json(
        &self,
        path: &str,
        query: &[(&'static str, String)],
        token: &AccessToken,
    ) -> Result<serde_json::Value, UpstreamError>;
}

/// The reqwest-backed [`Upstream`].
///
/// This client is cheap to clone (uses `Arc` internally) and can be shared
/// across threads safely.
///
/// # Example
///
/// ```ignore
/// use upcache_lib::UpstreamClient;
///
/// let client = UpstreamClient::builder()
///     .base_url("https://oauth.reddit.com")
///     .user_agent("my-app/1.0")
///     .build()?;
/// ```
#[derive(Clone)]
pub struct UpstreamClient {
    inner: Arc<UpstreamClientInner>,
}

struct UpstreamClientInner {
    base_url: String,
    user_agent: String,
    http_client: Client,
    timeout: Option<Duration>,
}

impl UpstreamClient {
    /// Default per-request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

    /// Creates a new builder for constructing a client.
    pub fn builder() -> UpstreamClientBuilder<Missing> {
        UpstreamClientBuilder::new()
    }

    /// Returns the base URL of the upstream API.
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Returns the `User-Agent` sent with every request.
    pub fn user_agent(&self) -> &str {
        &self.inner.user_agent
    }

    fn url(&self, path: &str, query: &[(&'static str, String)]) -> Result<Url, UpstreamError> {
        let raw = format!("{}{}", self.inner.base_url.trim_end_matches('/'), path);
        let mut url = Url::parse(&raw).map_err(|e| UpstreamError::InvalidUrl(format!("{raw}: {e}")))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in query {
                pairs.append_pair(name, value);
            }
        }
        Ok(url)
    }

    fn map_send_error(&self, error: reqwest::Error) -> UpstreamError {
        match self.inner.timeout {
            Some(timeout) if error.is_timeout() => UpstreamError::Timeout(timeout),
            _ => UpstreamError::Network(error),
        }
    }
}

#[async_trait]
impl Upstream for UpstreamClient {
    async fn get_json(
        &self,
        path: &str,
        query: &[(&'static str, String)],
        token: &AccessToken,
    ) -> Result<serde_json::Value, UpstreamError> {
        let url = self.url(path, query)?;
        log::debug!("GET {}", url);

        let mut request = self
            .inner
            .http_client
            .get(url)
            .bearer_auth(&token.access_token)
            .header(USER_AGENT, &self.inner.user_agent);

        if let Some(timeout) = self.inner.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(|e| self.map_send_error(e))?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::error!("upstream error: HTTP {} {}", status.as_u16(), body.trim());
            return Err(UpstreamError::http(status.as_u16(), body));
        }

        let body = response.text().await.map_err(|e| self.map_send_error(e))?;
        serde_json::from_str(&body).map_err(|e| {
            let excerpt: String = body.chars().take(UpstreamError::MAX_MESSAGE_LEN).collect();
            UpstreamError::parse_with_body(e.to_string(), excerpt)
        })
    }
}

impl std::fmt::Debug for UpstreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamClient")
            .field("base_url", &self.inner.base_url)
            .field("user_agent", &self.inner.user_agent)
            .field("timeout", &self.inner.timeout)
            .finish()
    }
}

// =============================================================================
// Typestate Builder
// =============================================================================

/// Marker type for missing required builder fields.
pub struct Missing;

/// Marker type for set builder fields.
pub struct Set<T>(T);

/// Builder for constructing an [`UpstreamClient`].
///
/// Uses the typestate pattern to ensure the base URL is set at compile time.
pub struct UpstreamClientBuilder<U> {
    base_url: U,
    user_agent: String,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    http_client: Option<Client>,
}

impl UpstreamClientBuilder<Missing> {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            base_url: Missing,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Some(UpstreamClient::DEFAULT_TIMEOUT),
            connect_timeout: None,
            http_client: None,
        }
    }

    /// Sets the API base URL.
    ///
    /// # Example
    ///
    /// ```ignore
    /// .base_url("https://oauth.reddit.com")
    /// ```
    pub fn base_url(self, url: impl Into<String>) -> UpstreamClientBuilder<Set<String>> {
        UpstreamClientBuilder {
            base_url: Set(url.into()),
            user_agent: self.user_agent,
            timeout: self.timeout,
            connect_timeout: self.connect_timeout,
            http_client: self.http_client,
        }
    }
}

impl Default for UpstreamClientBuilder<Missing> {
    fn default() -> Self {
        Self::new()
    }
}

impl<U> UpstreamClientBuilder<U> {
    /// Sets the `User-Agent` header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the per-request timeout. Defaults to 15 seconds.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Removes the per-request timeout.
    pub fn no_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    /// Sets the connection timeout.
    ///
    /// This is applied when building the HTTP client.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets a custom HTTP client.
    ///
    /// If not set, a default client will be created.
    pub fn http_client(mut self, client: Client) -> Self {
        self.http_client = Some(client);
        self
    }
}

impl UpstreamClientBuilder<Set<String>> {
    /// Builds the [`UpstreamClient`].
    ///
    /// This method is only available once the base URL has been set.
    pub fn build(self) -> Result<UpstreamClient, UpstreamError> {
        let http_client = match self.http_client {
            Some(client) => client,
            None => {
                let mut builder = Client::builder();
                if let Some(timeout) = self.connect_timeout {
                    builder = builder.connect_timeout(timeout);
                }
                builder.build()?
            }
        };

        Ok(UpstreamClient {
            inner: Arc::new(UpstreamClientInner {
                base_url: self.base_url.0,
                user_agent: self.user_agent,
                http_client,
                timeout: self.timeout,
            }),
        })
    }
}
