//! TokenProvider trait and AccessToken

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::AuthError;

/// A bearer token together with the instant it was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    /// The bearer token used for API authentication.
    pub access_token: String,
    /// When the token was obtained.
    pub obtained_at: Instant,
    /// Lifetime reported by the token endpoint, if any.
    pub expires_in: Option<Duration>,
}

impl AccessToken {
    /// Creates a new access token obtained at `obtained_at`.
    pub fn new(access_token: impl Into<String>, obtained_at: Instant) -> Self {
        Self {
            access_token: access_token.into(),
            obtained_at,
            expires_in: None,
        }
    }

    /// Sets the lifetime reported by the token endpoint.
    pub fn with_expires_in(mut self, expires_in: Duration) -> Self {
        self.expires_in = Some(expires_in);
        self
    }

    /// How long ago the token was obtained.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.obtained_at)
    }

    /// Returns `true` while the token is younger than `ttl`.
    pub fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        self.age(now) < ttl
    }

    /// Returns the token as a bearer authorization header value.
    pub fn as_bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

/// Trait for providing access tokens to the fetchers.
///
/// Implementations decide whether a cached token can be reused or a new
/// exchange is needed. Fetchers call `get_token` before every upstream call.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Returns a usable bearer token.
    async fn get_token(&self) -> Result<AccessToken, AuthError>;
}

/// A token provider that always returns the same static token.
///
/// Useful for testing or when a long-lived token is issued out of band.
///
/// # Example
///
/// ```
/// use upcache_lib::auth::StaticTokenProvider;
///
/// let provider = StaticTokenProvider::new("my-access-token");
/// ```
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: AccessToken,
}

impl StaticTokenProvider {
    /// Creates a new static token provider with the given token string.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            token: AccessToken::new(access_token, Instant::now()),
        }
    }

    /// Creates a new static token provider from an existing AccessToken.
    pub fn from_token(token: AccessToken) -> Self {
        Self { token }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn get_token(&self) -> Result<AccessToken, AuthError> {
        Ok(self.token.clone())
    }
}
