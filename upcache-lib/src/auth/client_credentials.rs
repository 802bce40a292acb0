//! OAuth2 client credentials flow

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::USER_AGENT;

use super::cache::AuthFlow;
use super::grant::rejected;
use super::TokenGrant;
use crate::config::DEFAULT_AUTH_URL;
use crate::config::DEFAULT_USER_AGENT;
use crate::error::AuthError;

/// OAuth2 client credentials ("application only") flow.
///
/// Posts `grant_type=client_credentials` to the token endpoint, authenticating
/// with HTTP Basic client id and secret. Defaults to Reddit's endpoint.
///
/// # Example
///
/// ```ignore
/// use upcache_lib::auth::ClientCredentialsFlow;
///
/// let flow = ClientCredentialsFlow::new("client-id", "client-secret")
///     .user_agent("my-app/1.0");
///
/// let grant = flow.authenticate().await?;
/// ```
#[derive(Clone)]
pub struct ClientCredentialsFlow {
    client_id: String,
    client_secret: String,
    token_url: String,
    user_agent: String,
    timeout: Option<Duration>,
    http_client: reqwest::Client,
}

impl ClientCredentialsFlow {
    /// Creates a new flow for the given client credentials.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token_url: DEFAULT_AUTH_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: None,
            http_client: reqwest::Client::new(),
        }
    }

    /// Sets the token endpoint URL.
    pub fn token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    /// Sets the `User-Agent` header sent with the exchange.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets a custom HTTP client.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = client;
        self
    }

    /// Returns `true` when both client id and secret are set.
    pub fn has_credentials(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }

    /// Exchanges the client credentials for a token.
    pub async fn authenticate(&self) -> Result<TokenGrant, AuthError> {
        if !self.has_credentials() {
            return Err(AuthError::MissingCredentials);
        }

        let params = [("grant_type", "client_credentials")];

        let mut request = self
            .http_client
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header(USER_AGENT, &self.user_agent)
            .form(&params);

        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            let body = response.text().await?;
            serde_json::from_str::<TokenGrant>(&body).map_err(|e| AuthError::Parse(e.to_string()))
        } else {
            let body = response.text().await.unwrap_or_default();
            log::error!("token exchange failed: HTTP {} {}", status.as_u16(), body.trim());
            Err(rejected(status.as_u16(), &body))
        }
    }
}

impl std::fmt::Debug for ClientCredentialsFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentialsFlow")
            .field("client_id", &self.client_id)
            .field("token_url", &self.token_url)
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl AuthFlow for ClientCredentialsFlow {
    fn is_configured(&self) -> bool {
        self.has_credentials()
    }

    async fn authenticate(&self) -> Result<TokenGrant, AuthError> {
        self.authenticate().await
    }
}
