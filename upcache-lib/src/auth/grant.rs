//! Token endpoint responses

use std::time::Duration;

use serde::Deserialize;
use tokio::time::Instant;

use super::AccessToken;
use crate::error::AuthError;

/// A successful response from the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenGrant {
    /// The bearer token.
    pub access_token: String,
    /// Lifetime in seconds, as reported by the endpoint.
    #[serde(default, deserialize_with = "deserialize_expires_in")]
    pub expires_in: Option<u64>,
}

impl TokenGrant {
    /// Creates a grant without a reported lifetime.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_in: None,
        }
    }

    /// Stamps the grant with the instant it was obtained.
    pub fn into_access_token(self, obtained_at: Instant) -> AccessToken {
        let token = AccessToken::new(self.access_token, obtained_at);
        match self.expires_in {
            Some(secs) => token.with_expires_in(Duration::from_secs(secs)),
            None => token,
        }
    }
}

/// Deserializes `expires_in` which can be either a number or a string.
fn deserialize_expires_in<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(u64),
    }

    match Option::<StringOrNumber>::deserialize(deserializer)? {
        None => Ok(None),
        Some(StringOrNumber::Number(n)) => Ok(Some(n)),
        Some(StringOrNumber::String(s)) => s
            .parse::<u64>()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("invalid expires_in value: {}", s))),
    }
}

/// Error body returned by OAuth token endpoints.
///
/// Reddit answers `{"error": 401, "message": "Unauthorized"}` while standard
/// OAuth servers answer `{"error": "invalid_client", "error_description": ...}`.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorResponse {
    #[serde(default)]
    pub error: Option<serde_json::Value>,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorResponse {
    fn describe(self) -> Option<String> {
        self.error_description.or(self.message).or_else(|| {
            self.error.map(|e| match e {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
        })
    }
}

/// Builds an `AuthError::Rejected` from a failed token response body.
pub(crate) fn rejected(status: u16, body: &str) -> AuthError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(ErrorResponse::describe)
        .unwrap_or_else(|| body.trim().to_string());

    AuthError::Rejected { status, message }
}
