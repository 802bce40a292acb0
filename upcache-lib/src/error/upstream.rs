//! Upstream API error types

use std::time::Duration;

/// Errors that can occur during resource calls to the upstream API.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// HTTP error response from the API.
    #[error("HTTP {status}: {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Error message (response body, truncated).
        message: String,
    },

    /// Network error during the call.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Request timed out.
    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    /// Invalid URL provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to parse the response body.
    #[error("Response parse error: {message}")]
    Parse {
        /// Description of the parse error.
        message: String,
        /// Raw response body, if available.
        body: Option<String>,
    },
}

impl UpstreamError {
    /// Longest body excerpt kept in an HTTP error message.
    pub const MAX_MESSAGE_LEN: usize = 200;

    /// Creates a new HTTP error, truncating the message.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        let message: String = message.into();
        let message = match message.char_indices().nth(Self::MAX_MESSAGE_LEN) {
            Some((idx, _)) => message[..idx].to_string(),
            None => message,
        };
        Self::Http { status, message }
    }

    /// Creates a new parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            body: None,
        }
    }

    /// Creates a new parse error with the raw response body.
    pub fn parse_with_body(message: impl Into<String>, body: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            body: Some(body.into()),
        }
    }

    /// Returns the HTTP status code if this is an HTTP error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}
