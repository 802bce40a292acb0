//! Authentication error types

/// Errors that can occur while exchanging client credentials for a token.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Client id or secret is empty.
    #[error("Upstream credentials not configured (client id and secret are required)")]
    MissingCredentials,

    /// The token endpoint answered with a non-success status.
    #[error("Token exchange rejected with HTTP {status}: {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Error message from the token endpoint.
        message: String,
    },

    /// Network error during authentication.
    #[error("Network error during auth: {0}")]
    Network(#[from] reqwest::Error),

    /// Failed to parse the token response.
    #[error("Auth response parse error: {0}")]
    Parse(String),
}

impl AuthError {
    /// Returns the HTTP status code if the token endpoint rejected the exchange.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}
