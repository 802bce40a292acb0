//! Error types

mod auth;
mod config;
mod upstream;

pub use auth::*;
pub use config::*;
pub use upstream::*;

/// Any error the gateway can produce.
///
/// Fetchers never hand this to their callers; it only travels as far as the
/// stale/empty fallback, and out of startup code.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The credential exchange failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The resource call failed.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// Configuration is missing or malformed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A background refresh task panicked or was cancelled.
    #[error("refresh task failed: {0}")]
    Refresh(String),
}
