//! Response wrapper with freshness information

use std::time::Duration;

/// Data returned by a fetch, together with where it came from.
///
/// Fetches never fail: when the upstream misbehaves they fall back to stale
/// or empty data, and say so in [`freshness`](Self::freshness) so callers
/// can decide whether to flag it.
///
/// # Example
///
/// ```ignore
/// let response = gateway.posts(&PostsParams::default(), false).await;
///
/// if response.is_stale() {
///     println!("serving data {:?} old", response.age());
/// }
///
/// let posts = response.into_inner();
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Response<T> {
    data: T,
    /// How fresh the data is.
    pub freshness: Freshness,
}

impl<T> Response<T> {
    /// Data that was just fetched from the upstream.
    pub fn live(data: T) -> Self {
        Self {
            data,
            freshness: Freshness::Live,
        }
    }

    /// Data served from a valid cache entry.
    pub fn cached(data: T, age: Duration, refresh_suppressed: bool) -> Self {
        Self {
            data,
            freshness: Freshness::Cached {
                age,
                refresh_suppressed,
            },
        }
    }

    /// Data from an invalid cache entry, served because a refresh failed.
    pub fn stale(data: T, age: Duration, error: impl Into<String>) -> Self {
        Self {
            data,
            freshness: Freshness::Stale {
                age,
                error: error.into(),
            },
        }
    }

    /// An empty default, served because a refresh failed and nothing was cached.
    pub fn empty(data: T, error: impl Into<String>) -> Self {
        Self {
            data,
            freshness: Freshness::Empty {
                error: error.into(),
            },
        }
    }

    /// Returns `true` if the data was just fetched.
    pub fn is_live(&self) -> bool {
        matches!(self.freshness, Freshness::Live)
    }

    /// Returns `true` if the data came from a valid cache entry.
    pub fn is_cached(&self) -> bool {
        matches!(self.freshness, Freshness::Cached { .. })
    }

    /// Returns `true` if stale data was served after a failed refresh.
    pub fn is_stale(&self) -> bool {
        matches!(self.freshness, Freshness::Stale { .. })
    }

    /// Returns `true` if the empty default was served after a failed refresh.
    pub fn is_empty(&self) -> bool {
        matches!(self.freshness, Freshness::Empty { .. })
    }

    /// Returns the age of the served cache entry, if one was served.
    pub fn age(&self) -> Option<Duration> {
        self.freshness.age()
    }

    /// Returns a reference to the inner data.
    pub fn data(&self) -> &T {
        &self.data
    }

    /// Consumes the response and returns the inner data.
    pub fn into_inner(self) -> T {
        self.data
    }

    /// Consumes the response and returns data and freshness.
    pub fn into_parts(self) -> (T, Freshness) {
        (self.data, self.freshness)
    }

    /// Maps the inner data using the provided function.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Response<U> {
        Response {
            data: f(self.data),
            freshness: self.freshness,
        }
    }
}

/// Where the data in a [`Response`] came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    /// Fetched from the upstream during this call.
    Live,
    /// Served from a valid cache entry.
    Cached {
        /// Age of the entry.
        age: Duration,
        /// A forced refresh was asked for but the entry was too young.
        refresh_suppressed: bool,
    },
    /// Served from an invalid entry because the refresh failed.
    Stale {
        /// Age of the entry.
        age: Duration,
        /// Why the refresh failed.
        error: String,
    },
    /// Nothing was cached and the refresh failed.
    Empty {
        /// Why the refresh failed.
        error: String,
    },
}

impl Freshness {
    /// Lowercase name, as used in the `X-Cache-Status` header.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Cached { .. } => "cached",
            Self::Stale { .. } => "stale",
            Self::Empty { .. } => "empty",
        }
    }

    /// Age of the cache entry that was served, if any.
    pub fn age(&self) -> Option<Duration> {
        match self {
            Self::Cached { age, .. } | Self::Stale { age, .. } => Some(*age),
            Self::Live | Self::Empty { .. } => None,
        }
    }

    /// The refresh error behind a fallback, if any.
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Stale { error, .. } | Self::Empty { error } => Some(error),
            Self::Live | Self::Cached { .. } => None,
        }
    }
}

impl std::fmt::Display for Freshness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
