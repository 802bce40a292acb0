//! Resource descriptions
//!
//! A [`Resource`] tells a [`Fetcher`](crate::fetch::Fetcher) how to turn a
//! set of request parameters into a cache key and an upstream call, and how
//! to project the upstream's raw payload into the shape that gets cached.

use serde::Serialize;
use serde::de::DeserializeOwned;

/// One kind of upstream resource.
///
/// Implementations are zero-sized markers; all state lives in the fetcher.
pub trait Resource: Send + Sync + 'static {
    /// Request parameters that identify one resource instance.
    type Params: Clone + Send + Sync + 'static;

    /// Raw upstream payload, as deserialized from the JSON body.
    type Raw: DeserializeOwned;

    /// Normalized payload stored in the cache and returned to callers.
    ///
    /// `Default` is the empty result served when nothing was ever cached.
    type Data: Clone + Default + Serialize + Send + Sync + 'static;

    /// Short name used in logs and cache status reporting.
    const NAME: &'static str;

    /// The cache key for `params`. Parameters that are not part of the key
    /// share one entry.
    fn cache_key(params: &Self::Params) -> String;

    /// Path appended to the upstream base URL.
    fn path(params: &Self::Params) -> String;

    /// Query string pairs for the upstream call.
    fn query(_params: &Self::Params) -> Vec<(&'static str, String)> {
        Vec::new()
    }

    /// Projects the raw payload into the cached shape.
    fn transform(raw: Self::Raw) -> Self::Data;
}
