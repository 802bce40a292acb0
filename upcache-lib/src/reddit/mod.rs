//! Reddit resources
//!
//! Post listings, comment threads and link flairs, each described as a
//! [`Resource`](crate::resource::Resource) with its own projection from
//! Reddit's wire format.

mod comments;
mod flairs;
mod posts;

pub use comments::*;
pub use flairs::*;
pub use posts::*;

use std::borrow::Cow;

use serde::Deserialize;

/// Reddit's generic `Listing` envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Listing<T> {
    pub data: ListingData<T>,
}

impl<T> Default for Listing<T> {
    fn default() -> Self {
        Self {
            data: ListingData::default(),
        }
    }
}

/// The `data` part of a [`Listing`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ListingData<T> {
    pub children: Vec<Thing<T>>,
}

impl<T> Default for ListingData<T> {
    fn default() -> Self {
        Self {
            children: Vec::new(),
        }
    }
}

/// A typed child of a listing (`t1` comment, `t3` link, `more`, ...).
#[derive(Debug, Clone, Deserialize)]
pub struct Thing<T> {
    #[serde(default)]
    pub kind: String,
    pub data: T,
}

/// Percent-encodes one URL path segment.
pub(crate) fn segment(value: &str) -> Cow<'_, str> {
    urlencoding::encode(value)
}
