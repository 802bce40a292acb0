//! Subreddit link flairs

use serde::Deserialize;
use serde::Serialize;

use super::segment;
use crate::resource::Resource;

/// Parameters for a flair list request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlairsParams {
    pub subreddit: String,
}

impl FlairsParams {
    pub fn new(subreddit: impl Into<String>) -> Self {
        Self {
            subreddit: subreddit.into(),
        }
    }
}

/// A link flair template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Flair {
    pub id: String,
    pub text: String,
    pub text_color: Option<String>,
    pub background_color: Option<String>,
    pub text_editable: bool,
}

/// `GET /r/{subreddit}/api/link_flair_v2`, cached per subreddit.
///
/// Requires moderator scope on some subreddits; Reddit answers 403 there and
/// the fetch falls back like any other upstream failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct Flairs;

impl Resource for Flairs {
    type Params = FlairsParams;
    type Raw = Vec<Flair>;
    type Data = Vec<Flair>;

    const NAME: &'static str = "flairs";

    fn cache_key(params: &FlairsParams) -> String {
        params.subreddit.clone()
    }

    fn path(params: &FlairsParams) -> String {
        format!("/r/{}/api/link_flair_v2", segment(&params.subreddit))
    }

    fn transform(raw: Vec<Flair>) -> Vec<Flair> {
        raw
    }
}
