//! Subreddit hot listings

use chrono::DateTime;
use chrono::SecondsFormat;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use super::Listing;
use super::segment;
use crate::resource::Resource;

/// Parameters for a post listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostsParams {
    pub subreddit: String,
    pub limit: u32,
}

impl PostsParams {
    pub const DEFAULT_SUBREDDIT: &'static str = "ProductManagement";
    pub const DEFAULT_LIMIT: u32 = 40;
    pub const MAX_LIMIT: u32 = 100;

    /// Creates parameters for `subreddit` with the default limit.
    pub fn new(subreddit: impl Into<String>) -> Self {
        Self {
            subreddit: subreddit.into(),
            limit: Self::DEFAULT_LIMIT,
        }
    }

    /// Sets the number of posts to request, clamped to `1..=100`.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit.clamp(1, Self::MAX_LIMIT);
        self
    }
}

impl Default for PostsParams {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SUBREDDIT)
    }
}

/// A post as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub author: String,
    pub author_icon: Option<String>,
    /// RFC 3339 timestamp with millisecond precision, UTC.
    pub created_at: String,
    pub title: String,
    pub content: String,
    pub tag: String,
    pub upvotes: i64,
    pub comments: i64,
    pub url: String,
}

/// The subset of a Reddit `t3` link the projection reads.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawPost {
    pub id: String,
    pub author: String,
    pub sr_detail: Option<RawSubredditDetail>,
    pub thumbnail: Option<String>,
    pub created_utc: f64,
    pub title: String,
    pub selftext: Option<String>,
    pub link_flair_text: Option<String>,
    pub ups: i64,
    pub num_comments: i64,
    pub permalink: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawSubredditDetail {
    pub icon_img: Option<String>,
}

impl From<RawPost> for Post {
    fn from(raw: RawPost) -> Self {
        let author_icon = raw
            .sr_detail
            .and_then(|detail| detail.icon_img)
            .filter(|icon| !icon.is_empty())
            .or_else(|| raw.thumbnail.filter(|thumb| thumb.starts_with("http")));

        Post {
            id: raw.id,
            author: raw.author,
            author_icon,
            created_at: iso_timestamp(raw.created_utc),
            title: raw.title,
            content: raw.selftext.unwrap_or_default(),
            tag: raw
                .link_flair_text
                .filter(|tag| !tag.is_empty())
                .unwrap_or_else(|| "Discussion".to_string()),
            upvotes: raw.ups,
            comments: raw.num_comments,
            url: format!("https://reddit.com{}", raw.permalink),
        }
    }
}

fn iso_timestamp(created_utc: f64) -> String {
    let millis = (created_utc * 1000.0).round() as i64;
    DateTime::<Utc>::from_timestamp_millis(millis)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `GET /r/{subreddit}/hot?limit=N`, cached per subreddit.
#[derive(Debug, Clone, Copy, Default)]
pub struct Posts;

impl Resource for Posts {
    type Params = PostsParams;
    type Raw = Listing<RawPost>;
    type Data = Vec<Post>;

    const NAME: &'static str = "posts";

    fn cache_key(params: &PostsParams) -> String {
        params.subreddit.clone()
    }

    fn path(params: &PostsParams) -> String {
        format!("/r/{}/hot", segment(&params.subreddit))
    }

    fn query(params: &PostsParams) -> Vec<(&'static str, String)> {
        vec![("limit", params.limit.to_string())]
    }

    fn transform(raw: Listing<RawPost>) -> Vec<Post> {
        raw.data
            .children
            .into_iter()
            .map(|child| Post::from(child.data))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn listing(children: serde_json::Value) -> Listing<RawPost> {
        serde_json::from_value(json!({"kind": "Listing", "data": {"children": children}})).unwrap()
    }

    #[test]
    fn test_params_defaults_and_clamp() {
        let params = PostsParams::default();
        assert_eq!(params.subreddit, "ProductManagement");
        assert_eq!(params.limit, 40);

        assert_eq!(PostsParams::new("rust").with_limit(0).limit, 1);
        assert_eq!(PostsParams::new("rust").with_limit(500).limit, 100);
    }

    #[test]
    fn test_key_path_and_query() {
        let params = PostsParams::new("rust").with_limit(10);
        assert_eq!(Posts::cache_key(&params), "rust");
        assert_eq!(Posts::path(&params), "/r/rust/hot");
        assert_eq!(Posts::query(&params), vec![("limit", "10".to_string())]);
    }

    #[test]
    fn test_transform_projection() {
        let posts = Posts::transform(listing(json!([{
            "kind": "t3",
            "data": {
                "id": "abc",
                "author": "ferris",
                "sr_detail": {"icon_img": "https://img/icon.png"},
                "thumbnail": "https://img/thumb.png",
                "created_utc": 1700000000.0,
                "title": "Hello",
                "selftext": "Body",
                "link_flair_text": "Career",
                "ups": 12,
                "num_comments": 3,
                "permalink": "/r/rust/comments/abc/hello/",
                "gilded": 0
            }
        }])));

        assert_eq!(
            posts,
            vec![Post {
                id: "abc".into(),
                author: "ferris".into(),
                author_icon: Some("https://img/icon.png".into()),
                created_at: "2023-11-14T22:13:20.000Z".into(),
                title: "Hello".into(),
                content: "Body".into(),
                tag: "Career".into(),
                upvotes: 12,
                comments: 3,
                url: "https://reddit.com/r/rust/comments/abc/hello/".into(),
            }]
        );
    }

    #[test]
    fn test_transform_fallbacks() {
        let posts = Posts::transform(listing(json!([
            {"kind": "t3", "data": {
                "id": "a", "author": "x", "thumbnail": "https://img/thumb.png",
                "created_utc": 0, "title": "t", "selftext": "", "link_flair_text": null,
                "ups": 1, "num_comments": 0, "permalink": "/p"
            }},
            {"kind": "t3", "data": {
                "id": "b", "author": "y", "sr_detail": {"icon_img": ""}, "thumbnail": "self",
                "created_utc": 0, "title": "t", "ups": 1, "num_comments": 0, "permalink": "/q"
            }}
        ])));

        assert_eq!(posts[0].author_icon.as_deref(), Some("https://img/thumb.png"));
        assert_eq!(posts[0].content, "");
        assert_eq!(posts[0].tag, "Discussion");
        assert_eq!(posts[0].created_at, "1970-01-01T00:00:00.000Z");
        assert_eq!(posts[1].author_icon, None);
    }

    #[test]
    fn test_serialized_shape() {
        let post = Post::from(RawPost {
            id: "a".into(),
            permalink: "/p".into(),
            ..Default::default()
        });
        let value = serde_json::to_value(&post).unwrap();
        assert_eq!(value["author_icon"], serde_json::Value::Null);
        assert_eq!(value["url"], "https://reddit.com/p");
        assert_eq!(value["tag"], "Discussion");
    }
}
