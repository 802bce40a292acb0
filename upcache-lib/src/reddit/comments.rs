//! Post comment threads

use serde::Deserialize;
use serde::Serialize;

use super::Listing;
use super::segment;
use crate::resource::Resource;

/// Parameters for a comment thread request. Both fields are required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentsParams {
    pub subreddit: String,
    pub post_id: String,
}

impl CommentsParams {
    pub fn new(subreddit: impl Into<String>, post_id: impl Into<String>) -> Self {
        Self {
            subreddit: subreddit.into(),
            post_id: post_id.into(),
        }
    }

    /// Parses a `subreddit:post_id` key.
    pub fn from_key(key: &str) -> Option<Self> {
        let (subreddit, post_id) = key.split_once(':')?;
        if subreddit.is_empty() || post_id.is_empty() {
            return None;
        }
        Some(Self::new(subreddit, post_id))
    }
}

/// A top-level comment as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub name: String,
    pub author: String,
    pub author_icon: Option<String>,
    pub body: String,
    pub created_utc: f64,
    pub score: i64,
}

/// The subset of a Reddit `t1` comment the projection reads.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawComment {
    pub id: String,
    pub name: String,
    pub author: String,
    pub author_flair_background_color: Option<String>,
    pub body: String,
    pub created_utc: f64,
    pub score: i64,
}

impl From<RawComment> for Comment {
    fn from(raw: RawComment) -> Self {
        Comment {
            id: raw.id,
            name: raw.name,
            author: raw.author,
            author_icon: raw.author_flair_background_color.filter(|c| !c.is_empty()),
            body: raw.body,
            created_utc: raw.created_utc,
            score: raw.score,
        }
    }
}

/// `GET /r/{subreddit}/comments/{post_id}`, cached per `subreddit:post_id`.
///
/// Reddit answers with a pair of listings: the post itself, then its
/// comments. Only the second listing's `t1` children are kept, which drops
/// the "load more" stubs.
#[derive(Debug, Clone, Copy, Default)]
pub struct Comments;

impl Resource for Comments {
    type Params = CommentsParams;
    type Raw = Vec<Listing<RawComment>>;
    type Data = Vec<Comment>;

    const NAME: &'static str = "comments";

    fn cache_key(params: &CommentsParams) -> String {
        format!("{}:{}", params.subreddit, params.post_id)
    }

    fn path(params: &CommentsParams) -> String {
        format!(
            "/r/{}/comments/{}",
            segment(&params.subreddit),
            segment(&params.post_id)
        )
    }

    fn transform(raw: Vec<Listing<RawComment>>) -> Vec<Comment> {
        raw.into_iter()
            .nth(1)
            .map(|listing| listing.data.children)
            .unwrap_or_default()
            .into_iter()
            .filter(|child| child.kind == "t1")
            .map(|child| Comment::from(child.data))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn raw(value: serde_json::Value) -> Vec<Listing<RawComment>> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_key_and_path() {
        let params = CommentsParams::new("rust", "abc123");
        assert_eq!(Comments::cache_key(&params), "rust:abc123");
        assert_eq!(Comments::path(&params), "/r/rust/comments/abc123");
        assert!(Comments::query(&params).is_empty());
    }

    #[test]
    fn test_from_key() {
        assert_eq!(
            CommentsParams::from_key("rust:abc"),
            Some(CommentsParams::new("rust", "abc"))
        );
        assert_eq!(CommentsParams::from_key("rust"), None);
        assert_eq!(CommentsParams::from_key(":abc"), None);
        assert_eq!(CommentsParams::from_key("rust:"), None);
    }

    #[test]
    fn test_transform_keeps_only_comments() {
        let comments = Comments::transform(raw(json!([
            {"kind": "Listing", "data": {"children": [
                {"kind": "t3", "data": {"id": "post", "title": "Hello", "score": 99}}
            ]}},
            {"kind": "Listing", "data": {"children": [
                {"kind": "t1", "data": {
                    "id": "c1", "name": "t1_c1", "author": "ferris",
                    "author_flair_background_color": "#ff4500",
                    "body": "Nice", "created_utc": 1700000000.0, "score": 4,
                    "replies": ""
                }},
                {"kind": "t1", "data": {
                    "id": "c2", "name": "t1_c2", "author": "crab",
                    "author_flair_background_color": "",
                    "body": "Agreed", "created_utc": 1700000100.0, "score": 1
                }},
                {"kind": "more", "data": {"id": "m1", "name": "t1_m1", "count": 7, "children": ["x", "y"]}}
            ]}}
        ])));

        assert_eq!(
            comments,
            vec![
                Comment {
                    id: "c1".into(),
                    name: "t1_c1".into(),
                    author: "ferris".into(),
                    author_icon: Some("#ff4500".into()),
                    body: "Nice".into(),
                    created_utc: 1700000000.0,
                    score: 4,
                },
                Comment {
                    id: "c2".into(),
                    name: "t1_c2".into(),
                    author: "crab".into(),
                    author_icon: None,
                    body: "Agreed".into(),
                    created_utc: 1700000100.0,
                    score: 1,
                },
            ]
        );
    }

    #[test]
    fn test_transform_missing_second_listing() {
        let comments = Comments::transform(raw(json!([
            {"kind": "Listing", "data": {"children": []}}
        ])));
        assert!(comments.is_empty());
    }
}
