//! Request routing and JSON responses.
//!
//! Resource routes always answer `200 OK`; how fresh the data is travels in
//! `X-Cache-Status`, `Age` and `Warning` headers.

use std::collections::HashMap;
use std::sync::Arc;

use http_body_util::Full;
use hyper::Method;
use hyper::Request;
use hyper::Response;
use hyper::StatusCode;
use hyper::body::Bytes;
use hyper::header;
use hyper::header::HeaderName;
use hyper::header::HeaderValue;
use serde::Serialize;
use serde_json::json;
use upcache_lib::Freshness;
use upcache_lib::RedditGateway;
use upcache_lib::ResourceKind;
use upcache_lib::reddit::CommentsParams;
use upcache_lib::reddit::FlairsParams;
use upcache_lib::reddit::PostsParams;

pub type Body = Full<Bytes>;

pub const X_CACHE_STATUS: &str = "x-cache-status";

const WARNING_STALE: &str = "110 - \"Response is Stale\"";
const WARNING_EMPTY: &str = "111 - \"Revalidation Failed\"";

const INVALIDATE_PATH: &str = "/api/cache/invalidate";

/// Shared by every connection.
#[derive(Clone)]
pub struct AppState {
    pub gateway: RedditGateway,

    /// Bearer token the admin routes require. `None` disables them.
    pub admin_token: Option<Arc<str>>,
}

impl AppState {
    pub fn new(gateway: RedditGateway, admin_token: Option<String>) -> Self {
        Self {
            gateway,
            admin_token: admin_token.map(Arc::from),
        }
    }

    fn admin_enabled(&self) -> bool {
        self.admin_token.is_some()
    }

    fn is_admin(&self, authorization: Option<&str>) -> bool {
        let presented = authorization.and_then(|v| v.strip_prefix("Bearer ")).map(str::trim);
        match (&self.admin_token, presented) {
            (Some(expected), Some(presented)) => {
                constant_time_eq(expected.as_bytes(), presented.as_bytes())
            }
            _ => false,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("gateway", &self.gateway)
            .field("admin_token", &self.admin_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Routes one request.
pub async fn handle<B>(state: &AppState, req: Request<B>) -> Response<Body> {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let authorization = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    drop(req);

    let gateway = &state.gateway;

    let path = uri.path();
    let query = Query::parse(uri.query());
    log::debug!("{} {}", method, uri);

    let response = match (&method, path) {
        (&Method::OPTIONS, _) => preflight(),
        (&Method::GET, "/health") => json_response(StatusCode::OK, &json!({"status": "ok"})),

        (&Method::GET, "/api/reddit-posts") => {
            let params = posts_params(query.get("subreddit"), &query);
            let refresh = query.flag("refresh");
            resource_response(gateway.posts(&params, refresh).await)
        }
        (&Method::GET, "/api/posts") => {
            let params = posts_params(query.get("key"), &query);
            let refresh = query.flag("refresh");
            resource_response(gateway.posts(&params, refresh).await)
        }

        (&Method::GET, "/api/reddit-comments") => {
            let params = query
                .get("subreddit")
                .zip(query.get("postId"))
                .map(|(subreddit, post_id)| CommentsParams::new(subreddit, post_id));
            comments(gateway, params, query.flag("refresh")).await
        }
        (&Method::GET, "/api/comments") => {
            let params = query.get("key").and_then(CommentsParams::from_key);
            comments(gateway, params, query.flag("refresh")).await
        }

        (&Method::GET, "/api/reddit-flairs") => {
            flairs(gateway, query.get("subreddit"), query.flag("refresh")).await
        }
        (&Method::GET, "/api/flairs") => {
            flairs(gateway, query.get("key"), query.flag("refresh")).await
        }

        (&Method::POST, INVALIDATE_PATH) if state.admin_enabled() => {
            if state.is_admin(authorization.as_deref()) {
                invalidate(gateway, query.get("resource"))
            } else {
                log::warn!("rejected unauthorized cache invalidation");
                unauthorized()
            }
        }

        (_, path) => match allowed_method(path, state.admin_enabled()) {
            Some(allowed) => {
                let mut response = error_response(
                    StatusCode::METHOD_NOT_ALLOWED,
                    &format!("method {} not allowed", method),
                );
                response
                    .headers_mut()
                    .insert(header::ALLOW, HeaderValue::from_static(allowed));
                response
            }
            None => error_response(StatusCode::NOT_FOUND, &format!("no route for {}", path)),
        },
    };

    with_cors(response)
}

async fn comments(
    gateway: &RedditGateway,
    params: Option<CommentsParams>,
    refresh: bool,
) -> Response<Body> {
    match params {
        Some(params) => resource_response(gateway.comments(&params, refresh).await),
        None => error_response(StatusCode::BAD_REQUEST, "subreddit and postId are required"),
    }
}

async fn flairs(gateway: &RedditGateway, subreddit: Option<&str>, refresh: bool) -> Response<Body> {
    match subreddit {
        Some(subreddit) => {
            resource_response(gateway.flairs(&FlairsParams::new(subreddit), refresh).await)
        }
        None => error_response(StatusCode::BAD_REQUEST, "subreddit parameter is required"),
    }
}

fn invalidate(gateway: &RedditGateway, resource: Option<&str>) -> Response<Body> {
    let kinds: Vec<ResourceKind> = match resource {
        None | Some("all") => ResourceKind::ALL.to_vec(),
        Some(name) => match ResourceKind::from_name(name) {
            Some(kind) => vec![kind],
            None => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    &format!("unknown resource '{}'", name),
                );
            }
        },
    };

    let versions: HashMap<&'static str, u32> = kinds
        .into_iter()
        .map(|kind| (kind.as_str(), gateway.invalidate(kind)))
        .collect();

    log::info!("cache invalidated: {:?}", versions);
    json_response(StatusCode::OK, &json!({ "versions": versions }))
}

fn posts_params(subreddit: Option<&str>, query: &Query) -> PostsParams {
    let params = PostsParams::new(subreddit.unwrap_or(PostsParams::DEFAULT_SUBREDDIT));
    match query.get("limit").and_then(|raw| raw.parse::<u32>().ok()) {
        Some(limit) if limit > 0 => params.with_limit(limit),
        _ => params,
    }
}

fn allowed_method(path: &str, admin_enabled: bool) -> Option<&'static str> {
    match path {
        "/health" | "/api/reddit-posts" | "/api/posts" | "/api/reddit-comments"
        | "/api/comments" | "/api/reddit-flairs" | "/api/flairs" => Some("GET, OPTIONS"),
        INVALIDATE_PATH if admin_enabled => Some("POST, OPTIONS"),
        _ => None,
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn resource_response<T: Serialize>(response: upcache_lib::Response<T>) -> Response<Body> {
    let (data, freshness) = response.into_parts();
    let mut response = json_response(StatusCode::OK, &data);
    let headers = response.headers_mut();

    headers.insert(
        HeaderName::from_static(X_CACHE_STATUS),
        HeaderValue::from_static(freshness.as_str()),
    );
    if let Some(age) = freshness.age() {
        headers.insert(header::AGE, HeaderValue::from(age.as_secs()));
    }
    match freshness {
        Freshness::Stale { .. } => {
            headers.insert(header::WARNING, HeaderValue::from_static(WARNING_STALE));
        }
        Freshness::Empty { .. } => {
            headers.insert(header::WARNING, HeaderValue::from_static(WARNING_EMPTY));
        }
        Freshness::Live | Freshness::Cached { .. } => {}
    }

    response
}

fn unauthorized() -> Response<Body> {
    let mut response = error_response(StatusCode::UNAUTHORIZED, "missing or invalid admin token");
    response
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    response
}

fn error_response(status: StatusCode, message: &str) -> Response<Body> {
    json_response(status, &json!({ "error": message }))
}

fn json_response<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Response<Body> {
    let (status, body) = match serde_json::to_vec(value) {
        Ok(body) => (status, body),
        Err(e) => {
            log::error!("failed to serialize response: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                br#"{"error":"internal error"}"#.to_vec(),
            )
        }
    };

    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

fn preflight() -> Response<Body> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = StatusCode::NO_CONTENT;
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("authorization, *"),
    );
    response
}

fn with_cors(mut response: Response<Body>) -> Response<Body> {
    response.headers_mut().insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    response
}

/// Decoded query string. Blank values count as absent.
struct Query(HashMap<String, String>);

impl Query {
    fn parse(raw: Option<&str>) -> Self {
        let pairs = raw
            .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();
        Self(pairs)
    }

    fn get(&self, name: &str) -> Option<&str> {
        self.0
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn flag(&self, name: &str) -> bool {
        self.get(name) == Some("true")
    }
}
