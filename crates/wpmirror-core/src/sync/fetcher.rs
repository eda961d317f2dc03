//! Remote content fetcher
//!
//! Performs one paginated GET against the WordPress posts endpoint and
//! returns the global totals from the `X-WP-Total` / `X-WP-TotalPages`
//! headers together with the raw JSON items.

use std::future::Future;
use std::str::FromStr;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::{HeaderMap, AUTHORIZATION};
use serde::Deserialize;
use tracing::debug;

use crate::config::Config;
use crate::error::{FetchError, FetchResult};
use crate::extract;
use crate::models::{FetchTask, Post, RemoteId};

/// Header carrying the number of posts matching the query
pub const TOTAL_POSTS_HEADER: &str = "X-WP-Total";

/// Header carrying the number of pages for the query
pub const TOTAL_PAGES_HEADER: &str = "X-WP-TotalPages";

/// One page as returned by the remote
#[derive(Debug, Clone, Default)]
pub struct RemotePage {
    pub total_posts: u64,
    pub total_pages: u32,
    /// Undecoded JSON items
    pub items: Vec<serde_json::Value>,
}

/// Source of post pages
pub trait ContentFetcher: Send + Sync {
    /// Fetch the page described by `task`
    fn fetch(&self, task: &FetchTask) -> impl Future<Output = FetchResult<RemotePage>> + Send;
}

/// `{"rendered": "..."}` wrapper used by WordPress for titles and content
#[derive(Debug, Clone, Deserialize)]
pub struct Rendered {
    pub rendered: String,
}

/// The fields of a remote post the mirror cares about
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteItem {
    pub id: RemoteId,
    pub title: Rendered,
    pub content: Rendered,
    pub date: String,
    pub modified: String,
}

/// Store key of a raw item
pub fn item_id(value: &serde_json::Value, page: u32) -> FetchResult<String> {
    value
        .get("id")
        .and_then(|id| serde_json::from_value::<RemoteId>(id.clone()).ok())
        .map(RemoteId::into_key)
        .ok_or_else(|| FetchError::Protocol {
            page,
            what: "an item id".to_string(),
        })
}

impl RemoteItem {
    /// Decode one JSON item, reporting missing fields as protocol errors
    pub fn from_value(value: serde_json::Value, page: u32) -> FetchResult<Self> {
        serde_json::from_value(value).map_err(|e| FetchError::Protocol {
            page,
            what: format!("item fields ({})", e),
        })
    }

    /// Build a post, optionally running word extraction on the content
    pub fn into_post(self, with_words: bool) -> Post {
        let words = if with_words {
            extract::word_counts(&self.content.rendered)
        } else {
            Vec::new()
        };

        Post::new(
            self.id.into_key(),
            self.title.rendered,
            self.date,
            self.modified,
            words,
        )
    }
}

/// HTTP implementation backed by reqwest
pub struct HttpFetcher {
    client: reqwest::Client,
    url: String,
    auth_header: String,
}

impl HttpFetcher {
    /// Create a fetcher from configuration
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.as_str())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            url: config.remote_url.clone(),
            auth_header: basic_auth_header(&config.username, &config.password),
        })
    }

    /// Remote endpoint
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl ContentFetcher for HttpFetcher {
    async fn fetch(&self, task: &FetchTask) -> FetchResult<RemotePage> {
        let page = task.page;
        debug!("GET {} page={} kind={}", self.url, page, task.kind);

        let response = self
            .client
            .get(&self.url)
            .query(&task.query())
            .header(AUTHORIZATION, self.auth_header.as_str())
            .send()
            .await
            .map_err(|e| FetchError::transport(page, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Response {
                page,
                status: status.as_u16(),
            });
        }

        let total_posts = header_number(response.headers(), TOTAL_POSTS_HEADER, page)?;
        let total_pages = header_number(response.headers(), TOTAL_PAGES_HEADER, page)?;
        check_page_count(total_posts, total_pages, task.per_page, page)?;

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::transport(page, e))?;

        Ok(RemotePage {
            total_posts,
            total_pages,
            items: decode_items(&body, page)?,
        })
    }
}

/// `Basic base64(user:password)`
pub fn basic_auth_header(username: &str, password: &str) -> String {
    format!(
        "Basic {}",
        STANDARD.encode(format!("{}:{}", username, password))
    )
}

/// Parse a numeric header
fn header_number<T: FromStr>(headers: &HeaderMap, name: &str, page: u32) -> FetchResult<T> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
        .ok_or_else(|| FetchError::Protocol {
            page,
            what: format!("numeric header {}", name),
        })
}

/// Reject a page count the post count cannot account for
fn check_page_count(total_posts: u64, total_pages: u32, per_page: u32, page: u32) -> FetchResult<()> {
    let expected = total_posts.div_ceil(u64::from(per_page.max(1))).max(1);
    if u64::from(total_pages) > expected {
        return Err(FetchError::Protocol {
            page,
            what: format!(
                "a {} consistent with {} post(s), got {}",
                TOTAL_PAGES_HEADER, total_posts, total_pages
            ),
        });
    }
    Ok(())
}

/// Parse the response body as a JSON array
fn decode_items(body: &str, page: u32) -> FetchResult<Vec<serde_json::Value>> {
    serde_json::from_str(body).map_err(|source| FetchError::Decode { page, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_basic_auth_header() {
        assert_eq!(basic_auth_header("guest", ""), "Basic Z3Vlc3Q6");
        assert_eq!(
            basic_auth_header("user", "secret"),
            "Basic dXNlcjpzZWNyZXQ="
        );
    }

    #[test]
    fn test_header_number() {
        let mut headers = HeaderMap::new();
        headers.insert("x-wp-total", HeaderValue::from_static("42"));

        let total: u64 = header_number(&headers, TOTAL_POSTS_HEADER, 1).unwrap();
        assert_eq!(total, 42);
    }

    #[test]
    fn test_missing_header_is_protocol_error() {
        let headers = HeaderMap::new();
        let err = header_number::<u32>(&headers, TOTAL_PAGES_HEADER, 3).unwrap_err();

        assert!(matches!(err, FetchError::Protocol { page: 3, .. }));
        assert!(err.to_string().contains(TOTAL_PAGES_HEADER));
    }

    #[test]
    fn test_page_count_must_match_post_count() {
        assert!(check_page_count(5, 2, 3, 1).is_ok());
        assert!(check_page_count(0, 0, 3, 1).is_ok());
        assert!(check_page_count(0, 1, 3, 1).is_ok());

        let err = check_page_count(5, u32::MAX, 3, 4).unwrap_err();
        assert!(matches!(err, FetchError::Protocol { page: 4, .. }));
        assert!(err.to_string().contains(TOTAL_PAGES_HEADER));
    }

    #[test]
    fn test_item_id() {
        let number = serde_json::json!({"id": 17444});
        let text = serde_json::json!({"id": "abc", "title": 3});
        assert_eq!(item_id(&number, 1).unwrap(), "17444");
        assert_eq!(item_id(&text, 1).unwrap(), "abc");

        let err = item_id(&serde_json::json!({"title": {"rendered": "x"}}), 5).unwrap_err();
        assert!(matches!(err, FetchError::Protocol { page: 5, .. }));
    }

    #[test]
    fn test_decode_items() {
        let items = decode_items(r#"[{"id": 1}, {"id": 2}]"#, 1).unwrap();
        assert_eq!(items.len(), 2);

        let err = decode_items("<html>maintenance</html>", 1).unwrap_err();
        assert_eq!(err.kind(), "decode");
    }

    #[test]
    fn test_remote_item_into_post() {
        let value = serde_json::json!({
            "id": 17444,
            "title": {"rendered": "A title"},
            "content": {"rendered": "<p>Some words, some more</p>"},
            "date": "2024-03-01T09:00:00",
            "modified": "2024-03-02T09:00:00",
            "slug": "ignored"
        });

        let post = RemoteItem::from_value(value.clone(), 1)
            .unwrap()
            .into_post(true);
        assert_eq!(post.id(), "17444");
        assert_eq!(post.title(), "A title");
        assert_eq!(post.modified(), "2024-03-02T09:00:00");
        assert!(post
            .words()
            .contains(&("some".to_string(), 2)));

        let bare = RemoteItem::from_value(value, 1).unwrap().into_post(false);
        assert!(bare.words().is_empty());
    }

    #[test]
    fn test_remote_item_missing_field() {
        let value = serde_json::json!({"id": 1, "date": "2024-03-01T09:00:00"});
        let err = RemoteItem::from_value(value, 2).unwrap_err();

        assert!(matches!(err, FetchError::Protocol { page: 2, .. }));
    }

    #[test]
    fn test_http_fetcher_new() {
        let fetcher = HttpFetcher::new(&Config::default()).unwrap();
        assert!(fetcher.url().ends_with("/wp/v2/posts"));
    }
}
