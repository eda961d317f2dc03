//! In-memory remote used by the dispatcher and engine tests

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;

use super::fetcher::{ContentFetcher, RemotePage};
use crate::error::{FetchError, FetchResult};
use crate::models::{parse_timestamp, FetchTask, TaskKind};

/// Timestamp `n` minutes after 2024-01-01T00:00:00
pub fn ts(n: u32) -> String {
    format!("2024-01-01T{:02}:{:02}:00", n / 60, n % 60)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Full,
    NoTitle,
    NoId,
}

#[derive(Debug, Clone)]
struct FakePost {
    date: String,
    modified: String,
    shape: Shape,
}

/// Scripted failure: remaining count and the HTTP status, if any
#[derive(Debug, Clone, Copy)]
struct Failure {
    remaining: usize,
    status: Option<u16>,
}

#[derive(Debug, Default)]
struct FakeInner {
    posts: BTreeMap<u64, FakePost>,
    failures: HashMap<(TaskKind, u32), Failure>,
    delays: HashMap<u32, Duration>,
    reported_pages: Option<u32>,
    requests: Vec<FetchTask>,
}

/// A WordPress-like posts endpoint
///
/// Posts are served in id order. `modified_after` is strict, like the real
/// API, and the totals describe the filtered result set. Pages past the last
/// one are answered with HTTP 400.
#[derive(Debug, Default)]
pub struct FakeRemote {
    inner: Mutex<FakeInner>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remote with posts `1..=count`, post `n` modified at `ts(n)`
    pub fn with_posts(count: u64) -> Self {
        let remote = Self::new();
        for id in 1..=count {
            remote.put(id, id as u32);
        }
        remote
    }

    /// Create or edit a post
    pub fn put(&self, id: u64, modified: u32) {
        let mut inner = self.inner.lock();
        let date = inner
            .posts
            .get(&id)
            .map(|p| p.date.clone())
            .unwrap_or_else(|| ts(modified));
        inner.posts.insert(
            id,
            FakePost {
                date,
                modified: ts(modified),
                shape: Shape::Full,
            },
        );
    }

    /// Serve this post without its title and content
    pub fn break_post(&self, id: u64) {
        self.reshape(id, Shape::NoTitle);
    }

    /// Serve this post without its id
    pub fn strip_id(&self, id: u64) {
        self.reshape(id, Shape::NoId);
    }

    fn reshape(&self, id: u64, shape: Shape) {
        if let Some(post) = self.inner.lock().posts.get_mut(&id) {
            post.shape = shape;
        }
    }

    pub fn remove(&self, id: u64) {
        self.inner.lock().posts.remove(&id);
    }

    /// Fail the next `times` requests for this page with a transport error
    pub fn fail(&self, kind: TaskKind, page: u32, times: usize) {
        self.script(kind, page, times, None);
    }

    /// Answer the next `times` requests for this page with `status`
    pub fn fail_with_status(&self, kind: TaskKind, page: u32, status: u16, times: usize) {
        self.script(kind, page, times, Some(status));
    }

    fn script(&self, kind: TaskKind, page: u32, remaining: usize, status: Option<u16>) {
        self.inner
            .lock()
            .failures
            .insert((kind, page), Failure { remaining, status });
    }

    pub fn delay(&self, page: u32, delay: Duration) {
        self.inner.lock().delays.insert(page, delay);
    }

    /// Report this page count instead of the real one
    pub fn report_total_pages(&self, pages: u32) {
        self.inner.lock().reported_pages = Some(pages);
    }

    /// Requests received so far, in arrival order
    pub fn requests(&self) -> Vec<FetchTask> {
        self.inner.lock().requests.clone()
    }

    pub fn clear_requests(&self) {
        self.inner.lock().requests.clear();
    }

    fn respond(&self, task: &FetchTask) -> (Option<Duration>, FetchResult<RemotePage>) {
        let mut inner = self.inner.lock();
        inner.requests.push(task.clone());
        let delay = inner.delays.get(&task.page).copied();

        if let Some(failure) = inner.failures.get_mut(&(task.kind, task.page)) {
            if failure.remaining > 0 {
                failure.remaining -= 1;
                let err = match failure.status {
                    Some(status) => FetchError::Response {
                        page: task.page,
                        status,
                    },
                    None => {
                        let err =
                            io::Error::new(io::ErrorKind::ConnectionReset, "connection reset");
                        FetchError::transport(task.page, err)
                    }
                };
                return (delay, Err(err));
            }
        }

        let matching: Vec<(u64, &FakePost)> = inner
            .posts
            .iter()
            .filter(|(_, post)| match task.modified_after {
                Some(after) => parse_timestamp(&post.modified).is_ok_and(|m| m > after),
                None => true,
            })
            .map(|(id, post)| (*id, post))
            .collect();

        let per_page = task.per_page as usize;
        let total_posts = matching.len() as u64;
        let total_pages = inner
            .reported_pages
            .unwrap_or(matching.len().div_ceil(per_page) as u32);

        if task.page > total_pages.max(1) {
            let err = FetchError::Response {
                page: task.page,
                status: 400,
            };
            return (delay, Err(err));
        }

        let items = matching
            .iter()
            .skip((task.page as usize - 1).saturating_mul(per_page))
            .take(per_page)
            .map(|(id, post)| match post.shape {
                Shape::Full => json!({
                    "id": id,
                    "title": {"rendered": format!("Post {}", id)},
                    "content": {"rendered": format!("<p>Body of post {}</p>", id)},
                    "date": post.date,
                    "modified": post.modified,
                }),
                Shape::NoTitle => {
                    json!({"id": id, "date": post.date, "modified": post.modified})
                }
                Shape::NoId => json!({
                    "title": {"rendered": format!("Post {}", id)},
                    "content": {"rendered": ""},
                    "date": post.date,
                    "modified": post.modified,
                }),
            })
            .collect();

        (
            delay,
            Ok(RemotePage {
                total_posts,
                total_pages,
                items,
            }),
        )
    }
}

impl ContentFetcher for FakeRemote {
    async fn fetch(&self, task: &FetchTask) -> FetchResult<RemotePage> {
        let (delay, result) = self.respond(task);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        result
    }
}
