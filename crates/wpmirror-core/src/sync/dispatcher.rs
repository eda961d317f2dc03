//! Fetch dispatcher
//!
//! Runs a batch of fetch tasks concurrently, at most `workers` at a time, and
//! hands the outcomes back in submission order no matter which request
//! finishes first. Workers only fetch and decode; all state changes happen
//! in the engine after the whole batch is collected.

use futures_util::stream::{self, StreamExt};

use tracing::warn;

use super::fetcher::{item_id, ContentFetcher, RemoteItem};
use crate::error::FetchResult;
use crate::models::{FetchTask, Post};

/// Decoded page of a successful fetch
#[derive(Debug, Clone, Default)]
pub struct PageResult {
    pub total_posts: u64,
    pub total_pages: u32,
    /// Stored posts; empty for deletion checks
    pub posts: Vec<Post>,
    /// Every id on the page, including skipped items
    pub ids: Vec<String>,
    /// Items without the fields a post needs
    pub skipped: usize,
}

/// A task together with what came back for it
#[derive(Debug)]
pub struct FetchOutcome {
    pub task: FetchTask,
    pub result: FetchResult<PageResult>,
}

/// Bounded, order-preserving fan-out of fetch tasks
#[derive(Debug, Clone)]
pub struct FetchDispatcher {
    workers: usize,
}

impl FetchDispatcher {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Execute all tasks, returning one outcome per task in input order
    pub async fn dispatch<F: ContentFetcher>(
        &self,
        fetcher: &F,
        tasks: Vec<FetchTask>,
    ) -> Vec<FetchOutcome> {
        stream::iter(tasks)
            .map(|task| async move {
                let result = execute(fetcher, &task).await;
                FetchOutcome { task, result }
            })
            .buffered(self.workers)
            .collect()
            .await
    }
}

/// Fetch one page and decode its items
///
/// Deletion checks only need ids. Parse tasks build posts with word counts;
/// an item that has an id but lacks other fields is logged and skipped. An
/// item without an id fails the page.
async fn execute<F: ContentFetcher>(fetcher: &F, task: &FetchTask) -> FetchResult<PageResult> {
    let page = fetcher.fetch(task).await?;
    let mut result = PageResult {
        total_posts: page.total_posts,
        total_pages: page.total_pages,
        ..PageResult::default()
    };

    for value in page.items {
        let id = item_id(&value, task.page)?;
        if task.is_parse() {
            match RemoteItem::from_value(value, task.page) {
                Ok(item) => result.posts.push(item.into_post(true)),
                Err(e) => {
                    warn!("Skipping post {}: {}", id, e);
                    result.skipped += 1;
                }
            }
        }
        result.ids.push(id);
    }

    Ok(result)
}
