//! Probe command handler

use anyhow::{Context, Result};

use wpmirror_core::sync::{ContentFetcher, HttpFetcher, RemoteItem};
use wpmirror_core::{Config, FetchTask};

use crate::output::{Output, PageSummary};

/// Fetch one unfiltered page and print what came back
pub async fn run(config: &Config, page: u32, output: &Output) -> Result<()> {
    let fetcher = HttpFetcher::new(config)?;
    let task = FetchTask::parse(page.max(1), config.per_page, None);

    let remote = fetcher
        .fetch(&task)
        .await
        .with_context(|| format!("Failed to fetch page {} from {}", task.page, fetcher.url()))?;

    let posts = remote
        .items
        .into_iter()
        .map(|value| RemoteItem::from_value(value, task.page).map(|item| item.into_post(true)))
        .collect::<Result<Vec<_>, _>>()?;

    output.print_page(&PageSummary {
        url: fetcher.url(),
        page: task.page,
        total_posts: remote.total_posts,
        total_pages: remote.total_pages,
        posts: &posts,
    });

    Ok(())
}
