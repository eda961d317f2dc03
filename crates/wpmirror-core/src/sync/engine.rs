//! Sync engine
//!
//! Drives the polling state machine. Each call to [`SyncEngine::run_round`]
//! plans a batch of page fetches, dispatches them concurrently, then applies
//! the outcomes one by one in submission order:
//!
//! 1. parse tasks for the next `max_pages_per_round` pages of the current
//!    pass (plus parse tasks that failed earlier),
//! 2. once a full pass has completed, one unfiltered deletion check for the
//!    page under the deletion cursor, always last.
//!
//! A pass ends when the page cursor moves past the last reported page and
//! nothing of it is still pending, or after it has waited
//! [`MAX_HELD_ROUNDS`] rounds for pending pages. Those stay pending and are
//! retried alongside later passes. The next pass only asks for posts
//! modified after the newest modification seen so far.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::dispatcher::{FetchDispatcher, PageResult};
use super::fetcher::ContentFetcher;
use super::state::SyncState;
use crate::config::{Config, MAX_PAGES_PER_ROUND};
use crate::error::FetchError;
use crate::models::{FetchTask, TaskKind};
use crate::store::PostStore;

/// Rounds a finished pass waits for its failed pages before closing anyway
pub const MAX_HELD_ROUNDS: u32 = 3;

/// Highest page count the cursor can step past
const LAST_PAGE: u32 = u32::MAX - 1;

/// What happened during one round
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundReport {
    pub dispatched: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub upserted: usize,
    pub purged: usize,
    /// The round finished a pass over the feed
    pub pass_complete: bool,
    pub elapsed: Duration,
}

/// Incremental mirror of the remote feed into a [`PostStore`]
pub struct SyncEngine<F> {
    fetcher: F,
    dispatcher: FetchDispatcher,
    store: PostStore,
    state: SyncState,
    per_page: u32,
    max_pages_per_round: u32,
}

impl<F: ContentFetcher> SyncEngine<F> {
    /// Create an engine in bulk mode
    pub fn new(fetcher: F, store: PostStore, config: &Config) -> Self {
        Self {
            fetcher,
            dispatcher: FetchDispatcher::new(config.workers),
            store,
            state: SyncState::new(),
            per_page: config.per_page,
            max_pages_per_round: config.max_pages_per_round.clamp(1, MAX_PAGES_PER_ROUND),
        }
    }

    /// Start from a specific state
    pub fn with_state(mut self, state: SyncState) -> Self {
        self.state = state;
        self
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    pub fn store(&self) -> &PostStore {
        &self.store
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// The store holds at least as many posts as the remote is known to have
    pub fn is_ready(&self) -> bool {
        self.store.count() as u64 >= self.state.known_total_posts
    }

    /// Tasks for the next round and the page the cursor moves to afterwards
    pub fn plan_round(&self) -> (Vec<FetchTask>, u32) {
        let state = &self.state;
        let last_page = state
            .total_pages
            .saturating_add(1)
            .min(state.current_page.saturating_add(self.max_pages_per_round));

        let mut tasks = state.pending.clone();
        tasks.extend(
            (state.current_page..last_page)
                .map(|page| FetchTask::parse(page, self.per_page, state.modified_after))
                .filter(|task| !state.pending.contains(task)),
        );

        if state.modified_after.is_some() {
            tasks.push(FetchTask::deletion_check(
                state.deletion_cursor,
                self.per_page,
            ));
        }

        (tasks, last_page)
    }

    /// Fetch one batch of pages and apply the results
    pub async fn run_round(&mut self) -> RoundReport {
        let started = Instant::now();
        let (tasks, last_page) = self.plan_round();
        debug!(
            "Round: {} task(s), pages {}..{}, mode {:?}",
            tasks.len(),
            self.state.current_page,
            last_page,
            self.state.mode()
        );

        let outcomes = self.dispatcher.dispatch(&self.fetcher, tasks).await;

        let mut report = RoundReport {
            dispatched: outcomes.len(),
            ..RoundReport::default()
        };
        let mut still_pending = Vec::new();

        for outcome in outcomes {
            match outcome.result {
                Ok(page) => {
                    report.succeeded += 1;
                    match outcome.task.kind {
                        TaskKind::Parse => report.upserted += self.apply_parse(page),
                        TaskKind::DeletionCheck => {
                            report.purged += self.apply_deletion_check(&outcome.task, page)
                        }
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        "{} task for page {} failed ({}): {}",
                        outcome.task.kind,
                        outcome.task.page,
                        e.kind(),
                        e
                    );
                    match outcome.task.kind {
                        TaskKind::Parse => still_pending.push(outcome.task),
                        // Rebuilt from the cursor next round
                        TaskKind::DeletionCheck => self.deletion_check_failed(&e),
                    }
                }
            }
        }

        self.state.pending = still_pending;
        self.state.current_page = last_page;
        report.pass_complete = self.finish_pass();
        report.elapsed = started.elapsed();
        report
    }

    /// Store the posts of a parse page; returns how many were upserted
    fn apply_parse(&mut self, page: PageResult) -> usize {
        self.state.total_pages = page.total_pages.min(LAST_PAGE);
        self.state.known_total_posts = self.state.known_total_posts.max(page.total_posts);

        // Posts arriving mid-sweep are live by definition
        if self.state.sweep_in_progress() {
            self.state.active_ids.extend(page.ids);
        }

        let count = page.posts.len();
        for post in page.posts {
            self.state.observe_dates(&post);
            self.store.upsert(post);
        }
        count
    }

    /// Advance the deletion sweep; returns how many posts were purged
    fn apply_deletion_check(&mut self, task: &FetchTask, page: PageResult) -> usize {
        self.state.known_total_posts = page.total_posts;
        self.state.deletion_total_pages = page.total_pages.min(LAST_PAGE);

        let stored = self.store.count() as u64;
        if page.total_posts >= stored {
            self.state.reset_sweep();
            return 0;
        }

        if task.page > page.total_pages.max(1) {
            warn!(
                "Deletion check page {} is past the end ({} page(s)), restarting sweep",
                task.page, page.total_pages
            );
            self.state.reset_sweep();
            return 0;
        }

        self.state.active_ids.extend(page.ids);

        if self.state.deletion_cursor < self.state.deletion_total_pages {
            debug!(
                "Deletion suspected ({} remote < {} stored), checked page {}/{}",
                page.total_posts, stored, task.page, self.state.deletion_total_pages
            );
            self.state.deletion_cursor += 1;
            return 0;
        }

        let removed = self.store.purge(&self.state.active_ids);
        if !removed.is_empty() {
            info!("Purged {} deleted post(s): {:?}", removed.len(), removed);
        }
        self.state.reset_sweep();
        removed.len()
    }

    /// Restart the sweep when the remote rejects the checked page
    fn deletion_check_failed(&mut self, error: &FetchError) {
        if let FetchError::Response { page, status } = *error {
            if (400..500).contains(&status) {
                warn!(
                    "Deletion check page {} rejected with HTTP {}, restarting sweep",
                    page, status
                );
                self.state.reset_sweep();
            }
        }
    }

    /// Close the pass if the cursor ran past the last page
    fn finish_pass(&mut self) -> bool {
        let state = &mut self.state;
        if state.pending.is_empty() {
            state.held_rounds = 0;
        }
        if state.current_page <= state.total_pages {
            return false;
        }

        if !state.pending.is_empty() {
            if state.held_rounds < MAX_HELD_ROUNDS {
                // Give the failed pages a few rounds to come through
                state.held_rounds += 1;
                state.current_page = state.current_page.min(state.total_pages.saturating_add(1));
                return false;
            }
            warn!(
                "Closing pass with {} page(s) still failing; they stay queued",
                state.pending.len()
            );
        }

        state.current_page = 1;
        state.total_pages = 1;
        if state.latest_modified.is_some() {
            state.modified_after = state.latest_modified;
        }
        true
    }
}
