//! Polling state
//!
//! Everything the sync engine remembers between rounds. Owned by a single
//! `SyncEngine`; nothing else writes it.

use std::collections::HashSet;

use chrono::NaiveDateTime;
use tracing::warn;

use crate::models::{parse_timestamp, FetchTask, Post};

/// Which kind of pass the engine is running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// No modification filter yet; every page of the feed is fetched
    Bulk,
    /// Only posts modified after the previous pass are fetched
    Incremental,
}

/// Polling state of the sync engine
#[derive(Debug, Clone)]
pub struct SyncState {
    /// Next page of the current pass
    pub current_page: u32,
    /// Page count reported by the latest parse result
    pub total_pages: u32,
    /// Page the next deletion check fetches
    pub deletion_cursor: u32,
    /// Page count of the unfiltered feed
    pub deletion_total_pages: u32,
    /// Filter for incremental passes
    pub modified_after: Option<NaiveDateTime>,
    pub latest_date: Option<NaiveDateTime>,
    pub latest_modified: Option<NaiveDateTime>,
    /// Remote collection size; authoritative right after a deletion check
    pub known_total_posts: u64,
    /// Parse tasks that failed and are retried next round
    pub pending: Vec<FetchTask>,
    /// Rounds a finished pass has waited on `pending`; reset once it drains
    pub held_rounds: u32,
    /// Ids seen live during the running deletion sweep
    pub active_ids: HashSet<String>,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            current_page: 1,
            total_pages: 1,
            deletion_cursor: 1,
            deletion_total_pages: 1,
            modified_after: None,
            latest_date: None,
            latest_modified: None,
            // Assume at least one post so a fresh mirror is never "ready"
            known_total_posts: 1,
            pending: Vec::new(),
            held_rounds: 0,
            active_ids: HashSet::new(),
        }
    }
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> SyncMode {
        if self.modified_after.is_some() {
            SyncMode::Incremental
        } else {
            SyncMode::Bulk
        }
    }

    /// A deletion sweep has marked at least one page
    pub fn sweep_in_progress(&self) -> bool {
        !self.active_ids.is_empty()
    }

    /// Raise the high-water marks to this post's dates
    ///
    /// A post with an unparseable date leaves both marks untouched.
    pub fn observe_dates(&mut self, post: &Post) {
        let parsed = parse_timestamp(post.date())
            .and_then(|date| parse_timestamp(post.modified()).map(|modified| (date, modified)));

        match parsed {
            Ok((date, modified)) => {
                if self.latest_date.map_or(true, |latest| latest < date) {
                    self.latest_date = Some(date);
                }
                if self.latest_modified.map_or(true, |latest| latest < modified) {
                    self.latest_modified = Some(modified);
                }
            }
            Err(e) => {
                warn!("Post {} has an unparseable date: {}", post.id(), e);
            }
        }
    }

    /// Forget the running deletion sweep
    pub fn reset_sweep(&mut self) {
        self.deletion_cursor = 1;
        self.active_ids.clear();
    }
}
