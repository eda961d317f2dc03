//! Feed synchronization
//!
//! Mirrors a paginated WordPress posts endpoint into the shared `PostStore`.
//!
//! ## Flow
//!
//! 1. `SyncEngine` plans a batch of `FetchTask`s from its `SyncState`
//! 2. `FetchDispatcher` runs them through a `ContentFetcher`, bounded and in order
//! 3. The engine applies the outcomes: upserts, pagination, deletion sweep
//!
//! ## Usage
//!
//! ```ignore
//! let fetcher = HttpFetcher::new(&config)?;
//! let mut engine = SyncEngine::new(fetcher, store.clone(), &config);
//! let report = engine.run_round().await;
//! ```

mod dispatcher;
mod engine;
mod fetcher;
mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatcher::{FetchDispatcher, FetchOutcome, PageResult};
pub use engine::{RoundReport, SyncEngine};
pub use fetcher::{
    basic_auth_header, ContentFetcher, HttpFetcher, RemoteItem, RemotePage, Rendered,
    TOTAL_PAGES_HEADER, TOTAL_POSTS_HEADER,
};
pub use state::{SyncMode, SyncState};
