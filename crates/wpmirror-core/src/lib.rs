//! wpmirror Core Library
//!
//! Keeps an in-memory mirror of a WordPress site's posts and fans changes
//! out to WebSocket clients.
//!
//! # Architecture
//!
//! - **Sync engine**: polls the remote REST API page by page, first a full
//!   pass, then only posts modified since the previous pass, with a
//!   periodic unfiltered sweep to detect deletions
//! - **Post store**: the single shared map of posts plus a ledger of
//!   new/modified/deleted ids since the last broadcast
//! - **Server**: answers pull requests from the store and pushes the ledger
//!   to every client after each round
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! runner::serve(&config, shutdown_signal).await?;
//! ```
//!
//! # Modules
//!
//! - `store`: Shared post map and change ledger
//! - `models`: Posts and fetch tasks
//! - `extract`: Word frequencies from rendered HTML
//! - `sync`: Fetcher, dispatcher and polling state machine
//! - `server`: WebSocket protocol and connection handling
//! - `runner`: The long-running schedules
//! - `config`: Application configuration

pub mod config;
pub mod error;
pub mod extract;
pub mod models;
pub mod runner;
pub mod server;
pub mod store;
pub mod sync;

pub use config::Config;
pub use error::{FetchError, ProtocolError};
pub use models::{FetchTask, Post, PostStatus, TaskKind};
pub use server::{Broadcaster, Server};
pub use store::{ChangeLedger, PostStore};
pub use sync::{HttpFetcher, SyncEngine};
