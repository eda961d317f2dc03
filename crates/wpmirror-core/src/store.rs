//! Shared post store
//!
//! The `PostStore` holds every mirrored post plus the ledger of changes that
//! have not been broadcast yet. Both live behind one mutex: an upsert must
//! update the map and the ledger together, and every operation holds the lock
//! only for its own duration.
//!
//! ## Usage
//!
//! ```ignore
//! let store = PostStore::new();
//! store.upsert(post);                 // recorded in the ledger's new-list
//! let diff = store.flush_ledger(3);   // snapshot + reset
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::models::{Post, PostStatus};

/// Changes accumulated since the last broadcast
///
/// Serializes directly to the broadcast message:
/// `{"new": [...], "deleted": [...], "modified": [...], "clients": 2}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeLedger {
    pub new: Vec<String>,
    pub deleted: Vec<String>,
    pub modified: Vec<String>,
    /// Live connections at flush time
    pub clients: usize,
}

impl ChangeLedger {
    /// True when no post changed
    pub fn is_empty(&self) -> bool {
        self.new.is_empty() && self.deleted.is_empty() && self.modified.is_empty()
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    posts: HashMap<String, Post>,
    ledger: ChangeLedger,
}

/// Thread-safe post map and change ledger
///
/// Cloning is cheap; clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct PostStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl PostStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a post
    ///
    /// The status is assigned here: `New` for an unknown id, `Modified`
    /// otherwise. The id is appended to the matching ledger list. An id
    /// upserted twice before a flush shows up in both lists.
    pub fn upsert(&self, mut post: Post) -> PostStatus {
        let mut inner = self.inner.lock();
        let key = post.id().to_string();

        let status = if inner.posts.contains_key(&key) {
            inner.ledger.modified.push(key.clone());
            PostStatus::Modified
        } else {
            inner.ledger.new.push(key.clone());
            PostStatus::New
        };

        post.set_status(status);
        inner.posts.insert(key, post);
        status
    }

    /// Get a post by id
    pub fn get(&self, id: &str) -> Option<Post> {
        self.inner.lock().posts.get(id).cloned()
    }

    /// All stored ids
    pub fn all_ids(&self) -> HashSet<String> {
        self.inner.lock().posts.keys().cloned().collect()
    }

    /// Number of stored posts
    pub fn count(&self) -> usize {
        self.inner.lock().posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().posts.is_empty()
    }

    /// Remove every post whose id is not in `active`
    ///
    /// Returns the removed ids, which are also appended to the ledger's
    /// deleted-list. The new/modified lists are left alone.
    pub fn purge(&self, active: &HashSet<String>) -> Vec<String> {
        let mut inner = self.inner.lock();

        let removed: Vec<String> = inner
            .posts
            .keys()
            .filter(|id| !active.contains(*id))
            .cloned()
            .collect();

        for id in &removed {
            inner.posts.remove(id);
        }
        inner.ledger.deleted.extend(removed.iter().cloned());

        removed
    }

    /// Snapshot of the pending changes without resetting them
    pub fn ledger(&self) -> ChangeLedger {
        self.inner.lock().ledger.clone()
    }

    /// Take the pending changes and reset the three lists
    ///
    /// `clients` overwrites the connection count carried by the snapshot.
    pub fn flush_ledger(&self, clients: usize) -> ChangeLedger {
        let mut inner = self.inner.lock();
        inner.ledger.clients = clients;

        ChangeLedger {
            new: std::mem::take(&mut inner.ledger.new),
            deleted: std::mem::take(&mut inner.ledger.deleted),
            modified: std::mem::take(&mut inner.ledger.modified),
            clients,
        }
    }
}
