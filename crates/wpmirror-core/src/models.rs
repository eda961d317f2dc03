//! Data models for wpmirror
//!
//! Defines the mirrored `Post` and the `FetchTask` unit of work handed from
//! the sync engine to the fetch dispatcher.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Timestamp format used by the remote feed and the `modified_after` filter
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A word and how often it occurs in a post
pub type WordCount = (String, u32);

/// Parse a remote timestamp (`YYYY-MM-DDTHH:MM:SS`)
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
}

/// Format a timestamp the way the remote expects it
pub fn format_timestamp(value: &NaiveDateTime) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

/// Post id as it appears on the wire
///
/// The remote sends integers, clients may send either form. Both are
/// normalized to the decimal string used as the store key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RemoteId {
    Number(u64),
    Text(String),
}

impl RemoteId {
    /// Store key for this id
    pub fn into_key(self) -> String {
        match self {
            RemoteId::Number(n) => n.to_string(),
            RemoteId::Text(s) => s,
        }
    }
}

/// Change status of a stored post
///
/// Assigned by the store on insert/update, never by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    /// First time this id was stored
    #[default]
    New,
    /// Overwrote an existing record
    Modified,
}

/// A mirrored post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    id: String,
    title: String,
    date: String,
    #[serde(rename = "modify_date")]
    modified: String,
    #[serde(default)]
    status: PostStatus,
    words: Vec<WordCount>,
}

impl Post {
    /// Create a post from remote fields
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        date: impl Into<String>,
        modified: impl Into<String>,
        words: Vec<WordCount>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            date: date.into(),
            modified: modified.into(),
            status: PostStatus::New,
            words,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Creation timestamp as sent by the remote
    pub fn date(&self) -> &str {
        &self.date
    }

    /// Last-modified timestamp as sent by the remote
    pub fn modified(&self) -> &str {
        &self.modified
    }

    pub fn status(&self) -> PostStatus {
        self.status
    }

    /// Word frequency list, sorted by word
    pub fn words(&self) -> &[WordCount] {
        &self.words
    }

    pub(crate) fn set_status(&mut self, status: PostStatus) {
        self.status = status;
    }
}

/// Kind of page fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Fetch a page of (possibly filtered) posts and store them
    Parse,
    /// Fetch an unfiltered page to learn the true total and the live ids
    DeletionCheck,
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskKind::Parse => write!(f, "parse"),
            TaskKind::DeletionCheck => write!(f, "deletion_check"),
        }
    }
}

/// One paginated request against the remote feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTask {
    pub kind: TaskKind,
    /// 1-based page number
    pub page: u32,
    pub per_page: u32,
    /// Only return posts modified after this instant
    pub modified_after: Option<NaiveDateTime>,
}

impl FetchTask {
    /// Create a parse task
    pub fn parse(page: u32, per_page: u32, modified_after: Option<NaiveDateTime>) -> Self {
        Self {
            kind: TaskKind::Parse,
            page,
            per_page,
            modified_after,
        }
    }

    /// Create a deletion check task (never filtered)
    pub fn deletion_check(page: u32, per_page: u32) -> Self {
        Self {
            kind: TaskKind::DeletionCheck,
            page,
            per_page,
            modified_after: None,
        }
    }

    pub fn is_parse(&self) -> bool {
        self.kind == TaskKind::Parse
    }

    /// Query parameters for this request
    pub fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("per_page", self.per_page.to_string()),
            ("page", self.page.to_string()),
        ];
        if let Some(ref after) = self.modified_after {
            query.push(("modified_after", format_timestamp(after)));
        }
        query
    }
}
