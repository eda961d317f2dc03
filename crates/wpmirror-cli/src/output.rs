//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use wpmirror_core::Post;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// One fetched page as shown by `probe`
#[derive(Debug)]
pub struct PageSummary<'a> {
    pub url: &'a str,
    pub page: u32,
    pub total_posts: u64,
    pub total_pages: u32,
    pub posts: &'a [Post],
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print a fetched page
    pub fn print_page(&self, summary: &PageSummary<'_>) {
        match self.format {
            OutputFormat::Human => {
                println!("Remote:      {}", summary.url);
                println!(
                    "Page:        {} of {} ({} post(s) total)",
                    summary.page, summary.total_pages, summary.total_posts
                );
                println!();

                if summary.posts.is_empty() {
                    println!("No posts on this page.");
                    return;
                }
                for post in summary.posts {
                    println!(
                        "{:>8} | {} | {} | {} word(s)",
                        post.id(),
                        post.modified(),
                        truncate(post.title(), 40),
                        post.words().len()
                    );
                    println!("         | {}", top_words(post, 5));
                }
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({
                        "url": summary.url,
                        "page": summary.page,
                        "total_posts": summary.total_posts,
                        "total_pages": summary.total_pages,
                        "posts": summary.posts,
                    })
                );
            }
            OutputFormat::Quiet => {
                for post in summary.posts {
                    println!("{}", post.id());
                }
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

/// Most frequent words of a post, `word×count` separated by commas
fn top_words(post: &Post, limit: usize) -> String {
    let mut words: Vec<_> = post.words().iter().collect();
    words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    words
        .into_iter()
        .take(limit)
        .map(|(word, count)| format!("{}×{}", word, count))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Truncate a string to max characters, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}
