//! Word extraction
//!
//! Turns the rendered HTML of a post into a word-frequency list sorted by
//! word. Markup is stripped with `scraper`; `<script>` and `<style>` bodies are
//! skipped. Each whitespace-separated token is lowercased and filtered down
//! to letters (including German umlauts), digits, `-`, `:` and `.`.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use scraper::Html;

use crate::models::WordCount;

struct Patterns {
    /// Inline emphasis that splits a word, e.g. `<strong>V</strong>olatility`
    strong: Regex,
    span_open: Regex,
    span_close: Regex,
    bold_seam: Regex,
    leading: Regex,
    disallowed: Regex,
    inner_dot: Regex,
    pieces: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        strong: Regex::new(r"</?strong>").expect("valid regex"),
        span_open: Regex::new(r"<span.*?>").expect("valid regex"),
        span_close: Regex::new(r"</span>").expect("valid regex"),
        bold_seam: Regex::new(r"</b><b>").expect("valid regex"),
        leading: Regex::new(r"^[^a-zäöüß]+").expect("valid regex"),
        disallowed: Regex::new(r"[^a-zäöüß\-:0-9.]").expect("valid regex"),
        inner_dot: Regex::new(r"^.+\..+").expect("valid regex"),
        pieces: Regex::new(r"[a-zäöüß:0-9.]{2,}-|[a-zäöüß:0-9.\-]+").expect("valid regex"),
    })
}

/// Count the words in rendered post content
///
/// The result is sorted by word.
pub fn word_counts(html: &str) -> Vec<WordCount> {
    let text = extract_text(html);

    let mut counts: BTreeMap<String, u32> = BTreeMap::new();
    for token in text.split_whitespace() {
        for word in filter_word(token) {
            *counts.entry(word).or_insert(0) += 1;
        }
    }

    counts.into_iter().collect()
}

/// Visible text of an HTML fragment, one space between text nodes
pub fn extract_text(html: &str) -> String {
    let p = patterns();

    // Glue split words back together before the parser sees them
    let html = p.strong.replace_all(html, "");
    let html = p.span_open.replace_all(&html, "<b>");
    let html = p.span_close.replace_all(&html, "</b>");
    let html = p.bold_seam.replace_all(&html, "");

    let fragment = Html::parse_fragment(&html);
    let mut chunks: Vec<&str> = Vec::new();

    for node in fragment.tree.root().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };

        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| matches!(el.name(), "script" | "style"))
        });
        if hidden {
            continue;
        }

        let trimmed = text.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed);
        }
    }

    chunks.join(" ")
}

/// Normalize one token into zero or more words
fn filter_word(token: &str) -> Vec<String> {
    let p = patterns();

    let lower = token.to_lowercase();
    let stripped = p.leading.replace(&lower, "");
    let mut word = p.disallowed.replace_all(&stripped, "").into_owned();

    // Abbreviations like "z.b." keep their trailing dot
    if !p.inner_dot.is_match(&word) && word.ends_with('.') {
        word.pop();
    }

    p.pieces
        .find_iter(&word)
        .map(|m| {
            let piece = m.as_str();
            piece.strip_suffix('-').unwrap_or(piece).to_string()
        })
        .filter(|piece| !piece.is_empty())
        .collect()
}
