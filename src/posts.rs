use std::collections::BTreeSet;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::debug;

use crate::config::MAX_POST_LENGTH;
use crate::core::errors::{Result, StoreError};
use crate::core::helpers::{format_timestamp, now_millis, parse_timestamp, truncate_millis};
use crate::core::record::Record;
use crate::models::Post;

fn hashtag_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"#(\w+)").expect("Regex should compile"))
}

/// Distinct hashtags in `text`, without `#`, in first-seen order, case kept.
pub fn extract_hashtags(text: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for caps in hashtag_regex().captures_iter(text) {
        let tag = &caps[1];
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

/// Strips whitespace and one leading `#`. `None` if nothing is left.
fn normalize_tag(tag: &str) -> Option<&str> {
    let tag = tag.trim();
    let tag = tag.strip_prefix('#').unwrap_or(tag);
    (!tag.is_empty()).then_some(tag)
}

fn newest_first(mut posts: Vec<Post>) -> Vec<Post> {
    posts.sort_by(|a, b| {
        b.timestamp()
            .cmp(&a.timestamp())
            .then_with(|| b.seq.cmp(&a.seq))
    });
    posts
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostLoadStats {
    pub posts: usize,
    pub skipped_records: usize,
}

/// Every post, kept in insertion order.
#[derive(Debug, Clone, Default)]
pub struct PostStore {
    posts: Vec<Post>,
    next_seq: u64,
}

impl PostStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a post stamped with the current time.
    pub fn create(&mut self, author: &str, text: &str) -> Result<Post> {
        self.create_at(author, text, now_millis())
    }

    /// Length is checked on the raw text, then the text is trimmed and stored.
    /// The timestamp is kept to the millisecond, as in the data file.
    pub fn create_at(&mut self, author: &str, text: &str, timestamp: DateTime<Utc>) -> Result<Post> {
        if author.trim().is_empty() {
            return Err(StoreError::validation("Author cannot be empty"));
        }
        let length = text.chars().count();
        if length > MAX_POST_LENGTH {
            return Err(StoreError::validation(format!(
                "Post text cannot exceed {} characters (got {})",
                MAX_POST_LENGTH, length
            )));
        }

        let timestamp = truncate_millis(timestamp);
        let mut post = Post::new(author.to_string(), text.trim().to_string(), timestamp);
        post.seq = self.next_seq;
        self.next_seq += 1;
        self.posts.push(post.clone());
        Ok(post)
    }

    pub fn all(&self) -> Vec<Post> {
        newest_first(self.posts.clone())
    }

    /// Posts in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Post> {
        self.posts.iter()
    }

    pub fn by_author(&self, username: &str) -> Vec<Post> {
        self.filtered(|p| p.author() == username)
    }

    pub fn by_hashtag(&self, tag: &str) -> Vec<Post> {
        if normalize_tag(tag).is_none() {
            return Vec::new();
        }
        self.filtered(|p| Self::contains_hashtag(p, tag))
    }

    /// Case-insensitive substring search over post text.
    pub fn search(&self, query: &str) -> Vec<Post> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }
        self.filtered(|p| p.text().to_lowercase().contains(&query))
    }

    pub fn contains_hashtag(post: &Post, tag: &str) -> bool {
        let Some(tag) = normalize_tag(tag) else {
            return false;
        };
        let tag = tag.to_lowercase();
        post.hashtags().iter().any(|t| t.to_lowercase() == tag)
    }

    pub(crate) fn filtered<F>(&self, keep: F) -> Vec<Post>
    where
        F: Fn(&Post) -> bool,
    {
        newest_first(self.posts.iter().filter(|p| keep(p)).cloned().collect())
    }

    pub fn count(&self) -> usize {
        self.posts.len()
    }

    pub fn count_by_author(&self, username: &str) -> usize {
        self.posts.iter().filter(|p| p.author() == username).count()
    }

    /// Removes the first post equal to `post` (same author, text and timestamp).
    pub fn remove(&mut self, post: &Post) -> bool {
        match self.posts.iter().position(|p| p == post) {
            Some(pos) => {
                self.posts.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Drops every post and returns how many there were.
    pub fn clear(&mut self) -> usize {
        let removed = self.posts.len();
        self.posts.clear();
        removed
    }

    /// Every distinct hashtag in use, sorted.
    pub fn all_hashtags(&self) -> Vec<String> {
        let tags: BTreeSet<&String> = self.posts.iter().flat_map(|p| p.hashtags()).collect();
        tags.into_iter().cloned().collect()
    }

    /// Rebuilds the store from `posts` file records, in file order.
    ///
    /// The stored `hashtags` field is ignored; tags are always recomputed.
    pub fn from_records(records: &[Record]) -> (Self, PostLoadStats) {
        let mut store = Self::new();
        let mut stats = PostLoadStats::default();

        for record in records {
            let fields = (record.text("author"), record.text("text"), record.text("timestamp"));
            let (Some(author), Some(text), Some(raw_ts)) = fields else {
                stats.skipped_records += 1;
                continue;
            };
            let Some(timestamp) = parse_timestamp(raw_ts) else {
                debug!(author, timestamp = raw_ts, "skipping post with unreadable timestamp");
                stats.skipped_records += 1;
                continue;
            };
            if let Err(e) = store.create_at(author, text, timestamp) {
                debug!(author, error = %e, "skipping invalid post record");
                stats.skipped_records += 1;
            }
        }

        stats.posts = store.count();
        (store, stats)
    }

    pub fn to_records(&self) -> Vec<Record> {
        self.posts
            .iter()
            .map(|post| {
                Record::new()
                    .with_text("author", post.author())
                    .with_text("text", post.text())
                    .with_text("timestamp", format_timestamp(&post.timestamp()))
                    .with_list("hashtags", post.hashtags().iter().map(String::as_str))
            })
            .collect()
    }
}
