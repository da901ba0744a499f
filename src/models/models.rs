use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::posts::extract_hashtags;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub username: String,
    /// Opaque credential. The engine stores an argon2 PHC string here.
    pub password: String,
    pub public: bool,
}

impl User {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            public: true,
        }
    }
}

/// Read-only view of a user handed out by queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub username: String,
    pub public: bool,
    pub followers: usize,
    pub following: usize,
}

/// An immutable post. Hashtags are derived from the text when the post is built.
#[derive(Debug, Clone, Serialize)]
pub struct Post {
    author: String,
    text: String,
    timestamp: DateTime<Utc>,
    hashtags: Vec<String>,
    #[serde(skip)]
    pub(crate) seq: u64,
}

impl Post {
    pub(crate) fn new(author: String, text: String, timestamp: DateTime<Utc>) -> Self {
        let hashtags = extract_hashtags(&text);
        Self {
            author,
            text,
            timestamp,
            hashtags,
            seq: 0,
        }
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Distinct hashtags without the leading `#`, in first-seen order.
    pub fn hashtags(&self) -> &[String] {
        &self.hashtags
    }
}

impl PartialEq for Post {
    fn eq(&self, other: &Self) -> bool {
        self.author == other.author && self.text == other.text && self.timestamp == other.timestamp
    }
}

impl Eq for Post {}

#[derive(Debug, Clone)]
pub struct Session {
    pub username: String,
    pub created_at: DateTime<Utc>,
}
