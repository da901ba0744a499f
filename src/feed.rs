//! Read-only queries that combine the user graph with the post store.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::models::Post;
use crate::posts::PostStore;
use crate::users::UserGraph;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HashtagCount {
    pub tag: String,
    pub count: usize,
}

/// The user's own posts plus posts from everyone they follow, newest first.
/// Empty for a blank or unknown username.
pub fn home_timeline(graph: &UserGraph, posts: &PostStore, username: &str) -> Vec<Post> {
    if username.trim().is_empty() || !graph.contains(username) {
        return Vec::new();
    }
    let mut authors: HashSet<String> = graph.following_of(username).into_iter().collect();
    authors.insert(username.to_string());

    posts.filtered(|p| authors.contains(p.author()))
}

/// Hashtags ranked by how many posts use them, ties broken alphabetically.
pub fn hashtag_counts(posts: &PostStore, limit: usize) -> Vec<HashtagCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for post in posts.iter() {
        for tag in post.hashtags() {
            *counts.entry(tag.as_str()).or_default() += 1;
        }
    }

    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(limit)
        .map(|(tag, count)| HashtagCount {
            tag: tag.to_string(),
            count,
        })
        .collect()
}

pub fn popular_hashtags(posts: &PostStore, limit: usize) -> Vec<String> {
    hashtag_counts(posts, limit).into_iter().map(|h| h.tag).collect()
}

/// Usernames containing `query`, ignoring case and one leading `@`.
pub fn search_users(graph: &UserGraph, query: &str) -> Vec<String> {
    let query = query.trim();
    let query = query.strip_prefix('@').unwrap_or(query).to_lowercase();
    if query.is_empty() {
        return Vec::new();
    }
    graph
        .users()
        .filter(|u| u.username.to_lowercase().contains(&query))
        .map(|u| u.username.clone())
        .collect()
}

/// Text search, or a hashtag lookup when the query starts with `#`.
pub fn search_posts(posts: &PostStore, query: &str) -> Vec<Post> {
    let query = query.trim();
    if query.starts_with('#') {
        posts.by_hashtag(query)
    } else {
        posts.search(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn texts(posts: &[Post]) -> Vec<&str> {
        posts.iter().map(|p| p.text()).collect()
    }

    #[test]
    fn timeline_includes_self_and_followees_only() {
        let mut graph = UserGraph::new();
        for name in ["alice", "bob", "carol"] {
            graph.register(name, "pw");
        }
        graph.follow("alice", "bob");

        let mut posts = PostStore::new();
        posts.create_at("bob", "hi #x", at(1)).unwrap();
        posts.create_at("carol", "not followed", at(2)).unwrap();
        posts.create_at("alice", "mine", at(3)).unwrap();

        assert_eq!(texts(&home_timeline(&graph, &posts, "alice")), vec!["mine", "hi #x"]);
        assert_eq!(texts(&home_timeline(&graph, &posts, "bob")), vec!["hi #x"]);
        assert!(home_timeline(&graph, &posts, "ghost").is_empty());
        assert!(home_timeline(&graph, &posts, "").is_empty());
    }

    #[test]
    fn ranking_breaks_ties_alphabetically() {
        let mut posts = PostStore::new();
        posts.create_at("u", "#b #c", at(0)).unwrap();
        posts.create_at("u", "#a #b", at(1)).unwrap();
        posts.create_at("u", "#a", at(2)).unwrap();

        for _ in 0..5 {
            assert_eq!(popular_hashtags(&posts, 2), vec!["a", "b"]);
        }
        assert_eq!(
            hashtag_counts(&posts, 10),
            vec![
                HashtagCount { tag: "a".into(), count: 2 },
                HashtagCount { tag: "b".into(), count: 2 },
                HashtagCount { tag: "c".into(), count: 1 },
            ]
        );
        assert!(popular_hashtags(&posts, 0).is_empty());
    }

    #[test]
    fn repeated_tag_in_one_post_counts_once() {
        let mut posts = PostStore::new();
        posts.create_at("u", "#dup #dup #dup", at(0)).unwrap();
        posts.create_at("u", "#solo", at(1)).unwrap();
        posts.create_at("u", "#solo", at(2)).unwrap();
        assert_eq!(popular_hashtags(&posts, 5), vec!["solo", "dup"]);
    }

    #[test]
    fn user_search() {
        let mut graph = UserGraph::new();
        for name in ["Alice", "malice", "bob"] {
            graph.register(name, "pw");
        }
        assert_eq!(search_users(&graph, "ALI"), vec!["Alice", "malice"]);
        assert_eq!(search_users(&graph, "@bob"), vec!["bob"]);
        assert!(search_users(&graph, "@").is_empty());
        assert!(search_users(&graph, "zzz").is_empty());
    }

    #[test]
    fn post_search_switches_on_hash() {
        let mut posts = PostStore::new();
        posts.create_at("u", "learning #rust", at(0)).unwrap();
        posts.create_at("u", "rust is neat", at(1)).unwrap();

        assert_eq!(texts(&search_posts(&posts, "#Rust")), vec!["learning #rust"]);
        assert_eq!(texts(&search_posts(&posts, "rust")), vec!["rust is neat", "learning #rust"]);
    }
}
