use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::core::errors::{Result, StoreError};
use crate::core::record::{parse_records, render_records, ParsedRecords, Record};
use crate::engine::Engine;
use crate::posts::{PostLoadStats, PostStore};
use crate::users::{GraphLoadStats, UserGraph};

/// What `Engine::load_all` found on disk and what it had to leave behind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub users: usize,
    pub posts: usize,
    pub skipped_user_records: usize,
    pub skipped_post_records: usize,
    pub dropped_references: usize,
    pub repaired_edges: usize,
    pub upgraded_passwords: usize,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.skipped_user_records == 0
            && self.skipped_post_records == 0
            && self.dropped_references == 0
            && self.repaired_edges == 0
    }
}

/// Reads and parses a record file. A missing file reads as an empty array.
fn read_records(path: &Path) -> Result<(Vec<Record>, usize)> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!(path = %path.display(), "data file does not exist, starting empty");
            return Ok((Vec::new(), 0));
        }
        Err(e) => return Err(StoreError::io(path, e)),
    };

    let ParsedRecords {
        records,
        skipped,
        rejected,
    } = parse_records(&content);
    if rejected {
        warn!(path = %path.display(), "data file is not a record array, ignoring its content");
    }
    if skipped > 0 {
        warn!(path = %path.display(), skipped, "skipped malformed records");
    }
    Ok((records, skipped + usize::from(rejected)))
}

fn write_records(path: &Path, records: &[Record]) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if !dir.exists() {
            fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;
            info!(dir = %dir.display(), "created data directory");
        }
    }
    fs::write(path, render_records(records)).map_err(|e| StoreError::io(path, e))
}

pub fn load_users(path: &Path) -> Result<(UserGraph, GraphLoadStats)> {
    let (records, skipped) = read_records(path)?;
    let (graph, mut stats) = UserGraph::from_records(&records);
    stats.skipped_records += skipped;
    if stats.dropped_references > 0 || stats.repaired_edges > 0 {
        warn!(
            path = %path.display(),
            dropped = stats.dropped_references,
            repaired = stats.repaired_edges,
            "follow edges did not match the user set"
        );
    }
    info!(path = %path.display(), users = stats.users, "loaded users");
    Ok((graph, stats))
}

pub fn save_users(path: &Path, graph: &UserGraph) -> Result<()> {
    write_records(path, &graph.to_records())?;
    info!(path = %path.display(), users = graph.len(), "saved users");
    Ok(())
}

pub fn load_posts(path: &Path) -> Result<(PostStore, PostLoadStats)> {
    let (records, skipped) = read_records(path)?;
    let (store, mut stats) = PostStore::from_records(&records);
    stats.skipped_records += skipped;
    info!(path = %path.display(), posts = stats.posts, "loaded posts");
    Ok((store, stats))
}

pub fn save_posts(path: &Path, posts: &PostStore) -> Result<()> {
    write_records(path, &posts.to_records())?;
    info!(path = %path.display(), posts = posts.count(), "saved posts");
    Ok(())
}

/// Registers a few demo accounts with posts and follows, skipping whatever
/// already exists.
pub fn init_demo_data(engine: &Engine) -> Result<()> {
    let demo = [
        ("test", "test", "This is my first post on the board! #hello"),
        ("alice", "alice", "Welcome to my board! Excited to share thoughts here. #hello #rust"),
        ("bob", "bob", "Hey everyone! Just joined, looking forward to connecting. #hello"),
    ];

    for (username, password, text) in demo {
        if engine.register(username, password) {
            engine.create_post(username, text)?;
        }
    }
    engine.follow("test", "bob");
    engine.follow("alice", "bob");
    engine.follow("bob", "alice");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_files_load_empty() {
        let dir = tempfile::tempdir().unwrap();
        let (graph, stats) = load_users(&dir.path().join("users.json")).unwrap();
        assert!(graph.is_empty());
        assert_eq!(stats, GraphLoadStats::default());

        let (posts, stats) = load_posts(&dir.path().join("posts.json")).unwrap();
        assert_eq!(posts.count(), 0);
        assert_eq!(stats, PostLoadStats::default());
    }

    #[test]
    fn empty_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        fs::write(&path, "").unwrap();
        let (graph, stats) = load_users(&path).unwrap();
        assert!(graph.is_empty());
        assert_eq!(stats.skipped_records, 0);
    }

    #[test]
    fn non_array_file_counts_as_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("posts.json");
        fs::write(&path, "{\"author\": \"bob\"}").unwrap();
        let (posts, stats) = load_posts(&path).unwrap();
        assert_eq!(posts.count(), 0);
        assert_eq!(stats.skipped_records, 1);
    }

    #[test]
    fn save_creates_directory_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("users.json");

        let mut graph = UserGraph::new();
        graph.register("alice", "a");
        graph.register("bob", "b");
        graph.follow("alice", "bob");
        save_users(&path, &graph).unwrap();

        let (loaded, stats) = load_users(&path).unwrap();
        assert_eq!(stats.users, 2);
        assert!(loaded.is_following("alice", "bob"));
        assert_eq!(loaded.followers_of("bob"), vec!["alice"]);
    }

    #[test]
    fn unreadable_path_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be read as a file.
        let err = load_users(dir.path()).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));

        let err = save_posts(dir.path(), &PostStore::new()).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }
}
