use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{error, info, warn};

use crate::auth::SessionStore;
use crate::config::Config;
use crate::core::db::{self, LoadReport};
use crate::core::errors::{Result, StoreError};
use crate::core::helpers::{hash_password, is_password_hash, verify_password};
use crate::feed::{self, HashtagCount};
use crate::models::{Post, UserSummary};
use crate::posts::PostStore;
use crate::users::UserGraph;

/// The engine behind the web layer: users, follows, posts, sessions and
/// their persistence.
///
/// The graph and the post store each sit behind their own lock. Whenever
/// both are needed the graph lock is taken first.
#[derive(Debug)]
pub struct Engine {
    config: Config,
    graph: RwLock<UserGraph>,
    posts: RwLock<PostStore>,
    sessions: SessionStore,
}

impl Engine {
    /// An empty engine. Nothing is read from disk.
    pub fn new(config: Config) -> Self {
        let sessions = SessionStore::new(config.session_ttl_hours);
        Self {
            config,
            graph: RwLock::new(UserGraph::new()),
            posts: RwLock::new(PostStore::new()),
            sessions,
        }
    }

    /// Builds an engine and loads the data directory. A failed load is
    /// logged and leaves the engine empty but usable.
    pub fn open(config: Config) -> Self {
        Self::open_with_report(config).0
    }

    /// Like [`Engine::open`], also returning what the load found. The report
    /// is `None` when the data could not be read.
    pub fn open_with_report(config: Config) -> (Self, Option<LoadReport>) {
        let engine = Self::new(config);
        let report = match engine.load_all() {
            Ok(report) => {
                if !report.is_clean() {
                    warn!(?report, "data loaded with problems");
                }
                Some(report)
            }
            Err(e) => {
                error!(error = %e, "failed to load data, starting empty");
                None
            }
        };
        (engine, report)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn graph(&self) -> RwLockReadGuard<'_, UserGraph> {
        self.graph.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn graph_mut(&self) -> RwLockWriteGuard<'_, UserGraph> {
        self.graph.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn posts(&self) -> RwLockReadGuard<'_, PostStore> {
        self.posts.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn posts_mut(&self) -> RwLockWriteGuard<'_, PostStore> {
        self.posts.write().unwrap_or_else(PoisonError::into_inner)
    }

    // === Users ===

    /// Registers a user, storing an argon2 hash of the password.
    pub fn register(&self, username: &str, password: &str) -> bool {
        if username.trim().is_empty() || password.is_empty() || self.graph().contains(username) {
            return false;
        }
        let hash = match hash_password(password, self.config.hash_cost) {
            Ok(hash) => hash,
            Err(e) => {
                warn!(username, error = %e, "could not hash password");
                return false;
            }
        };

        let created = self.graph_mut().register(username, &hash);
        if created {
            info!(username, "registered user");
            self.autosave_users();
        }
        created
    }

    pub fn authenticate(&self, username: &str, password: &str) -> bool {
        let stored = self.graph().get(username).map(|u| u.password.clone());
        stored.is_some_and(|hash| verify_password(password, &hash))
    }

    /// Replaces a user's password after checking the current one. Every open
    /// session of that user is ended.
    pub fn change_password(&self, username: &str, current: &str, new_password: &str) -> bool {
        if new_password.is_empty() || !self.authenticate(username, current) {
            return false;
        }
        let hash = match hash_password(new_password, self.config.hash_cost) {
            Ok(hash) => hash,
            Err(e) => {
                warn!(username, error = %e, "could not hash password");
                return false;
            }
        };

        let changed = self.graph_mut().set_password(username, hash);
        if changed {
            let ended = self.sessions.end_all_for(username);
            info!(username, ended, "password changed");
            self.autosave_users();
        }
        changed
    }

    pub fn user_summary(&self, username: &str) -> Option<UserSummary> {
        self.graph().summary(username)
    }

    pub fn set_visibility(&self, username: &str, public: bool) -> bool {
        self.graph_mut().set_visibility(username, public)
    }

    pub fn user_count(&self) -> usize {
        self.graph().len()
    }

    // === Sessions ===

    /// Issues a session token for an existing user.
    pub fn create_session(&self, username: &str) -> Option<String> {
        if !self.graph().contains(username) {
            return None;
        }
        Some(self.sessions.create(username))
    }

    /// Authenticates and, on success, issues a session token.
    pub fn login(&self, username: &str, password: &str) -> Option<String> {
        if !self.authenticate(username, password) {
            info!(username, "failed login");
            return None;
        }
        self.create_session(username)
    }

    pub fn session_user(&self, token: &str) -> Option<String> {
        self.sessions.username_for(token)
    }

    pub fn end_session(&self, token: &str) -> bool {
        self.sessions.end(token)
    }

    // === Follows ===

    pub fn follow(&self, follower: &str, followee: &str) -> bool {
        let done = self.graph_mut().follow(follower, followee);
        if done {
            info!(follower, followee, "follow");
            self.autosave_users();
        }
        done
    }

    pub fn unfollow(&self, follower: &str, followee: &str) -> bool {
        let done = self.graph_mut().unfollow(follower, followee);
        if done {
            info!(follower, followee, "unfollow");
            self.autosave_users();
        }
        done
    }

    pub fn is_following(&self, follower: &str, followee: &str) -> bool {
        self.graph().is_following(follower, followee)
    }

    pub fn followers_of(&self, username: &str) -> Vec<String> {
        self.graph().followers_of(username)
    }

    pub fn following_of(&self, username: &str) -> Vec<String> {
        self.graph().following_of(username)
    }

    // === Posts ===

    /// Posts on behalf of a registered user. Blank text is rejected here even
    /// though the post store itself accepts it.
    pub fn create_post(&self, author: &str, text: &str) -> Result<Post> {
        if author.trim().is_empty() {
            return Err(StoreError::validation("Author cannot be empty"));
        }
        if text.trim().is_empty() {
            return Err(StoreError::validation("Post text cannot be empty"));
        }
        if !self.graph().contains(author) {
            warn!(author, "post attempted by unknown user");
            return Err(StoreError::UnknownUser(author.to_string()));
        }

        let post = self.posts_mut().create(author, text)?;
        info!(author, hashtags = post.hashtags().len(), "created post");
        self.autosave_posts();
        Ok(post)
    }

    pub fn posts_by_author(&self, username: &str) -> Vec<Post> {
        self.posts().by_author(username)
    }

    pub fn posts_by_hashtag(&self, tag: &str) -> Vec<Post> {
        self.posts().by_hashtag(tag)
    }

    pub fn all_posts(&self) -> Vec<Post> {
        self.posts().all()
    }

    pub fn post_count(&self) -> usize {
        self.posts().count()
    }

    pub fn post_count_by_author(&self, username: &str) -> usize {
        self.posts().count_by_author(username)
    }

    pub fn remove_post(&self, post: &Post) -> bool {
        let removed = self.posts_mut().remove(post);
        if removed {
            info!(author = post.author(), "removed post");
            self.autosave_posts();
        }
        removed
    }

    /// Administrative wipe of every post.
    pub fn clear_posts(&self) -> usize {
        let removed = self.posts_mut().clear();
        info!(removed, "cleared all posts");
        self.autosave_posts();
        removed
    }

    // === Queries ===

    pub fn home_timeline(&self, username: &str) -> Vec<Post> {
        let graph = self.graph();
        let posts = self.posts();
        feed::home_timeline(&graph, &posts, username)
    }

    pub fn popular_hashtags(&self, limit: usize) -> Vec<String> {
        feed::popular_hashtags(&self.posts(), limit)
    }

    pub fn hashtag_counts(&self, limit: usize) -> Vec<HashtagCount> {
        feed::hashtag_counts(&self.posts(), limit)
    }

    /// Every distinct hashtag in use, sorted.
    pub fn all_hashtags(&self) -> Vec<String> {
        self.posts().all_hashtags()
    }

    pub fn search_users(&self, query: &str) -> Vec<String> {
        feed::search_users(&self.graph(), query)
    }

    pub fn search_posts(&self, query: &str) -> Vec<Post> {
        feed::search_posts(&self.posts(), query)
    }

    /// Copy of the current graph, for inspection.
    pub fn graph_snapshot(&self) -> UserGraph {
        self.graph().clone()
    }

    /// Copy of the current post store, for inspection.
    pub fn posts_snapshot(&self) -> PostStore {
        self.posts().clone()
    }

    // === Persistence ===

    pub fn save_users(&self) -> Result<()> {
        db::save_users(&self.config.users_path(), &self.graph())
    }

    pub fn save_posts(&self) -> Result<()> {
        db::save_posts(&self.config.posts_path(), &self.posts())
    }

    /// Rewrites both data files from the in-memory state.
    pub fn save_all(&self) -> Result<()> {
        let graph = self.graph();
        let posts = self.posts();
        db::save_users(&self.config.users_path(), &graph)?;
        db::save_posts(&self.config.posts_path(), &posts)
    }

    /// Replaces the in-memory state with the data directory's content.
    ///
    /// Both files are read and parsed before anything is swapped in, so a
    /// failed load leaves the current state untouched. Plaintext passwords
    /// from older files are replaced with hashes.
    pub fn load_all(&self) -> Result<LoadReport> {
        let (mut graph, user_stats) = db::load_users(&self.config.users_path())?;
        let (posts, post_stats) = db::load_posts(&self.config.posts_path())?;
        let upgraded = self.upgrade_legacy_passwords(&mut graph)?;

        let report = LoadReport {
            users: user_stats.users,
            posts: post_stats.posts,
            skipped_user_records: user_stats.skipped_records,
            skipped_post_records: post_stats.skipped_records,
            dropped_references: user_stats.dropped_references,
            repaired_edges: user_stats.repaired_edges,
            upgraded_passwords: upgraded,
        };

        let mut graph_slot = self.graph_mut();
        let mut posts_slot = self.posts_mut();
        *graph_slot = graph;
        *posts_slot = posts;
        drop(posts_slot);
        drop(graph_slot);

        info!(users = report.users, posts = report.posts, "loaded data");
        if upgraded > 0 {
            self.autosave_users();
        }
        Ok(report)
    }

    fn upgrade_legacy_passwords(&self, graph: &mut UserGraph) -> Result<usize> {
        let legacy: Vec<(String, String)> = graph
            .users()
            .filter(|u| !is_password_hash(&u.password))
            .map(|u| (u.username.clone(), u.password.clone()))
            .collect();
        for (username, plaintext) in &legacy {
            let hash = hash_password(plaintext, self.config.hash_cost)?;
            graph.set_password(username, hash);
        }
        if !legacy.is_empty() {
            warn!(count = legacy.len(), "replaced plaintext passwords with hashes");
        }
        Ok(legacy.len())
    }

    fn autosave_users(&self) {
        if self.config.autosave {
            if let Err(e) = self.save_users() {
                error!(error = %e, "autosave of users failed");
            }
        }
    }

    fn autosave_posts(&self) {
        if self.config.autosave {
            if let Err(e) = self.save_posts() {
                error!(error = %e, "autosave of posts failed");
            }
        }
    }
}
