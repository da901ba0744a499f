use std::collections::HashMap;

use tracing::debug;

use crate::core::record::Record;
use crate::models::{User, UserSummary};

/// Stable index of a user node inside a [`UserGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub(crate) usize);

#[derive(Debug, Clone)]
pub(crate) struct UserNode {
    pub(crate) user: User,
    pub(crate) followers: Vec<UserId>,
    pub(crate) following: Vec<UserId>,
}

impl UserNode {
    fn new(user: User) -> Self {
        Self {
            user,
            followers: Vec::new(),
            following: Vec::new(),
        }
    }
}

/// All users and the follow edges between them.
///
/// Nodes are never removed, so a `UserId` stays valid for the life of the
/// graph. Edges are adjacency lists of ids kept in insertion order, and every
/// edge is stored on both ends.
#[derive(Debug, Clone, Default)]
pub struct UserGraph {
    pub(crate) nodes: Vec<UserNode>,
    index: HashMap<String, UserId>,
}

/// What a load from records kept and what it had to drop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphLoadStats {
    pub users: usize,
    pub skipped_records: usize,
    pub dropped_references: usize,
    pub repaired_edges: usize,
}

impl UserGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a public user with no edges. Fails on an empty username or
    /// password, or when the username is taken.
    pub fn register(&mut self, username: &str, password: &str) -> bool {
        if username.trim().is_empty() || password.is_empty() {
            debug!(username, "rejected registration with empty credentials");
            return false;
        }
        if self.index.contains_key(username) {
            debug!(username, "rejected registration of existing username");
            return false;
        }
        self.insert(User::new(username, password));
        true
    }

    fn insert(&mut self, user: User) -> UserId {
        let id = UserId(self.nodes.len());
        self.index.insert(user.username.clone(), id);
        self.nodes.push(UserNode::new(user));
        id
    }

    pub fn id_of(&self, username: &str) -> Option<UserId> {
        self.index.get(username).copied()
    }

    pub(crate) fn node(&self, id: UserId) -> &UserNode {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: UserId) -> &mut UserNode {
        &mut self.nodes[id.0]
    }

    pub(crate) fn username(&self, id: UserId) -> &str {
        &self.node(id).user.username
    }

    pub fn contains(&self, username: &str) -> bool {
        self.index.contains_key(username)
    }

    pub fn get(&self, username: &str) -> Option<&User> {
        self.id_of(username).map(|id| &self.node(id).user)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Usernames in registration order.
    pub fn usernames(&self) -> Vec<String> {
        self.nodes.iter().map(|n| n.user.username.clone()).collect()
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.nodes.iter().map(|n| &n.user)
    }

    pub fn summary(&self, username: &str) -> Option<UserSummary> {
        let node = self.node(self.id_of(username)?);
        Some(UserSummary {
            username: node.user.username.clone(),
            public: node.user.public,
            followers: node.followers.len(),
            following: node.following.len(),
        })
    }

    pub fn set_visibility(&mut self, username: &str, public: bool) -> bool {
        match self.id_of(username) {
            Some(id) => {
                self.node_mut(id).user.public = public;
                true
            }
            None => false,
        }
    }

    pub fn set_password(&mut self, username: &str, password: String) -> bool {
        match self.id_of(username) {
            Some(id) if !password.is_empty() => {
                self.node_mut(id).user.password = password;
                true
            }
            _ => false,
        }
    }

    /// Rebuilds a graph from `users` file records.
    ///
    /// Pass one creates every node so that pass two can resolve edges that
    /// point forward or backward in the file. Names that do not resolve (and
    /// self references) are dropped and counted. A final pass adds any missing
    /// mirror edge, so the graph is symmetric even when the file was not.
    pub fn from_records(records: &[Record]) -> (Self, GraphLoadStats) {
        let mut graph = Self::new();
        let mut stats = GraphLoadStats::default();
        let mut accepted = Vec::with_capacity(records.len());

        for record in records {
            let (Some(username), Some(password)) = (record.text("username"), record.text("password"))
            else {
                stats.skipped_records += 1;
                continue;
            };
            if username.trim().is_empty() || password.is_empty() || graph.contains(username) {
                debug!(username, "skipping unusable user record");
                stats.skipped_records += 1;
                continue;
            }
            let id = graph.insert(User::new(username, password));
            accepted.push((id, record));
        }

        for (id, record) in &accepted {
            for name in record.list("following").unwrap_or_default() {
                match graph.id_of(name) {
                    Some(target) if target != *id => {
                        let node = graph.node_mut(*id);
                        if !node.following.contains(&target) {
                            node.following.push(target);
                        }
                    }
                    _ => {
                        debug!(user = graph.username(*id), name = %name, "dropping following reference");
                        stats.dropped_references += 1;
                    }
                }
            }
            for name in record.list("followers").unwrap_or_default() {
                match graph.id_of(name) {
                    Some(source) if source != *id => {
                        let node = graph.node_mut(*id);
                        if !node.followers.contains(&source) {
                            node.followers.push(source);
                        }
                    }
                    _ => {
                        debug!(user = graph.username(*id), name = %name, "dropping follower reference");
                        stats.dropped_references += 1;
                    }
                }
            }
        }

        stats.repaired_edges = graph.reconcile();
        stats.users = graph.len();
        (graph, stats)
    }

    /// Adds the missing side of any one-sided edge. Returns how many were added.
    fn reconcile(&mut self) -> usize {
        let mut repaired = 0;
        for i in 0..self.nodes.len() {
            let id = UserId(i);
            for target in self.nodes[i].following.clone() {
                let node = self.node_mut(target);
                if !node.followers.contains(&id) {
                    node.followers.push(id);
                    repaired += 1;
                }
            }
            for source in self.nodes[i].followers.clone() {
                let node = self.node_mut(source);
                if !node.following.contains(&id) {
                    node.following.push(id);
                    repaired += 1;
                }
            }
        }
        repaired
    }

    /// One record per user, in registration order.
    pub fn to_records(&self) -> Vec<Record> {
        self.nodes
            .iter()
            .map(|node| {
                Record::new()
                    .with_text("username", node.user.username.as_str())
                    .with_text("password", node.user.password.as_str())
                    .with_list("followers", node.followers.iter().map(|id| self.username(*id)))
                    .with_list("following", node.following.iter().map(|id| self.username(*id)))
            })
            .collect()
    }
}
