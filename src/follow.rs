use tracing::debug;

use crate::users::{UserGraph, UserId};

impl UserGraph {
    /// Adds the edge `follower -> followee` on both ends.
    pub fn follow(&mut self, follower: &str, followee: &str) -> bool {
        let Some((from, to)) = self.edge_ends(follower, followee) else {
            return false;
        };
        if from == to {
            debug!(user = follower, "rejected self-follow");
            return false;
        }
        if self.node(from).following.contains(&to) {
            return false;
        }
        self.node_mut(from).following.push(to);
        self.node_mut(to).followers.push(from);
        true
    }

    /// Removes the edge `follower -> followee` from both ends.
    pub fn unfollow(&mut self, follower: &str, followee: &str) -> bool {
        let Some((from, to)) = self.edge_ends(follower, followee) else {
            return false;
        };
        let following = &mut self.node_mut(from).following;
        let Some(pos) = following.iter().position(|id| *id == to) else {
            return false;
        };
        following.remove(pos);
        self.node_mut(to).followers.retain(|id| *id != from);
        true
    }

    pub fn is_following(&self, follower: &str, followee: &str) -> bool {
        self.edge_ends(follower, followee)
            .map(|(from, to)| self.node(from).following.contains(&to))
            .unwrap_or(false)
    }

    /// Usernames following `username`, oldest edge first.
    pub fn followers_of(&self, username: &str) -> Vec<String> {
        self.id_of(username)
            .map(|id| self.names(&self.node(id).followers))
            .unwrap_or_default()
    }

    /// Usernames `username` follows, oldest edge first.
    pub fn following_of(&self, username: &str) -> Vec<String> {
        self.id_of(username)
            .map(|id| self.names(&self.node(id).following))
            .unwrap_or_default()
    }

    /// Number of directed follow edges.
    pub fn edge_count(&self) -> usize {
        self.nodes.iter().map(|n| n.following.len()).sum()
    }

    /// Checks `a in b.followers <=> b in a.following` for every pair.
    pub fn is_symmetric(&self) -> bool {
        self.nodes.iter().enumerate().all(|(i, node)| {
            let me = UserId(i);
            node.following
                .iter()
                .all(|to| *to != me && self.node(*to).followers.contains(&me))
                && node
                    .followers
                    .iter()
                    .all(|from| *from != me && self.node(*from).following.contains(&me))
        })
    }

    fn edge_ends(&self, follower: &str, followee: &str) -> Option<(UserId, UserId)> {
        Some((self.id_of(follower)?, self.id_of(followee)?))
    }

    fn names(&self, ids: &[UserId]) -> Vec<String> {
        ids.iter().map(|id| self.username(*id).to_string()).collect()
    }
}
