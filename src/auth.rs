use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::models::Session;

/// In-memory session tokens. Nothing here is persisted, so every token is
/// gone after a restart.
#[derive(Debug)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    ttl_hours: i64,
}

impl SessionStore {
    pub fn new(ttl_hours: i64) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl_hours,
        }
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Issues a fresh token for `username`. The caller is responsible for
    /// having authenticated the user.
    pub fn create(&self, username: &str) -> String {
        let token = Uuid::new_v4().to_string();
        let session = Session {
            username: username.to_string(),
            created_at: Utc::now(),
        };
        self.sessions().insert(token.clone(), session);
        token
    }

    /// Username bound to `token`, unless the token is unknown or expired.
    /// Expired tokens are evicted on lookup.
    pub fn username_for(&self, token: &str) -> Option<String> {
        let mut sessions = self.sessions();
        let session = sessions.get(token)?;
        let age_hours = (Utc::now() - session.created_at).num_hours();
        if age_hours >= self.ttl_hours {
            sessions.remove(token);
            return None;
        }
        Some(session.username.clone())
    }

    pub fn end(&self, token: &str) -> bool {
        match self.sessions().remove(token) {
            Some(session) => {
                info!(username = %session.username, "session ended");
                true
            }
            None => false,
        }
    }

    /// Drops every session belonging to `username`; returns how many.
    pub fn end_all_for(&self, username: &str) -> usize {
        let mut sessions = self.sessions();
        let before = sessions.len();
        sessions.retain(|_, s| s.username != username);
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_map_to_users() {
        let store = SessionStore::new(24);
        let a = store.create("alice");
        let b = store.create("alice");
        assert_ne!(a, b);
        assert!(Uuid::parse_str(&a).is_ok());
        assert_eq!(store.username_for(&a).as_deref(), Some("alice"));
        assert_eq!(store.username_for("bogus"), None);
    }

    #[test]
    fn end_session() {
        let store = SessionStore::new(24);
        let token = store.create("bob");
        assert!(store.end(&token));
        assert!(!store.end(&token));
        assert_eq!(store.username_for(&token), None);
    }

    #[test]
    fn zero_ttl_expires_immediately() {
        let store = SessionStore::new(0);
        let token = store.create("carol");
        assert_eq!(store.username_for(&token), None);
        assert!(store.is_empty());
    }

    #[test]
    fn end_all_for_user() {
        let store = SessionStore::new(24);
        store.create("alice");
        store.create("alice");
        let keep = store.create("bob");
        assert_eq!(store.end_all_for("alice"), 2);
        assert_eq!(store.len(), 1);
        assert_eq!(store.username_for(&keep).as_deref(), Some("bob"));
    }
}
