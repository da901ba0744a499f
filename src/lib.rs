//! In-memory social graph and post store with flat-file persistence.
//!
//! [`Engine`] is the entry point: it owns the user graph, the post store and
//! the session table, and saves/loads them as two record files in a data
//! directory.

pub mod auth;
pub mod config;
pub mod core;
pub mod engine;
pub mod feed;
pub mod follow;
pub mod models;
pub mod posts;
pub mod users;

pub use crate::config::Config;
pub use crate::core::db::LoadReport;
pub use crate::core::errors::{Result, StoreError};
pub use crate::engine::Engine;
pub use crate::feed::HashtagCount;
pub use crate::models::{Post, User, UserSummary};
pub use crate::posts::PostStore;
pub use crate::users::UserGraph;
