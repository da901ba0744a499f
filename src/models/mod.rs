#[allow(clippy::module_inception)]
pub mod models;

pub use models::{Post, Session, User, UserSummary};
