use std::path::{Path, PathBuf};

pub const MAX_POST_LENGTH: usize = 280;
pub const USERS_FILE: &str = "users.json";
pub const POSTS_FILE: &str = "posts.json";
pub const DEFAULT_DATA_DIR: &str = "data";

/// On-disk timestamp layout, e.g. `2024-03-01T12:30:45.123+0000`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";

pub fn token_expiration_hours() -> i64 {
    std::env::var("PERCH_SESSION_HOURS")
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(24)
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

fn env_u32(name: &str, default: u32) -> u32 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(default)
}

/// Argon2 cost parameters used when hashing new passwords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashCost {
    pub memory_kib: u32,
    pub iterations: u32,
}

impl HashCost {
    /// Smallest cost argon2 accepts. Only meant for tests.
    pub const fn cheap() -> Self {
        Self {
            memory_kib: argon2::Params::MIN_M_COST,
            iterations: argon2::Params::MIN_T_COST,
        }
    }
}

impl Default for HashCost {
    fn default() -> Self {
        Self {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub session_ttl_hours: i64,
    /// Persist the affected file after every successful mutation.
    pub autosave: bool,
    pub hash_cost: HashCost,
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = HashCost::default();
        Self {
            data_dir: std::env::var("PERCH_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR)),
            session_ttl_hours: token_expiration_hours(),
            autosave: env_flag("PERCH_AUTOSAVE"),
            hash_cost: HashCost {
                memory_kib: env_u32("PERCH_HASH_MEMORY_KIB", defaults.memory_kib),
                iterations: env_u32("PERCH_HASH_ITERATIONS", defaults.iterations),
            },
        }
    }

    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn autosave(mut self, on: bool) -> Self {
        self.autosave = on;
        self
    }

    pub fn hash_cost(mut self, cost: HashCost) -> Self {
        self.hash_cost = cost;
        self
    }

    pub fn users_path(&self) -> PathBuf {
        self.data_dir.join(USERS_FILE)
    }

    pub fn posts_path(&self) -> PathBuf {
        self.data_dir.join(POSTS_FILE)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            session_ttl_hours: 24,
            autosave: false,
            hash_cost: HashCost::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_live_under_data_dir() {
        let config = Config::with_data_dir("/tmp/perch");
        assert_eq!(config.users_path(), PathBuf::from("/tmp/perch/users.json"));
        assert_eq!(config.posts_path(), PathBuf::from("/tmp/perch/posts.json"));
        assert!(!config.autosave);
    }

    #[test]
    fn builder_overrides() {
        let config = Config::with_data_dir("d").autosave(true).hash_cost(HashCost::cheap());
        assert!(config.autosave);
        assert_eq!(config.hash_cost, HashCost::cheap());
    }
}
