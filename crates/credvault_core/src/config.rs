//! Runtime configuration for embedders and the CLI.
//!
//! Values come from `CREDVAULT_*` environment variables. Lookups go through a
//! caller-supplied function so tests never touch the process environment.

use crate::identity::StaticIdentity;
use crate::logging::default_log_level;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const ENV_DB_PATH: &str = "CREDVAULT_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "CREDVAULT_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "CREDVAULT_LOG_DIR";
pub const ENV_USER: &str = "CREDVAULT_USER";

/// Resolved core settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Vault file. `None` means an in-memory database.
    pub db_path: Option<PathBuf>,
    pub log_level: String,
    /// Log directory. `None` disables file logging.
    pub log_dir: Option<PathBuf>,
    /// Acting user. `None` runs with a system identity.
    pub user_id: Option<String>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            log_level: default_log_level().to_string(),
            log_dir: None,
            user_id: None,
        }
    }
}

impl CoreConfig {
    /// Builds config from `lookup`. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();
        Self {
            db_path: read(ENV_DB_PATH).map(PathBuf::from),
            log_level: read(ENV_LOG_LEVEL).unwrap_or(defaults.log_level),
            log_dir: read(ENV_LOG_DIR).map(PathBuf::from),
            user_id: read(ENV_USER),
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Identity matching `user_id`.
    pub fn identity(&self) -> StaticIdentity {
        match &self.user_id {
            Some(user_id) => StaticIdentity::user(user_id.clone()),
            None => StaticIdentity::system(),
        }
    }
}
