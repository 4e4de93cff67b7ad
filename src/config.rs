//! Runtime configuration from the environment

use log::debug;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{LingoError, LingoResult};
use crate::runtime::DEFAULT_ADVANCE_DELAY;

pub const DB_ENV: &str = "ISLAND_LINGO_DB";
pub const LESSON_ENV: &str = "ISLAND_LINGO_LESSON";
pub const ADVANCE_MS_ENV: &str = "ISLAND_LINGO_ADVANCE_MS";

const DEFAULT_DB_PATH: &str = "island_lingo.db";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_path: PathBuf,
    pub lesson_path: Option<PathBuf>,
    pub auto_advance_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DB_PATH),
            lesson_path: None,
            auto_advance_delay: DEFAULT_ADVANCE_DELAY,
        }
    }
}

impl Config {
    /// Read the process environment, after loading `.env` if present
    pub fn from_env() -> LingoResult<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!("Loaded environment from {}", path.display());
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key lookup
    pub fn from_lookup<F>(lookup: F) -> LingoResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(path) = non_empty(DB_ENV) {
            config.database_path = PathBuf::from(path);
        }
        config.lesson_path = non_empty(LESSON_ENV).map(PathBuf::from);
        if let Some(raw) = non_empty(ADVANCE_MS_ENV) {
            let millis: u64 = raw.trim().parse().map_err(|_| {
                LingoError::Config(format!(
                    "{} must be a number of milliseconds, got '{}'",
                    ADVANCE_MS_ENV, raw
                ))
            })?;
            config.auto_advance_delay = Duration::from_millis(millis);
        }

        Ok(config)
    }
}
