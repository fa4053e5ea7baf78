//! Runtime configuration
//!
//! Everything is read from the environment once at startup.

use std::path::PathBuf;

use crate::nutrition::{DEFAULT_STATISTICS_DAYS, MAX_STATISTICS_DAYS};

/// Process configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: PathBuf,
    /// Number of past days covered by the statistics window
    pub statistics_days: u32,
    /// Owner used by tools when a call omits `user_id`
    pub default_user_id: Option<i64>,
}

impl Config {
    /// Build the configuration from `RATION_*` environment variables
    pub fn from_env() -> Self {
        let statistics_days = statistics_days(std::env::var("RATION_STATS_DAYS").ok().as_deref());

        let default_user_id = std::env::var("RATION_DEFAULT_USER")
            .ok()
            .and_then(|v| v.trim().parse::<i64>().ok());

        Self {
            database_path: database_path(),
            statistics_days,
            default_user_id,
        }
    }
}

/// Window length in days, falling back to the default when unset, zero,
/// unparsable or above `MAX_STATISTICS_DAYS`
fn statistics_days(value: Option<&str>) -> u32 {
    value
        .and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|d| (1..=MAX_STATISTICS_DAYS).contains(d))
        .unwrap_or(DEFAULT_STATISTICS_DAYS)
}

/// Database path from `RATION_DATABASE_PATH`, or `<project>/data/ration.db`
fn database_path() -> PathBuf {
    std::env::var("RATION_DATABASE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let mut path = std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|p| p.to_path_buf()))
                .unwrap_or_else(|| PathBuf::from("."));

            // Go up from target/release or target/debug to project root
            if path.ends_with("release") || path.ends_with("debug") {
                if let Some(grandparent) = path.parent().and_then(|p| p.parent()) {
                    path = grandparent.to_path_buf();
                }
            }

            path.push("data");
            path.push("ration.db");
            path
        })
}
