//! Ration Status Tool
//!
//! Provides runtime status information about the Ration service.

use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use sysinfo::{Pid, ProcessesToUpdate, System};

use crate::build_info::BuildInfo;
use crate::config::Config;

/// Usage guide for AI assistants
pub const USAGE_INSTRUCTIONS: &str = r#"
# Ration Usage Instructions

Ration tracks what a user eats. Everything is derived from four records:

1. **Groceries** - base ingredients with proteins, fats and carbohydrates in grams per 100 g
2. **Dishes** - named sets of groceries with gram amounts
3. **Diets** - meal plans: dishes scheduled at a time of day ("HH:MM") with a gram amount
4. **Meals** - a gram amount of a dish eaten at a moment in time

Calories are never stored. They are computed on every read as
`proteins * 4.1 + fats * 9.29 + carbohydrates * 4.2`.

Every tool acts on behalf of one user (`user_id`, or the configured default).
Records owned by another user are reported as not found.

---

## Groceries

- `add_grocery` without `user_id` adds to the shared catalog, visible to everyone.
- `list_groceries` returns the user's personal catalog and the shared one side by side.
- `delete_grocery` is refused while any dish uses the grocery.

## Dishes

- `create_dish` / `update_dish` take `components: [{grocery_id, amount_grams}]`.
- Updating `components` replaces the whole list.
- Dish nutrition is reported **per 100 g** of the finished dish together with its total weight.
- Deleting a dish also deletes every meal and diet entry that references it.

## Diets

- Entries are `{dish_id, amount_grams, time}`; totals are absolute, not per 100 g.
- A user has at most one selected diet: `select_diet` replaces the previous selection,
  `select_diet` without `diet_id` clears it.

## Meals and time zones

- `eaten_at` accepts an RFC 3339 instant (`2024-03-05T08:10:00+03:00`), or a local
  wall-clock time (`2024-03-05T08:10`) together with `timezone_offset`.
  Times are kept to the whole second.
- `timezone_offset` is in minutes and follows the browser convention: local time is
  UTC minus the offset, so UTC+3 is `-180` and UTC-5 is `300`.
- `get_weekly_statistics` buckets meals by the user's local calendar day over the
  last 7 days plus today (`days` up to 366). Meals exactly at local midnight
  belong to the new day.
- `get_remaining_diet_meals` lists entries of the selected diet whose dish has not
  been eaten yet today, with their time projected onto today.
"#;

/// Runtime status of the Ration service
#[derive(Debug, Clone, Serialize)]
pub struct RationStatus {
    /// Build information
    pub build_number: u64,
    pub build_timestamp: &'static str,
    pub version: &'static str,

    /// Database information
    pub database_path: String,
    pub database_size_bytes: Option<u64>,

    /// Configuration
    pub statistics_days: u32,
    pub default_user_id: Option<i64>,

    /// Process information
    pub uptime_seconds: u64,
    pub process_id: u32,
    pub memory_usage_bytes: u64,
}

/// Status tracker for collecting runtime information
pub struct StatusTracker {
    start_time: Instant,
    database_path: PathBuf,
    statistics_days: u32,
    default_user_id: Option<i64>,
}

impl StatusTracker {
    /// Create a new status tracker
    pub fn new(config: &Config) -> Self {
        Self {
            start_time: Instant::now(),
            database_path: config.database_path.clone(),
            statistics_days: config.statistics_days,
            default_user_id: config.default_user_id,
        }
    }

    /// Get the current status
    pub fn get_status(&self) -> RationStatus {
        let build_info = BuildInfo::current();

        let database_size_bytes = std::fs::metadata(&self.database_path)
            .ok()
            .map(|m| m.len());

        let pid = std::process::id();
        let mut sys = System::new();
        sys.refresh_processes(ProcessesToUpdate::Some(&[Pid::from_u32(pid)]));

        let memory_usage_bytes = sys
            .process(Pid::from_u32(pid))
            .map(|p| p.memory())
            .unwrap_or(0);

        RationStatus {
            build_number: build_info.build_number,
            build_timestamp: build_info.build_timestamp,
            version: build_info.version,
            database_path: self.database_path.display().to_string(),
            database_size_bytes,
            statistics_days: self.statistics_days,
            default_user_id: self.default_user_id,
            uptime_seconds: self.start_time.elapsed().as_secs(),
            process_id: pid,
            memory_usage_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_reports_configuration() {
        let config = Config {
            database_path: PathBuf::from("/nonexistent/ration.db"),
            statistics_days: 14,
            default_user_id: Some(3),
        };
        let status = StatusTracker::new(&config).get_status();

        assert_eq!(status.database_size_bytes, None);
        assert_eq!(status.statistics_days, 14);
        assert_eq!(status.default_user_id, Some(3));
        assert_eq!(status.process_id, std::process::id());
    }
}
