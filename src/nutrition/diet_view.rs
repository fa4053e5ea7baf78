//! Remaining diet entries for today
//!
//! An entry counts as done once any meal of the same dish was eaten on the
//! current local date. What remains is projected onto today's clock.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::error::NutritionResult;
use super::statistics::{local_date, local_to_utc};
use crate::models::{Diet, DietEntry, Meal};

/// A diet entry not yet eaten today
#[derive(Debug, Clone, Serialize)]
pub struct RemainingEntry {
    #[serde(flatten)]
    pub entry: DietEntry,
    /// The entry's time of day on today's local date
    pub projected_eaten_at: DateTime<Utc>,
}

pub fn remaining_diet_entries_today(
    diet: &Diet,
    meals: &[Meal],
    now: DateTime<Utc>,
    offset_minutes: i32,
) -> NutritionResult<Vec<RemainingEntry>> {
    let today = local_date(&now, offset_minutes)?;

    let mut eaten_today = HashSet::new();
    for meal in meals {
        if local_date(&meal.eaten_at, offset_minutes)? == today {
            eaten_today.insert(meal.dish_id);
        }
    }

    diet.entries
        .iter()
        .filter(|entry| !eaten_today.contains(&entry.dish_id))
        .map(|entry| {
            Ok(RemainingEntry {
                entry: *entry,
                projected_eaten_at: local_to_utc(today.and_time(entry.time), offset_minutes)?,
            })
        })
        .collect()
}
