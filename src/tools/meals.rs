//! Meal MCP Tools
//!
//! Tools for logging meals, today's remaining diet entries and the weekly
//! statistics chart.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SubsecRound, Utc};
use serde::Serialize;

use super::load_dishes;
use super::users::require_user;
use crate::db::Database;
use crate::models::{Aggregate, Dish, Meal, MealCreate, MealUpdate, User};
use crate::nutrition::{
    bucket_statistics, fill_series, local_date, local_to_utc, remaining_diet_entries_today,
    resolve_diet_entry, resolve_meals, DailyPoint, DailyTotals, MealNutrition, RemainingEntry,
    StatisticsWindow,
};

const LOCAL_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Response for list_meals
#[derive(Debug, Serialize)]
pub struct ListMealsResponse {
    pub meals: Vec<MealNutrition>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// A diet entry still to be eaten today
#[derive(Debug, Serialize)]
pub struct RemainingMeal {
    #[serde(flatten)]
    pub remaining: RemainingEntry,
    pub dish_name: String,
    pub nutrition: Aggregate,
}

/// Response for get_remaining_diet_meals
#[derive(Debug, Serialize)]
pub struct RemainingMealsResponse {
    pub diet_id: Option<i64>,
    pub diet_name: Option<String>,
    pub today: NaiveDate,
    pub meals: Vec<RemainingMeal>,
}

/// Response for get_weekly_statistics
#[derive(Debug, Serialize)]
pub struct StatisticsResponse {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub timezone_offset: i32,
    /// Only days with at least one meal
    pub buckets: BTreeMap<DateTime<Utc>, DailyTotals>,
    /// Every day of the window, oldest first
    pub series: Vec<DailyPoint>,
}

/// Parse a meal time: an RFC 3339 instant, or a local wall-clock time that
/// needs `timezone_offset` to be placed on the timeline.
///
/// Meals are stored with whole-second precision, so fractional seconds are
/// truncated here.
pub fn parse_eaten_at(value: &str, timezone_offset: Option<i32>) -> Result<DateTime<Utc>, String> {
    let value = value.trim();

    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Ok(instant.with_timezone(&Utc).trunc_subsecs(0));
    }

    let local = LOCAL_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .ok_or_else(|| {
            format!(
                "Invalid eaten_at '{}': expected RFC 3339 or YYYY-MM-DDTHH:MM[:SS]",
                value
            )
        })?;

    let offset = timezone_offset
        .ok_or_else(|| "timezone_offset is required when eaten_at has no UTC offset".to_string())?;

    local_to_utc(local, offset)
        .map(|instant| instant.trunc_subsecs(0))
        .map_err(|e| format!("Invalid eaten_at: {}", e))
}

fn check_amount(amount_grams: f64) -> Result<(), String> {
    if !amount_grams.is_finite() || amount_grams <= 0.0 {
        return Err("amount_grams must be greater than 0".to_string());
    }
    Ok(())
}

/// The meal with `id`, unless it belongs to someone other than `owner`
fn owned_meal(conn: &rusqlite::Connection, owner: i64, id: i64) -> Result<Option<Meal>, String> {
    let meal = Meal::get_by_id(conn, id)
        .map_err(|e| format!("Failed to get meal: {}", e))?;
    Ok(meal.filter(|m| m.user_id == owner))
}

fn resolve(conn: &rusqlite::Connection, meals: Vec<Meal>) -> Result<Vec<MealNutrition>, String> {
    let (dishes, groceries) = load_dishes(conn, meals.iter().map(|m| m.dish_id).collect())?;
    resolve_meals(meals, &dishes, &groceries).map_err(|e| format!("Failed to resolve meals: {}", e))
}

fn resolve_one(conn: &rusqlite::Connection, meal: Meal) -> Result<MealNutrition, String> {
    resolve(conn, vec![meal])?
        .pop()
        .ok_or_else(|| "Meal could not be resolved".to_string())
}

/// Log an amount of a dish. `eaten_at` defaults to `now`.
pub fn log_meal(
    db: &Database,
    user_id: i64,
    dish_id: i64,
    amount_grams: f64,
    eaten_at: Option<&str>,
    timezone_offset: Option<i32>,
    now: DateTime<Utc>,
) -> Result<MealNutrition, String> {
    check_amount(amount_grams)?;
    let eaten_at = match eaten_at {
        Some(value) => parse_eaten_at(value, timezone_offset)?,
        None => now.trunc_subsecs(0),
    };

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    require_user(&conn, user_id)?;
    let dish = Dish::get_by_id(&conn, dish_id)
        .map_err(|e| format!("Database error checking dish: {}", e))?
        .ok_or_else(|| format!("Dish not found with id: {}", dish_id))?;
    if dish.user_id != user_id {
        return Err(format!("Dish {} belongs to another user", dish_id));
    }

    let data = MealCreate {
        user_id,
        dish_id,
        amount_grams,
        eaten_at,
    };
    let meal = Meal::create(&conn, &data)
        .map_err(|e| format!("Failed to log meal: {}", e))?;

    tracing::info!("Logged meal {}: {} g of dish {} at {}", meal.id, meal.amount_grams, dish_id, meal.eaten_at);
    resolve_one(&conn, meal)
}

/// A user's meals, newest first, with nutrition
pub fn list_meals(db: &Database, user_id: i64, limit: i64, offset: i64) -> Result<ListMealsResponse, String> {
    let limit = limit.min(500).max(1);
    let offset = offset.max(0);
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let meals = Meal::list(&conn, user_id, limit, offset)
        .map_err(|e| format!("Failed to list meals: {}", e))?;
    let total = Meal::count(&conn, user_id)
        .map_err(|e| format!("Failed to count meals: {}", e))?;

    Ok(ListMealsResponse {
        meals: resolve(&conn, meals)?,
        total,
        limit,
        offset,
    })
}

/// Change the amount and/or time of a meal
pub fn update_meal(
    db: &Database,
    owner: i64,
    id: i64,
    amount_grams: Option<f64>,
    eaten_at: Option<&str>,
    timezone_offset: Option<i32>,
) -> Result<Option<MealNutrition>, String> {
    if let Some(amount) = amount_grams {
        check_amount(amount)?;
    }
    let eaten_at = eaten_at
        .map(|value| parse_eaten_at(value, timezone_offset))
        .transpose()?;

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    if owned_meal(&conn, owner, id)?.is_none() {
        return Ok(None);
    }

    let data = MealUpdate {
        amount_grams,
        eaten_at,
    };
    let meal = Meal::update(&conn, id, &data)
        .map_err(|e| format!("Failed to update meal: {}", e))?;

    match meal {
        Some(meal) => {
            tracing::info!("Updated meal {}", meal.id);
            resolve_one(&conn, meal).map(Some)
        }
        None => Ok(None),
    }
}

/// Delete a meal
pub fn delete_meal(db: &Database, owner: i64, id: i64) -> Result<bool, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    if owned_meal(&conn, owner, id)?.is_none() {
        return Ok(false);
    }

    let deleted = Meal::delete(&conn, id)
        .map_err(|e| format!("Failed to delete meal: {}", e))?;
    if deleted {
        tracing::info!("Deleted meal {}", id);
    }
    Ok(deleted)
}

/// Entries of the selected diet whose dish has not been eaten today
pub fn get_remaining_diet_meals(
    db: &Database,
    user_id: i64,
    timezone_offset: i32,
    now: DateTime<Utc>,
) -> Result<RemainingMealsResponse, String> {
    let today = local_date(&now, timezone_offset).map_err(|e| e.to_string())?;
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let diet = User::selected_diet(&conn, user_id)
        .map_err(|e| format!("Failed to get selected diet: {}", e))?;
    let diet = match diet {
        Some(diet) => diet,
        None => {
            return Ok(RemainingMealsResponse {
                diet_id: None,
                diet_name: None,
                today,
                meals: Vec::new(),
            })
        }
    };

    // A zero-day window covers exactly today
    let window = StatisticsWindow::ending_at(now, timezone_offset, 0).map_err(|e| e.to_string())?;
    let eaten = Meal::list_between(&conn, user_id, &window.from, &window.to)
        .map_err(|e| format!("Failed to list today's meals: {}", e))?;

    let remaining = remaining_diet_entries_today(&diet, &eaten, now, timezone_offset)
        .map_err(|e| e.to_string())?;

    let (dishes, groceries) = load_dishes(&conn, remaining.iter().map(|r| r.entry.dish_id).collect())?;
    let meals = remaining
        .into_iter()
        .map(|remaining| {
            let dish = dishes
                .get(&remaining.entry.dish_id)
                .ok_or_else(|| format!("Dish not found with id: {}", remaining.entry.dish_id))?;
            let nutrition = resolve_diet_entry(&remaining.entry, dish, &groceries)
                .map_err(|e| format!("Failed to resolve diet entry: {}", e))?;
            Ok(RemainingMeal {
                dish_name: dish.name.clone(),
                nutrition,
                remaining,
            })
        })
        .collect::<Result<Vec<_>, String>>()?;

    Ok(RemainingMealsResponse {
        diet_id: Some(diet.id),
        diet_name: Some(diet.name),
        today,
        meals,
    })
}

/// Daily nutrition totals for the last `days` days and today
pub fn get_weekly_statistics(
    db: &Database,
    user_id: i64,
    timezone_offset: i32,
    days: u32,
    now: DateTime<Utc>,
) -> Result<StatisticsResponse, String> {
    let window = StatisticsWindow::ending_at(now, timezone_offset, days).map_err(|e| e.to_string())?;
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let meals = Meal::list_between(&conn, user_id, &window.from, &window.to)
        .map_err(|e| format!("Failed to list meals: {}", e))?;
    let (dishes, groceries) = load_dishes(&conn, meals.iter().map(|m| m.dish_id).collect())?;

    let buckets = bucket_statistics(&meals, &dishes, &groceries, timezone_offset, &window)
        .map_err(|e| format!("Failed to compute statistics: {}", e))?;
    let series = fill_series(&buckets, &window);

    tracing::debug!(
        "Statistics for user {}: {} meal(s) in {} day(s)",
        user_id,
        meals.len(),
        buckets.len()
    );

    Ok(StatisticsResponse {
        from: window.from,
        to: window.to,
        timezone_offset,
        buckets,
        series,
    })
}
