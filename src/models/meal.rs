//! Meal model
//!
//! A logged, timestamped amount of a dish. Only the dish reference is stored;
//! nutrition is derived from the dish's current composition on every read.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::{DbError, DbResult};

/// A logged meal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meal {
    pub id: i64,
    pub user_id: i64,
    pub dish_id: i64,
    pub dish_name: String,
    pub amount_grams: f64,
    pub eaten_at: DateTime<Utc>,
}

/// Data for logging a meal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealCreate {
    pub user_id: i64,
    pub dish_id: i64,
    pub amount_grams: f64,
    pub eaten_at: DateTime<Utc>,
}

/// Data for updating a meal
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MealUpdate {
    pub amount_grams: Option<f64>,
    pub eaten_at: Option<DateTime<Utc>>,
}

/// Fixed-width UTC text form with whole seconds, so string comparison in SQL
/// orders by time. Callers truncate fractional seconds before storing.
pub fn to_db_timestamp(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn from_db_timestamp(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}

const SELECT_MEAL: &str = r#"
    SELECT m.id, m.user_id, m.dish_id, d.name AS dish_name, m.amount, m.eaten_at
    FROM meals m
    INNER JOIN dishes d ON d.id = m.dish_id
"#;

impl Meal {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let eaten_at: String = row.get("eaten_at")?;
        let eaten_at = from_db_timestamp(&eaten_at).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            dish_id: row.get("dish_id")?,
            dish_name: row.get("dish_name")?,
            amount_grams: row.get("amount")?,
            eaten_at,
        })
    }

    fn query(conn: &Connection, sql: &str, params: &[&dyn rusqlite::ToSql]) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare(sql)?;
        let meals = stmt
            .query_map(params, Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(meals)
    }

    /// Log a new meal
    pub fn create(conn: &Connection, data: &MealCreate) -> DbResult<Self> {
        conn.execute(
            "INSERT INTO meals (user_id, dish_id, amount, eaten_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                data.user_id,
                data.dish_id,
                data.amount_grams,
                to_db_timestamp(&data.eaten_at),
            ],
        )?;

        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?.ok_or(DbError::NotFound { entity: "Meal", id })
    }

    /// Get a meal by ID
    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let sql = format!("{} WHERE m.id = ?1", SELECT_MEAL);
        Ok(Self::query(conn, &sql, params![id])?.into_iter().next())
    }

    /// A user's meals, newest first
    pub fn list(conn: &Connection, user_id: i64, limit: i64, offset: i64) -> DbResult<Vec<Self>> {
        let sql = format!(
            "{} WHERE m.user_id = ?1 ORDER BY m.eaten_at DESC, m.id DESC LIMIT ?2 OFFSET ?3",
            SELECT_MEAL
        );
        Self::query(conn, &sql, params![user_id, limit, offset])
    }

    /// Count a user's meals
    pub fn count(conn: &Connection, user_id: i64) -> DbResult<i64> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM meals WHERE user_id = ?1",
            [user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// A user's meals eaten within the half-open interval `[from, to)`
    pub fn list_between(
        conn: &Connection,
        user_id: i64,
        from: &DateTime<Utc>,
        to: &DateTime<Utc>,
    ) -> DbResult<Vec<Self>> {
        let sql = format!(
            "{} WHERE m.user_id = ?1 AND m.eaten_at >= ?2 AND m.eaten_at < ?3 ORDER BY m.eaten_at ASC, m.id ASC",
            SELECT_MEAL
        );
        let from = to_db_timestamp(from);
        let to = to_db_timestamp(to);
        Self::query(conn, &sql, params![user_id, from, to])
    }

    /// Update amount and/or time of a meal
    pub fn update(conn: &Connection, id: i64, data: &MealUpdate) -> DbResult<Option<Self>> {
        let mut updates = Vec::new();
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(amount) = data.amount_grams {
            params_vec.push(Box::new(amount));
            updates.push(format!("amount = ?{}", params_vec.len()));
        }
        if let Some(ref eaten_at) = data.eaten_at {
            params_vec.push(Box::new(to_db_timestamp(eaten_at)));
            updates.push(format!("eaten_at = ?{}", params_vec.len()));
        }

        if updates.is_empty() {
            return Self::get_by_id(conn, id);
        }

        params_vec.push(Box::new(id));
        let sql = format!(
            "UPDATE meals SET {} WHERE id = ?{}",
            updates.join(", "),
            params_vec.len()
        );

        let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
        conn.execute(&sql, params_refs.as_slice())?;

        Self::get_by_id(conn, id)
    }

    /// Delete a meal
    pub fn delete(conn: &Connection, id: i64) -> DbResult<bool> {
        let rows = conn.execute("DELETE FROM meals WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_connection;
    use crate::models::{Diet, DietCreate, DietEntry, Dish, DishCreate, User};
    use chrono::{NaiveTime, TimeZone};

    fn instant(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_list_between_is_half_open() {
        let conn = test_connection();
        let user = User::create(&conn, "egor", false).unwrap();
        let dish = Dish::create(
            &conn,
            &DishCreate { user_id: user.id, name: "Toast".to_string(), components: vec![] },
        )
        .unwrap();

        for at in [instant(4, 23), instant(5, 0), instant(6, 0)] {
            Meal::create(
                &conn,
                &MealCreate { user_id: user.id, dish_id: dish.id, amount_grams: 50.0, eaten_at: at },
            )
            .unwrap();
        }

        let found = Meal::list_between(&conn, user.id, &instant(5, 0), &instant(6, 0)).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].eaten_at, instant(5, 0));
        assert_eq!(found[0].dish_name, "Toast");
    }

    #[test]
    fn test_update_meal() {
        let conn = test_connection();
        let user = User::create(&conn, "fedor", false).unwrap();
        let dish = Dish::create(
            &conn,
            &DishCreate { user_id: user.id, name: "Tea".to_string(), components: vec![] },
        )
        .unwrap();
        let meal = Meal::create(
            &conn,
            &MealCreate { user_id: user.id, dish_id: dish.id, amount_grams: 200.0, eaten_at: instant(1, 8) },
        )
        .unwrap();

        let updated = Meal::update(
            &conn,
            meal.id,
            &MealUpdate { amount_grams: Some(330.0), eaten_at: None },
        )
        .unwrap()
        .unwrap();
        assert_eq!(updated.amount_grams, 330.0);
        assert_eq!(updated.eaten_at, instant(1, 8));
    }

    #[test]
    fn test_dish_delete_cascades_to_meals_and_diet_entries() {
        let conn = test_connection();
        let user = User::create(&conn, "galina", false).unwrap();
        let dish = Dish::create(
            &conn,
            &DishCreate { user_id: user.id, name: "Pasta".to_string(), components: vec![] },
        )
        .unwrap();
        let diet = Diet::create(
            &conn,
            &DietCreate {
                user_id: user.id,
                name: "Week".to_string(),
                entries: vec![DietEntry {
                    dish_id: dish.id,
                    amount_grams: 300.0,
                    time: NaiveTime::from_hms_opt(13, 0, 0).unwrap(),
                }],
            },
        )
        .unwrap();
        Meal::create(
            &conn,
            &MealCreate { user_id: user.id, dish_id: dish.id, amount_grams: 300.0, eaten_at: instant(2, 13) },
        )
        .unwrap();

        assert_eq!(Dish::get_reference_counts(&conn, dish.id).unwrap(), (1, 1));
        assert!(Dish::delete(&conn, dish.id).unwrap());

        assert_eq!(Meal::count(&conn, user.id).unwrap(), 0);
        let diet = Diet::get_by_id(&conn, diet.id).unwrap().unwrap();
        assert!(diet.entries.is_empty());
    }
}
