//! Diet model
//!
//! A meal plan: dishes scheduled at wall-clock times of day.

use chrono::NaiveTime;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::{DbError, DbResult};

/// A scheduled dish inside a diet
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DietEntry {
    pub dish_id: i64,
    pub amount_grams: f64,
    #[serde(with = "time_of_day")]
    pub time: NaiveTime,
}

/// A diet with entries ordered by time of day
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diet {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    /// Whether this is the owner's currently selected diet
    pub selected: bool,
    pub entries: Vec<DietEntry>,
    pub created_at: String,
    pub updated_at: String,
}

/// Data for creating a new diet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DietCreate {
    pub user_id: i64,
    pub name: String,
    #[serde(default)]
    pub entries: Vec<DietEntry>,
}

/// Data for updating a diet
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DietUpdate {
    pub name: Option<String>,
    /// When present, replaces every existing entry
    pub entries: Option<Vec<DietEntry>>,
}

/// "HH:MM" serialization for times of day
pub mod time_of_day {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%H:%M";

    /// Parse "HH:MM", also accepting "HH:MM:SS"
    pub fn parse(s: &str) -> Result<NaiveTime, chrono::ParseError> {
        let trimmed = s.trim();
        NaiveTime::parse_from_str(trimmed, FORMAT)
            .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
    }

    pub fn format(time: &NaiveTime) -> String {
        time.format(FORMAT).to_string()
    }

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse(&s).map_err(serde::de::Error::custom)
    }
}

const SELECT_DIET: &str = r#"
    SELECT d.*,
           EXISTS(SELECT 1 FROM users u WHERE u.selected_diet_id = d.id) AS selected
    FROM diets d
"#;

impl Diet {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            name: row.get("name")?,
            selected: row.get::<_, i32>("selected")? != 0,
            entries: Vec::new(),
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn insert_entries(conn: &Connection, diet_id: i64, entries: &[DietEntry]) -> DbResult<()> {
        let mut stmt = conn.prepare(
            "INSERT INTO diet_dishes (diet_id, dish_id, amount, time) VALUES (?1, ?2, ?3, ?4)",
        )?;
        for entry in entries {
            stmt.execute(params![
                diet_id,
                entry.dish_id,
                entry.amount_grams,
                time_of_day::format(&entry.time),
            ])?;
        }
        Ok(())
    }

    /// Insert a diet and its entries in one transaction
    pub fn create(conn: &Connection, data: &DietCreate) -> DbResult<Self> {
        let tx = conn.unchecked_transaction()?;

        tx.execute(
            "INSERT INTO diets (user_id, name) VALUES (?1, ?2)",
            params![data.user_id, data.name],
        )?;
        let id = tx.last_insert_rowid();
        Self::insert_entries(&tx, id, &data.entries)?;

        tx.commit()?;

        Self::get_by_id(conn, id)?.ok_or(DbError::NotFound { entity: "Diet", id })
    }

    /// Get a diet with its entries
    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare(&format!("{} WHERE d.id = ?1", SELECT_DIET))?;

        let result = stmt.query_row([id], Self::from_row);
        match result {
            Ok(mut diet) => {
                diet.entries = Self::get_entries(conn, id)?;
                Ok(Some(diet))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Entries of a diet ordered by time of day
    pub fn get_entries(conn: &Connection, diet_id: i64) -> DbResult<Vec<DietEntry>> {
        let mut stmt = conn.prepare(
            "SELECT dish_id, amount, time FROM diet_dishes WHERE diet_id = ?1 ORDER BY time, id",
        )?;

        let raw = stmt
            .query_map([diet_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(dish_id, amount_grams, time)| {
                let time = time_of_day::parse(&time)
                    .map_err(|e| DbError::InvalidValue(format!("diet entry time '{}': {}", time, e)))?;
                Ok(DietEntry {
                    dish_id,
                    amount_grams,
                    time,
                })
            })
            .collect()
    }

    /// List a user's diets, optionally filtered by name
    pub fn list(
        conn: &Connection,
        user_id: i64,
        query: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> DbResult<Vec<Self>> {
        let pattern = query.map(|q| format!("%{}%", q.to_lowercase()));
        let sql = format!(
            "{} WHERE d.user_id = ?1 AND (?2 IS NULL OR LOWER(d.name) LIKE ?2) ORDER BY d.name ASC LIMIT ?3 OFFSET ?4",
            SELECT_DIET
        );

        let mut stmt = conn.prepare(&sql)?;
        let mut diets = stmt
            .query_map(params![user_id, pattern, limit, offset], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        for diet in &mut diets {
            diet.entries = Self::get_entries(conn, diet.id)?;
        }

        Ok(diets)
    }

    /// Count a user's diets with the same filter as `list`
    pub fn count(conn: &Connection, user_id: i64, query: Option<&str>) -> DbResult<i64> {
        let pattern = query.map(|q| format!("%{}%", q.to_lowercase()));
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM diets WHERE user_id = ?1 AND (?2 IS NULL OR LOWER(name) LIKE ?2)",
            params![user_id, pattern],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Update a diet. Entries are deleted and reinserted, not diffed.
    pub fn update(conn: &Connection, id: i64, data: &DietUpdate) -> DbResult<Option<Self>> {
        if Self::get_by_id(conn, id)?.is_none() {
            return Ok(None);
        }

        let tx = conn.unchecked_transaction()?;

        if let Some(ref name) = data.name {
            tx.execute(
                "UPDATE diets SET name = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![name, id],
            )?;
        }

        if let Some(ref entries) = data.entries {
            tx.execute("DELETE FROM diet_dishes WHERE diet_id = ?1", [id])?;
            Self::insert_entries(&tx, id, entries)?;
            tx.execute(
                "UPDATE diets SET updated_at = datetime('now') WHERE id = ?1",
                [id],
            )?;
        }

        tx.commit()?;

        Self::get_by_id(conn, id)
    }

    /// Delete a diet. A user selection pointing at it is cleared by the schema.
    pub fn delete(conn: &Connection, id: i64) -> DbResult<bool> {
        let rows = conn.execute("DELETE FROM diets WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }
}
