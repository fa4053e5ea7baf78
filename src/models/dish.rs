//! Dish model
//!
//! A named composition of groceries with fixed gram amounts. Updating the
//! components replaces the whole set.

use std::collections::HashMap;

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::{DbError, DbResult};

/// One grocery inside a dish
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DishComponent {
    pub grocery_id: i64,
    pub amount_grams: f64,
}

/// A dish with its components
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dish {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub components: Vec<DishComponent>,
    pub created_at: String,
    pub updated_at: String,
}

/// Data for creating a new dish
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DishCreate {
    pub user_id: i64,
    pub name: String,
    #[serde(default)]
    pub components: Vec<DishComponent>,
}

/// Data for updating a dish
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DishUpdate {
    pub name: Option<String>,
    /// When present, replaces every existing component
    pub components: Option<Vec<DishComponent>>,
}

impl Dish {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            name: row.get("name")?,
            components: Vec::new(),
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn insert_components(conn: &Connection, dish_id: i64, components: &[DishComponent]) -> DbResult<()> {
        let mut stmt = conn.prepare(
            "INSERT INTO dish_groceries (dish_id, grocery_id, amount) VALUES (?1, ?2, ?3)",
        )?;
        for component in components {
            stmt.execute(params![dish_id, component.grocery_id, component.amount_grams])?;
        }
        Ok(())
    }

    /// Insert a dish and its components in one transaction
    pub fn create(conn: &Connection, data: &DishCreate) -> DbResult<Self> {
        let tx = conn.unchecked_transaction()?;

        tx.execute(
            "INSERT INTO dishes (user_id, name) VALUES (?1, ?2)",
            params![data.user_id, data.name],
        )?;
        let id = tx.last_insert_rowid();
        Self::insert_components(&tx, id, &data.components)?;

        tx.commit()?;

        Self::get_by_id(conn, id)?.ok_or(DbError::NotFound { entity: "Dish", id })
    }

    /// Get a dish with its components
    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM dishes WHERE id = ?1")?;

        let result = stmt.query_row([id], Self::from_row);
        match result {
            Ok(mut dish) => {
                dish.components = Self::get_components(conn, id)?;
                Ok(Some(dish))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Components of a dish, in insertion order
    pub fn get_components(conn: &Connection, dish_id: i64) -> DbResult<Vec<DishComponent>> {
        let mut stmt = conn.prepare(
            "SELECT grocery_id, amount FROM dish_groceries WHERE dish_id = ?1 ORDER BY rowid",
        )?;

        let components = stmt
            .query_map([dish_id], |row| {
                Ok(DishComponent {
                    grocery_id: row.get(0)?,
                    amount_grams: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(components)
    }

    /// Fetch several dishes at once, keyed by ID. Unknown IDs are skipped.
    pub fn get_many(conn: &Connection, ids: &[i64]) -> DbResult<HashMap<i64, Self>> {
        let mut found = HashMap::with_capacity(ids.len());
        for &id in ids {
            if found.contains_key(&id) {
                continue;
            }
            if let Some(dish) = Self::get_by_id(conn, id)? {
                found.insert(id, dish);
            }
        }
        Ok(found)
    }

    /// List a user's dishes, optionally filtered by name
    pub fn list(
        conn: &Connection,
        user_id: i64,
        query: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> DbResult<Vec<Self>> {
        let mut dishes = match query {
            Some(q) => {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT * FROM dishes
                    WHERE user_id = ?1 AND LOWER(name) LIKE ?2
                    ORDER BY name ASC LIMIT ?3 OFFSET ?4
                    "#,
                )?;
                let pattern = format!("%{}%", q.to_lowercase());
                let rows = stmt
                    .query_map(params![user_id, pattern, limit, offset], Self::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT * FROM dishes WHERE user_id = ?1 ORDER BY name ASC LIMIT ?2 OFFSET ?3",
                )?;
                let rows = stmt
                    .query_map(params![user_id, limit, offset], Self::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };

        for dish in &mut dishes {
            dish.components = Self::get_components(conn, dish.id)?;
        }

        Ok(dishes)
    }

    /// Count a user's dishes with the same filter as `list`
    pub fn count(conn: &Connection, user_id: i64, query: Option<&str>) -> DbResult<i64> {
        let count: i64 = match query {
            Some(q) => conn.query_row(
                "SELECT COUNT(*) FROM dishes WHERE user_id = ?1 AND LOWER(name) LIKE ?2",
                params![user_id, format!("%{}%", q.to_lowercase())],
                |row| row.get(0),
            )?,
            None => conn.query_row(
                "SELECT COUNT(*) FROM dishes WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )?,
        };
        Ok(count)
    }

    /// Update a dish. Components are deleted and reinserted, not diffed.
    pub fn update(conn: &Connection, id: i64, data: &DishUpdate) -> DbResult<Option<Self>> {
        if Self::get_by_id(conn, id)?.is_none() {
            return Ok(None);
        }

        let tx = conn.unchecked_transaction()?;

        if let Some(ref name) = data.name {
            tx.execute(
                "UPDATE dishes SET name = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![name, id],
            )?;
        }

        if let Some(ref components) = data.components {
            tx.execute("DELETE FROM dish_groceries WHERE dish_id = ?1", [id])?;
            Self::insert_components(&tx, id, components)?;
            tx.execute(
                "UPDATE dishes SET updated_at = datetime('now') WHERE id = ?1",
                [id],
            )?;
        }

        tx.commit()?;

        Self::get_by_id(conn, id)
    }

    /// Number of meals and diet entries that reference this dish
    pub fn get_reference_counts(conn: &Connection, id: i64) -> DbResult<(i64, i64)> {
        let meals: i64 = conn.query_row(
            "SELECT COUNT(*) FROM meals WHERE dish_id = ?1",
            [id],
            |row| row.get(0),
        )?;
        let diet_entries: i64 = conn.query_row(
            "SELECT COUNT(*) FROM diet_dishes WHERE dish_id = ?1",
            [id],
            |row| row.get(0),
        )?;
        Ok((meals, diet_entries))
    }

    /// Delete a dish. Components, diet entries and meals referencing it are
    /// removed by the schema's cascade rules. Returns Ok(false) if not found.
    pub fn delete(conn: &Connection, id: i64) -> DbResult<bool> {
        let rows = conn.execute("DELETE FROM dishes WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }
}

/// Distinct grocery IDs referenced by the given dishes
pub fn referenced_grocery_ids<'a, I>(dishes: I) -> Vec<i64>
where
    I: IntoIterator<Item = &'a Dish>,
{
    let mut ids: Vec<i64> = dishes
        .into_iter()
        .flat_map(|d| d.components.iter().map(|c| c.grocery_id))
        .collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}
