//! Grocery model
//!
//! A base ingredient with a macro-nutrient profile per 100 grams. Groceries
//! without an owner are shared with every user.

use std::collections::HashMap;

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use super::{referenced_grocery_ids, Dish, NutrientProfile};
use crate::db::{DbError, DbResult};

/// A grocery with its derived usage count
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grocery {
    pub id: i64,
    /// `None` for shared groceries
    pub user_id: Option<i64>,
    pub name: String,
    #[serde(flatten)]
    pub profile: NutrientProfile,
    pub is_liquid: bool,
    /// Number of dishes referencing this grocery
    pub dishes_count: i64,
    pub created_at: String,
}

/// Data for creating a new grocery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroceryCreate {
    pub user_id: Option<i64>,
    pub name: String,
    pub proteins: f64,
    pub fats: f64,
    pub carbohydrates: f64,
    #[serde(default)]
    pub is_liquid: bool,
}

/// Which catalog a grocery listing reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroceryScope {
    /// Groceries owned by the given user
    Personal(i64),
    /// Groceries without an owner
    Shared,
}

/// Filters for listing groceries
#[derive(Debug, Clone, Default)]
pub struct GroceryFilter {
    pub name: Option<String>,
    pub is_liquid: Option<bool>,
}

const SELECT_GROCERY: &str = r#"
    SELECT g.*,
           (SELECT COUNT(*) FROM dish_groceries dg WHERE dg.grocery_id = g.id) AS dishes_count
    FROM groceries g
"#;

impl Grocery {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            name: row.get("name")?,
            profile: NutrientProfile {
                proteins: row.get("proteins")?,
                fats: row.get("fats")?,
                carbohydrates: row.get("carbohydrates")?,
            },
            is_liquid: row.get::<_, i32>("is_liquid")? != 0,
            dishes_count: row.get("dishes_count")?,
            created_at: row.get("created_at")?,
        })
    }

    /// Insert a new grocery
    pub fn create(conn: &Connection, data: &GroceryCreate) -> DbResult<Self> {
        conn.execute(
            r#"
            INSERT INTO groceries (user_id, name, proteins, fats, carbohydrates, is_liquid)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                data.user_id,
                data.name,
                data.proteins,
                data.fats,
                data.carbohydrates,
                data.is_liquid as i32,
            ],
        )?;

        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?.ok_or(DbError::NotFound {
            entity: "Grocery",
            id,
        })
    }

    /// Get a grocery by ID
    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare(&format!("{} WHERE g.id = ?1", SELECT_GROCERY))?;

        let result = stmt.query_row([id], Self::from_row);
        match result {
            Ok(item) => Ok(Some(item)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Fetch several groceries at once, keyed by ID. Unknown IDs are skipped.
    pub fn get_many(conn: &Connection, ids: &[i64]) -> DbResult<HashMap<i64, Self>> {
        let mut found = HashMap::with_capacity(ids.len());
        if ids.is_empty() {
            return Ok(found);
        }

        let placeholders = (1..=ids.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("{} WHERE g.id IN ({})", SELECT_GROCERY, placeholders);

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(ids.iter()), Self::from_row)?;
        for row in rows {
            let grocery = row?;
            found.insert(grocery.id, grocery);
        }

        Ok(found)
    }

    /// Every grocery, personal or shared, that the given dishes reference
    pub fn lookup_for_dishes<'a, I>(conn: &Connection, dishes: I) -> DbResult<HashMap<i64, Self>>
    where
        I: IntoIterator<Item = &'a Dish>,
    {
        let ids = referenced_grocery_ids(dishes);
        Self::get_many(conn, &ids)
    }

    fn where_clause(
        scope: GroceryScope,
        filter: &GroceryFilter,
        params_vec: &mut Vec<Box<dyn rusqlite::ToSql>>,
    ) -> String {
        let mut clauses = Vec::new();

        match scope {
            GroceryScope::Personal(user_id) => {
                params_vec.push(Box::new(user_id));
                clauses.push(format!("g.user_id = ?{}", params_vec.len()));
            }
            GroceryScope::Shared => clauses.push("g.user_id IS NULL".to_string()),
        }

        if let Some(ref name) = filter.name {
            params_vec.push(Box::new(format!("%{}%", name.to_lowercase())));
            clauses.push(format!("LOWER(g.name) LIKE ?{}", params_vec.len()));
        }

        if let Some(is_liquid) = filter.is_liquid {
            params_vec.push(Box::new(is_liquid as i32));
            clauses.push(format!("g.is_liquid = ?{}", params_vec.len()));
        }

        clauses.join(" AND ")
    }

    /// List groceries in one scope with filtering, sorting and pagination
    pub fn list(
        conn: &Connection,
        scope: GroceryScope,
        filter: &GroceryFilter,
        sort_by: &str,
        sort_order: &str,
        limit: i64,
        offset: i64,
    ) -> DbResult<Vec<Self>> {
        let order = if sort_order.eq_ignore_ascii_case("desc") { "DESC" } else { "ASC" };
        let sort_col = match sort_by.to_lowercase().as_str() {
            "id" => "g.id",
            "proteins" => "g.proteins",
            "fats" => "g.fats",
            "carbohydrates" => "g.carbohydrates",
            _ => "g.name",
        };

        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        let where_sql = Self::where_clause(scope, filter, &mut params_vec);

        params_vec.push(Box::new(limit));
        let limit_idx = params_vec.len();
        params_vec.push(Box::new(offset));
        let offset_idx = params_vec.len();

        let sql = format!(
            "{} WHERE {} ORDER BY {} {} LIMIT ?{} OFFSET ?{}",
            SELECT_GROCERY, where_sql, sort_col, order, limit_idx, offset_idx
        );

        let mut stmt = conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
        let items = stmt
            .query_map(params_refs.as_slice(), Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(items)
    }

    /// Count groceries matching the same filters as `list`
    pub fn count(conn: &Connection, scope: GroceryScope, filter: &GroceryFilter) -> DbResult<i64> {
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        let where_sql = Self::where_clause(scope, filter, &mut params_vec);
        let sql = format!("SELECT COUNT(*) FROM groceries g WHERE {}", where_sql);

        let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
        let count: i64 = conn.query_row(&sql, params_refs.as_slice(), |row| row.get(0))?;
        Ok(count)
    }

    /// Names of dishes that use this grocery
    pub fn get_used_in_dishes(conn: &Connection, id: i64) -> DbResult<Vec<String>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT d.name FROM dishes d
            INNER JOIN dish_groceries dg ON d.id = dg.dish_id
            WHERE dg.grocery_id = ?1
            ORDER BY d.name
            "#,
        )?;

        let names = stmt
            .query_map([id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;

        Ok(names)
    }

    /// Delete a grocery. Returns Ok(false) if not found.
    ///
    /// Fails with a constraint error while any dish still references it.
    pub fn delete(conn: &Connection, id: i64) -> DbResult<bool> {
        let rows = conn.execute("DELETE FROM groceries WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_connection;
    use crate::models::{Dish, DishComponent, DishCreate, User};

    fn grocery(user_id: Option<i64>, name: &str, is_liquid: bool) -> GroceryCreate {
        GroceryCreate {
            user_id,
            name: name.to_string(),
            proteins: 10.0,
            fats: 1.0,
            carbohydrates: 5.0,
            is_liquid,
        }
    }

    #[test]
    fn test_personal_and_shared_scopes() {
        let conn = test_connection();
        let user = User::create(&conn, "anna", false).unwrap();
        Grocery::create(&conn, &grocery(Some(user.id), "Curd", false)).unwrap();
        Grocery::create(&conn, &grocery(None, "Milk", true)).unwrap();
        Grocery::create(&conn, &grocery(None, "Oats", false)).unwrap();

        let filter = GroceryFilter::default();
        let personal = Grocery::list(&conn, GroceryScope::Personal(user.id), &filter, "name", "asc", 20, 0).unwrap();
        let shared = Grocery::list(&conn, GroceryScope::Shared, &filter, "name", "asc", 20, 0).unwrap();
        assert_eq!(personal.len(), 1);
        assert_eq!(shared.len(), 2);
        assert_eq!(shared[0].name, "Milk");

        let liquids = GroceryFilter { name: None, is_liquid: Some(true) };
        assert_eq!(Grocery::count(&conn, GroceryScope::Shared, &liquids).unwrap(), 1);

        let by_name = GroceryFilter { name: Some("OA".to_string()), is_liquid: None };
        let found = Grocery::list(&conn, GroceryScope::Shared, &by_name, "name", "asc", 20, 0).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Oats");
    }

    #[test]
    fn test_negative_macros_rejected_by_schema() {
        let conn = test_connection();
        let mut data = grocery(None, "Broken", false);
        data.fats = -1.0;
        assert!(Grocery::create(&conn, &data).is_err());
    }

    #[test]
    fn test_delete_refused_while_referenced() {
        let conn = test_connection();
        let user = User::create(&conn, "boris", false).unwrap();
        let g = Grocery::create(&conn, &grocery(None, "Rice", false)).unwrap();
        Dish::create(
            &conn,
            &DishCreate {
                user_id: user.id,
                name: "Plain rice".to_string(),
                components: vec![DishComponent { grocery_id: g.id, amount_grams: 150.0 }],
            },
        )
        .unwrap();

        let reloaded = Grocery::get_by_id(&conn, g.id).unwrap().unwrap();
        assert_eq!(reloaded.dishes_count, 1);
        assert_eq!(Grocery::get_used_in_dishes(&conn, g.id).unwrap(), vec!["Plain rice".to_string()]);
        assert!(Grocery::delete(&conn, g.id).is_err());
    }

    #[test]
    fn test_get_many_skips_unknown_ids() {
        let conn = test_connection();
        let a = Grocery::create(&conn, &grocery(None, "A", false)).unwrap();
        let found = Grocery::get_many(&conn, &[a.id, 9999]).unwrap();
        assert_eq!(found.len(), 1);
        assert!(found.contains_key(&a.id));
    }

    #[test]
    fn test_lookup_for_dishes_spans_both_catalogs() {
        let conn = test_connection();
        let user = User::create(&conn, "dasha", false).unwrap();
        let mine = Grocery::create(&conn, &grocery(Some(user.id), "Cottage cheese", false)).unwrap();
        let shared = Grocery::create(&conn, &grocery(None, "Honey", false)).unwrap();
        Grocery::create(&conn, &grocery(None, "Unused", false)).unwrap();

        let dish = Dish::create(
            &conn,
            &DishCreate {
                user_id: user.id,
                name: "Breakfast".to_string(),
                components: vec![
                    DishComponent { grocery_id: mine.id, amount_grams: 200.0 },
                    DishComponent { grocery_id: shared.id, amount_grams: 20.0 },
                ],
            },
        )
        .unwrap();

        let lookup = Grocery::lookup_for_dishes(&conn, [&dish]).unwrap();
        assert_eq!(lookup.len(), 2);
        assert!(lookup.contains_key(&mine.id));
        assert!(lookup.contains_key(&shared.id));
    }
}
