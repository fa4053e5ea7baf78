//! Grocery MCP Tools
//!
//! Tools for the personal and shared grocery catalogs.

use serde::Serialize;

use super::users::require_user;
use crate::db::Database;
use crate::models::{Grocery, GroceryCreate, GroceryFilter, GroceryScope};
use crate::nutrition::calories;

/// A grocery with its energy per 100 g
#[derive(Debug, Serialize)]
pub struct GrocerySummary {
    #[serde(flatten)]
    pub grocery: Grocery,
    pub calories: f64,
}

impl From<Grocery> for GrocerySummary {
    fn from(grocery: Grocery) -> Self {
        let p = grocery.profile;
        Self {
            calories: calories::from_masses(p.proteins, p.fats, p.carbohydrates),
            grocery,
        }
    }
}

/// Full grocery detail response
#[derive(Debug, Serialize)]
pub struct GroceryDetail {
    #[serde(flatten)]
    pub summary: GrocerySummary,
    pub used_in_dishes: Vec<String>,
}

/// One page of one catalog
#[derive(Debug, Serialize)]
pub struct GroceryPage {
    pub items: Vec<GrocerySummary>,
    pub total: i64,
}

/// Response for list_groceries
#[derive(Debug, Serialize)]
pub struct ListGroceriesResponse {
    pub personal: GroceryPage,
    pub shared: GroceryPage,
    pub limit: i64,
    pub offset: i64,
}

/// Response for delete_grocery blocked
#[derive(Debug, Serialize)]
pub struct DeleteGroceryBlockedResponse {
    pub error: String,
    pub used_in_dishes: Vec<String>,
}

/// Response for successful delete_grocery
#[derive(Debug, Serialize)]
pub struct DeleteGrocerySuccessResponse {
    pub success: bool,
    pub deleted_id: i64,
}

fn check_macro(name: &str, value: f64) -> Result<(), String> {
    if !value.is_finite() || value < 0.0 {
        return Err(format!("{} must be a non-negative number of grams per 100 g", name));
    }
    Ok(())
}

/// The grocery with `id` if it is shared or belongs to `owner`
fn visible_grocery(conn: &rusqlite::Connection, owner: i64, id: i64) -> Result<Option<Grocery>, String> {
    let grocery = Grocery::get_by_id(conn, id)
        .map_err(|e| format!("Failed to get grocery: {}", e))?;
    Ok(grocery.filter(|g| !g.user_id.is_some_and(|user_id| user_id != owner)))
}

/// Add a grocery to a user's catalog, or to the shared one when `user_id` is None
pub fn add_grocery(db: &Database, data: GroceryCreate) -> Result<GrocerySummary, String> {
    let name = data.name.trim().to_string();
    if name.is_empty() {
        return Err("Grocery name cannot be empty".to_string());
    }

    check_macro("proteins", data.proteins)?;
    check_macro("fats", data.fats)?;
    check_macro("carbohydrates", data.carbohydrates)?;
    if data.proteins + data.fats + data.carbohydrates > 100.0 {
        return Err("proteins + fats + carbohydrates cannot exceed 100 g per 100 g".to_string());
    }

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    if let Some(user_id) = data.user_id {
        require_user(&conn, user_id)?;
    }

    let data = GroceryCreate { name, ..data };
    let grocery = Grocery::create(&conn, &data)
        .map_err(|e| format!("Failed to create grocery: {}", e))?;

    tracing::info!("Added grocery {} ({})", grocery.id, grocery.name);
    Ok(grocery.into())
}

/// Get a grocery with the dishes that use it
pub fn get_grocery(db: &Database, owner: i64, id: i64) -> Result<Option<GroceryDetail>, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    match visible_grocery(&conn, owner, id)? {
        Some(grocery) => {
            let used_in_dishes = Grocery::get_used_in_dishes(&conn, id)
                .map_err(|e| format!("Failed to get dish usage: {}", e))?;
            Ok(Some(GroceryDetail {
                summary: grocery.into(),
                used_in_dishes,
            }))
        }
        None => Ok(None),
    }
}

/// List a user's personal groceries next to the shared catalog
#[allow(clippy::too_many_arguments)]
pub fn list_groceries(
    db: &Database,
    user_id: i64,
    name: Option<&str>,
    is_liquid: Option<bool>,
    sort_by: &str,
    sort_order: &str,
    limit: i64,
    offset: i64,
) -> Result<ListGroceriesResponse, String> {
    let limit = limit.min(500).max(1);
    let offset = offset.max(0);
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let filter = GroceryFilter {
        name: name.map(str::trim).filter(|n| !n.is_empty()).map(str::to_string),
        is_liquid,
    };

    let page = |scope: GroceryScope| -> Result<GroceryPage, String> {
        let items = Grocery::list(&conn, scope, &filter, sort_by, sort_order, limit, offset)
            .map_err(|e| format!("Failed to list groceries: {}", e))?;
        let total = Grocery::count(&conn, scope, &filter)
            .map_err(|e| format!("Failed to count groceries: {}", e))?;
        Ok(GroceryPage {
            items: items.into_iter().map(GrocerySummary::from).collect(),
            total,
        })
    };

    let personal = page(GroceryScope::Personal(user_id))?;
    let shared = page(GroceryScope::Shared)?;

    Ok(ListGroceriesResponse {
        personal,
        shared,
        limit,
        offset,
    })
}

/// Delete a grocery (only allowed if no dish uses it)
pub fn delete_grocery(
    db: &Database,
    owner: i64,
    id: i64,
) -> Result<Result<DeleteGrocerySuccessResponse, DeleteGroceryBlockedResponse>, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    if visible_grocery(&conn, owner, id)?.is_none() {
        return Err(format!("Grocery not found with id: {}", id));
    }

    let used_in_dishes = Grocery::get_used_in_dishes(&conn, id)
        .map_err(|e| format!("Failed to get dish usage: {}", e))?;
    if !used_in_dishes.is_empty() {
        return Ok(Err(DeleteGroceryBlockedResponse {
            error: format!("Cannot delete grocery: used in {} dish(es)", used_in_dishes.len()),
            used_in_dishes,
        }));
    }

    Grocery::delete(&conn, id)
        .map_err(|e| format!("Failed to delete grocery: {}", e))?;

    tracing::info!("Deleted grocery {}", id);
    Ok(Ok(DeleteGrocerySuccessResponse {
        success: true,
        deleted_id: id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_database;
    use crate::tools::users::create_user;

    fn create(user_id: Option<i64>, name: &str, proteins: f64) -> GroceryCreate {
        GroceryCreate {
            user_id,
            name: name.to_string(),
            proteins,
            fats: 2.0,
            carbohydrates: 0.0,
            is_liquid: false,
        }
    }

    #[test]
    fn test_add_grocery_reports_calories() {
        let db = test_database();
        let added = add_grocery(&db, create(None, "  Chicken  ", 20.0)).unwrap();
        assert_eq!(added.grocery.name, "Chicken");
        assert!((added.calories - 100.58).abs() < 1e-9);
    }

    #[test]
    fn test_add_grocery_validation() {
        let db = test_database();
        assert!(add_grocery(&db, create(None, " ", 1.0)).is_err());
        assert!(add_grocery(&db, create(None, "Bad", -1.0)).is_err());
        assert!(add_grocery(&db, create(None, "Too much", 99.0)).is_err());
        assert!(add_grocery(&db, create(Some(404), "Orphan", 1.0)).is_err());
    }

    #[test]
    fn test_list_groceries_separates_catalogs() {
        let db = test_database();
        let user = create_user(&db, "olga", false).unwrap();
        let other = create_user(&db, "pavel", false).unwrap();
        add_grocery(&db, create(Some(user.id), "Mine", 1.0)).unwrap();
        add_grocery(&db, create(Some(other.id), "Theirs", 1.0)).unwrap();
        add_grocery(&db, create(None, "Shared", 1.0)).unwrap();

        let listed = list_groceries(&db, user.id, None, None, "name", "asc", 50, 0).unwrap();
        assert_eq!(listed.personal.total, 1);
        assert_eq!(listed.personal.items[0].grocery.name, "Mine");
        assert_eq!(listed.shared.total, 1);
        assert_eq!(listed.shared.items[0].grocery.name, "Shared");
    }

    #[test]
    fn test_delete_unused_grocery() {
        let db = test_database();
        let user = create_user(&db, "roma", false).unwrap();
        let added = add_grocery(&db, create(None, "Salt", 0.0)).unwrap();
        let result = delete_grocery(&db, user.id, added.grocery.id).unwrap();
        assert!(result.is_ok());
        assert!(get_grocery(&db, user.id, added.grocery.id).unwrap().is_none());
        assert!(delete_grocery(&db, user.id, added.grocery.id).is_err());
    }

    #[test]
    fn test_personal_grocery_hidden_from_others() {
        let db = test_database();
        let owner = create_user(&db, "stepan", false).unwrap();
        let stranger = create_user(&db, "tanya", false).unwrap();
        let private = add_grocery(&db, create(Some(owner.id), "Home jam", 0.5)).unwrap();
        let shared = add_grocery(&db, create(None, "Oats", 12.0)).unwrap();

        assert!(get_grocery(&db, stranger.id, private.grocery.id).unwrap().is_none());
        assert!(get_grocery(&db, stranger.id, shared.grocery.id).unwrap().is_some());
        assert!(delete_grocery(&db, stranger.id, private.grocery.id).is_err());
        assert!(get_grocery(&db, owner.id, private.grocery.id).unwrap().is_some());
    }
}
