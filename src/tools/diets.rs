//! Diet MCP Tools
//!
//! Tools for meal plans and the per-user diet selection.

use rusqlite::Connection;
use serde::Serialize;

use super::load_dishes;
use super::users::require_user;
use crate::db::Database;
use crate::models::{Aggregate, Diet, DietCreate, DietEntry, DietUpdate, Dish, User};
use crate::nutrition::{resolve_diet, DietEntryNutrition};

/// Full diet detail with per-entry and total nutrition
#[derive(Debug, Serialize)]
pub struct DietDetail {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub selected: bool,
    pub entries: Vec<DietEntryNutrition>,
    pub total: Aggregate,
    pub created_at: String,
    pub updated_at: String,
}

/// Summary of a diet for list results
#[derive(Debug, Serialize)]
pub struct DietSummary {
    pub id: i64,
    pub name: String,
    pub selected: bool,
    pub entries_count: usize,
    pub total: Aggregate,
}

/// Response for list_diets
#[derive(Debug, Serialize)]
pub struct ListDietsResponse {
    pub diets: Vec<DietSummary>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Response for select_diet
#[derive(Debug, Serialize)]
pub struct SelectDietResponse {
    pub user_id: i64,
    pub selected_diet_id: Option<i64>,
}

/// Response for delete_diet
#[derive(Debug, Serialize)]
pub struct DeleteDietResponse {
    pub success: bool,
    pub deleted_id: i64,
    /// The diet was the owner's selection, which is now cleared
    pub was_selected: bool,
}

fn validate_entries(conn: &Connection, owner: i64, entries: &[DietEntry]) -> Result<(), String> {
    for entry in entries {
        if !entry.amount_grams.is_finite() || entry.amount_grams <= 0.0 {
            return Err(format!(
                "amount_grams for dish {} must be greater than 0",
                entry.dish_id
            ));
        }

        let dish = Dish::get_by_id(conn, entry.dish_id)
            .map_err(|e| format!("Database error checking dish: {}", e))?
            .ok_or_else(|| format!("Dish not found with id: {}", entry.dish_id))?;
        if dish.user_id != owner {
            return Err(format!("Dish {} belongs to another user", entry.dish_id));
        }
    }
    Ok(())
}

/// The diet with `id`, unless it belongs to someone other than `owner`
fn owned_diet(conn: &Connection, owner: i64, id: i64) -> Result<Option<Diet>, String> {
    let diet = Diet::get_by_id(conn, id)
        .map_err(|e| format!("Failed to get diet: {}", e))?;
    Ok(diet.filter(|d| d.user_id == owner))
}

fn resolve_totals(conn: &Connection, diet: &Diet) -> Result<(Vec<DietEntryNutrition>, Aggregate), String> {
    let (dishes, groceries) = load_dishes(conn, diet.entries.iter().map(|e| e.dish_id).collect())?;
    let breakdown = resolve_diet(diet, &dishes, &groceries)
        .map_err(|e| format!("Failed to resolve diet {}: {}", diet.id, e))?;
    Ok((breakdown.entries, breakdown.total))
}

fn build_detail(conn: &Connection, diet: Diet) -> Result<DietDetail, String> {
    let (entries, total) = resolve_totals(conn, &diet)?;
    Ok(DietDetail {
        id: diet.id,
        user_id: diet.user_id,
        name: diet.name,
        selected: diet.selected,
        entries,
        total,
        created_at: diet.created_at,
        updated_at: diet.updated_at,
    })
}

/// Create a diet from scheduled dishes
pub fn create_diet(db: &Database, data: DietCreate) -> Result<DietDetail, String> {
    let name = data.name.trim().to_string();
    if name.is_empty() {
        return Err("Diet name cannot be empty".to_string());
    }

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    require_user(&conn, data.user_id)?;
    validate_entries(&conn, data.user_id, &data.entries)?;

    let data = DietCreate { name, ..data };
    let diet = Diet::create(&conn, &data)
        .map_err(|e| format!("Failed to create diet: {}", e))?;

    tracing::info!("Created diet {} ({}) with {} entries", diet.id, diet.name, diet.entries.len());
    build_detail(&conn, diet)
}

/// Get a diet with resolved nutrition
pub fn get_diet(db: &Database, owner: i64, id: i64) -> Result<Option<DietDetail>, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    match owned_diet(&conn, owner, id)? {
        Some(diet) => build_detail(&conn, diet).map(Some),
        None => Ok(None),
    }
}

/// List a user's diets with optional name search
pub fn list_diets(
    db: &Database,
    user_id: i64,
    query: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<ListDietsResponse, String> {
    let limit = limit.min(200).max(1);
    let offset = offset.max(0);
    let query = query.map(str::trim).filter(|q| !q.is_empty());
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let diets = Diet::list(&conn, user_id, query, limit, offset)
        .map_err(|e| format!("Failed to list diets: {}", e))?;
    let total = Diet::count(&conn, user_id, query)
        .map_err(|e| format!("Failed to count diets: {}", e))?;

    let diets = diets
        .into_iter()
        .map(|diet| {
            let (_, nutrition) = resolve_totals(&conn, &diet)?;
            Ok(DietSummary {
                id: diet.id,
                name: diet.name,
                selected: diet.selected,
                entries_count: diet.entries.len(),
                total: nutrition,
            })
        })
        .collect::<Result<Vec<_>, String>>()?;

    Ok(ListDietsResponse {
        diets,
        total,
        limit,
        offset,
    })
}

/// Rename a diet and/or replace its entries
pub fn update_diet(db: &Database, owner: i64, id: i64, data: DietUpdate) -> Result<Option<DietDetail>, String> {
    if let Some(ref name) = data.name {
        if name.trim().is_empty() {
            return Err("Diet name cannot be empty".to_string());
        }
    }

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    if owned_diet(&conn, owner, id)?.is_none() {
        return Ok(None);
    }

    if let Some(ref entries) = data.entries {
        validate_entries(&conn, owner, entries)?;
    }

    let data = DietUpdate {
        name: data.name.map(|n| n.trim().to_string()),
        ..data
    };
    let updated = Diet::update(&conn, id, &data)
        .map_err(|e| format!("Failed to update diet: {}", e))?;

    match updated {
        Some(diet) => {
            tracing::info!("Updated diet {}", diet.id);
            build_detail(&conn, diet).map(Some)
        }
        None => Ok(None),
    }
}

/// Delete a diet, clearing the owner's selection if it pointed here
pub fn delete_diet(db: &Database, owner: i64, id: i64) -> Result<DeleteDietResponse, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let diet = owned_diet(&conn, owner, id)?
        .ok_or_else(|| format!("Diet not found with id: {}", id))?;

    Diet::delete(&conn, id)
        .map_err(|e| format!("Failed to delete diet: {}", e))?;

    tracing::info!("Deleted diet {}", id);
    Ok(DeleteDietResponse {
        success: true,
        deleted_id: id,
        was_selected: diet.selected,
    })
}

/// Select one of the user's diets, or clear the selection with `None`
pub fn select_diet(db: &Database, user_id: i64, diet_id: Option<i64>) -> Result<SelectDietResponse, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let user = User::select_diet(&conn, user_id, diet_id)
        .map_err(|e| format!("Failed to select diet: {}", e))?;

    tracing::info!("User {} selected diet {:?}", user.id, user.selected_diet_id);
    Ok(SelectDietResponse {
        user_id: user.id,
        selected_diet_id: user.selected_diet_id,
    })
}

/// The user's selected diet with resolved nutrition
pub fn get_selected_diet(db: &Database, user_id: i64) -> Result<Option<DietDetail>, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let diet = User::selected_diet(&conn, user_id)
        .map_err(|e| format!("Failed to get selected diet: {}", e))?;

    match diet {
        Some(diet) => build_detail(&conn, diet).map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_database;
    use crate::models::{DishComponent, DishCreate, GroceryCreate};
    use crate::tools::dishes::create_dish;
    use crate::tools::groceries::add_grocery;
    use crate::tools::users::create_user;
    use chrono::NaiveTime;

    fn at(hour: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, 0, 0).unwrap()
    }

    /// A user owning one dish made of 100 g of {20, 2, 0}
    fn fixture(db: &Database, login: &str) -> (i64, i64) {
        let user = create_user(db, login, false).unwrap();
        let grocery = add_grocery(
            db,
            GroceryCreate {
                user_id: None,
                name: format!("Chicken for {}", login),
                proteins: 20.0,
                fats: 2.0,
                carbohydrates: 0.0,
                is_liquid: false,
            },
        )
        .unwrap();
        let dish = create_dish(
            db,
            DishCreate {
                user_id: user.id,
                name: "Chicken".to_string(),
                components: vec![DishComponent { grocery_id: grocery.grocery.id, amount_grams: 100.0 }],
            },
        )
        .unwrap();
        (user.id, dish.id)
    }

    #[test]
    fn test_diet_totals_are_absolute() {
        let db = test_database();
        let (user_id, dish_id) = fixture(&db, "yana");

        let diet = create_diet(
            &db,
            DietCreate {
                user_id,
                name: "Cut".to_string(),
                entries: vec![
                    DietEntry { dish_id, amount_grams: 150.0, time: at(13) },
                    DietEntry { dish_id, amount_grams: 100.0, time: at(8) },
                ],
            },
        )
        .unwrap();

        assert_eq!(diet.entries.len(), 2);
        assert_eq!(diet.entries[0].entry.time, at(8));
        assert_eq!(diet.total.weight_grams, 250.0);
        assert!((diet.total.proteins - 50.0).abs() < 1e-9);
        assert!((diet.total.calories - 251.45).abs() < 1e-9);
        assert!(!diet.selected);
    }

    #[test]
    fn test_entries_validated() {
        let db = test_database();
        let (user_id, dish_id) = fixture(&db, "zoya");
        let (other_id, _) = fixture(&db, "arkady");

        let foreign = DietCreate {
            user_id: other_id,
            name: "Borrowed".to_string(),
            entries: vec![DietEntry { dish_id, amount_grams: 100.0, time: at(9) }],
        };
        assert!(create_diet(&db, foreign).is_err());

        let empty_amount = DietCreate {
            user_id,
            name: "Nothing".to_string(),
            entries: vec![DietEntry { dish_id, amount_grams: 0.0, time: at(9) }],
        };
        assert!(create_diet(&db, empty_amount).is_err());
    }

    #[test]
    fn test_selection_flow() {
        let db = test_database();
        let (user_id, dish_id) = fixture(&db, "bogdan");
        let make = |name: &str| DietCreate {
            user_id,
            name: name.to_string(),
            entries: vec![DietEntry { dish_id, amount_grams: 100.0, time: at(12) }],
        };
        let first = create_diet(&db, make("First")).unwrap();
        let second = create_diet(&db, make("Second")).unwrap();

        assert!(get_selected_diet(&db, user_id).unwrap().is_none());

        select_diet(&db, user_id, Some(first.id)).unwrap();
        select_diet(&db, user_id, Some(second.id)).unwrap();
        let selected = get_selected_diet(&db, user_id).unwrap().unwrap();
        assert_eq!(selected.id, second.id);
        assert!(selected.selected);

        let listed = list_diets(&db, user_id, None, 50, 0).unwrap();
        assert_eq!(listed.diets.iter().filter(|d| d.selected).count(), 1);

        let deleted = delete_diet(&db, user_id, second.id).unwrap();
        assert!(deleted.was_selected);
        assert!(get_selected_diet(&db, user_id).unwrap().is_none());
    }

    #[test]
    fn test_update_replaces_entries() {
        let db = test_database();
        let (user_id, dish_id) = fixture(&db, "darya");
        let diet = create_diet(
            &db,
            DietCreate {
                user_id,
                name: "Plan".to_string(),
                entries: vec![DietEntry { dish_id, amount_grams: 100.0, time: at(8) }],
            },
        )
        .unwrap();

        let updated = update_diet(
            &db,
            user_id,
            diet.id,
            DietUpdate {
                name: None,
                entries: Some(vec![DietEntry { dish_id, amount_grams: 300.0, time: at(19) }]),
            },
        )
        .unwrap()
        .unwrap();

        assert_eq!(updated.entries.len(), 1);
        assert_eq!(updated.total.weight_grams, 300.0);
        assert_eq!(updated.name, "Plan");
    }

    #[test]
    fn test_other_users_diet_is_not_found() {
        let db = test_database();
        let (owner_id, dish_id) = fixture(&db, "egor");
        let (stranger_id, _) = fixture(&db, "faina");
        let diet = create_diet(
            &db,
            DietCreate {
                user_id: owner_id,
                name: "Private".to_string(),
                entries: vec![DietEntry { dish_id, amount_grams: 100.0, time: at(8) }],
            },
        )
        .unwrap();

        assert!(get_diet(&db, stranger_id, diet.id).unwrap().is_none());
        let rename = DietUpdate { name: Some("Taken".to_string()), entries: None };
        assert!(update_diet(&db, stranger_id, diet.id, rename).unwrap().is_none());
        assert!(delete_diet(&db, stranger_id, diet.id).is_err());

        let kept = get_diet(&db, owner_id, diet.id).unwrap().unwrap();
        assert_eq!(kept.name, "Private");
    }
}
