//! Dish MCP Tools
//!
//! Tools for managing dishes. Every response carries the dish's nutrition per
//! 100 g, resolved from the current grocery profiles.

use std::collections::HashSet;

use rusqlite::Connection;
use serde::Serialize;

use super::users::require_user;
use crate::db::Database;
use crate::models::{Dish, DishComponent, DishCreate, DishProfile, DishUpdate, Grocery};
use crate::nutrition::resolve_dish;

/// A dish component with its grocery name
#[derive(Debug, Serialize)]
pub struct ComponentDetail {
    pub grocery_id: i64,
    pub grocery_name: String,
    pub amount_grams: f64,
}

/// Full dish detail response
#[derive(Debug, Serialize)]
pub struct DishDetail {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub components: Vec<ComponentDetail>,
    #[serde(flatten)]
    pub profile: DishProfile,
    pub created_at: String,
    pub updated_at: String,
}

/// Summary of a dish for list results
#[derive(Debug, Serialize)]
pub struct DishSummary {
    pub id: i64,
    pub name: String,
    pub components_count: usize,
    #[serde(flatten)]
    pub profile: DishProfile,
}

/// Response for list_dishes
#[derive(Debug, Serialize)]
pub struct ListDishesResponse {
    pub dishes: Vec<DishSummary>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Response for delete_dish
#[derive(Debug, Serialize)]
pub struct DeleteDishResponse {
    pub success: bool,
    pub deleted_id: i64,
    pub meals_removed: i64,
    pub diet_entries_removed: i64,
}

/// Check amounts, duplicates and grocery visibility for `owner`
fn validate_components(conn: &Connection, owner: i64, components: &[DishComponent]) -> Result<(), String> {
    let mut seen = HashSet::new();

    for component in components {
        if !component.amount_grams.is_finite() || component.amount_grams <= 0.0 {
            return Err(format!(
                "amount_grams for grocery {} must be greater than 0",
                component.grocery_id
            ));
        }
        if !seen.insert(component.grocery_id) {
            return Err(format!("Grocery {} is listed more than once", component.grocery_id));
        }

        let grocery = Grocery::get_by_id(conn, component.grocery_id)
            .map_err(|e| format!("Database error checking grocery: {}", e))?
            .ok_or_else(|| format!("Grocery not found with id: {}", component.grocery_id))?;

        if grocery.user_id.is_some_and(|id| id != owner) {
            return Err(format!(
                "Grocery {} belongs to another user",
                component.grocery_id
            ));
        }
    }

    Ok(())
}

/// The dish with `id`, unless it belongs to someone other than `owner`
fn owned_dish(conn: &Connection, owner: i64, id: i64) -> Result<Option<Dish>, String> {
    let dish = Dish::get_by_id(conn, id)
        .map_err(|e| format!("Failed to get dish: {}", e))?;
    Ok(dish.filter(|d| d.user_id == owner))
}

fn build_detail(conn: &Connection, dish: Dish) -> Result<DishDetail, String> {
    let groceries = Grocery::lookup_for_dishes(conn, [&dish])
        .map_err(|e| format!("Failed to load groceries: {}", e))?;
    let profile = resolve_dish(&dish, &groceries)
        .map_err(|e| format!("Failed to resolve dish nutrition: {}", e))?;

    let components = dish
        .components
        .iter()
        .map(|c| ComponentDetail {
            grocery_id: c.grocery_id,
            grocery_name: groceries
                .get(&c.grocery_id)
                .map(|g| g.name.clone())
                .unwrap_or_default(),
            amount_grams: c.amount_grams,
        })
        .collect();

    Ok(DishDetail {
        id: dish.id,
        user_id: dish.user_id,
        name: dish.name,
        components,
        profile,
        created_at: dish.created_at,
        updated_at: dish.updated_at,
    })
}

/// Create a dish from groceries
pub fn create_dish(db: &Database, data: DishCreate) -> Result<DishDetail, String> {
    let name = data.name.trim().to_string();
    if name.is_empty() {
        return Err("Dish name cannot be empty".to_string());
    }

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    require_user(&conn, data.user_id)?;
    validate_components(&conn, data.user_id, &data.components)?;

    let data = DishCreate { name, ..data };
    let dish = Dish::create(&conn, &data)
        .map_err(|e| format!("Failed to create dish: {}", e))?;

    tracing::info!("Created dish {} ({}) with {} components", dish.id, dish.name, dish.components.len());
    build_detail(&conn, dish)
}

/// Get a dish with its nutrition per 100 g
pub fn get_dish(db: &Database, owner: i64, id: i64) -> Result<Option<DishDetail>, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    match owned_dish(&conn, owner, id)? {
        Some(dish) => build_detail(&conn, dish).map(Some),
        None => Ok(None),
    }
}

/// List a user's dishes with optional name search
pub fn list_dishes(
    db: &Database,
    user_id: i64,
    query: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<ListDishesResponse, String> {
    let limit = limit.min(200).max(1);
    let offset = offset.max(0);
    let query = query.map(str::trim).filter(|q| !q.is_empty());
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let dishes = Dish::list(&conn, user_id, query, limit, offset)
        .map_err(|e| format!("Failed to list dishes: {}", e))?;
    let total = Dish::count(&conn, user_id, query)
        .map_err(|e| format!("Failed to count dishes: {}", e))?;

    let groceries = Grocery::lookup_for_dishes(&conn, &dishes)
        .map_err(|e| format!("Failed to load groceries: {}", e))?;

    let dishes = dishes
        .into_iter()
        .map(|dish| {
            let profile = resolve_dish(&dish, &groceries)
                .map_err(|e| format!("Failed to resolve dish {}: {}", dish.id, e))?;
            Ok(DishSummary {
                id: dish.id,
                name: dish.name,
                components_count: dish.components.len(),
                profile,
            })
        })
        .collect::<Result<Vec<_>, String>>()?;

    Ok(ListDishesResponse {
        dishes,
        total,
        limit,
        offset,
    })
}

/// Rename a dish and/or replace its components
pub fn update_dish(db: &Database, owner: i64, id: i64, data: DishUpdate) -> Result<Option<DishDetail>, String> {
    if let Some(ref name) = data.name {
        if name.trim().is_empty() {
            return Err("Dish name cannot be empty".to_string());
        }
    }

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    if owned_dish(&conn, owner, id)?.is_none() {
        return Ok(None);
    }

    if let Some(ref components) = data.components {
        validate_components(&conn, owner, components)?;
    }

    let data = DishUpdate {
        name: data.name.map(|n| n.trim().to_string()),
        ..data
    };
    let updated = Dish::update(&conn, id, &data)
        .map_err(|e| format!("Failed to update dish: {}", e))?;

    match updated {
        Some(dish) => {
            tracing::info!("Updated dish {}", dish.id);
            build_detail(&conn, dish).map(Some)
        }
        None => Ok(None),
    }
}

/// Delete a dish together with the meals and diet entries that reference it
pub fn delete_dish(db: &Database, owner: i64, id: i64) -> Result<DeleteDishResponse, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    if owned_dish(&conn, owner, id)?.is_none() {
        return Err(format!("Dish not found with id: {}", id));
    }

    let (meals_removed, diet_entries_removed) = Dish::get_reference_counts(&conn, id)
        .map_err(|e| format!("Failed to count references: {}", e))?;

    Dish::delete(&conn, id)
        .map_err(|e| format!("Failed to delete dish: {}", e))?;

    tracing::info!(
        "Deleted dish {} along with {} meal(s) and {} diet entr(ies)",
        id,
        meals_removed,
        diet_entries_removed
    );

    Ok(DeleteDishResponse {
        success: true,
        deleted_id: id,
        meals_removed,
        diet_entries_removed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_database;
    use crate::models::GroceryCreate;
    use crate::tools::groceries::add_grocery;
    use crate::tools::users::create_user;

    fn grocery(db: &Database, user_id: Option<i64>, name: &str, proteins: f64, fats: f64) -> i64 {
        add_grocery(
            db,
            GroceryCreate {
                user_id,
                name: name.to_string(),
                proteins,
                fats,
                carbohydrates: 0.0,
                is_liquid: false,
            },
        )
        .unwrap()
        .grocery
        .id
    }

    #[test]
    fn test_dish_detail_is_per_100g() {
        let db = test_database();
        let user = create_user(&db, "rita", false).unwrap();
        let chicken = grocery(&db, None, "Chicken", 20.0, 2.0);

        let dish = create_dish(
            &db,
            DishCreate {
                user_id: user.id,
                name: "Boiled chicken".to_string(),
                components: vec![DishComponent { grocery_id: chicken, amount_grams: 300.0 }],
            },
        )
        .unwrap();

        assert_eq!(dish.profile.weight_grams, 300.0);
        assert!((dish.profile.calories_per_100g - 100.58).abs() < 1e-9);
        assert_eq!(dish.components[0].grocery_name, "Chicken");
    }

    #[test]
    fn test_components_validated() {
        let db = test_database();
        let user = create_user(&db, "sasha", false).unwrap();
        let other = create_user(&db, "timur", false).unwrap();
        let private = grocery(&db, Some(other.id), "Secret sauce", 1.0, 1.0);
        let shared = grocery(&db, None, "Bread", 8.0, 1.0);

        let make = |components: Vec<DishComponent>| DishCreate {
            user_id: user.id,
            name: "Sandwich".to_string(),
            components,
        };

        assert!(create_dish(&db, make(vec![DishComponent { grocery_id: private, amount_grams: 10.0 }])).is_err());
        assert!(create_dish(&db, make(vec![DishComponent { grocery_id: shared, amount_grams: 0.0 }])).is_err());
        assert!(create_dish(
            &db,
            make(vec![
                DishComponent { grocery_id: shared, amount_grams: 10.0 },
                DishComponent { grocery_id: shared, amount_grams: 20.0 },
            ])
        )
        .is_err());
        assert!(create_dish(&db, make(vec![DishComponent { grocery_id: shared, amount_grams: 60.0 }])).is_ok());
    }

    #[test]
    fn test_update_replaces_components() {
        let db = test_database();
        let user = create_user(&db, "ulya", false).unwrap();
        let rice = grocery(&db, None, "Rice", 7.0, 1.0);
        let butter = grocery(&db, None, "Butter", 1.0, 82.0);

        let dish = create_dish(
            &db,
            DishCreate {
                user_id: user.id,
                name: "Rice".to_string(),
                components: vec![DishComponent { grocery_id: rice, amount_grams: 200.0 }],
            },
        )
        .unwrap();

        let updated = update_dish(
            &db,
            user.id,
            dish.id,
            DishUpdate {
                name: Some(" Buttered rice ".to_string()),
                components: Some(vec![
                    DishComponent { grocery_id: rice, amount_grams: 190.0 },
                    DishComponent { grocery_id: butter, amount_grams: 10.0 },
                ]),
            },
        )
        .unwrap()
        .unwrap();

        assert_eq!(updated.name, "Buttered rice");
        assert_eq!(updated.components.len(), 2);
        assert_eq!(updated.profile.weight_grams, 200.0);
        assert!(updated.profile.fats_per_100g > dish.profile.fats_per_100g);

        assert!(update_dish(&db, user.id, 9999, DishUpdate::default()).unwrap().is_none());
    }

    #[test]
    fn test_list_and_delete() {
        let db = test_database();
        let user = create_user(&db, "vera", false).unwrap();
        for name in ["Soup", "Salad", "Stew"] {
            create_dish(
                &db,
                DishCreate { user_id: user.id, name: name.to_string(), components: vec![] },
            )
            .unwrap();
        }

        let listed = list_dishes(&db, user.id, Some("s"), 2, 0).unwrap();
        assert_eq!(listed.total, 3);
        assert_eq!(listed.dishes.len(), 2);
        assert_eq!(listed.dishes[0].name, "Salad");
        assert_eq!(listed.dishes[0].profile, DishProfile::default());

        let deleted = delete_dish(&db, user.id, listed.dishes[0].id).unwrap();
        assert!(deleted.success);
        assert_eq!(deleted.meals_removed, 0);
        assert!(get_dish(&db, user.id, listed.dishes[0].id).unwrap().is_none());
    }

    #[test]
    fn test_other_users_dish_is_not_found() {
        let db = test_database();
        let owner = create_user(&db, "gleb", false).unwrap();
        let stranger = create_user(&db, "inna", false).unwrap();
        let bread = grocery(&db, None, "Bread", 8.0, 1.0);

        let dish = create_dish(
            &db,
            DishCreate {
                user_id: owner.id,
                name: "Toast".to_string(),
                components: vec![DishComponent { grocery_id: bread, amount_grams: 50.0 }],
            },
        )
        .unwrap();

        assert!(get_dish(&db, stranger.id, dish.id).unwrap().is_none());
        let rename = DishUpdate { name: Some("Mine now".to_string()), components: None };
        assert!(update_dish(&db, stranger.id, dish.id, rename).unwrap().is_none());
        assert!(delete_dish(&db, stranger.id, dish.id).is_err());

        let kept = get_dish(&db, owner.id, dish.id).unwrap().unwrap();
        assert_eq!(kept.name, "Toast");
    }
}
