//! Ration Tools module
//!
//! MCP tool implementations for the Ration nutrition tracker.

use std::collections::HashMap;

use rusqlite::Connection;

use crate::models::{Dish, Grocery};

pub mod diets;
pub mod dishes;
pub mod groceries;
pub mod meals;
pub mod status;
pub mod users;

/// Load the given dishes and every grocery they reference, ready for resolution
pub(crate) fn load_dishes(
    conn: &Connection,
    mut dish_ids: Vec<i64>,
) -> Result<(HashMap<i64, Dish>, HashMap<i64, Grocery>), String> {
    dish_ids.sort_unstable();
    dish_ids.dedup();

    let dishes = Dish::get_many(conn, &dish_ids)
        .map_err(|e| format!("Failed to load dishes: {}", e))?;
    let groceries = Grocery::lookup_for_dishes(conn, dishes.values())
        .map_err(|e| format!("Failed to load groceries: {}", e))?;

    Ok((dishes, groceries))
}
