//! Data models
//!
//! Rust structs representing database entities.

mod diet;
mod dish;
mod grocery;
mod meal;
mod nutrition;
mod user;

pub use diet::{time_of_day, Diet, DietCreate, DietEntry, DietUpdate};
pub use dish::{referenced_grocery_ids, Dish, DishComponent, DishCreate, DishUpdate};
pub use grocery::{Grocery, GroceryCreate, GroceryFilter, GroceryScope};
pub use meal::{to_db_timestamp, Meal, MealCreate, MealUpdate};
pub use nutrition::{Aggregate, DishProfile, NutrientProfile};
pub use user::User;
