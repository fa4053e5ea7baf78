//! Nutrition engine errors
//!
//! Every variant is a broken precondition from the caller: the engine does not
//! coerce bad input into numbers.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NutritionError {
    #[error("Grocery {grocery_id} referenced by dish {dish_id} was not provided")]
    MissingGrocery { dish_id: i64, grocery_id: i64 },

    #[error("Dish {0} was not provided")]
    MissingDish(i64),

    #[error("Expected dish {expected}, got dish {actual}")]
    DishMismatch { expected: i64, actual: i64 },

    #[error("Invalid amount {amount} for {context}")]
    InvalidAmount { amount: f64, context: String },

    #[error("Grocery {0} has a negative or non-numeric macro value")]
    InvalidProfile(i64),

    #[error("Timezone offset {0} minutes is out of range")]
    InvalidTimezoneOffset(i32),

    #[error("Statistics window of {days} days exceeds the limit of {max}")]
    WindowTooLong { days: u32, max: u32 },
}

pub type NutritionResult<T> = Result<T, NutritionError>;
