//! Shared nutrition value types
//!
//! Used across groceries, dishes, diets, meals and statistics.

use serde::{Deserialize, Serialize};

/// Macro-nutrient content per 100 grams of a grocery
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NutrientProfile {
    pub proteins: f64,      // grams per 100 g
    pub fats: f64,          // grams per 100 g
    pub carbohydrates: f64, // grams per 100 g
}

impl NutrientProfile {
    pub fn new(proteins: f64, fats: f64, carbohydrates: f64) -> Self {
        Self {
            proteins,
            fats,
            carbohydrates,
        }
    }

    /// All fields finite and non-negative
    pub fn is_valid(&self) -> bool {
        [self.proteins, self.fats, self.carbohydrates]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0)
    }
}

/// Derived absolute nutrition of some amount of food. Never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    pub weight_grams: f64,
    pub calories: f64,
    pub proteins: f64,
    pub fats: f64,
    pub carbohydrates: f64,
}

impl Aggregate {
    /// An aggregate with all zeros
    pub fn zero() -> Self {
        Self::default()
    }
}

/// Field by field, weights included
impl std::ops::Add for Aggregate {
    type Output = Aggregate;

    fn add(self, other: Aggregate) -> Aggregate {
        Aggregate {
            weight_grams: self.weight_grams + other.weight_grams,
            calories: self.calories + other.calories,
            proteins: self.proteins + other.proteins,
            fats: self.fats + other.fats,
            carbohydrates: self.carbohydrates + other.carbohydrates,
        }
    }
}

impl std::ops::AddAssign for Aggregate {
    fn add_assign(&mut self, other: Aggregate) {
        *self = *self + other;
    }
}

impl std::iter::Sum for Aggregate {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Aggregate::zero(), |acc, a| acc + a)
    }
}

/// Catalog view of a dish: nutrition per 100 g of the finished dish
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DishProfile {
    /// Total weight of all components
    pub weight_grams: f64,
    pub calories_per_100g: f64,
    pub proteins_per_100g: f64,
    pub fats_per_100g: f64,
    pub carbohydrates_per_100g: f64,
}
