//! Calorie model
//!
//! Energy density coefficients in kcal per gram of macro-nutrient.

/// kcal per gram of protein
pub const PROTEIN_KCAL_PER_GRAM: f64 = 4.1;

/// kcal per gram of fat
pub const FAT_KCAL_PER_GRAM: f64 = 9.29;

/// kcal per gram of carbohydrate
pub const CARBOHYDRATE_KCAL_PER_GRAM: f64 = 4.2;

/// Calories contained in the given masses (grams) of protein, fat and carbohydrate
pub fn from_masses(proteins: f64, fats: f64, carbohydrates: f64) -> f64 {
    proteins * PROTEIN_KCAL_PER_GRAM
        + fats * FAT_KCAL_PER_GRAM
        + carbohydrates * CARBOHYDRATE_KCAL_PER_GRAM
}
