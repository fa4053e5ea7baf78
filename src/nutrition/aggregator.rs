//! Weighted nutrient aggregation
//!
//! Accumulates (grams, per-100g profile) pairs into total weight and total
//! nutrient mass, and projects the result back onto any amount of food.

use serde::Serialize;

use super::calories;
use crate::models::{Aggregate, DishProfile, NutrientProfile};

/// Nutrition contained in one gram of a mixture
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PerGram {
    pub calories: f64,
    pub proteins: f64,
    pub fats: f64,
    pub carbohydrates: f64,
}

impl PerGram {
    /// Absolute nutrition of `amount_grams` of the mixture
    pub fn scale(&self, amount_grams: f64) -> Aggregate {
        Aggregate {
            weight_grams: amount_grams,
            calories: self.calories * amount_grams,
            proteins: self.proteins * amount_grams,
            fats: self.fats * amount_grams,
            carbohydrates: self.carbohydrates * amount_grams,
        }
    }

    /// Catalog view: the same mixture expressed per 100 g
    pub fn per_100g(&self, total_weight_grams: f64) -> DishProfile {
        let hundred = self.scale(100.0);
        DishProfile {
            weight_grams: total_weight_grams,
            calories_per_100g: hundred.calories,
            proteins_per_100g: hundred.proteins,
            fats_per_100g: hundred.fats,
            carbohydrates_per_100g: hundred.carbohydrates,
        }
    }
}

/// Running totals of weight and macro-nutrient mass
#[derive(Debug, Clone, Default)]
pub struct WeightedAggregator {
    weight: f64,
    proteins: f64,
    fats: f64,
    carbohydrates: f64,
}

impl WeightedAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `amount_grams` of food with the given per-100g profile.
    ///
    /// `amount_grams` must be non-negative; zero is a no-op contribution.
    pub fn accumulate(&mut self, amount_grams: f64, profile: &NutrientProfile) {
        debug_assert!(amount_grams >= 0.0, "negative amount: {}", amount_grams);

        self.weight += amount_grams;
        self.proteins += profile.proteins * amount_grams / 100.0;
        self.fats += profile.fats * amount_grams / 100.0;
        self.carbohydrates += profile.carbohydrates * amount_grams / 100.0;
    }

    /// Total accumulated weight in grams
    pub fn total_weight(&self) -> f64 {
        self.weight
    }

    /// Nutrition per gram of the accumulated mixture; all zeros when empty
    pub fn normalized_per_gram(&self) -> PerGram {
        if self.weight == 0.0 {
            return PerGram::default();
        }

        PerGram {
            calories: calories::from_masses(self.proteins, self.fats, self.carbohydrates)
                / self.weight,
            proteins: self.proteins / self.weight,
            fats: self.fats / self.weight,
            carbohydrates: self.carbohydrates / self.weight,
        }
    }

    /// Per-gram nutrition projected onto `target_grams` of the mixture
    pub fn scaled_to(&self, target_grams: f64) -> Aggregate {
        self.normalized_per_gram().scale(target_grams)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_empty_aggregator_is_all_zero() {
        let agg = WeightedAggregator::new();
        assert_eq!(agg.total_weight(), 0.0);
        assert_eq!(agg.normalized_per_gram(), PerGram::default());

        let scaled = agg.scaled_to(250.0);
        assert_eq!(scaled.calories, 0.0);
        assert_eq!(scaled.proteins, 0.0);
        assert!(!scaled.calories.is_nan());
    }

    #[test]
    fn test_zero_amount_is_noop() {
        let mut agg = WeightedAggregator::new();
        agg.accumulate(0.0, &NutrientProfile::new(50.0, 50.0, 0.0));
        assert_eq!(agg.total_weight(), 0.0);
        assert_eq!(agg.normalized_per_gram(), PerGram::default());
    }

    #[test]
    fn test_round_trip_reproduces_profile() {
        let profiles = [
            NutrientProfile::new(20.0, 2.0, 0.0),
            NutrientProfile::new(3.3, 1.0, 4.8),
            NutrientProfile::new(0.0, 99.9, 0.0),
        ];
        let amounts = [1.0, 37.5, 100.0, 1234.0];

        for profile in &profiles {
            for &amount in &amounts {
                let mut agg = WeightedAggregator::new();
                agg.accumulate(amount, profile);
                let result = agg.normalized_per_gram().scale(amount);

                assert!((result.proteins - profile.proteins * amount / 100.0).abs() < EPS);
                assert!((result.fats - profile.fats * amount / 100.0).abs() < EPS);
                assert!(
                    (result.carbohydrates - profile.carbohydrates * amount / 100.0).abs() < EPS
                );
                assert!((result.weight_grams - amount).abs() < EPS);
            }
        }
    }

    #[test]
    fn test_weighted_average_of_two_groceries() {
        // 100 g at 20 g protein + 300 g at 0 g protein = 5 g protein per 100 g
        let mut agg = WeightedAggregator::new();
        agg.accumulate(100.0, &NutrientProfile::new(20.0, 0.0, 0.0));
        agg.accumulate(300.0, &NutrientProfile::new(0.0, 0.0, 10.0));

        let per_100 = agg.normalized_per_gram().per_100g(agg.total_weight());
        assert_eq!(per_100.weight_grams, 400.0);
        assert!((per_100.proteins_per_100g - 5.0).abs() < EPS);
        assert!((per_100.carbohydrates_per_100g - 7.5).abs() < EPS);
        assert!((per_100.calories_per_100g - (5.0 * 4.1 + 7.5 * 4.2)).abs() < EPS);
    }
}
