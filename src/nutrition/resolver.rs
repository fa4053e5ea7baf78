//! Composition resolver
//!
//! Walks dish → groceries, diet → dishes → groceries and meal → dish →
//! groceries, feeding every leaf into a [`WeightedAggregator`].
//!
//! Dish catalog views are normalized per 100 g of dish. Diet entries and meals
//! project the same per-gram profile onto their own amount, so editing a dish
//! changes every meal that references it.

use std::collections::HashMap;

use serde::Serialize;

use super::aggregator::{PerGram, WeightedAggregator};
use super::error::{NutritionError, NutritionResult};
use crate::models::{Aggregate, Diet, DietEntry, Dish, DishProfile, Grocery, Meal, NutrientProfile};

/// Source of grocery nutrient profiles, typically preloaded from storage
pub trait GroceryLookup {
    fn grocery_profile(&self, grocery_id: i64) -> Option<NutrientProfile>;
}

impl GroceryLookup for HashMap<i64, Grocery> {
    fn grocery_profile(&self, grocery_id: i64) -> Option<NutrientProfile> {
        self.get(&grocery_id).map(|g| g.profile)
    }
}

impl GroceryLookup for HashMap<i64, NutrientProfile> {
    fn grocery_profile(&self, grocery_id: i64) -> Option<NutrientProfile> {
        self.get(&grocery_id).copied()
    }
}

impl GroceryLookup for [Grocery] {
    fn grocery_profile(&self, grocery_id: i64) -> Option<NutrientProfile> {
        self.iter().find(|g| g.id == grocery_id).map(|g| g.profile)
    }
}

impl<T: GroceryLookup + ?Sized> GroceryLookup for &T {
    fn grocery_profile(&self, grocery_id: i64) -> Option<NutrientProfile> {
        (**self).grocery_profile(grocery_id)
    }
}

/// Nutrition of one scheduled diet entry
#[derive(Debug, Clone, Serialize)]
pub struct DietEntryNutrition {
    #[serde(flatten)]
    pub entry: DietEntry,
    pub dish_name: String,
    pub per_100g: DishProfile,
    pub nutrition: Aggregate,
}

/// Per-entry nutrition of a diet plus the plan's absolute total
#[derive(Debug, Clone, Serialize)]
pub struct DietBreakdown {
    pub entries: Vec<DietEntryNutrition>,
    /// Summed over entries; `weight_grams` is the sum of entry amounts
    pub total: Aggregate,
}

/// Nutrition of one logged meal
#[derive(Debug, Clone, Serialize)]
pub struct MealNutrition {
    #[serde(flatten)]
    pub meal: Meal,
    pub nutrition: Aggregate,
}

fn check_amount(amount: f64, context: impl FnOnce() -> String) -> NutritionResult<f64> {
    if amount.is_finite() && amount >= 0.0 {
        Ok(amount)
    } else {
        Err(NutritionError::InvalidAmount {
            amount,
            context: context(),
        })
    }
}

fn check_dish(expected: i64, dish: &Dish) -> NutritionResult<()> {
    if dish.id == expected {
        Ok(())
    } else {
        Err(NutritionError::DishMismatch {
            expected,
            actual: dish.id,
        })
    }
}

/// Accumulate every component of a dish
pub fn aggregate_dish<L>(dish: &Dish, groceries: &L) -> NutritionResult<WeightedAggregator>
where
    L: GroceryLookup + ?Sized,
{
    let mut aggregator = WeightedAggregator::new();

    for component in &dish.components {
        let amount = check_amount(component.amount_grams, || {
            format!("grocery {} in dish {}", component.grocery_id, dish.id)
        })?;

        let profile = groceries
            .grocery_profile(component.grocery_id)
            .ok_or(NutritionError::MissingGrocery {
                dish_id: dish.id,
                grocery_id: component.grocery_id,
            })?;

        if !profile.is_valid() {
            return Err(NutritionError::InvalidProfile(component.grocery_id));
        }

        aggregator.accumulate(amount, &profile);
    }

    Ok(aggregator)
}

/// Nutrition per gram of a dish; all zeros for a dish without components
pub fn resolve_dish_per_gram<L>(dish: &Dish, groceries: &L) -> NutritionResult<PerGram>
where
    L: GroceryLookup + ?Sized,
{
    Ok(aggregate_dish(dish, groceries)?.normalized_per_gram())
}

/// Catalog view of a dish: total weight and nutrition per 100 g
pub fn resolve_dish<L>(dish: &Dish, groceries: &L) -> NutritionResult<DishProfile>
where
    L: GroceryLookup + ?Sized,
{
    let aggregator = aggregate_dish(dish, groceries)?;
    Ok(aggregator
        .normalized_per_gram()
        .per_100g(aggregator.total_weight()))
}

/// Absolute nutrition of a diet entry, scaled to the entry's amount
pub fn resolve_diet_entry<L>(entry: &DietEntry, dish: &Dish, groceries: &L) -> NutritionResult<Aggregate>
where
    L: GroceryLookup + ?Sized,
{
    check_dish(entry.dish_id, dish)?;
    let amount = check_amount(entry.amount_grams, || format!("diet entry of dish {}", dish.id))?;
    Ok(resolve_dish_per_gram(dish, groceries)?.scale(amount))
}

/// Absolute nutrition of a logged meal, scaled to the eaten amount
pub fn resolve_meal<L>(meal: &Meal, dish: &Dish, groceries: &L) -> NutritionResult<Aggregate>
where
    L: GroceryLookup + ?Sized,
{
    check_dish(meal.dish_id, dish)?;
    let amount = check_amount(meal.amount_grams, || format!("meal {}", meal.id))?;
    Ok(resolve_dish_per_gram(dish, groceries)?.scale(amount))
}

/// Resolve every entry of a diet and sum them into an absolute total
pub fn resolve_diet<L>(
    diet: &Diet,
    dishes: &HashMap<i64, Dish>,
    groceries: &L,
) -> NutritionResult<DietBreakdown>
where
    L: GroceryLookup + ?Sized,
{
    let mut per_dish: HashMap<i64, (PerGram, DishProfile)> = HashMap::new();
    let mut entries = Vec::with_capacity(diet.entries.len());

    for entry in &diet.entries {
        let dish = dishes
            .get(&entry.dish_id)
            .ok_or(NutritionError::MissingDish(entry.dish_id))?;

        let (per_gram, per_100g) = match per_dish.get(&dish.id) {
            Some(cached) => *cached,
            None => {
                let aggregator = aggregate_dish(dish, groceries)?;
                let per_gram = aggregator.normalized_per_gram();
                let resolved = (per_gram, per_gram.per_100g(aggregator.total_weight()));
                per_dish.insert(dish.id, resolved);
                resolved
            }
        };

        let amount = check_amount(entry.amount_grams, || format!("diet {} entry of dish {}", diet.id, dish.id))?;
        entries.push(DietEntryNutrition {
            entry: *entry,
            dish_name: dish.name.clone(),
            per_100g,
            nutrition: per_gram.scale(amount),
        });
    }

    let total = entries.iter().map(|e| e.nutrition).sum();

    Ok(DietBreakdown { entries, total })
}

/// Resolve a batch of meals against preloaded dishes
pub fn resolve_meals<L>(
    meals: Vec<Meal>,
    dishes: &HashMap<i64, Dish>,
    groceries: &L,
) -> NutritionResult<Vec<MealNutrition>>
where
    L: GroceryLookup + ?Sized,
{
    meals
        .into_iter()
        .map(|meal| {
            let dish = dishes
                .get(&meal.dish_id)
                .ok_or(NutritionError::MissingDish(meal.dish_id))?;
            let nutrition = resolve_meal(&meal, dish, groceries)?;
            Ok(MealNutrition { meal, nutrition })
        })
        .collect()
}
