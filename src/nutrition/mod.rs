//! Nutrition engine
//!
//! Pure aggregation over preloaded models: grocery macros roll up into dishes,
//! dishes into diets and meals, meals into daily statistics.

pub mod aggregator;
pub mod calories;
pub mod diet_view;
pub mod error;
pub mod resolver;
pub mod statistics;

pub use aggregator::{PerGram, WeightedAggregator};
pub use diet_view::{remaining_diet_entries_today, RemainingEntry};
pub use error::{NutritionError, NutritionResult};
pub use resolver::{
    resolve_diet, resolve_diet_entry, resolve_dish, resolve_dish_per_gram, resolve_meal,
    resolve_meals, DietBreakdown, DietEntryNutrition, GroceryLookup, MealNutrition,
};
pub use statistics::{
    bucket_statistics, fill_series, local_date, local_to_utc, DailyPoint, DailyTotals,
    StatisticsWindow, DEFAULT_STATISTICS_DAYS, MAX_STATISTICS_DAYS,
};
