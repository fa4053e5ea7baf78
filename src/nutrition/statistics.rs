//! Daily statistics
//!
//! Buckets meals into local calendar days over a rolling window.
//!
//! Offsets follow the browser convention: minutes the local clock is *behind*
//! UTC, so `local = utc - offset`. A client at UTC+3 sends `-180`.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Days, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::Serialize;

use super::aggregator::PerGram;
use super::error::{NutritionError, NutritionResult};
use super::resolver::{resolve_dish_per_gram, GroceryLookup};
use crate::models::{Aggregate, Dish, Meal};

/// Number of past days covered by the statistics window, besides today
pub const DEFAULT_STATISTICS_DAYS: u32 = 7;

/// Longest window a caller may ask for
pub const MAX_STATISTICS_DAYS: u32 = 366;

const MINUTES_PER_DAY: i32 = 24 * 60;

/// Convert a browser-style offset into a chrono zone
pub fn offset_of(offset_minutes: i32) -> NutritionResult<FixedOffset> {
    if offset_minutes.unsigned_abs() >= MINUTES_PER_DAY as u32 {
        return Err(NutritionError::InvalidTimezoneOffset(offset_minutes));
    }
    FixedOffset::west_opt(offset_minutes * 60).ok_or(NutritionError::InvalidTimezoneOffset(offset_minutes))
}

/// Calendar date of `instant` on the client's clock
pub fn local_date(instant: &DateTime<Utc>, offset_minutes: i32) -> NutritionResult<NaiveDate> {
    let zone = offset_of(offset_minutes)?;
    Ok(instant.with_timezone(&zone).date_naive())
}

/// Interpret a wall-clock time on the client's clock as a UTC instant
pub fn local_to_utc(local: NaiveDateTime, offset_minutes: i32) -> NutritionResult<DateTime<Utc>> {
    let zone = offset_of(offset_minutes)?;
    local
        .and_local_timezone(zone)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or(NutritionError::InvalidTimezoneOffset(offset_minutes))
}

fn local_midnight(date: NaiveDate, offset_minutes: i32) -> NutritionResult<DateTime<Utc>> {
    local_to_utc(date.and_time(NaiveTime::MIN), offset_minutes)
}

/// Bucket key for a local date: that date's midnight, read as UTC
pub fn bucket_key(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Half-open interval `[from, to)` of local days ending with today
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatisticsWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub first_day: NaiveDate,
    pub last_day: NaiveDate,
}

impl StatisticsWindow {
    /// Window from local midnight `days` days ago up to local midnight tomorrow
    pub fn ending_at(now: DateTime<Utc>, offset_minutes: i32, days: u32) -> NutritionResult<Self> {
        if days > MAX_STATISTICS_DAYS {
            return Err(NutritionError::WindowTooLong {
                days,
                max: MAX_STATISTICS_DAYS,
            });
        }

        let today = local_date(&now, offset_minutes)?;
        let first_day = today
            .checked_sub_days(Days::new(days as u64))
            .ok_or(NutritionError::WindowTooLong {
                days,
                max: MAX_STATISTICS_DAYS,
            })?;
        let tomorrow = today.succ_opt().ok_or(NutritionError::WindowTooLong {
            days,
            max: MAX_STATISTICS_DAYS,
        })?;

        Ok(Self {
            from: local_midnight(first_day, offset_minutes)?,
            to: local_midnight(tomorrow, offset_minutes)?,
            first_day,
            last_day: today,
        })
    }

    pub fn contains(&self, instant: &DateTime<Utc>) -> bool {
        self.from <= *instant && *instant < self.to
    }

    /// Every local date of the window, oldest first
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.first_day.iter_days().take_while(move |d| *d <= self.last_day)
    }
}

/// Nutrition eaten during one local day
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DailyTotals {
    pub calories: f64,
    pub proteins: f64,
    pub fats: f64,
    pub carbohydrates: f64,
    pub meal_count: u32,
}

impl DailyTotals {
    fn record(&mut self, meal: &Aggregate) {
        self.calories += meal.calories;
        self.proteins += meal.proteins;
        self.fats += meal.fats;
        self.carbohydrates += meal.carbohydrates;
        self.meal_count += 1;
    }
}

/// One point of a dense chart series
#[derive(Debug, Clone, Serialize)]
pub struct DailyPoint {
    pub date: DateTime<Utc>,
    #[serde(flatten)]
    pub totals: DailyTotals,
}

/// Sum each meal of the window into the bucket of its local date.
///
/// Days without meals are absent from the map. Meals outside the window are
/// skipped.
pub fn bucket_statistics<L>(
    meals: &[Meal],
    dishes: &HashMap<i64, Dish>,
    groceries: &L,
    offset_minutes: i32,
    window: &StatisticsWindow,
) -> NutritionResult<BTreeMap<DateTime<Utc>, DailyTotals>>
where
    L: GroceryLookup + ?Sized,
{
    let mut per_gram: HashMap<i64, PerGram> = HashMap::new();
    let mut buckets: BTreeMap<DateTime<Utc>, DailyTotals> = BTreeMap::new();

    for meal in meals {
        if !window.contains(&meal.eaten_at) {
            tracing::debug!("Meal {} at {} is outside the statistics window", meal.id, meal.eaten_at);
            continue;
        }

        let profile = match per_gram.get(&meal.dish_id) {
            Some(profile) => *profile,
            None => {
                let dish = dishes
                    .get(&meal.dish_id)
                    .ok_or(NutritionError::MissingDish(meal.dish_id))?;
                let profile = resolve_dish_per_gram(dish, groceries)?;
                per_gram.insert(meal.dish_id, profile);
                profile
            }
        };

        if !(meal.amount_grams.is_finite() && meal.amount_grams >= 0.0) {
            return Err(NutritionError::InvalidAmount {
                amount: meal.amount_grams,
                context: format!("meal {}", meal.id),
            });
        }

        let date = local_date(&meal.eaten_at, offset_minutes)?;
        buckets
            .entry(bucket_key(date))
            .or_default()
            .record(&profile.scale(meal.amount_grams));
    }

    Ok(buckets)
}

/// Dense series over every day of the window, zero where nothing was eaten
pub fn fill_series(
    buckets: &BTreeMap<DateTime<Utc>, DailyTotals>,
    window: &StatisticsWindow,
) -> Vec<DailyPoint> {
    window
        .dates()
        .map(|date| {
            let key = bucket_key(date);
            DailyPoint {
                date: key,
                totals: buckets.get(&key).copied().unwrap_or_default(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nutrition::resolver::tests::{dish, grocery_a};
    use chrono::{Duration, TimeZone, Timelike};

    const EPS: f64 = 1e-9;

    fn meal(id: i64, dish_id: i64, amount_grams: f64, eaten_at: DateTime<Utc>) -> Meal {
        Meal {
            id,
            user_id: 1,
            dish_id,
            dish_name: String::new(),
            amount_grams,
            eaten_at,
        }
    }

    fn dishes() -> HashMap<i64, Dish> {
        let mut dishes = HashMap::new();
        dishes.insert(10, dish(10, vec![(1, 100.0)]));
        dishes.insert(11, dish(11, vec![]));
        dishes
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_offset_sign_convention() {
        // UTC+3 client
        let instant = Utc.with_ymd_and_hms(2024, 3, 4, 22, 30, 0).unwrap();
        assert_eq!(local_date(&instant, -180).unwrap(), date(2024, 3, 5));
        assert_eq!(local_date(&instant, 0).unwrap(), date(2024, 3, 4));

        let local = date(2024, 3, 5).and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(
            local_to_utc(local, -180).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 4, 21, 0, 0).unwrap()
        );
        assert_eq!(
            local_to_utc(local, 300).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 5, 5, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_out_of_range_offset_rejected() {
        let now = Utc::now();
        assert_eq!(
            StatisticsWindow::ending_at(now, 1440, 7).unwrap_err(),
            NutritionError::InvalidTimezoneOffset(1440)
        );
        assert!(offset_of(i32::MIN).is_err());
        assert!(offset_of(-1439).is_ok());
    }

    #[test]
    fn test_window_bounds() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 15, 0, 0).unwrap();
        let window = StatisticsWindow::ending_at(now, 0, DEFAULT_STATISTICS_DAYS).unwrap();

        assert_eq!(window.from, Utc.with_ymd_and_hms(2024, 3, 3, 0, 0, 0).unwrap());
        assert_eq!(window.to, Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap());
        assert_eq!(window.dates().count(), 8);
    }

    #[test]
    fn test_window_length_is_capped() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();

        let longest = StatisticsWindow::ending_at(now, 0, MAX_STATISTICS_DAYS).unwrap();
        assert_eq!(longest.dates().count(), MAX_STATISTICS_DAYS as usize + 1);

        assert_eq!(
            StatisticsWindow::ending_at(now, 0, MAX_STATISTICS_DAYS + 1).unwrap_err(),
            NutritionError::WindowTooLong { days: MAX_STATISTICS_DAYS + 1, max: MAX_STATISTICS_DAYS }
        );
        assert!(StatisticsWindow::ending_at(now, 0, u32::MAX).is_err());
    }

    #[test]
    fn test_window_property_across_offsets() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 23, 59, 59).unwrap();

        for offset in (-720..=840).step_by(15) {
            let zone = offset_of(offset).unwrap();
            let window = StatisticsWindow::ending_at(now, offset, 7).unwrap();

            assert!(window.contains(&now), "offset {}", offset);
            assert_eq!(window.to - window.from, Duration::days(8), "offset {}", offset);

            let local_from = window.from.with_timezone(&zone);
            let local_to = window.to.with_timezone(&zone);
            assert_eq!(local_from.time(), NaiveTime::MIN, "offset {}", offset);
            assert_eq!(local_to.hour(), 0, "offset {}", offset);
            assert_eq!(local_to.date_naive(), local_date(&now, offset).unwrap().succ_opt().unwrap());
        }
    }

    #[test]
    fn test_bucket_keys_stay_inside_window_across_offsets() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 23, 59, 59).unwrap();
        let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap();

        for offset in (-720..=840).step_by(15) {
            let window = StatisticsWindow::ending_at(now, offset, 7).unwrap();

            let mut meals: Vec<Meal> = window
                .dates()
                .map(|day| local_to_utc(day.and_time(noon), offset).unwrap())
                .chain([
                    window.from - Duration::seconds(1),
                    window.from,
                    window.to - Duration::seconds(1),
                    window.to,
                ])
                .enumerate()
                .map(|(i, at)| meal(i as i64, 10, 100.0, at))
                .collect();
            meals.push(meal(99, 10, 100.0, window.to + Duration::hours(20)));

            let buckets = bucket_statistics(&meals, &dishes(), &grocery_a(), offset, &window).unwrap();

            assert_eq!(buckets.len(), 8, "offset {}", offset);
            for key in buckets.keys() {
                let day = key.date_naive();
                assert!(
                    window.first_day <= day && day <= window.last_day,
                    "offset {}: key {} outside {}..={}",
                    offset,
                    key,
                    window.first_day,
                    window.last_day
                );
            }

            let first = &buckets[&bucket_key(window.first_day)];
            let last = &buckets[&bucket_key(window.last_day)];
            assert_eq!(first.meal_count, 2, "offset {}", offset);
            assert_eq!(last.meal_count, 2, "offset {}", offset);
            assert_eq!(buckets.values().map(|t| t.meal_count).sum::<u32>(), 10, "offset {}", offset);
        }
    }

    #[test]
    fn test_midnight_belongs_to_later_day() {
        let now = Utc.with_ymd_and_hms(2024, 3, 6, 12, 0, 0).unwrap();
        // Local midnight of March 5th at UTC+3
        let midnight = Utc.with_ymd_and_hms(2024, 3, 4, 21, 0, 0).unwrap();
        let just_before = midnight - Duration::seconds(1);

        let window = StatisticsWindow::ending_at(now, -180, 7).unwrap();
        let meals = vec![meal(1, 10, 100.0, midnight), meal(2, 10, 100.0, just_before)];
        let buckets = bucket_statistics(&meals, &dishes(), &grocery_a(), -180, &window).unwrap();

        let fifth = buckets.get(&bucket_key(date(2024, 3, 5))).unwrap();
        let fourth = buckets.get(&bucket_key(date(2024, 3, 4))).unwrap();
        assert_eq!(fifth.meal_count, 1);
        assert_eq!(fourth.meal_count, 1);
        assert_eq!(buckets.len(), 2);
    }

    #[test]
    fn test_buckets_sum_scaled_meals() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 20, 0, 0).unwrap();
        let window = StatisticsWindow::ending_at(now, 0, 7).unwrap();
        let meals = vec![
            meal(1, 10, 250.0, Utc.with_ymd_and_hms(2024, 3, 10, 8, 0, 0).unwrap()),
            meal(2, 10, 100.0, Utc.with_ymd_and_hms(2024, 3, 10, 13, 0, 0).unwrap()),
            meal(3, 11, 400.0, Utc.with_ymd_and_hms(2024, 3, 10, 18, 0, 0).unwrap()),
            // outside the window on both ends
            meal(4, 10, 100.0, Utc.with_ymd_and_hms(2024, 3, 2, 23, 0, 0).unwrap()),
            meal(5, 10, 100.0, Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap()),
        ];

        let buckets = bucket_statistics(&meals, &dishes(), &grocery_a(), 0, &window).unwrap();
        assert_eq!(buckets.len(), 1);

        let day = buckets.get(&bucket_key(date(2024, 3, 10))).unwrap();
        assert_eq!(day.meal_count, 3);
        assert!((day.proteins - 70.0).abs() < EPS);
        assert!((day.fats - 7.0).abs() < EPS);
        assert!((day.calories - (251.45 + 100.58)).abs() < 1e-6);
    }

    #[test]
    fn test_unknown_dish_fails() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 20, 0, 0).unwrap();
        let window = StatisticsWindow::ending_at(now, 0, 7).unwrap();
        let meals = vec![meal(1, 77, 10.0, now)];

        let err = bucket_statistics(&meals, &dishes(), &grocery_a(), 0, &window).unwrap_err();
        assert_eq!(err, NutritionError::MissingDish(77));
    }

    #[test]
    fn test_fill_series_is_dense() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 20, 0, 0).unwrap();
        let window = StatisticsWindow::ending_at(now, 0, 7).unwrap();
        let meals = vec![meal(1, 10, 100.0, Utc.with_ymd_and_hms(2024, 3, 7, 9, 0, 0).unwrap())];
        let buckets = bucket_statistics(&meals, &dishes(), &grocery_a(), 0, &window).unwrap();

        let series = fill_series(&buckets, &window);
        assert_eq!(series.len(), 8);
        assert_eq!(series[0].date, bucket_key(date(2024, 3, 3)));
        assert_eq!(series[7].date, bucket_key(date(2024, 3, 10)));
        assert_eq!(series[4].totals.meal_count, 1);
        assert_eq!(series.iter().map(|p| p.totals.meal_count).sum::<u32>(), 1);
    }
}
