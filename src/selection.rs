//! Weekly selection
//!
//! Groups a training plan by week, marks each week's long weekend ride and,
//! in high-volume weeks, one workout to skip. The adjustment engine reads
//! the resulting flags.

use crate::classifier::difficulty_score;
use crate::models::{Classification, Workout};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::{debug, warn};

static WEEK_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    // Matches: Week 3, week_3, week-3, W3
    [r"[Ww]eek[_\s-]?(\d+)", r"(?:^|[^A-Za-z])[Ww](\d+)"]
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect()
});

static DAY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    // Matches: Day 2, day_2, day-2, D2
    [r"[Dd]ay[_\s-]?(\d+)", r"(?:^|[^A-Za-z])[Dd](\d+)"]
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect()
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Weeks with at least this many workouts lose one
    pub skip_threshold: usize,
    /// A last-of-week ride this long is the weekend ride outright
    pub weekend_min_duration_s: u32,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            skip_threshold: 5,
            weekend_min_duration_s: 90 * 60,
        }
    }
}

/// What selection decided for one week
#[derive(Debug, Clone, PartialEq)]
pub struct WeekSelection {
    pub week: u32,
    /// Indices into the slice passed to [`apply_weekly_selection`]
    pub workouts: Vec<usize>,
    pub weekend_ride: Option<usize>,
    pub skipped: Vec<usize>,
}

fn first_number(patterns: &[Regex], text: &str) -> Option<u32> {
    patterns
        .iter()
        .find_map(|pattern| pattern.captures(text))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Week and day numbers embedded in a workout name or file stem
pub fn extract_week_day(name: &str) -> (Option<u32>, Option<u32>) {
    (first_number(&WEEK_PATTERNS, name), first_number(&DAY_PATTERNS, name))
}

/// Workout indices per week, each week ordered by day.
///
/// Workouts without a week number belong to no week and are left out.
pub fn group_by_week(workouts: &[Workout]) -> BTreeMap<u32, Vec<usize>> {
    let mut weeks: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (index, workout) in workouts.iter().enumerate() {
        match workout.week_number {
            Some(week) => weeks.entry(week).or_default().push(index),
            None => debug!(workout = %workout.name, "No week number, leaving out of weekly selection"),
        }
    }

    for indices in weeks.values_mut() {
        // stable, so workouts without a day keep load order at the end
        indices.sort_by_key(|&i| workouts[i].day_of_week.unwrap_or(u32::MAX));
    }
    weeks
}

/// Pick the week's long ride.
///
/// The last workout if it runs at least `weekend_min_duration_s`;
/// otherwise the longest workout if it exceeds `target_duration_s`;
/// otherwise the last workout anyway.
pub fn identify_weekend_ride(
    workouts: &[Workout],
    week: &[usize],
    config: &SelectionConfig,
    target_duration_s: u32,
) -> Option<usize> {
    let last = *week.last()?;
    if workouts[last].total_duration_s >= config.weekend_min_duration_s {
        return Some(last);
    }

    let longest = week
        .iter()
        .copied()
        .max_by(|&a, &b| {
            workouts[a]
                .total_duration_s
                .cmp(&workouts[b].total_duration_s)
                .then(b.cmp(&a))
        })
        .filter(|&i| workouts[i].total_duration_s > target_duration_s);

    Some(longest.unwrap_or(last))
}

fn difficulty(workout: &Workout) -> f32 {
    workout.difficulty_score.unwrap_or_else(|| difficulty_score(workout))
}

fn lightest(workouts: &[Workout], candidates: impl Iterator<Item = usize>) -> Option<usize> {
    candidates.min_by(|&a, &b| difficulty(&workouts[a]).total_cmp(&difficulty(&workouts[b])))
}

/// Choose workouts to drop from a high-volume week.
///
/// Nothing below `skip_threshold` workouts. Otherwise the lightest
/// active-recovery workout, else the lightest workout that is neither an
/// interval session nor the weekend ride.
pub fn identify_workouts_to_skip(
    workouts: &[Workout],
    week: &[usize],
    weekend_ride: Option<usize>,
    config: &SelectionConfig,
) -> Vec<usize> {
    if week.len() < config.skip_threshold {
        return Vec::new();
    }

    let eligible = || week.iter().copied().filter(move |&i| Some(i) != weekend_ride);
    let recovery = lightest(
        workouts,
        eligible().filter(|&i| workouts[i].classification == Some(Classification::ActiveRecovery)),
    );
    let choice = recovery.or_else(|| {
        lightest(
            workouts,
            eligible().filter(|&i| workouts[i].classification != Some(Classification::Interval)),
        )
    });

    match choice {
        Some(index) => vec![index],
        None => {
            warn!(workouts = week.len(), "High-volume week has no workout suitable to skip");
            Vec::new()
        }
    }
}

/// Set `is_weekend_ride` and `should_skip` across a plan.
///
/// Expects workouts to be classified already; unclassified workouts are
/// never taken for recovery or interval sessions.
pub fn apply_weekly_selection(
    workouts: &mut [Workout],
    config: &SelectionConfig,
    target_duration_s: u32,
) -> Vec<WeekSelection> {
    let weeks = group_by_week(workouts);
    let mut selections = Vec::with_capacity(weeks.len());

    for (week, indices) in weeks {
        for &i in &indices {
            workouts[i].is_weekend_ride = false;
            workouts[i].should_skip = false;
        }

        let weekend_ride = identify_weekend_ride(workouts, &indices, config, target_duration_s);
        if let Some(i) = weekend_ride {
            workouts[i].is_weekend_ride = true;
        }

        let skipped = identify_workouts_to_skip(workouts, &indices, weekend_ride, config);
        for &i in &skipped {
            workouts[i].should_skip = true;
        }

        debug!(
            week,
            workouts = indices.len(),
            weekend_ride = ?weekend_ride.map(|i| workouts[i].name.as_str()),
            skipped = skipped.len(),
            "Selected week"
        );

        selections.push(WeekSelection {
            week,
            workouts: indices,
            weekend_ride,
            skipped,
        });
    }

    selections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Segment;

    fn workout(week: u32, day: u32, minutes: u32, power: f32, classification: Classification) -> Workout {
        let mut workout = Workout::new(
            format!("Week {} Day {}", week, day),
            vec![Segment::Steady {
                duration_s: minutes * 60,
                power,
                cadence: None,
            }],
        );
        workout.week_number = Some(week);
        workout.day_of_week = Some(day);
        workout.classification = Some(classification);
        workout.difficulty_score = Some(difficulty_score(&workout));
        workout
    }

    #[test]
    fn test_extract_week_day() {
        assert_eq!(extract_week_day("Week 2 Day 3 - Tempo"), (Some(2), Some(3)));
        assert_eq!(extract_week_day("week_4_day_1"), (Some(4), Some(1)));
        assert_eq!(extract_week_day("w12d5"), (Some(12), Some(5)));
        assert_eq!(extract_week_day("Foundation-Week-3"), (Some(3), None));
        assert_eq!(extract_week_day("Sweet Spot"), (None, None));
    }

    #[test]
    fn test_group_by_week_orders_days() {
        let workouts = vec![
            workout(2, 3, 60, 0.7, Classification::Endurance),
            workout(1, 2, 60, 0.7, Classification::Endurance),
            workout(2, 1, 60, 0.7, Classification::Endurance),
            Workout::new("Loose", Vec::new()),
        ];
        let weeks = group_by_week(&workouts);
        assert_eq!(weeks.len(), 2);
        assert_eq!(weeks[&1], vec![1]);
        assert_eq!(weeks[&2], vec![2, 0]);
    }

    #[test]
    fn test_weekend_ride_rules() {
        let config = SelectionConfig::default();

        // long last ride
        let workouts = vec![
            workout(1, 1, 60, 0.7, Classification::Endurance),
            workout(1, 7, 120, 0.7, Classification::Endurance),
        ];
        assert_eq!(identify_weekend_ride(&workouts, &[0, 1], &config, 4500), Some(1));

        // short last ride, longest is over target
        let workouts = vec![
            workout(1, 1, 80, 0.7, Classification::Endurance),
            workout(1, 7, 45, 0.7, Classification::Endurance),
        ];
        assert_eq!(identify_weekend_ride(&workouts, &[0, 1], &config, 4500), Some(0));

        // nothing long, fall back to last
        let workouts = vec![
            workout(1, 1, 60, 0.7, Classification::Endurance),
            workout(1, 7, 45, 0.7, Classification::Endurance),
        ];
        assert_eq!(identify_weekend_ride(&workouts, &[0, 1], &config, 4500), Some(1));

        assert_eq!(identify_weekend_ride(&workouts, &[], &config, 4500), None);
    }

    #[test]
    fn test_skip_prefers_lightest_recovery() {
        let mut workouts = vec![
            workout(1, 1, 45, 0.55, Classification::ActiveRecovery),
            workout(1, 2, 60, 1.0, Classification::Interval),
            workout(1, 3, 30, 0.50, Classification::ActiveRecovery),
            workout(1, 4, 60, 0.70, Classification::Endurance),
            workout(1, 6, 120, 0.70, Classification::Endurance),
        ];
        let selections = apply_weekly_selection(&mut workouts, &SelectionConfig::default(), 4500);

        assert_eq!(selections.len(), 1);
        assert_eq!(selections[0].weekend_ride, Some(4));
        assert_eq!(selections[0].skipped, vec![2]);
        assert!(workouts[2].should_skip);
        assert!(workouts[4].is_weekend_ride);
        assert_eq!(workouts.iter().filter(|w| w.should_skip).count(), 1);
    }

    #[test]
    fn test_skip_falls_back_to_non_interval() {
        let workouts = vec![
            workout(1, 1, 30, 1.0, Classification::Interval),
            workout(1, 2, 60, 0.75, Classification::Mixed),
            workout(1, 3, 60, 0.70, Classification::Endurance),
            workout(1, 4, 45, 1.1, Classification::Interval),
            workout(1, 6, 120, 0.65, Classification::Endurance),
        ];
        let skipped = identify_workouts_to_skip(&workouts, &[0, 1, 2, 3, 4], Some(4), &SelectionConfig::default());
        assert_eq!(skipped, vec![2]);
    }

    #[test]
    fn test_no_skip_below_threshold_or_without_candidates() {
        let config = SelectionConfig::default();
        let workouts = vec![
            workout(1, 1, 30, 0.5, Classification::ActiveRecovery),
            workout(1, 2, 60, 0.7, Classification::Endurance),
        ];
        assert!(identify_workouts_to_skip(&workouts, &[0, 1], None, &config).is_empty());

        let workouts: Vec<Workout> = (1..=5)
            .map(|day| workout(1, day, 60, 1.0, Classification::Interval))
            .collect();
        assert!(identify_workouts_to_skip(&workouts, &[0, 1, 2, 3, 4], Some(4), &config).is_empty());
    }
}
