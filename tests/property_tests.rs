use proptest::prelude::*;
use zwotrim::adjustment::{AdjustmentConfig, AdjustmentStatus, DurationAdjuster};
use zwotrim::models::{Segment, Workout};
use zwotrim::validation::WorkoutValidator;
use zwotrim::{decode, encode};

/// Power in whole percent so the two-decimal encoding is exact
fn power() -> impl Strategy<Value = f32> {
    (30u32..=150).prop_map(|percent| percent as f32 / 100.0)
}

fn cadence() -> impl Strategy<Value = Option<u32>> {
    proptest::option::of(60u32..=120)
}

fn segment() -> impl Strategy<Value = Segment> {
    prop_oneof![
        (60u32..=1200, power(), power(), cadence()).prop_map(|(duration_s, power_low, power_high, cadence)| {
            Segment::Warmup {
                duration_s,
                power_low,
                power_high,
                cadence,
            }
        }),
        (60u32..=1200, power(), power(), cadence()).prop_map(|(duration_s, power_low, power_high, cadence)| {
            Segment::Cooldown {
                duration_s,
                power_low,
                power_high,
                cadence,
            }
        }),
        (30u32..=1800, power(), power(), cadence()).prop_map(|(duration_s, power_low, power_high, cadence)| {
            Segment::Ramp {
                duration_s,
                power_low,
                power_high,
                cadence,
            }
        }),
        (30u32..=5400, power(), cadence()).prop_map(|(duration_s, power, cadence)| Segment::Steady {
            duration_s,
            power,
            cadence,
        }),
        (1u32..=8, 10u32..=600, 10u32..=600, power(), power()).prop_map(
            |(repeat, on_duration_s, off_duration_s, on_power, off_power)| Segment::Intervals {
                repeat,
                on_duration_s,
                off_duration_s,
                on_power,
                off_power,
            }
        ),
        (30u32..=1800).prop_map(|duration_s| Segment::FreeRide { duration_s }),
    ]
}

/// Any printable text, including empty strings, markup characters and
/// leading or trailing spaces
fn text() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        "[ &<>'\"A-Za-z]{0,12}",
        "\\PC{0,30}",
    ]
}

fn workout() -> impl Strategy<Value = Workout> {
    (
        text(),
        text(),
        text(),
        proptest::collection::vec("[A-Za-z0-9 &\"]{1,10}", 0..3),
        proptest::collection::vec(segment(), 0..10),
    )
        .prop_map(|(name, author, description, tags, segments)| {
            Workout::new(name, segments)
                .with_author(author)
                .with_description(description)
                .with_tags(tags)
        })
}

/// Warmup and cooldown that may already sit under their floors around
/// arbitrary middle blocks
fn bracketed_workout() -> impl Strategy<Value = Workout> {
    (
        30u32..=900,
        proptest::collection::vec(segment(), 0..6),
        30u32..=900,
    )
        .prop_map(|(warmup_s, middle, cooldown_s)| {
            let mut segments = vec![Segment::Warmup {
                duration_s: warmup_s,
                power_low: 0.50,
                power_high: 0.75,
                cadence: None,
            }];
            segments.extend(middle);
            segments.push(Segment::Cooldown {
                duration_s: cooldown_s,
                power_low: 0.65,
                power_high: 0.50,
                cadence: None,
            });
            Workout::new("Bracketed", segments)
        })
}

fn floor_durations(workout: &Workout) -> Vec<(bool, u32)> {
    workout
        .segments
        .iter()
        .filter_map(|s| match s {
            Segment::Warmup { duration_s, .. } => Some((true, *duration_s)),
            Segment::Cooldown { duration_s, .. } => Some((false, *duration_s)),
            _ => None,
        })
        .collect()
}

fn is_protected(segment: &Segment, threshold: f32) -> bool {
    matches!(segment, Segment::Intervals { .. })
        || segment.representative_power().unwrap_or(0.0) >= threshold
}

proptest! {
    #[test]
    fn test_encode_decode_round_trip(original in workout()) {
        let xml = encode(&original).unwrap();
        let decoded = decode(&xml).unwrap();
        prop_assert_eq!(decoded, original);
    }

    #[test]
    fn test_adjustment_duration_invariant(mut workout in workout()) {
        let original_total = workout.total_duration_s;
        let report = DurationAdjuster::default().adjust(&mut workout).unwrap();

        prop_assert!(WorkoutValidator::check_invariants(&workout).is_ok());
        prop_assert_eq!(workout.total_duration_s, report.new_duration_s);

        let target = AdjustmentConfig::default().target_duration_s;
        match report.status {
            AdjustmentStatus::WithinTarget => prop_assert_eq!(workout.total_duration_s, original_total),
            AdjustmentStatus::Modified => {
                prop_assert_eq!(report.shortfall_s, 0);
                prop_assert_eq!(workout.total_duration_s + report.overshoot_s, target);
            }
            AdjustmentStatus::TargetUnreachable => {
                prop_assert!(report.shortfall_s > 0);
                prop_assert_eq!(workout.total_duration_s, target + report.shortfall_s - report.overshoot_s);
            }
            AdjustmentStatus::Skipped | AdjustmentStatus::WeekendRide => prop_assert!(false, "no selection flags set"),
        }
    }

    #[test]
    fn test_protected_segments_survive(mut workout in workout()) {
        let config = AdjustmentConfig::default();
        let protected: Vec<Segment> = workout
            .segments
            .iter()
            .filter(|s| is_protected(s, config.high_intensity_threshold))
            .cloned()
            .collect();

        DurationAdjuster::new(config.clone()).adjust(&mut workout).unwrap();

        let after: Vec<Segment> = workout
            .segments
            .iter()
            .filter(|s| is_protected(s, config.high_intensity_threshold))
            .cloned()
            .collect();
        prop_assert_eq!(after, protected);
    }

    #[test]
    fn test_warmup_cooldown_floor(mut workout in prop_oneof![workout(), bracketed_workout()]) {
        let config = AdjustmentConfig::default();
        let floors = floor_durations(&workout);

        let report = DurationAdjuster::new(config.clone()).adjust(&mut workout).unwrap();
        prop_assert!(WorkoutValidator::check_invariants(&workout).is_ok());
        prop_assert_eq!(workout.total_duration_s, report.new_duration_s);

        let after = floor_durations(&workout);
        // warmups and cooldowns are never removed
        prop_assert_eq!(after.len(), floors.len());
        for ((is_warmup, before), (_, now)) in floors.iter().zip(&after) {
            let minimum = if *is_warmup { config.min_warmup_s } else { config.min_cooldown_s };
            prop_assert!(*now >= minimum.min(*before));
            prop_assert!(now <= before);
        }
    }

    #[test]
    fn test_adjustment_idempotent(mut workout in workout()) {
        let adjuster = DurationAdjuster::default();
        adjuster.adjust(&mut workout).unwrap();
        let once = workout.clone();

        adjuster.adjust(&mut workout).unwrap();
        prop_assert_eq!(workout, once);
    }
}
