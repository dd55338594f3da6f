//! Workout classification
//!
//! Keyword scan over name and description first, then an intensity profile
//! of the segments. Also produces the difficulty score used to pick the
//! lightest workout of a week.

use crate::models::{Classification, Segment, Workout, HIGH_INTENSITY_THRESHOLD};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Classification thresholds and keyword sets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub recovery_keywords: Vec<String>,
    pub endurance_keywords: Vec<String>,
    pub interval_keywords: Vec<String>,
    /// Power at or above which time counts as high intensity. Shared through
    /// `AppConfig::high_intensity_threshold` rather than read from this section.
    #[serde(skip)]
    pub high_intensity_threshold: f32,
    /// Share of high-intensity time above which a workout is an interval session
    pub interval_ratio_threshold: f32,
    /// Endurance rides run longer than this
    pub endurance_min_duration_s: u32,
    /// Endurance rides average below this
    pub endurance_max_power: f32,
    /// Recovery rides run shorter than this
    pub recovery_max_duration_s: u32,
    /// Recovery rides average below this
    pub recovery_max_power: f32,
}

fn keywords(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            recovery_keywords: keywords(&["recovery", "rest", "easy", "active recovery"]),
            endurance_keywords: keywords(&["endurance", "base", "long", "steady"]),
            interval_keywords: keywords(&[
                "interval",
                "intervals",
                "vo2",
                "vo2max",
                "threshold",
                "sweet spot",
                "sweetspot",
                "tempo",
                "over under",
                "over unders",
                "hiit",
                "sprint",
                "sprints",
                "explosive",
                "crisscross",
                "step",
                "steps",
            ]),
            high_intensity_threshold: HIGH_INTENSITY_THRESHOLD,
            interval_ratio_threshold: 0.30,
            endurance_min_duration_s: 90 * 60,
            endurance_max_power: 0.75,
            recovery_max_duration_s: 60 * 60,
            recovery_max_power: 0.65,
        }
    }
}

/// Outcome of classifying one workout
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    pub classification: Classification,
    pub difficulty_score: f32,
    pub average_power: f32,
    pub intensity_ratio: f32,
    /// Keyword that decided the category, if any
    pub matched_keyword: Option<String>,
}

pub struct WorkoutClassifier {
    config: ClassifierConfig,
}

impl WorkoutClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn classify(&self, workout: &Workout) -> ClassificationResult {
        let average_power = average_power(&workout.segments);
        let intensity_ratio = intensity_ratio(workout, self.config.high_intensity_threshold);
        let difficulty_score = difficulty_score(workout);

        let keyword_match = self.match_keywords(workout);
        let classification = match &keyword_match {
            Some((classification, _)) => *classification,
            None => self.classify_by_profile(workout, average_power, intensity_ratio),
        };

        debug!(
            workout = %workout.name,
            %classification,
            average_power,
            intensity_ratio,
            difficulty_score,
            "Classified workout"
        );

        ClassificationResult {
            classification,
            difficulty_score,
            average_power,
            intensity_ratio,
            matched_keyword: keyword_match.map(|(_, keyword)| keyword),
        }
    }

    /// Classify and store the result on the workout
    pub fn annotate(&self, workout: &mut Workout) -> ClassificationResult {
        let result = self.classify(workout);
        workout.classification = Some(result.classification);
        workout.difficulty_score = Some(result.difficulty_score);
        result
    }

    fn match_keywords(&self, workout: &Workout) -> Option<(Classification, String)> {
        let tokens = tokenize(&format!("{} {}", workout.name, workout.description));
        let sets = [
            (Classification::ActiveRecovery, &self.config.recovery_keywords),
            (Classification::Endurance, &self.config.endurance_keywords),
            (Classification::Interval, &self.config.interval_keywords),
        ];

        sets.into_iter().find_map(|(classification, words)| {
            words
                .iter()
                .find(|keyword| contains_phrase(&tokens, &tokenize(keyword)))
                .map(|keyword| (classification, keyword.clone()))
        })
    }

    fn classify_by_profile(&self, workout: &Workout, average_power: f32, intensity_ratio: f32) -> Classification {
        let total = workout.total_duration_s;
        if total == 0 {
            return Classification::Mixed;
        }

        if intensity_ratio > self.config.interval_ratio_threshold {
            Classification::Interval
        } else if total > self.config.endurance_min_duration_s && average_power < self.config.endurance_max_power {
            Classification::Endurance
        } else if total < self.config.recovery_max_duration_s && average_power < self.config.recovery_max_power {
            Classification::ActiveRecovery
        } else {
            Classification::Mixed
        }
    }
}

impl Default for WorkoutClassifier {
    fn default() -> Self {
        Self::new(ClassifierConfig::default())
    }
}

/// Lower-cased alphanumeric words; punctuation and underscores separate words
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}

fn contains_phrase(tokens: &[String], phrase: &[String]) -> bool {
    !phrase.is_empty() && tokens.windows(phrase.len()).any(|window| window == phrase)
}

/// Duration-weighted mean power over every power-bearing portion.
///
/// Interval sets contribute their on and off portions separately. Free
/// rides carry no target and are left out. Zero when nothing carries power.
pub fn average_power(segments: &[Segment]) -> f32 {
    let (weighted, seconds) = segments
        .iter()
        .flat_map(Segment::power_portions)
        .fold((0.0f64, 0u64), |(weighted, seconds), (duration, power)| {
            (weighted + power as f64 * duration as f64, seconds + duration as u64)
        });

    if seconds == 0 {
        0.0
    } else {
        (weighted / seconds as f64) as f32
    }
}

/// Share of the workout spent at or above `threshold`
pub fn intensity_ratio(workout: &Workout, threshold: f32) -> f32 {
    if workout.total_duration_s == 0 {
        return 0.0;
    }

    let hard: u64 = workout
        .segments
        .iter()
        .flat_map(Segment::power_portions)
        .filter(|(_, power)| *power >= threshold)
        .map(|(duration, _)| duration as u64)
        .sum();

    (hard as f64 / workout.total_duration_s as f64) as f32
}

/// `average_power * minutes / 100`, lower is lighter
pub fn difficulty_score(workout: &Workout) -> f32 {
    average_power(&workout.segments) * workout.duration_minutes() / 100.0
}
