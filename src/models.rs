use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Lowest power target a segment may carry, as a fraction of FTP
pub const MIN_POWER: f32 = 0.0;

/// Highest power target a segment may carry (300% of FTP)
pub const MAX_POWER: f32 = 3.0;

/// Default power, as a fraction of FTP, at which work counts as high intensity
pub const HIGH_INTENSITY_THRESHOLD: f32 = 0.90;

/// A single training block inside a structured workout.
///
/// Power values are fractions of FTP (`0.75` is 75%). Durations are whole
/// seconds. Fields only exist on the kinds they apply to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Segment {
    /// Opening ramp, may rise or fall
    Warmup {
        duration_s: u32,
        power_low: f32,
        power_high: f32,
        cadence: Option<u32>,
    },

    /// Closing ramp, may rise or fall
    Cooldown {
        duration_s: u32,
        power_low: f32,
        power_high: f32,
        cadence: Option<u32>,
    },

    /// Constant power block
    Steady {
        duration_s: u32,
        power: f32,
        cadence: Option<u32>,
    },

    /// `repeat` alternations of an on block followed by an off block
    Intervals {
        repeat: u32,
        on_duration_s: u32,
        off_duration_s: u32,
        on_power: f32,
        off_power: f32,
    },

    /// Unstructured riding with no power target
    FreeRide { duration_s: u32 },

    /// Linear ramp in the body of a workout
    Ramp {
        duration_s: u32,
        power_low: f32,
        power_high: f32,
        cadence: Option<u32>,
    },
}

/// Discriminant of a [`Segment`], used for reporting and tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SegmentKind {
    Warmup,
    Cooldown,
    Steady,
    Intervals,
    FreeRide,
    Ramp,
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SegmentKind::Warmup => "Warmup",
            SegmentKind::Cooldown => "Cooldown",
            SegmentKind::Steady => "Steady",
            SegmentKind::Intervals => "Intervals",
            SegmentKind::FreeRide => "FreeRide",
            SegmentKind::Ramp => "Ramp",
        };
        f.write_str(name)
    }
}

impl Segment {
    pub fn kind(&self) -> SegmentKind {
        match self {
            Segment::Warmup { .. } => SegmentKind::Warmup,
            Segment::Cooldown { .. } => SegmentKind::Cooldown,
            Segment::Steady { .. } => SegmentKind::Steady,
            Segment::Intervals { .. } => SegmentKind::Intervals,
            Segment::FreeRide { .. } => SegmentKind::FreeRide,
            Segment::Ramp { .. } => SegmentKind::Ramp,
        }
    }

    /// Time the segment occupies on the trainer, repeats included
    pub fn effective_duration(&self) -> u32 {
        match self {
            Segment::Intervals {
                repeat,
                on_duration_s,
                off_duration_s,
                ..
            } => repeat.saturating_mul(on_duration_s.saturating_add(*off_duration_s)),
            Segment::Warmup { duration_s, .. }
            | Segment::Cooldown { duration_s, .. }
            | Segment::Steady { duration_s, .. }
            | Segment::FreeRide { duration_s }
            | Segment::Ramp { duration_s, .. } => *duration_s,
        }
    }

    /// Mutable handle on the duration of a simple (non-interval) segment
    pub fn duration_mut(&mut self) -> Option<&mut u32> {
        match self {
            Segment::Intervals { .. } => None,
            Segment::Warmup { duration_s, .. }
            | Segment::Cooldown { duration_s, .. }
            | Segment::Steady { duration_s, .. }
            | Segment::FreeRide { duration_s }
            | Segment::Ramp { duration_s, .. } => Some(duration_s),
        }
    }

    /// Single power figure that stands for the whole segment.
    ///
    /// Ramps use the midpoint of their endpoints and interval sets the
    /// duration-weighted mean of on and off power. Free rides have no target.
    pub fn representative_power(&self) -> Option<f32> {
        match self {
            Segment::Steady { power, .. } => Some(*power),
            Segment::Warmup {
                power_low,
                power_high,
                ..
            }
            | Segment::Cooldown {
                power_low,
                power_high,
                ..
            }
            | Segment::Ramp {
                power_low,
                power_high,
                ..
            } => Some((power_low + power_high) / 2.0),
            Segment::Intervals {
                on_duration_s,
                off_duration_s,
                on_power,
                off_power,
                ..
            } => {
                let span = on_duration_s + off_duration_s;
                if span == 0 {
                    return Some(on_power.max(*off_power));
                }
                let weighted = *on_power * *on_duration_s as f32 + *off_power * *off_duration_s as f32;
                Some(weighted / span as f32)
            }
            Segment::FreeRide { .. } => None,
        }
    }

    /// Power-bearing portions of the segment as `(seconds, power)` pairs.
    ///
    /// Interval sets yield their on and off portions separately so that
    /// intensity accounting sees the hard part on its own.
    pub fn power_portions(&self) -> Vec<(u32, f32)> {
        match self {
            Segment::Intervals {
                repeat,
                on_duration_s,
                off_duration_s,
                on_power,
                off_power,
            } => vec![
                (repeat.saturating_mul(*on_duration_s), *on_power),
                (repeat.saturating_mul(*off_duration_s), *off_power),
            ],
            Segment::FreeRide { .. } => Vec::new(),
            other => match other.representative_power() {
                Some(power) => vec![(other.effective_duration(), power)],
                None => Vec::new(),
            },
        }
    }

    pub fn cadence(&self) -> Option<u32> {
        match self {
            Segment::Warmup { cadence, .. }
            | Segment::Cooldown { cadence, .. }
            | Segment::Steady { cadence, .. }
            | Segment::Ramp { cadence, .. } => *cadence,
            Segment::Intervals { .. } | Segment::FreeRide { .. } => None,
        }
    }

    /// Every power field the segment carries
    pub fn power_values(&self) -> Vec<f32> {
        match self {
            Segment::Warmup {
                power_low,
                power_high,
                ..
            }
            | Segment::Cooldown {
                power_low,
                power_high,
                ..
            }
            | Segment::Ramp {
                power_low,
                power_high,
                ..
            } => vec![*power_low, *power_high],
            Segment::Steady { power, .. } => vec![*power],
            Segment::Intervals {
                on_power, off_power, ..
            } => vec![*on_power, *off_power],
            Segment::FreeRide { .. } => Vec::new(),
        }
    }

    /// Short human-readable description, e.g. `10min @ 73%`
    pub fn describe(&self) -> String {
        match self {
            Segment::Warmup {
                duration_s,
                power_low,
                power_high,
                ..
            }
            | Segment::Cooldown {
                duration_s,
                power_low,
                power_high,
                ..
            }
            | Segment::Ramp {
                duration_s,
                power_low,
                power_high,
                ..
            } => format!(
                "{} from {:.0} to {:.0}%",
                format_duration(*duration_s),
                power_low * 100.0,
                power_high * 100.0
            ),
            Segment::Steady {
                duration_s, power, ..
            } => format!("{} @ {:.0}%", format_duration(*duration_s), power * 100.0),
            Segment::Intervals {
                repeat,
                on_duration_s,
                off_duration_s,
                on_power,
                off_power,
            } => format!(
                "{} x {} @ {:.0}% / {} @ {:.0}%",
                repeat,
                format_duration(*on_duration_s),
                on_power * 100.0,
                format_duration(*off_duration_s),
                off_power * 100.0
            ),
            Segment::FreeRide { duration_s } => format!("{} free ride", format_duration(*duration_s)),
        }
    }
}

/// Format seconds as `1hr 5min`, `10min` or `90sec`
pub fn format_duration(seconds: u32) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    let mut parts = Vec::new();
    if hours > 0 {
        parts.push(format!("{}hr", hours));
    }
    if minutes > 0 {
        parts.push(format!("{}min", minutes));
    }
    if secs > 0 || parts.is_empty() {
        parts.push(format!("{}sec", secs));
    }
    parts.join(" ")
}

/// Workout category assigned by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    ActiveRecovery,
    Endurance,
    Interval,
    Mixed,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Classification::ActiveRecovery => "active_recovery",
            Classification::Endurance => "endurance",
            Classification::Interval => "interval",
            Classification::Mixed => "mixed",
        };
        f.write_str(name)
    }
}

/// A structured workout: ordered segments plus metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workout {
    /// Display name
    pub name: String,

    /// Author line written to the document
    pub author: String,

    /// Free-form description
    pub description: String,

    /// Tag names attached to the workout
    pub tags: Vec<String>,

    /// Segments in riding order; the workout owns them exclusively
    pub segments: Vec<Segment>,

    /// Sum of the segments' effective durations in seconds
    pub total_duration_s: u32,

    /// Category attached by the classifier
    pub classification: Option<Classification>,

    /// Relative load, lower is lighter
    pub difficulty_score: Option<f32>,

    /// Training-plan week this workout belongs to
    pub week_number: Option<u32>,

    /// Day within the week
    pub day_of_week: Option<u32>,

    /// Long ride of the week, never shortened
    pub is_weekend_ride: bool,

    /// Dropped from the week, never shortened
    pub should_skip: bool,

    /// Phrases the text parser could not recognise
    #[serde(default)]
    pub unparsed: Vec<String>,

    /// File the workout was loaded from
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Workout {
    /// Build a workout whose total matches its segments
    pub fn new(name: impl Into<String>, segments: Vec<Segment>) -> Self {
        let mut workout = Self {
            name: name.into(),
            author: String::new(),
            description: String::new(),
            tags: Vec::new(),
            segments,
            total_duration_s: 0,
            classification: None,
            difficulty_score: None,
            week_number: None,
            day_of_week: None,
            is_weekend_ride: false,
            should_skip: false,
            unparsed: Vec::new(),
            source: None,
        };
        workout.recalculate_total();
        workout
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Sum of effective segment durations
    pub fn segment_duration_sum(&self) -> u32 {
        self.segments
            .iter()
            .fold(0u32, |acc, s| acc.saturating_add(s.effective_duration()))
    }

    /// Bring `total_duration_s` back in line with the segments
    pub fn recalculate_total(&mut self) {
        self.total_duration_s = self.segment_duration_sum();
    }

    /// Zero segments or zero total. Valid, but nothing to classify or trim.
    pub fn is_degenerate(&self) -> bool {
        self.segments.is_empty() || self.total_duration_s == 0
    }

    pub fn duration_minutes(&self) -> f32 {
        self.total_duration_s as f32 / 60.0
    }
}
