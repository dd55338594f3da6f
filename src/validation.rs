use crate::error::InvariantViolation;
use crate::models::{Segment, Workout, MAX_POWER, MIN_POWER};
use std::fmt;

/// Shortest workout that does not draw a warning
const MIN_REASONABLE_DURATION_S: u32 = 5 * 60;

/// Longest workout that does not draw a warning
const MAX_REASONABLE_DURATION_S: u32 = 4 * 3600;

/// Soft problems that leave the workout usable
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationWarning {
    /// No segments at all
    Degenerate,
    /// Total below five minutes
    VeryShort { duration_s: u32 },
    /// Total above four hours
    VeryLong { duration_s: u32 },
    /// Workout opens with something other than an easy block
    UnusualFirstSegment { kind: String },
    /// Workout closes with something other than an easy block
    UnusualLastSegment { kind: String },
    /// Text phrases that produced no segment
    UnparsedPhrases { count: usize },
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationWarning::Degenerate => write!(f, "workout has no segments"),
            ValidationWarning::VeryShort { duration_s } => {
                write!(f, "workout is very short ({}s)", duration_s)
            }
            ValidationWarning::VeryLong { duration_s } => {
                write!(f, "workout is very long ({}s)", duration_s)
            }
            ValidationWarning::UnusualFirstSegment { kind } => {
                write!(f, "first segment is {}", kind)
            }
            ValidationWarning::UnusualLastSegment { kind } => {
                write!(f, "last segment is {}", kind)
            }
            ValidationWarning::UnparsedPhrases { count } => {
                write!(f, "{} phrase(s) could not be parsed", count)
            }
        }
    }
}

/// Outcome of a full validation pass
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<InvariantViolation>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Structural checks on a workout
pub struct WorkoutValidator;

impl WorkoutValidator {
    /// Collect every invariant violation and soft warning
    pub fn validate_workout(workout: &Workout) -> ValidationResult {
        let mut result = ValidationResult::default();

        for (index, segment) in workout.segments.iter().enumerate() {
            Self::validate_segment(index, segment, &mut result.errors);
        }

        let actual = workout.segment_duration_sum();
        if actual != workout.total_duration_s {
            result.errors.push(InvariantViolation::DurationMismatch {
                declared: workout.total_duration_s,
                actual,
            });
        }

        Self::collect_warnings(workout, &mut result.warnings);
        result
    }

    /// First invariant violation, if any
    pub fn check_invariants(workout: &Workout) -> Result<(), InvariantViolation> {
        match Self::validate_workout(workout).errors.into_iter().next() {
            Some(violation) => Err(violation),
            None => Ok(()),
        }
    }

    fn validate_segment(index: usize, segment: &Segment, errors: &mut Vec<InvariantViolation>) {
        match segment {
            Segment::Intervals {
                repeat,
                on_duration_s,
                off_duration_s,
                ..
            } => {
                if *repeat < 1 {
                    errors.push(InvariantViolation::InvalidRepeat {
                        index,
                        repeat: *repeat,
                    });
                }
                if *on_duration_s == 0 || *off_duration_s == 0 {
                    errors.push(InvariantViolation::NonPositiveDuration { index });
                }
            }
            other => {
                if other.effective_duration() == 0 {
                    errors.push(InvariantViolation::NonPositiveDuration { index });
                }
            }
        }

        for power in segment.power_values() {
            if !is_valid_power(power) {
                errors.push(InvariantViolation::PowerOutOfRange { index, power });
            }
        }
    }

    fn collect_warnings(workout: &Workout, warnings: &mut Vec<ValidationWarning>) {
        if workout.segments.is_empty() {
            warnings.push(ValidationWarning::Degenerate);
        } else if workout.total_duration_s < MIN_REASONABLE_DURATION_S {
            warnings.push(ValidationWarning::VeryShort {
                duration_s: workout.total_duration_s,
            });
        } else if workout.total_duration_s > MAX_REASONABLE_DURATION_S {
            warnings.push(ValidationWarning::VeryLong {
                duration_s: workout.total_duration_s,
            });
        }

        if let Some(first) = workout.segments.first() {
            if matches!(first, Segment::Intervals { .. } | Segment::Cooldown { .. }) {
                warnings.push(ValidationWarning::UnusualFirstSegment {
                    kind: first.kind().to_string(),
                });
            }
        }

        if workout.segments.len() > 1 {
            if let Some(last) = workout.segments.last() {
                if matches!(last, Segment::Intervals { .. } | Segment::Warmup { .. }) {
                    warnings.push(ValidationWarning::UnusualLastSegment {
                        kind: last.kind().to_string(),
                    });
                }
            }
        }

        if !workout.unparsed.is_empty() {
            warnings.push(ValidationWarning::UnparsedPhrases {
                count: workout.unparsed.len(),
            });
        }
    }
}

/// Finite and within 0-300% of FTP
pub fn is_valid_power(power: f32) -> bool {
    power.is_finite() && (MIN_POWER..=MAX_POWER).contains(&power)
}
