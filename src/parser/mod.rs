//! Text pattern parser
//!
//! Turns the ordered phrases of a workout page into typed segments:
//! phrase grammar, interval-run detection, then warmup/cooldown
//! reclassification at the ends of the list.

pub mod grammar;
mod intervals;

pub use grammar::{parse_phrase, Block, Phrase};

use crate::models::{Segment, Workout, HIGH_INTENSITY_THRESHOLD};
use intervals::{collapse_runs, items_from_phrases, Assembled};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Parser tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// First/last blocks below this fraction of FTP become warmup/cooldown.
    /// Shared through `AppConfig::high_intensity_threshold` rather than read
    /// from this section.
    #[serde(skip)]
    pub boundary_threshold: f32,
    /// Largest power difference still treated as the same level in a run
    pub power_tolerance: f32,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            boundary_threshold: HIGH_INTENSITY_THRESHOLD,
            power_tolerance: 0.005,
        }
    }
}

/// Segments recovered from a phrase list
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedPhrases {
    pub segments: Vec<Segment>,
    /// Phrases that matched no grammar, in input order
    pub unparsed: Vec<String>,
}

pub struct PhraseParser {
    config: ParserConfig,
}

impl PhraseParser {
    pub fn new(config: ParserConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Parse an ordered phrase list into segments
    pub fn parse_segments<S: AsRef<str>>(&self, phrases: &[S]) -> ParsedPhrases {
        let mut unparsed = Vec::new();
        let parsed: Vec<Phrase> = phrases
            .iter()
            .map(|text| {
                let phrase = parse_phrase(text.as_ref());
                if let Phrase::Unparsed(raw) = &phrase {
                    warn!(phrase = %raw, "Unrecognized workout phrase");
                    unparsed.push(raw.clone());
                }
                phrase
            })
            .collect();

        let items = items_from_phrases(&parsed, self.config.power_tolerance);
        let assembled = collapse_runs(&items, self.config.power_tolerance);
        let segments = apply_boundary_policy(assembled, self.config.boundary_threshold);

        debug!(
            phrases = phrases.len(),
            segments = segments.len(),
            unparsed = unparsed.len(),
            "Parsed phrase list"
        );

        ParsedPhrases { segments, unparsed }
    }

    /// Parse phrases into a complete workout
    pub fn parse_workout<S: AsRef<str>>(&self, name: impl Into<String>, phrases: &[S]) -> Workout {
        let parsed = self.parse_segments(phrases);
        let mut workout = Workout::new(name, parsed.segments);
        workout.unparsed = parsed.unparsed;
        workout
    }
}

impl Default for PhraseParser {
    fn default() -> Self {
        Self::new(ParserConfig::default())
    }
}

fn apply_boundary_policy(assembled: Vec<Assembled>, threshold: f32) -> Vec<Segment> {
    let len = assembled.len();
    assembled
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            if entry.from_run {
                entry.segment
            } else if len == 1 {
                settle_lone_ramp(entry.segment, threshold)
            } else if index == 0 {
                reclassify_boundary(entry.segment, threshold, Boundary::Start)
            } else if index == len - 1 {
                reclassify_boundary(entry.segment, threshold, Boundary::End)
            } else {
                entry.segment
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Boundary {
    Start,
    End,
}

fn reclassify_boundary(segment: Segment, threshold: f32, boundary: Boundary) -> Segment {
    let (duration_s, power_low, power_high, cadence) = match segment {
        Segment::Ramp {
            duration_s,
            power_low,
            power_high,
            cadence,
        } => (duration_s, power_low, power_high, cadence),
        Segment::Steady {
            duration_s,
            power,
            cadence,
        } => (duration_s, power, power, cadence),
        other => return other,
    };

    if (power_low + power_high) / 2.0 >= threshold {
        return segment;
    }

    match boundary {
        Boundary::Start => Segment::Warmup {
            duration_s,
            power_low,
            power_high,
            cadence,
        },
        Boundary::End => Segment::Cooldown {
            duration_s,
            power_low,
            power_high,
            cadence,
        },
    }
}

/// A lone ramp below the threshold is a warmup when flat or rising, a
/// cooldown when falling. A lone Steady keeps its kind.
fn settle_lone_ramp(segment: Segment, threshold: f32) -> Segment {
    match segment {
        Segment::Ramp {
            power_low, power_high, ..
        } => {
            let boundary = if power_high < power_low {
                Boundary::End
            } else {
                Boundary::Start
            };
            reclassify_boundary(segment, threshold, boundary)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(phrases: &[&str]) -> ParsedPhrases {
        PhraseParser::default().parse_segments(phrases)
    }

    #[test]
    fn test_warmup_steady_cooldown() {
        let parsed = parse(&["10min from 50 to 75% FTP", "2hr @ 73% FTP", "10min from 75 to 70% FTP"]);
        assert_eq!(
            parsed.segments,
            vec![
                Segment::Warmup {
                    duration_s: 600,
                    power_low: 0.50,
                    power_high: 0.75,
                    cadence: None,
                },
                Segment::Steady {
                    duration_s: 7200,
                    power: 0.73,
                    cadence: None,
                },
                Segment::Cooldown {
                    duration_s: 600,
                    power_low: 0.75,
                    power_high: 0.70,
                    cadence: None,
                },
            ]
        );
        assert!(parsed.unparsed.is_empty());
    }

    #[test]
    fn test_high_intensity_ends_stay_put() {
        let parsed = parse(&["5min @ 95% FTP", "10min @ 60% FTP", "3min from 90 to 120% FTP"]);
        assert!(matches!(parsed.segments[0], Segment::Steady { .. }));
        assert!(matches!(parsed.segments[2], Segment::Ramp { .. }));
    }

    #[test]
    fn test_low_steady_at_start_becomes_flat_warmup() {
        let parsed = parse(&["10min @ 55% FTP", "20min @ 95% FTP"]);
        assert_eq!(
            parsed.segments[0],
            Segment::Warmup {
                duration_s: 600,
                power_low: 0.55,
                power_high: 0.55,
                cadence: None,
            }
        );
    }

    #[test]
    fn test_middle_ramp_stays_ramp() {
        let parsed = parse(&[
            "10min from 50 to 65% FTP",
            "5min from 65 to 85% FTP",
            "30min @ 70% FTP",
            "5min from 65 to 50% FTP",
        ]);
        assert!(matches!(parsed.segments[1], Segment::Ramp { .. }));
    }

    #[test]
    fn test_interval_ends_not_reclassified() {
        let phrases: Vec<&str> = (0..3).flat_map(|_| ["1min @ 60% FTP", "1min @ 120% FTP"]).collect();
        let parsed = parse(&phrases);
        assert_eq!(parsed.segments.len(), 1);
        assert!(matches!(
            parsed.segments[0],
            Segment::Intervals {
                repeat: 3,
                on_duration_s: 60,
                ..
            }
        ));
    }

    #[test]
    fn test_single_element_keeps_kind() {
        let parsed = parse(&["45min @ 65% FTP"]);
        assert!(matches!(parsed.segments[0], Segment::Steady { duration_s: 2700, .. }));

        let parsed = parse(&["10min from 70 to 50% FTP"]);
        assert!(matches!(parsed.segments[0], Segment::Cooldown { .. }));
    }

    #[test]
    fn test_lone_hard_ramp_stays_ramp() {
        let parsed = parse(&["5min from 95 to 110% FTP"]);
        assert_eq!(
            parsed.segments,
            vec![Segment::Ramp {
                duration_s: 300,
                power_low: 0.95,
                power_high: 1.10,
                cadence: None,
            }]
        );

        let parsed = parse(&["5min from 50 to 75% FTP"]);
        assert!(matches!(parsed.segments[0], Segment::Warmup { duration_s: 300, .. }));
    }

    #[test]
    fn test_unparsed_recorded_not_fatal() {
        let parsed = parse(&["Sit up and spin", "mystery block"]);
        assert!(parsed.segments.is_empty());
        assert_eq!(parsed.unparsed, vec!["Sit up and spin", "mystery block"]);

        let workout = PhraseParser::default().parse_workout("Nothing", &["Sit up and spin"]);
        assert!(workout.is_degenerate());
        assert_eq!(workout.unparsed.len(), 1);
    }

    #[test]
    fn test_repetition_hint_after_first_pair() {
        let parsed = parse(&[
            "10min from 50 to 70% FTP",
            "30sec @ 150% FTP",
            "30sec @ 50% FTP",
            "repeated 8 times",
            "10min from 70 to 50% FTP",
        ]);
        assert_eq!(parsed.segments.len(), 3);
        assert_eq!(
            parsed.segments[1],
            Segment::Intervals {
                repeat: 8,
                on_duration_s: 30,
                off_duration_s: 30,
                on_power: 1.50,
                off_power: 0.50,
            }
        );
    }
}
