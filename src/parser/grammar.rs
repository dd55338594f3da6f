//! Phrase grammar for scraped workout text
//!
//! Each list item on a workout page describes one block, e.g.
//! `10min from 50 to 75% FTP`, `2hr @ 73% FTP` or
//! `10 x 1-min @ 88% FTP / 2min @ 73%`. Recognised forms map onto the
//! closed [`Phrase`] enum; everything else is [`Phrase::Unparsed`].

use crate::validation::is_valid_power;
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Power assigned to an all-out `@ MAX` effort
pub const MAX_EFFORT_POWER: f32 = 2.0;

static DURATION_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    // Matches: 2hr, 1hr 30min, 10min, 1-min, 90sec, 30s
    Regex::new(r"(?i)(\d+)\s*-?\s*(hours?|hrs?|h|minutes?|mins?|m|seconds?|secs?|s)\b").ok()
});

static PERCENT_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*%").ok());

static RANGE_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    // Matches: from 50 to 75%, 50% to 75%
    Regex::new(r"(?i)(?:from\s+)?(\d+(?:\.\d+)?)\s*%?\s*to\s*(\d+(?:\.\d+)?)\s*%").ok()
});

static CADENCE_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*rpm,?").ok());

static MAX_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?i)\bmax\b").ok());

static AT_MAX_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?i)@\s*max\b").ok());

static FREE_RIDE_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:free\s*ride|free|rest|recovery)\b").ok());

static LEAD_COUNT_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    // Matches: 10 x 1-min @ ..., 6x30sec @ ...
    Regex::new(r"(?i)^(\d+)\s*[x×]\s*(\S.*)$").ok()
});

static TRAILING_HINT_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    // Matches: repeated 4 times, 4x, 4 times, repeat 4 x
    Regex::new(r"(?i)^(?:repeat(?:ed)?\s+)?(\d+)\s*(?:[x×]|times)$").ok()
});

static LEADING_HINT_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    // Matches: x4, ×4, repeat x 4 times
    Regex::new(r"(?i)^(?:repeat(?:ed)?\s*)?[x×]\s*(\d+)(?:\s*times)?$").ok()
});

/// Constant-power block as written in a phrase
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Block {
    pub duration_s: u32,
    pub power: f32,
    pub cadence: Option<u32>,
}

/// Recognised phrase forms
#[derive(Debug, Clone, PartialEq)]
pub enum Phrase {
    /// `10min from 50 to 75% FTP`
    Ramp {
        duration_s: u32,
        power_low: f32,
        power_high: f32,
        cadence: Option<u32>,
    },

    /// `2hr @ 73% FTP`, or `4 x 2min @ 73% FTP` with a repetition hint for
    /// the pair that starts here
    Steady {
        block: Block,
        repeat_hint: Option<u32>,
    },

    /// `10 x 1-min @ 88% FTP / 2min @ 73%`
    IntervalSet {
        repeat: u32,
        first: Block,
        second: Block,
    },

    /// `5min free ride`, `2min rest`
    FreeRide { duration_s: u32 },

    /// `repeated 4 times`, `x4`: applies to the run just before it
    RepeatHint { count: u32 },

    /// Anything else, kept verbatim
    Unparsed(String),
}

fn captures<'t>(pattern: &LazyLock<Option<Regex>>, text: &'t str) -> Option<Captures<'t>> {
    pattern.as_ref().and_then(|re| re.captures(text))
}

fn capture_u32(caps: &Captures<'_>, group: usize) -> Option<u32> {
    caps.get(group).and_then(|m| m.as_str().parse().ok())
}

fn percent_to_fraction(text: &str) -> Option<f32> {
    let fraction = text.parse::<f32>().ok()? / 100.0;
    is_valid_power(fraction).then_some(fraction)
}

/// Sum every duration token in `text`, `None` when there is none
pub fn parse_duration(text: &str) -> Option<u32> {
    let pattern = DURATION_PATTERN.as_ref()?;
    let mut total: Option<u32> = None;

    for caps in pattern.captures_iter(text) {
        let value = capture_u32(&caps, 1)?;
        let unit = caps.get(2)?.as_str().to_ascii_lowercase();
        let scale = if unit.starts_with('h') {
            3600
        } else if unit.starts_with('m') {
            60
        } else {
            1
        };
        let seconds = value.checked_mul(scale)?;
        total = Some(total.unwrap_or(0).checked_add(seconds)?);
    }

    total.filter(|&seconds| seconds > 0)
}

/// `95rpm` anywhere in the phrase
pub fn parse_cadence(text: &str) -> Option<u32> {
    captures(&CADENCE_PATTERN, text).and_then(|caps| capture_u32(&caps, 1))
}

fn strip_cadence(text: &str) -> String {
    match CADENCE_PATTERN.as_ref() {
        Some(re) => re.replace_all(text, "").into_owned(),
        None => text.to_string(),
    }
}

/// Single power target: first `N%`, or `MAX` for an all-out effort
pub fn parse_power(text: &str) -> Option<f32> {
    if let Some(caps) = captures(&PERCENT_PATTERN, text) {
        return caps.get(1).and_then(|m| percent_to_fraction(m.as_str()));
    }
    captures(&MAX_PATTERN, text).map(|_| MAX_EFFORT_POWER)
}

/// Number of power targets written in `text`: `N%` tokens plus `@ MAX`
fn power_token_count(text: &str) -> usize {
    let count = |pattern: &LazyLock<Option<Regex>>| pattern.as_ref().map_or(0, |re| re.find_iter(text).count());
    count(&PERCENT_PATTERN) + count(&AT_MAX_PATTERN)
}

/// One duration at one power. Comma-joined blocks such as
/// `20min @ 95% FTP, 5min @ 50% FTP` are not a single block.
fn parse_block(text: &str) -> Option<Block> {
    let cadence = parse_cadence(text);
    let body = strip_cadence(text);
    if power_token_count(&body) > 1 {
        return None;
    }
    let power = parse_power(&body)?;
    let duration_s = parse_duration(&body)?;
    Some(Block {
        duration_s,
        power,
        cadence,
    })
}

fn parse_ramp(text: &str) -> Option<Phrase> {
    let caps = captures(&RANGE_PATTERN, text)?;
    let range = caps.get(0)?;
    let outside = format!("{}{}", &text[..range.start()], &text[range.end()..]);
    if power_token_count(&outside) > 0 {
        return None;
    }
    let power_low = caps.get(1).and_then(|m| percent_to_fraction(m.as_str()))?;
    let power_high = caps.get(2).and_then(|m| percent_to_fraction(m.as_str()))?;
    let cadence = parse_cadence(text);
    let duration_s = parse_duration(&strip_cadence(text))?;
    Some(Phrase::Ramp {
        duration_s,
        power_low,
        power_high,
        cadence,
    })
}

fn parse_hint(text: &str) -> Option<u32> {
    let caps = captures(&TRAILING_HINT_PATTERN, text)
        .or_else(|| captures(&LEADING_HINT_PATTERN, text))?;
    capture_u32(&caps, 1).filter(|&count| count > 0)
}

fn parse_repeated(text: &str) -> Option<Phrase> {
    let caps = captures(&LEAD_COUNT_PATTERN, text)?;
    let repeat = capture_u32(&caps, 1).filter(|&count| count > 0)?;
    let rest = caps.get(2)?.as_str();

    let halves: Vec<&str> = rest.split('/').map(str::trim).collect();
    match halves.as_slice() {
        [single] => parse_block(single).map(|block| Phrase::Steady {
            block,
            repeat_hint: Some(repeat),
        }),
        [first, second] => Some(Phrase::IntervalSet {
            repeat,
            first: parse_block(first)?,
            second: parse_block(second)?,
        }),
        _ => None,
    }
}

fn parse_free_ride(text: &str) -> Option<Phrase> {
    captures(&FREE_RIDE_PATTERN, text)?;
    if captures(&PERCENT_PATTERN, text).is_some() {
        return None;
    }
    parse_duration(text).map(|duration_s| Phrase::FreeRide { duration_s })
}

/// Classify one phrase
pub fn parse_phrase(text: &str) -> Phrase {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Phrase::Unparsed(text.to_string());
    }

    if let Some(count) = parse_hint(trimmed) {
        return Phrase::RepeatHint { count };
    }

    if captures(&LEAD_COUNT_PATTERN, trimmed).is_some() {
        return parse_repeated(trimmed).unwrap_or_else(|| Phrase::Unparsed(trimmed.to_string()));
    }

    if captures(&RANGE_PATTERN, trimmed).is_some() {
        return parse_ramp(trimmed).unwrap_or_else(|| Phrase::Unparsed(trimmed.to_string()));
    }

    if let Some(phrase) = parse_free_ride(trimmed) {
        return phrase;
    }

    match parse_block(trimmed) {
        Some(block) => Phrase::Steady {
            block,
            repeat_hint: None,
        },
        None => Phrase::Unparsed(trimmed.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steady(duration_s: u32, power: f32) -> Phrase {
        Phrase::Steady {
            block: Block {
                duration_s,
                power,
                cadence: None,
            },
            repeat_hint: None,
        }
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("10min"), Some(600));
        assert_eq!(parse_duration("2hr"), Some(7200));
        assert_eq!(parse_duration("1hr 30min"), Some(5400));
        assert_eq!(parse_duration("1-min"), Some(60));
        assert_eq!(parse_duration("90sec"), Some(90));
        assert_eq!(parse_duration("1min 30sec"), Some(90));
        assert_eq!(parse_duration("73% FTP"), None);
    }

    #[test]
    fn test_ramp_phrase() {
        assert_eq!(
            parse_phrase("10min from 50 to 75% FTP"),
            Phrase::Ramp {
                duration_s: 600,
                power_low: 0.50,
                power_high: 0.75,
                cadence: None,
            }
        );
        assert_eq!(
            parse_phrase("5min from 75% to 70% FTP"),
            Phrase::Ramp {
                duration_s: 300,
                power_low: 0.75,
                power_high: 0.70,
                cadence: None,
            }
        );
    }

    #[test]
    fn test_steady_phrases() {
        assert_eq!(parse_phrase("2hr @ 73% FTP"), steady(7200, 0.73));
        assert_eq!(parse_phrase("1hr 30min @ 73% FTP"), steady(5400, 0.73));
        assert_eq!(parse_phrase("10min @ 73% FTP"), steady(600, 0.73));
        assert_eq!(parse_phrase("  10min @ 73% FTP  "), steady(600, 0.73));
    }

    #[test]
    fn test_cadence_clause() {
        let expected = Phrase::Steady {
            block: Block {
                duration_s: 300,
                power: 0.85,
                cadence: Some(95),
            },
            repeat_hint: None,
        };
        assert_eq!(parse_phrase("5min @ 95rpm, 85% FTP"), expected);
        assert_eq!(parse_phrase("5min @ 85% FTP @ 95rpm"), expected);
    }

    #[test]
    fn test_max_effort() {
        assert_eq!(parse_phrase("10sec @ MAX"), steady(10, MAX_EFFORT_POWER));
    }

    #[test]
    fn test_interval_set() {
        assert_eq!(
            parse_phrase("10 x 1-min @ 88% FTP / 2min @ 73%"),
            Phrase::IntervalSet {
                repeat: 10,
                first: Block {
                    duration_s: 60,
                    power: 0.88,
                    cadence: None,
                },
                second: Block {
                    duration_s: 120,
                    power: 0.73,
                    cadence: None,
                },
            }
        );
    }

    #[test]
    fn test_repeated_steady() {
        assert_eq!(
            parse_phrase("4 x 2min @ 73% FTP"),
            Phrase::Steady {
                block: Block {
                    duration_s: 120,
                    power: 0.73,
                    cadence: None,
                },
                repeat_hint: Some(4),
            }
        );
    }

    #[test]
    fn test_repeat_hints() {
        assert_eq!(parse_phrase("repeated 4 times"), Phrase::RepeatHint { count: 4 });
        assert_eq!(parse_phrase("x4"), Phrase::RepeatHint { count: 4 });
        assert_eq!(parse_phrase("4x"), Phrase::RepeatHint { count: 4 });
        assert_eq!(parse_phrase("×3"), Phrase::RepeatHint { count: 3 });
        assert_eq!(parse_phrase("0x"), Phrase::Unparsed("0x".to_string()));
    }

    #[test]
    fn test_free_ride() {
        assert_eq!(parse_phrase("5min free ride"), Phrase::FreeRide { duration_s: 300 });
        assert_eq!(parse_phrase("2min rest"), Phrase::FreeRide { duration_s: 120 });
    }

    #[test]
    fn test_unparsed() {
        assert_eq!(
            parse_phrase("Spin easy and enjoy"),
            Phrase::Unparsed("Spin easy and enjoy".to_string())
        );
        assert_eq!(
            parse_phrase("10min @ 450% FTP"),
            Phrase::Unparsed("10min @ 450% FTP".to_string())
        );
        assert!(matches!(parse_phrase(""), Phrase::Unparsed(_)));
    }

    #[test]
    fn test_comma_joined_blocks_unparsed() {
        for text in [
            "20min @ 95% FTP, 5min @ 50% FTP",
            "5x 1min @ 120% FTP, 1min @ 55% FTP",
            "30sec @ MAX, 30sec @ 50% FTP",
            "10min from 50 to 75% FTP, 5min @ 80% FTP",
        ] {
            assert_eq!(parse_phrase(text), Phrase::Unparsed(text.to_string()), "{}", text);
        }
        // one block with a compound duration is still a single block
        assert_eq!(parse_phrase("1hr 30min @ 73% FTP"), steady(5400, 0.73));
    }
}
