//! Interval-run detection over provisional blocks
//!
//! Workout pages list every on/off block of a set separately, or show the
//! first pair followed by a repetition marker. Both collapse into a single
//! `Intervals` segment here.

use super::grammar::{Block, Phrase};
use crate::models::Segment;
use tracing::debug;

/// Provisional list entry produced from phrases
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Item {
    /// Constant-power block that may join an interval run
    Steady { block: Block, lead_hint: Option<u32> },
    /// Ramp or free ride, never part of a run
    Fixed(Segment),
    /// Interval set written out explicitly in a single phrase
    Explicit(Segment),
    /// Repetition marker for the run just before it
    Hint(u32),
}

/// Expand recognised phrases into provisional items
pub(crate) fn items_from_phrases(phrases: &[Phrase], tolerance: f32) -> Vec<Item> {
    let mut items = Vec::with_capacity(phrases.len());

    for phrase in phrases {
        match phrase {
            Phrase::Ramp {
                duration_s,
                power_low,
                power_high,
                cadence,
            } => items.push(Item::Fixed(Segment::Ramp {
                duration_s: *duration_s,
                power_low: *power_low,
                power_high: *power_high,
                cadence: *cadence,
            })),
            Phrase::Steady { block, repeat_hint } => items.push(Item::Steady {
                block: *block,
                lead_hint: *repeat_hint,
            }),
            Phrase::IntervalSet {
                repeat,
                first,
                second,
            } => expand_interval_set(*repeat, first, second, tolerance, &mut items),
            Phrase::FreeRide { duration_s } => items.push(Item::Fixed(Segment::FreeRide {
                duration_s: *duration_s,
            })),
            Phrase::RepeatHint { count } => items.push(Item::Hint(*count)),
            Phrase::Unparsed(_) => {}
        }
    }

    items
}

fn expand_interval_set(repeat: u32, first: &Block, second: &Block, tolerance: f32, items: &mut Vec<Item>) {
    if same_power(first.power, second.power, tolerance) {
        let duration_s = repeat.saturating_mul(first.duration_s + second.duration_s);
        items.push(Item::Steady {
            block: Block {
                duration_s,
                ..*first
            },
            lead_hint: None,
        });
    } else if repeat == 1 {
        items.push(Item::Steady {
            block: *first,
            lead_hint: None,
        });
        items.push(Item::Steady {
            block: *second,
            lead_hint: None,
        });
    } else {
        items.push(Item::Explicit(intervals_from_pair(repeat, first, second)));
    }
}

fn same_power(a: f32, b: f32, tolerance: f32) -> bool {
    (a - b).abs() <= tolerance
}

fn same_block(a: &Block, b: &Block, tolerance: f32) -> bool {
    a.duration_s == b.duration_s && same_power(a.power, b.power, tolerance)
}

fn intervals_from_pair(repeat: u32, a: &Block, b: &Block) -> Segment {
    let (on, off) = if a.power >= b.power { (a, b) } else { (b, a) };
    Segment::Intervals {
        repeat,
        on_duration_s: on.duration_s,
        off_duration_s: off.duration_s,
        on_power: on.power,
        off_power: off.power,
    }
}

fn steady_segment(block: &Block) -> Segment {
    Segment::Steady {
        duration_s: block.duration_s,
        power: block.power,
        cadence: block.cadence,
    }
}

fn steady_at(items: &[Item], index: usize) -> Option<(&Block, Option<u32>)> {
    match items.get(index) {
        Some(Item::Steady { block, lead_hint }) => Some((block, *lead_hint)),
        _ => None,
    }
}

/// Output entry before boundary reclassification
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Assembled {
    pub segment: Segment,
    /// Produced by a detected or explicit interval run
    pub from_run: bool,
}

/// Collapse alternating runs and apply repetition hints
pub(crate) fn collapse_runs(items: &[Item], tolerance: f32) -> Vec<Assembled> {
    let mut output: Vec<Assembled> = Vec::with_capacity(items.len());
    let mut i = 0;

    while i < items.len() {
        match &items[i] {
            Item::Steady { block, lead_hint } => {
                let consumed = match steady_at(items, i + 1) {
                    Some((partner, None)) => {
                        try_pair_run(items, i, block, *lead_hint, partner, tolerance, &mut output)
                    }
                    _ => None,
                };
                if let Some(next) = consumed {
                    i = next;
                    continue;
                }

                let mut segment = steady_segment(block);
                let mut next = i + 1;
                let hint = lead_hint.or_else(|| match items.get(next) {
                    Some(Item::Hint(count)) => {
                        next += 1;
                        Some(*count)
                    }
                    _ => None,
                });
                if let (Some(count), Some(duration)) = (hint, segment.duration_mut()) {
                    *duration = duration.saturating_mul(count);
                }
                push_merging(&mut output, segment, tolerance);
                i = next;
            }
            Item::Fixed(segment) => {
                output.push(Assembled {
                    segment: segment.clone(),
                    from_run: false,
                });
                i += 1;
            }
            Item::Explicit(segment) => {
                output.push(Assembled {
                    segment: segment.clone(),
                    from_run: true,
                });
                i += 1;
            }
            Item::Hint(count) => {
                debug!(count, "Repetition hint with no run before it, ignoring");
                i += 1;
            }
        }
    }

    output
}

/// Try to read an alternating run starting with the pair at `start`.
///
/// Returns the index after the run (and any trailing hint it consumed) when
/// a run was emitted.
fn try_pair_run(
    items: &[Item],
    start: usize,
    first: &Block,
    lead_hint: Option<u32>,
    second: &Block,
    tolerance: f32,
    output: &mut Vec<Assembled>,
) -> Option<usize> {
    let mut pairs: u32 = 1;
    let mut next = start + 2;

    while let (Some((a, None)), Some((b, None))) = (steady_at(items, next), steady_at(items, next + 1)) {
        if same_block(a, first, tolerance) && same_block(b, second, tolerance) {
            pairs += 1;
            next += 2;
        } else {
            break;
        }
    }

    let hint = lead_hint.or_else(|| match items.get(next) {
        Some(Item::Hint(count)) => {
            next += 1;
            Some(*count)
        }
        _ => None,
    });

    if same_power(first.power, second.power, tolerance) {
        // A run needs two distinct levels; equal halves are one long block
        if pairs < 2 && hint.is_none() {
            return None;
        }
        let repeat = hint.unwrap_or(pairs);
        let duration_s = repeat.saturating_mul(first.duration_s + second.duration_s);
        let segment = steady_segment(&Block {
            duration_s,
            ..*first
        });
        push_merging(output, segment, tolerance);
        return Some(next);
    }

    let repeat = match hint {
        Some(count) => count,
        None if pairs >= 2 => pairs,
        None => return None,
    };

    debug!(
        repeat,
        inferred = pairs,
        "Collapsed alternating blocks into an interval set"
    );
    output.push(Assembled {
        segment: intervals_from_pair(repeat, first, second),
        from_run: true,
    });
    Some(next)
}

/// Push a steady segment, folding it into a preceding steady of equal power
fn push_merging(output: &mut Vec<Assembled>, segment: Segment, tolerance: f32) {
    if let (
        Some(Assembled {
            segment:
                Segment::Steady {
                    duration_s: previous_duration,
                    power: previous_power,
                    cadence: previous_cadence,
                },
            from_run: false,
        }),
        Segment::Steady {
            duration_s,
            power,
            cadence,
        },
    ) = (output.last_mut(), &segment)
    {
        if same_power(*previous_power, *power, tolerance) && previous_cadence == cadence {
            *previous_duration = previous_duration.saturating_add(*duration_s);
            return;
        }
    }

    output.push(Assembled {
        segment,
        from_run: false,
    });
}
