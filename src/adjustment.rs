//! Duration-adjustment engine
//!
//! Shortens a workout to a target duration without touching its
//! high-intensity work. Low-intensity blocks absorb the cut in proportion to
//! their length; warmup and cooldown give up time only when that is not
//! enough.
//!
//! The engine plans on per-segment durations, verifies the plan, and only
//! then writes it back to the workout. A plan that would break the duration
//! or protection invariants is rejected and the workout left untouched.

use crate::error::InvariantViolation;
use crate::models::{Segment, SegmentKind, Workout, HIGH_INTENSITY_THRESHOLD};
use crate::validation::WorkoutValidator;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

/// Adjustment targets and floors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdjustmentConfig {
    /// Longest a non-weekend workout may run, in seconds
    pub target_duration_s: u32,
    /// Warmups are never trimmed below this
    pub min_warmup_s: u32,
    /// Cooldowns are never trimmed below this
    pub min_cooldown_s: u32,
    /// Cut blocks shorter than this are removed outright
    pub min_segment_s: u32,
    /// Segments at or above this power are never shortened. Shared through
    /// `AppConfig::high_intensity_threshold` rather than read from this section.
    #[serde(skip)]
    pub high_intensity_threshold: f32,
}

impl Default for AdjustmentConfig {
    fn default() -> Self {
        Self {
            target_duration_s: 75 * 60,
            min_warmup_s: 5 * 60,
            min_cooldown_s: 5 * 60,
            min_segment_s: 60,
            high_intensity_threshold: HIGH_INTENSITY_THRESHOLD,
        }
    }
}

/// How an adjustment ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentStatus {
    /// Workout was selected to be skipped this week
    Skipped,
    /// Weekend long ride, kept at full length
    WeekendRide,
    /// Already at or under the target
    WithinTarget,
    /// Shortened to exactly the target
    Modified,
    /// Shortened as far as possible; the target could not be met
    TargetUnreachable,
}

impl fmt::Display for AdjustmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AdjustmentStatus::Skipped => "skipped",
            AdjustmentStatus::WeekendRide => "weekend ride",
            AdjustmentStatus::WithinTarget => "within target",
            AdjustmentStatus::Modified => "modified",
            AdjustmentStatus::TargetUnreachable => "target unreachable",
        };
        f.write_str(label)
    }
}

/// Seconds removed from each class of segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CutBreakdown {
    pub endurance_s: u32,
    pub warmup_s: u32,
    pub cooldown_s: u32,
}

impl CutBreakdown {
    pub fn total(&self) -> u32 {
        self.endurance_s + self.warmup_s + self.cooldown_s
    }

    /// e.g. `endurance 2400s, warmup 300s`
    pub fn summary(&self) -> String {
        let parts: Vec<String> = [
            ("endurance", self.endurance_s),
            ("warmup", self.warmup_s),
            ("cooldown", self.cooldown_s),
        ]
        .iter()
        .filter(|(_, seconds)| *seconds > 0)
        .map(|(label, seconds)| format!("{} {}s", label, seconds))
        .collect();

        if parts.is_empty() {
            "nothing".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Outcome of one adjustment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentReport {
    pub status: AdjustmentStatus,
    pub original_duration_s: u32,
    pub new_duration_s: u32,
    pub cuts: CutBreakdown,
    /// Blocks dropped because their cut length fell under the floor
    pub removed_segments: usize,
    /// Seconds still over target after every source of slack was used
    pub shortfall_s: u32,
    /// Seconds cut beyond the target because whole blocks were removed
    pub overshoot_s: u32,
}

impl AdjustmentReport {
    fn unchanged(status: AdjustmentStatus, duration_s: u32) -> Self {
        Self {
            status,
            original_duration_s: duration_s,
            new_duration_s: duration_s,
            cuts: CutBreakdown::default(),
            removed_segments: 0,
            shortfall_s: 0,
            overshoot_s: 0,
        }
    }

    /// Segments were actually changed
    pub fn is_modified(&self) -> bool {
        self.new_duration_s != self.original_duration_s
    }

    pub fn seconds_saved(&self) -> u32 {
        self.original_duration_s.saturating_sub(self.new_duration_s)
    }
}

/// How the engine may treat a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    /// Never shortened
    Protected,
    /// Absorbs the proportional cut
    Cuttable,
    /// Warmup or cooldown, trimmed only in the overflow step
    Floor,
}

pub struct DurationAdjuster {
    config: AdjustmentConfig,
}

impl DurationAdjuster {
    pub fn new(config: AdjustmentConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AdjustmentConfig {
        &self.config
    }

    /// Shorten `workout` in place to the configured target.
    ///
    /// Only broken invariants are errors. Skipped, weekend and short
    /// workouts pass through unchanged; an unreachable target is reported
    /// through the returned status.
    pub fn adjust(&self, workout: &mut Workout) -> Result<AdjustmentReport, InvariantViolation> {
        WorkoutValidator::check_invariants(workout)?;
        let original_total = workout.total_duration_s;

        if workout.should_skip {
            debug!(workout = %workout.name, "Skipping workout selected for removal");
            return Ok(AdjustmentReport::unchanged(AdjustmentStatus::Skipped, original_total));
        }
        if workout.is_weekend_ride {
            debug!(workout = %workout.name, "Keeping weekend ride at full length");
            return Ok(AdjustmentReport::unchanged(AdjustmentStatus::WeekendRide, original_total));
        }
        if original_total <= self.config.target_duration_s {
            return Ok(AdjustmentReport::unchanged(AdjustmentStatus::WithinTarget, original_total));
        }

        let deficit = u64::from(original_total - self.config.target_duration_s);
        let originals: Vec<u32> = workout.segments.iter().map(Segment::effective_duration).collect();
        let roles: Vec<Role> = workout.segments.iter().map(|s| self.role(s)).collect();
        let cuttable: Vec<usize> = indices_with_role(&roles, Role::Cuttable);
        let mut durations: Vec<Option<u32>> = originals.iter().copied().map(Some).collect();

        let removed = self.scale(&originals, &cuttable, deficit, &mut durations);
        if !removed.is_empty() {
            let removed_total: u64 = removed.iter().map(|&i| u64::from(originals[i])).sum();
            let survivors: Vec<usize> = cuttable
                .iter()
                .copied()
                .filter(|&i| durations[i].is_some())
                .collect();
            for &i in &survivors {
                durations[i] = Some(originals[i]);
            }
            if removed_total < deficit {
                let rerun_removed = self.scale(&originals, &survivors, deficit - removed_total, &mut durations);
                debug!(
                    removed = removed.len(),
                    rerun_removed = rerun_removed.len(),
                    "Re-ran proportional cut after removing short blocks"
                );
            }
        }

        let applied: u64 = cuttable
            .iter()
            .map(|&i| u64::from(originals[i] - durations[i].unwrap_or(0)))
            .sum();
        let residual = self.reconcile(&originals, &cuttable, &mut durations, deficit as i64 - applied as i64);

        let overshoot = u32::try_from((-residual).max(0)).unwrap_or(u32::MAX);
        let mut remaining = u64::try_from(residual.max(0)).unwrap_or(0);
        let (warmup_cut, cooldown_cut) = self.trim_floor_segments(&workout.segments, &roles, &mut durations, &mut remaining);
        let shortfall = u32::try_from(remaining).unwrap_or(u32::MAX);

        let endurance_cut: u32 = cuttable
            .iter()
            .map(|&i| originals[i] - durations[i].unwrap_or(0))
            .sum();
        let removed_segments = durations.iter().filter(|d| d.is_none()).count();

        let candidate = self.build_candidate(workout, &durations);
        let expected_total = u64::from(original_total) - deficit + u64::from(shortfall) - u64::from(overshoot);
        self.verify(workout, &candidate, &roles, &durations, expected_total)?;

        let report = AdjustmentReport {
            status: if shortfall > 0 {
                AdjustmentStatus::TargetUnreachable
            } else {
                AdjustmentStatus::Modified
            },
            original_duration_s: original_total,
            new_duration_s: candidate.total_duration_s,
            cuts: CutBreakdown {
                endurance_s: endurance_cut,
                warmup_s: warmup_cut,
                cooldown_s: cooldown_cut,
            },
            removed_segments,
            shortfall_s: shortfall,
            overshoot_s: overshoot,
        };

        if shortfall > 0 {
            warn!(
                workout = %workout.name,
                shortfall_s = shortfall,
                new_duration_s = report.new_duration_s,
                "Target duration not reachable without cutting protected work"
            );
        } else {
            info!(
                workout = %workout.name,
                from_s = original_total,
                to_s = report.new_duration_s,
                removed = removed_segments,
                "Shortened workout"
            );
        }

        workout.segments = candidate.segments;
        workout.recalculate_total();
        Ok(report)
    }

    fn role(&self, segment: &Segment) -> Role {
        let power = segment.representative_power().unwrap_or(0.0);
        match segment {
            Segment::Intervals { .. } => Role::Protected,
            _ if power >= self.config.high_intensity_threshold => Role::Protected,
            Segment::Warmup { .. } | Segment::Cooldown { .. } => Role::Floor,
            _ => Role::Cuttable,
        }
    }

    /// Proportional cut of `deficit` across `indices`. Returns the indices
    /// whose cut length fell under the floor; those are removed.
    fn scale(&self, originals: &[u32], indices: &[usize], deficit: u64, durations: &mut [Option<u32>]) -> Vec<usize> {
        let available: u64 = indices.iter().map(|&i| u64::from(originals[i])).sum();
        if available == 0 || deficit == 0 {
            return Vec::new();
        }

        let ratio = (deficit as f64 / available as f64).min(1.0);
        let mut removed = Vec::new();
        for &i in indices {
            let duration = originals[i];
            let cut = ((f64::from(duration) * ratio).round() as u32).min(duration);
            let remaining = duration - cut;
            if remaining == 0 || remaining < self.config.min_segment_s {
                durations[i] = None;
                removed.push(i);
            } else {
                durations[i] = Some(remaining);
            }
        }
        removed
    }

    /// Absorb the difference between planned and applied cuts into the
    /// largest surviving cuttable blocks. Positive residual means more must
    /// be cut. Returns whatever could not be absorbed.
    fn reconcile(&self, originals: &[u32], indices: &[usize], durations: &mut [Option<u32>], mut residual: i64) -> i64 {
        let mut survivors: Vec<usize> = indices.iter().copied().filter(|&i| durations[i].is_some()).collect();
        survivors.sort_by(|&a, &b| durations[b].cmp(&durations[a]).then(a.cmp(&b)));

        let floor = self.config.min_segment_s.max(1);
        for i in survivors {
            if residual == 0 {
                break;
            }
            if let Some(current) = durations[i] {
                if residual > 0 {
                    let take = residual.min(i64::from(current.saturating_sub(floor)));
                    durations[i] = Some(current - take as u32);
                    residual -= take;
                } else {
                    let give = (-residual).min(i64::from(originals[i] - current));
                    durations[i] = Some(current + give as u32);
                    residual += give;
                }
            }
        }
        residual
    }

    /// Take the remaining deficit from warmup and cooldown slack, largest
    /// slack first. Returns seconds taken from (warmups, cooldowns).
    fn trim_floor_segments(
        &self,
        segments: &[Segment],
        roles: &[Role],
        durations: &mut [Option<u32>],
        remaining: &mut u64,
    ) -> (u32, u32) {
        let mut slack: Vec<(usize, u32)> = indices_with_role(roles, Role::Floor)
            .into_iter()
            .filter_map(|i| {
                let duration = durations[i]?;
                let minimum = self.floor_minimum(&segments[i]);
                duration.checked_sub(minimum).filter(|slack| *slack > 0).map(|slack| (i, slack))
            })
            .collect();
        slack.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        let (mut warmup_cut, mut cooldown_cut) = (0u32, 0u32);
        for (i, available) in slack {
            if *remaining == 0 {
                break;
            }
            let take = u32::try_from((*remaining).min(u64::from(available))).unwrap_or(available);
            if let Some(duration) = durations[i].as_mut() {
                *duration -= take;
            }
            *remaining -= u64::from(take);
            match segments[i].kind() {
                SegmentKind::Warmup => warmup_cut += take,
                _ => cooldown_cut += take,
            }
        }
        (warmup_cut, cooldown_cut)
    }

    fn floor_minimum(&self, segment: &Segment) -> u32 {
        match segment {
            Segment::Warmup { .. } => self.config.min_warmup_s,
            _ => self.config.min_cooldown_s,
        }
    }

    fn build_candidate(&self, workout: &Workout, durations: &[Option<u32>]) -> Workout {
        let mut candidate = workout.clone();
        candidate.segments = workout
            .segments
            .iter()
            .zip(durations)
            .filter_map(|(segment, planned)| {
                let planned = (*planned)?;
                let mut segment = segment.clone();
                if let Some(duration) = segment.duration_mut() {
                    *duration = planned;
                }
                Some(segment)
            })
            .collect();
        candidate.recalculate_total();
        candidate
    }

    fn verify(
        &self,
        before: &Workout,
        candidate: &Workout,
        roles: &[Role],
        durations: &[Option<u32>],
        expected_total: u64,
    ) -> Result<(), InvariantViolation> {
        let mut position = 0;
        for (index, (segment, planned)) in before.segments.iter().zip(durations).enumerate() {
            if planned.is_none() {
                if roles[index] != Role::Cuttable {
                    return Err(InvariantViolation::ProtectedSegmentChanged { index });
                }
                continue;
            }
            if roles[index] == Role::Protected
                && candidate.segments.get(position) != Some(segment)
            {
                return Err(InvariantViolation::ProtectedSegmentChanged { index });
            }
            if roles[index] == Role::Floor {
                let minimum = self.floor_minimum(segment).min(segment.effective_duration());
                if candidate.segments[position].effective_duration() < minimum {
                    return Err(InvariantViolation::ProtectedSegmentChanged { index });
                }
            }
            position += 1;
        }

        if u64::from(candidate.total_duration_s) != expected_total {
            return Err(InvariantViolation::DurationMismatch {
                declared: u32::try_from(expected_total).unwrap_or(u32::MAX),
                actual: candidate.total_duration_s,
            });
        }

        WorkoutValidator::check_invariants(candidate)
    }
}

impl Default for DurationAdjuster {
    fn default() -> Self {
        Self::new(AdjustmentConfig::default())
    }
}

fn indices_with_role(roles: &[Role], wanted: Role) -> Vec<usize> {
    roles
        .iter()
        .enumerate()
        .filter(|(_, role)| **role == wanted)
        .map(|(i, _)| i)
        .collect()
}
