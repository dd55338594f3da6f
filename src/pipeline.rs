//! Batch pipeline using rayon
//!
//! Runs a training plan through the whole chain:
//! - load, validate and classify each file in parallel
//! - weekly selection over everything that loaded
//! - adjust and encode each workout in parallel
//!
//! A file that fails at any step is reported in its outcome and the rest of
//! the batch carries on.

use crate::adjustment::{AdjustmentReport, AdjustmentStatus, DurationAdjuster};
use crate::classifier::WorkoutClassifier;
use crate::config::AppConfig;
use crate::error::{Result, ZwoTrimError};
use crate::export::zwo::ZwoExporter;
use crate::import::ImportManager;
use crate::models::{Classification, Workout};
use crate::selection::{apply_weekly_selection, SelectionConfig};
use crate::validation::{ValidationResult, WorkoutValidator};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Configuration for batch runs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Worker threads; rayon's default (one per CPU) when unset
    pub num_threads: Option<usize>,
}

/// What happened to one input file
#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub workout_name: Option<String>,
    pub week_number: Option<u32>,
    pub day_of_week: Option<u32>,
    pub classification: Option<Classification>,
    pub report: Option<AdjustmentReport>,
    /// Validation warnings raised while loading
    pub warnings: Vec<String>,
    /// Encoded document; absent for skipped and failed files
    #[serde(skip)]
    pub xml: Option<String>,
    pub error: Option<String>,
}

impl FileOutcome {
    fn failed(path: PathBuf, error: String) -> Self {
        Self {
            path,
            workout_name: None,
            week_number: None,
            day_of_week: None,
            classification: None,
            report: None,
            warnings: Vec::new(),
            xml: None,
            error: Some(error),
        }
    }

    pub fn status(&self) -> Option<AdjustmentStatus> {
        self.report.as_ref().map(|r| r.status)
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// Name for display, falling back to the file name
    pub fn display_name(&self) -> String {
        self.workout_name
            .clone()
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Counts over a whole batch
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total_files: usize,
    pub modified: usize,
    /// Within target or weekend ride
    pub unchanged: usize,
    pub skipped: usize,
    pub unreachable: usize,
    pub failed: usize,
    /// Durations over every workout that was kept
    pub original_duration_s: u64,
    pub new_duration_s: u64,
    pub duration_ms: u128,
}

impl BatchSummary {
    fn from_outcomes(outcomes: &[FileOutcome], duration_ms: u128) -> Self {
        let mut summary = Self {
            total_files: outcomes.len(),
            duration_ms,
            ..Self::default()
        };

        for outcome in outcomes {
            let Some(report) = &outcome.report else {
                summary.failed += 1;
                continue;
            };
            match report.status {
                AdjustmentStatus::Skipped => {
                    summary.skipped += 1;
                    continue;
                }
                AdjustmentStatus::Modified => summary.modified += 1,
                AdjustmentStatus::TargetUnreachable => summary.unreachable += 1,
                AdjustmentStatus::WithinTarget | AdjustmentStatus::WeekendRide => summary.unchanged += 1,
            }
            summary.original_duration_s += u64::from(report.original_duration_s);
            summary.new_duration_s += u64::from(report.new_duration_s);
        }

        summary
    }

    pub fn seconds_saved(&self) -> u64 {
        self.original_duration_s.saturating_sub(self.new_duration_s)
    }

    pub fn is_fully_successful(&self) -> bool {
        self.failed == 0
    }

    /// Get human-readable summary
    pub fn to_string_pretty(&self) -> String {
        let saved = self.seconds_saved();
        format!(
            "Batch Summary\n  \
             Total Files: {}\n  \
             Modified: {}\n  \
             Unchanged: {}\n  \
             Skipped: {}\n  \
             Target Unreachable: {}\n  \
             Failed: {}\n  \
             Time Saved: {}h {}m\n  \
             Total Time: {:.2}s",
            self.total_files,
            self.modified,
            self.unchanged,
            self.skipped,
            self.unreachable,
            self.failed,
            saved / 3600,
            (saved % 3600) / 60,
            self.duration_ms as f64 / 1000.0
        )
    }
}

/// Outcomes in input order plus the batch summary
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub outcomes: Vec<FileOutcome>,
    pub summary: BatchSummary,
}

impl BatchResult {
    /// Write every encoded document into `output_dir`
    pub fn write_outputs(&self, output_dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(output_dir)?;
        let mut written = Vec::new();
        for outcome in &self.outcomes {
            if let Some(xml) = &outcome.xml {
                let path = crate::export::output_path(output_dir, &outcome.path);
                std::fs::write(&path, xml)?;
                debug!(path = %path.display(), "Wrote workout");
                written.push(path);
            }
        }
        Ok(written)
    }
}

struct Loaded {
    workout: Workout,
    warnings: Vec<String>,
}

pub struct Pipeline {
    config: PipelineConfig,
    importer: ImportManager,
    classifier: WorkoutClassifier,
    selection: SelectionConfig,
    adjuster: DurationAdjuster,
}

impl Pipeline {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            config: config.pipeline.clone(),
            importer: ImportManager::new(config.parser_config()),
            classifier: WorkoutClassifier::new(config.classifier_config()),
            selection: config.selection.clone(),
            adjuster: DurationAdjuster::new(config.adjustment_config()),
        }
    }

    /// Process a batch of files. Only a broken thread pool fails the batch.
    pub fn process_files(&self, paths: &[PathBuf]) -> Result<BatchResult> {
        match self.config.num_threads {
            Some(num_threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(num_threads)
                    .build()
                    .map_err(|e| ZwoTrimError::Configuration(format!("Failed to create thread pool: {}", e)))?;
                Ok(pool.install(|| self.run(paths)))
            }
            None => Ok(self.run(paths)),
        }
    }

    fn run(&self, paths: &[PathBuf]) -> BatchResult {
        let start_time = Instant::now();
        info!("Starting batch of {} files", paths.len());

        let loaded: Vec<std::result::Result<Loaded, String>> = paths.par_iter().map(|path| self.load(path)).collect();

        let mut outcomes: Vec<Option<FileOutcome>> = (0..paths.len()).map(|_| None).collect();
        let mut positions = Vec::new();
        let mut workouts = Vec::new();
        let mut warnings = Vec::new();
        for (index, result) in loaded.into_iter().enumerate() {
            match result {
                Ok(loaded) => {
                    positions.push(index);
                    workouts.push(loaded.workout);
                    warnings.push(loaded.warnings);
                }
                Err(error) => {
                    warn!(path = %paths[index].display(), %error, "Failed to load workout");
                    outcomes[index] = Some(FileOutcome::failed(paths[index].clone(), error));
                }
            }
        }

        let weeks = apply_weekly_selection(&mut workouts, &self.selection, self.adjuster.config().target_duration_s);
        debug!(weeks = weeks.len(), "Weekly selection complete");

        let jobs: Vec<(usize, Workout, Vec<String>)> = positions
            .into_iter()
            .zip(workouts)
            .zip(warnings)
            .map(|((index, workout), warnings)| (index, workout, warnings))
            .collect();

        let adjusted: Vec<(usize, FileOutcome)> = jobs
            .into_par_iter()
            .map(|(index, workout, warnings)| (index, self.adjust_one(&paths[index], workout, warnings)))
            .collect();
        for (index, outcome) in adjusted {
            outcomes[index] = Some(outcome);
        }

        let outcomes: Vec<FileOutcome> = outcomes.into_iter().flatten().collect();
        let summary = BatchSummary::from_outcomes(&outcomes, start_time.elapsed().as_millis());

        info!(
            files = summary.total_files,
            modified = summary.modified,
            skipped = summary.skipped,
            failed = summary.failed,
            seconds_saved = summary.seconds_saved(),
            "Batch complete"
        );

        BatchResult { outcomes, summary }
    }

    fn load(&self, path: &Path) -> std::result::Result<Loaded, String> {
        let mut workout = self.importer.import_file(path).map_err(|e| e.user_message())?;

        let ValidationResult { errors, warnings } = WorkoutValidator::validate_workout(&workout);
        if let Some(violation) = errors.into_iter().next() {
            return Err(ZwoTrimError::from(violation).user_message());
        }
        for warning in &warnings {
            warn!(path = %path.display(), %warning, "Workout warning");
        }

        self.classifier.annotate(&mut workout);
        Ok(Loaded {
            workout,
            warnings: warnings.iter().map(ToString::to_string).collect(),
        })
    }

    fn adjust_one(&self, path: &Path, mut workout: Workout, warnings: Vec<String>) -> FileOutcome {
        let report = match self.adjuster.adjust(&mut workout) {
            Ok(report) => report,
            Err(violation) => {
                warn!(path = %path.display(), %violation, "Adjustment rejected");
                return FileOutcome::failed(path.to_path_buf(), ZwoTrimError::from(violation).user_message());
            }
        };

        let xml = if report.status == AdjustmentStatus::Skipped {
            None
        } else {
            match ZwoExporter::generate_zwo_xml(&workout, Some(&report)) {
                Ok(xml) => Some(xml),
                Err(err) => return FileOutcome::failed(path.to_path_buf(), ZwoTrimError::from(err).user_message()),
            }
        };

        FileOutcome {
            path: path.to_path_buf(),
            workout_name: Some(workout.name),
            week_number: workout.week_number,
            day_of_week: workout.day_of_week,
            classification: workout.classification,
            report: Some(report),
            warnings,
            xml,
            error: None,
        }
    }
}
