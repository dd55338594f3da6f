use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table, Tabled};

use zwotrim::export::ZwoExporter;
use zwotrim::import::phrases::PhraseImporter;
use zwotrim::import::{ImportFormat, ImportManager};
use zwotrim::logging::{init_logging, LogFormat};
use zwotrim::models::format_duration;
use zwotrim::pipeline::{BatchResult, FileOutcome};
use zwotrim::{AdjustmentStatus, AppConfig, Pipeline, WorkoutClassifier, WorkoutValidator};

/// zwotrim - Zwift training plan trimmer
///
/// Builds .zwo workouts from scraped workout text and shortens weekday
/// sessions to a time budget while keeping every high-intensity block.
#[derive(Parser)]
#[command(name = "zwotrim")]
#[command(version)]
#[command(about = "Shorten Zwift training plans to a weekday time budget", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log line format
    #[arg(long, value_enum, global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a .zwo workout from a phrase document
    Parse {
        /// Phrase document (JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file; printed to stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the segments and classification of a workout
    Inspect {
        /// Workout file (.zwo or phrase JSON)
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Shorten a training plan to the weekday target
    Adjust {
        /// Input files or directories
        #[arg(short, long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,

        /// Directory for the adjusted workouts
        #[arg(short, long)]
        output_dir: PathBuf,

        /// Weekday target in minutes
        #[arg(short, long)]
        target_minutes: Option<u32>,

        /// Shortest warmup in minutes
        #[arg(long)]
        min_warmup: Option<u32>,

        /// Shortest cooldown in minutes
        #[arg(long)]
        min_cooldown: Option<u32>,

        /// Drop one workout from weeks with at least this many
        #[arg(long)]
        skip_threshold: Option<usize>,

        /// Show what would change without writing files
        #[arg(long)]
        dry_run: bool,
    },

    /// Configure application settings
    Config {
        /// Print the effective configuration
        #[arg(short, long)]
        list: bool,

        /// Write a default configuration file
        #[arg(long)]
        init: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match cli.command {
        Commands::Config { init: true, .. } => AppConfig::load_if_present(cli.config.as_deref())?,
        _ => AppConfig::load_or_default(cli.config.as_deref())?,
    };

    let mut log_config = config.logging.clone();
    log_config.level = log_config.level.raised_by(cli.verbose);
    if let Some(format) = cli.log_format {
        log_config.format = format;
    }
    init_logging(&log_config)?;

    match cli.command {
        Commands::Parse { input, output } => run_parse(&config, &input, output.as_deref()),

        Commands::Inspect { file } => run_inspect(&config, &file),

        Commands::Adjust {
            input,
            output_dir,
            target_minutes,
            min_warmup,
            min_cooldown,
            skip_threshold,
            dry_run,
        } => {
            if let Some(minutes) = target_minutes {
                config.set_target_minutes(minutes);
            }
            if let Some(minutes) = min_warmup {
                config.adjustment.min_warmup_s = minutes * 60;
            }
            if let Some(minutes) = min_cooldown {
                config.adjustment.min_cooldown_s = minutes * 60;
            }
            if let Some(threshold) = skip_threshold {
                config.selection.skip_threshold = threshold;
            }
            run_adjust(&config, &input, &output_dir, dry_run)
        }

        Commands::Config { list, init } => run_config(&mut config, cli.config.as_deref(), list, init),
    }
}

fn run_parse(config: &AppConfig, input: &Path, output: Option<&Path>) -> Result<()> {
    let importer = PhraseImporter::new(config.parser_config());
    let workout = importer.import_file(input)?;

    for phrase in &workout.unparsed {
        eprintln!("{} {}", "Skipped unrecognized phrase:".yellow(), phrase);
    }

    match output {
        Some(path) => {
            ZwoExporter::export_workout(&workout, None, path)?;
            eprintln!(
                "{}",
                format!(
                    "✓ Wrote {} ({}, {} segments)",
                    path.display(),
                    format_duration(workout.total_duration_s),
                    workout.segments.len()
                )
                .green()
            );
        }
        None => println!("{}", zwotrim::encode(&workout)?),
    }
    Ok(())
}

#[derive(Tabled)]
struct SegmentRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Duration")]
    duration: String,
    #[tabled(rename = "Target")]
    target: String,
    #[tabled(rename = "Cadence")]
    cadence: String,
}

fn run_inspect(config: &AppConfig, file: &Path) -> Result<()> {
    let manager = ImportManager::new(config.parser_config());
    let workout = manager.import_file(file)?;

    let rows: Vec<SegmentRow> = workout
        .segments
        .iter()
        .enumerate()
        .map(|(index, segment)| SegmentRow {
            index: index + 1,
            kind: segment.kind().to_string(),
            duration: format_duration(segment.effective_duration()),
            target: segment.describe(),
            cadence: segment.cadence().map(|c| format!("{} rpm", c)).unwrap_or_default(),
        })
        .collect();

    println!("{}", workout.name.bold());
    if !workout.description.is_empty() {
        println!("{}", workout.description.dimmed());
    }
    println!("{}", Table::new(rows).with(Style::rounded()));

    let result = WorkoutClassifier::new(config.classifier_config()).classify(&workout);
    println!("  Total:          {}", format_duration(workout.total_duration_s));
    println!("  Classification: {}", result.classification.to_string().cyan());
    println!("  Difficulty:     {:.2}", result.difficulty_score);
    println!("  Average power:  {:.0}% FTP", result.average_power * 100.0);
    if let Some(keyword) = &result.matched_keyword {
        println!("  Keyword:        {}", keyword);
    }

    let validation = WorkoutValidator::validate_workout(&workout);
    for error in &validation.errors {
        println!("  {} {}", "✗".red(), error);
    }
    for warning in &validation.warnings {
        println!("  {} {}", "!".yellow(), warning);
    }
    for phrase in &workout.unparsed {
        println!("  {} unrecognized: {}", "!".yellow(), phrase);
    }
    Ok(())
}

#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "Week")]
    week: String,
    #[tabled(rename = "Day")]
    day: String,
    #[tabled(rename = "Workout")]
    workout: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Before")]
    before: String,
    #[tabled(rename = "After")]
    after: String,
}

impl From<&FileOutcome> for OutcomeRow {
    fn from(outcome: &FileOutcome) -> Self {
        let optional = |value: Option<u32>| value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string());
        let (status, before, after) = match &outcome.report {
            Some(report) => (
                report.status.to_string(),
                format_duration(report.original_duration_s),
                format_duration(report.new_duration_s),
            ),
            None => ("failed".to_string(), "-".to_string(), "-".to_string()),
        };
        Self {
            week: optional(outcome.week_number),
            day: optional(outcome.day_of_week),
            workout: outcome.display_name(),
            status,
            before,
            after,
        }
    }
}

fn run_adjust(config: &AppConfig, inputs: &[PathBuf], output_dir: &Path, dry_run: bool) -> Result<()> {
    let manager = ImportManager::new(config.parser_config());
    let files = manager.expand_inputs(inputs)?;
    if files.is_empty() {
        bail!("No workout files found in the given inputs");
    }

    println!(
        "{}",
        format!(
            "Adjusting {} workouts to {}...",
            files.len(),
            format_duration(config.adjustment.target_duration_s)
        )
        .blue()
        .bold()
    );

    let result = Pipeline::new(config).process_files(&files)?;
    print_outcomes(&result);
    println!("{}", result.summary.to_string_pretty());

    if dry_run {
        println!("{}", "Dry run - no files written".yellow());
        return Ok(());
    }

    let written = result
        .write_outputs(output_dir)
        .with_context(|| format!("Failed to write workouts to {}", output_dir.display()))?;

    println!(
        "{}",
        format!("✓ Wrote {} workouts to {}", written.len(), output_dir.display()).green()
    );
    Ok(())
}

fn print_outcomes(result: &BatchResult) {
    let rows: Vec<OutcomeRow> = result.outcomes.iter().map(OutcomeRow::from).collect();
    println!("{}", Table::new(rows).with(Style::rounded()));

    for outcome in &result.outcomes {
        if let Some(error) = &outcome.error {
            eprintln!("{} {}: {}", "✗".red(), outcome.path.display(), error);
        }
        if let Some(report) = outcome
            .report
            .as_ref()
            .filter(|r| r.status == AdjustmentStatus::TargetUnreachable)
        {
            eprintln!(
                "{} {} is still {} over target",
                "!".yellow(),
                outcome.display_name(),
                format_duration(report.shortfall_s)
            );
        }
    }
}

fn run_config(config: &mut AppConfig, explicit: Option<&Path>, list: bool, init: bool) -> Result<()> {
    if init {
        let path = explicit.map(Path::to_path_buf).unwrap_or_else(AppConfig::default_config_path);
        if path.exists() {
            println!("{}", format!("Config already exists: {}", path.display()).yellow());
        } else {
            config.save_to_file(&path)?;
            println!("{}", format!("✓ Wrote default config to {}", path.display()).green());
        }
    }

    if list {
        println!("{}", toml::to_string_pretty(config).context("Failed to render configuration")?);
    } else if !init {
        println!("Config file: {}", AppConfig::default_config_path().display());
        println!("Use --list to show the effective settings or --init to create the file");
    }
    Ok(())
}
