// Library interface for zwotrim
// The binary and the integration tests both build on these modules

pub mod adjustment;
pub mod classifier;
pub mod config;
pub mod error;
pub mod export;
pub mod import;
pub mod logging;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod selection;
pub mod validation;

// Re-export commonly used types for convenience
pub use adjustment::{AdjustmentConfig, AdjustmentReport, AdjustmentStatus, CutBreakdown, DurationAdjuster};
pub use classifier::{ClassificationResult, ClassifierConfig, WorkoutClassifier};
pub use config::AppConfig;
pub use error::{CodecError, ImportError, InvariantViolation, Result, ZwoTrimError};
pub use export::zwo::encode;
pub use import::zwo::decode;
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use models::*;
pub use parser::{ParserConfig, PhraseParser};
pub use pipeline::{BatchResult, BatchSummary, FileOutcome, Pipeline};
pub use selection::{apply_weekly_selection, extract_week_day, SelectionConfig};
pub use validation::{ValidationResult, WorkoutValidator};
