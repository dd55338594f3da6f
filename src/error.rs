//! Unified error hierarchy for zwotrim
//!
//! Decode failures and broken model invariants are the only hard errors.
//! Unrecognised phrases, degenerate workouts and unreachable targets are
//! ordinary values carried on the workout or the adjustment report.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for all zwotrim operations
#[derive(Debug, Error)]
pub enum ZwoTrimError {
    /// Input document could not be decoded
    #[error("Malformed input: {0}")]
    MalformedInput(#[from] CodecError),

    /// A workout broke one of the model's standing invariants
    #[error("Invariant violation: {0}")]
    InvariantViolation(#[from] InvariantViolation),

    /// Import layer errors
    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Errors raised while decoding or encoding `.zwo` documents
#[derive(Debug, Error)]
pub enum CodecError {
    /// XML is not well formed
    #[error("Invalid XML at byte {position}: {reason}")]
    InvalidXml { position: usize, reason: String },

    /// Document root is not `workout_file`
    #[error("Unexpected root element: expected workout_file, found {found}")]
    UnexpectedRoot { found: String },

    /// Required metadata or container element is absent
    #[error("Missing required element: {element}")]
    MissingElement { element: String },

    /// Segment element lacks a required attribute
    #[error("Missing attribute {attribute} on {element}")]
    MissingAttribute { element: String, attribute: String },

    /// Attribute value does not parse as its numeric type
    #[error("Invalid value for {element}@{attribute}: {value}")]
    InvalidAttribute {
        element: String,
        attribute: String,
        value: String,
    },

    /// Writer failed while producing output
    #[error("Serialization failed: {reason}")]
    Serialization { reason: String },
}

/// Broken model invariants. Fatal for the workout that carries them.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum InvariantViolation {
    /// Simple segment or interval half with zero length
    #[error("Segment {index} has non-positive duration")]
    NonPositiveDuration { index: usize },

    /// Interval set that repeats less than once
    #[error("Segment {index} has invalid repeat count {repeat}")]
    InvalidRepeat { index: usize, repeat: u32 },

    /// Power target outside 0-300% of FTP
    #[error("Segment {index} has power {power} outside [0, 3]")]
    PowerOutOfRange { index: usize, power: f32 },

    /// Declared total disagrees with the segments
    #[error("Total duration mismatch: declared {declared}s, segments sum to {actual}s")]
    DurationMismatch { declared: u32, actual: u32 },

    /// Adjustment altered a segment it must never touch
    #[error("Protected segment {index} changed during adjustment")]
    ProtectedSegmentChanged { index: usize },
}

/// Import layer errors
#[derive(Debug, Error)]
pub enum ImportError {
    /// No importer accepts the file
    #[error("Unsupported format: {path}")]
    UnsupportedFormat { path: PathBuf },

    /// Phrase document is not valid JSON of the expected shape
    #[error("Invalid phrase document {path}: {reason}")]
    InvalidDocument { path: PathBuf, reason: String },
}

/// Result type alias for zwotrim operations
pub type Result<T> = std::result::Result<T, ZwoTrimError>;

impl ZwoTrimError {
    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ZwoTrimError::MalformedInput(_) => ErrorSeverity::Warning,
            ZwoTrimError::Import(ImportError::UnsupportedFormat { .. }) => ErrorSeverity::Warning,
            ZwoTrimError::InvariantViolation(InvariantViolation::ProtectedSegmentChanged {
                ..
            }) => ErrorSeverity::Critical,
            ZwoTrimError::InvariantViolation(_) => ErrorSeverity::Error,
            _ => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            ZwoTrimError::MalformedInput(CodecError::UnexpectedRoot { found }) => {
                format!("Not a workout file (root element is <{}>)", found)
            }
            ZwoTrimError::MalformedInput(CodecError::MissingElement { element }) => {
                format!("Workout file is missing its <{}> element", element)
            }
            ZwoTrimError::Import(ImportError::UnsupportedFormat { path }) => {
                format!("Don't know how to read {}", path.display())
            }
            ZwoTrimError::InvariantViolation(violation) => {
                format!("Workout is internally inconsistent: {}", violation)
            }
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Output would be invalid if processing continued
    Critical,
    /// Error that prevents operation but system can continue
    Error,
    /// Warning that doesn't prevent operation
    Warning,
    /// Informational message
    Info,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Critical => tracing::Level::ERROR,
            ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Warning => tracing::Level::WARN,
            ErrorSeverity::Info => tracing::Level::INFO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_severity() {
        let err = ZwoTrimError::from(CodecError::UnexpectedRoot {
            found: "html".to_string(),
        });
        assert_eq!(err.severity(), ErrorSeverity::Warning);

        let err = ZwoTrimError::from(InvariantViolation::ProtectedSegmentChanged { index: 2 });
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert_eq!(err.severity().to_tracing_level(), tracing::Level::ERROR);
    }

    #[test]
    fn test_user_messages() {
        let err = ZwoTrimError::from(CodecError::MissingElement {
            element: "workout".to_string(),
        });
        assert!(err.user_message().contains("<workout>"));

        let err = ZwoTrimError::Import(ImportError::UnsupportedFormat {
            path: PathBuf::from("ride.fit"),
        });
        assert!(err.user_message().contains("ride.fit"));
    }

    #[test]
    fn test_display_includes_context() {
        let err = CodecError::InvalidAttribute {
            element: "SteadyState".to_string(),
            attribute: "Power".to_string(),
            value: "abc".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid value for SteadyState@Power: abc");
    }
}
