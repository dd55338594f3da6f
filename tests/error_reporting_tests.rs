//! Error reporting for malformed inputs and broken workouts
//!
//! Every failure surfaces as a typed error with a readable message, and a
//! batch keeps going past the files that fail.

use std::fs;
use tempfile::TempDir;
use zwotrim::adjustment::DurationAdjuster;
use zwotrim::config::AppConfig;
use zwotrim::error::{CodecError, ErrorSeverity, ImportError, InvariantViolation, ZwoTrimError};
use zwotrim::import::ImportManager;
use zwotrim::models::{Segment, Workout};
use zwotrim::pipeline::Pipeline;

#[test]
fn test_wrong_root_reported_as_malformed_input() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("page.zwo");
    fs::write(&path, "<html><body>Not a workout</body></html>").unwrap();

    let err = ImportManager::default().import_file(&path).unwrap_err();

    assert!(matches!(
        &err,
        ZwoTrimError::MalformedInput(CodecError::UnexpectedRoot { found }) if found == "html"
    ));
    assert_eq!(err.severity(), ErrorSeverity::Warning);
    assert_eq!(err.user_message(), "Not a workout file (root element is <html>)");
}

#[test]
fn test_bad_attribute_names_element_and_value() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.zwo");
    fs::write(
        &path,
        r#"<workout_file><name>x</name><workout><IntervalsT Repeat="four" OnDuration="60" OffDuration="60" OnPower="1.1" OffPower="0.5"/></workout></workout_file>"#,
    )
    .unwrap();

    let err = ImportManager::default().import_file(&path).unwrap_err();
    let message = err.to_string();

    assert!(message.contains("IntervalsT@Repeat"));
    assert!(message.contains("four"));
}

#[test]
fn test_invalid_phrase_document() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("w1d1.json");
    fs::write(&path, r#"{"name": "Week 1 Day 1"}"#).unwrap();

    let err = ImportManager::default().import_file(&path).unwrap_err();

    assert!(matches!(err, ZwoTrimError::Import(ImportError::InvalidDocument { .. })));
    assert!(err.to_string().contains("w1d1.json"));
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let err = ImportManager::default()
        .import_file(&dir.path().join("absent.zwo"))
        .unwrap_err();

    assert!(matches!(err, ZwoTrimError::Io(_)));
    assert_eq!(err.severity(), ErrorSeverity::Error);
}

#[test]
fn test_broken_invariant_rejected_before_adjustment() {
    let mut workout = Workout::new(
        "Week 1 Day 2 - Endurance",
        vec![Segment::Steady {
            duration_s: 7200,
            power: 0.73,
            cadence: None,
        }],
    );
    workout.total_duration_s = 9000;
    let before = workout.clone();

    let violation = DurationAdjuster::default().adjust(&mut workout).unwrap_err();

    assert_eq!(
        violation,
        InvariantViolation::DurationMismatch {
            declared: 9000,
            actual: 7200
        }
    );
    assert_eq!(workout, before);
    assert!(ZwoTrimError::from(violation)
        .user_message()
        .starts_with("Workout is internally inconsistent"));
}

#[test]
fn test_batch_reports_each_failure() {
    let dir = TempDir::new().unwrap();
    let truncated = dir.path().join("w1d1.zwo");
    fs::write(&truncated, "<workout_file><name>Cut off</name><workout>").unwrap();
    let out_of_range = dir.path().join("w1d2.zwo");
    fs::write(
        &out_of_range,
        r#"<workout_file><name>Week 1 Day 2 - Hot</name><workout><SteadyState Duration="600" Power="4.0"/></workout></workout_file>"#,
    )
    .unwrap();
    let good = dir.path().join("w1d3.zwo");
    fs::write(
        &good,
        r#"<workout_file><name>Week 1 Day 3 - Easy</name><workout><SteadyState Duration="1800" Power="0.55"/></workout></workout_file>"#,
    )
    .unwrap();

    let result = Pipeline::new(&AppConfig::default())
        .process_files(&[truncated, out_of_range, good])
        .unwrap();

    assert_eq!(result.summary.failed, 2);
    assert!(result.outcomes[0].error.as_deref().unwrap().contains("Invalid XML"));
    assert!(result.outcomes[1].error.as_deref().unwrap().contains("outside [0, 3]"));
    assert!(!result.outcomes[2].is_failed());
}
