use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::ImportFormat;
use crate::error::{ImportError, Result};
use crate::models::Workout;
use crate::parser::{ParserConfig, PhraseParser};
use crate::selection::extract_week_day;

/// Author written for workouts built from scraped text
pub const DEFAULT_AUTHOR: &str = "zwotrim";

/// JSON document holding the phrases scraped for one workout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhraseDocument {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub week_number: Option<u32>,
    #[serde(default)]
    pub day_of_week: Option<u32>,
    pub phrases: Vec<String>,
}

impl PhraseDocument {
    /// Parse the phrases and fill in workout metadata
    pub fn into_workout(self, parser: &PhraseParser) -> Workout {
        let mut workout = parser
            .parse_workout(self.name, &self.phrases)
            .with_description(self.description)
            .with_author(self.author.unwrap_or_else(|| DEFAULT_AUTHOR.to_string()))
            .with_tags(self.tags);

        let (week, day) = extract_week_day(&workout.name);
        workout.week_number = self.week_number.or(week);
        workout.day_of_week = self.day_of_week.or(day);
        workout
    }
}

/// Importer for `.json` phrase documents
pub struct PhraseImporter {
    parser: PhraseParser,
}

impl PhraseImporter {
    pub fn new(config: ParserConfig) -> Self {
        Self {
            parser: PhraseParser::new(config),
        }
    }

    pub fn parse_document(&self, content: &str, file_path: &Path) -> Result<Workout> {
        let document: PhraseDocument =
            serde_json::from_str(content).map_err(|err| ImportError::InvalidDocument {
                path: file_path.to_path_buf(),
                reason: err.to_string(),
            })?;
        let mut workout = document.into_workout(&self.parser);

        if workout.week_number.is_none() || workout.day_of_week.is_none() {
            let stem = file_path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
            let (week, day) = extract_week_day(stem);
            workout.week_number = workout.week_number.or(week);
            workout.day_of_week = workout.day_of_week.or(day);
        }

        Ok(workout)
    }
}

impl ImportFormat for PhraseImporter {
    fn can_import(&self, file_path: &Path) -> bool {
        file_path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false)
    }

    fn import_file(&self, file_path: &Path) -> Result<Workout> {
        let content = fs::read_to_string(file_path)?;
        let mut workout = self.parse_document(&content, file_path)?;
        workout.source = Some(file_path.to_path_buf());
        Ok(workout)
    }

    fn get_format_name(&self) -> &'static str {
        "Phrase JSON"
    }
}
