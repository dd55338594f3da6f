use crate::error::{ImportError, Result};
use crate::models::Workout;
use crate::parser::ParserConfig;
use std::path::{Path, PathBuf};
use tracing::debug;

pub mod phrases;
pub mod zwo;

/// Trait for loading workouts from different file formats
pub trait ImportFormat: Send + Sync {
    /// Check if this importer can handle the given file
    fn can_import(&self, file_path: &Path) -> bool;

    /// Load the workout stored in the file
    fn import_file(&self, file_path: &Path) -> Result<Workout>;

    /// Get the format name for this importer
    fn get_format_name(&self) -> &'static str;
}

/// Manager for coordinating different import formats
pub struct ImportManager {
    importers: Vec<Box<dyn ImportFormat>>,
}

impl ImportManager {
    /// Create a new import manager with all available importers
    pub fn new(parser_config: ParserConfig) -> Self {
        let importers: Vec<Box<dyn ImportFormat>> = vec![
            Box::new(zwo::ZwoImporter::new()),
            Box::new(phrases::PhraseImporter::new(parser_config)),
        ];

        Self { importers }
    }

    /// Import a single file, auto-detecting the format
    pub fn import_file(&self, file_path: &Path) -> Result<Workout> {
        for importer in &self.importers {
            if importer.can_import(file_path) {
                debug!(
                    path = %file_path.display(),
                    format = importer.get_format_name(),
                    "Importing workout"
                );
                return importer.import_file(file_path);
            }
        }

        Err(ImportError::UnsupportedFormat {
            path: file_path.to_path_buf(),
        }
        .into())
    }

    /// Collect all files that can be imported from a directory, sorted by path
    pub fn collect_importable_files(&self, dir_path: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for entry in std::fs::read_dir(dir_path)? {
            let path = entry?.path();
            if path.is_file() && self.can_import_file(&path) {
                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    }

    /// Expand a mix of files and directories into importable files
    pub fn expand_inputs(&self, inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for input in inputs {
            if input.is_dir() {
                files.extend(self.collect_importable_files(input)?);
            } else {
                files.push(input.clone());
            }
        }
        Ok(files)
    }

    /// Check if this manager can import a given file
    pub fn can_import_file(&self, file_path: &Path) -> bool {
        self.importers.iter().any(|importer| importer.can_import(file_path))
    }
}

impl Default for ImportManager {
    fn default() -> Self {
        Self::new(ParserConfig::default())
    }
}
