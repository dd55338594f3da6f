use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::adjustment::AdjustmentConfig;
use crate::classifier::ClassifierConfig;
use crate::logging::LogConfig;
use crate::models::HIGH_INTENSITY_THRESHOLD;
use crate::parser::ParserConfig;
use crate::pipeline::PipelineConfig;
use crate::selection::SelectionConfig;

const CONFIG_VERSION: &str = "1";

/// Main application configuration
///
/// Loaded once at startup and handed to each component. Every section
/// falls back to its defaults, so a file only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Configuration metadata
    pub metadata: ConfigMetadata,

    /// Power, as a fraction of FTP, at which work counts as high intensity.
    /// The one value behind adjustment protection, classification and the
    /// parser's warmup/cooldown boundary.
    pub high_intensity_threshold: f32,

    /// Target duration and floors
    pub adjustment: AdjustmentConfig,

    /// Keyword sets and profile thresholds
    pub classifier: ClassifierConfig,

    /// Phrase boundary and tolerance settings
    pub parser: ParserConfig,

    /// Weekend ride and skip rules
    pub selection: SelectionConfig,

    /// Batch worker settings
    pub pipeline: PipelineConfig,

    pub logging: LogConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            metadata: ConfigMetadata::default(),
            high_intensity_threshold: HIGH_INTENSITY_THRESHOLD,
            adjustment: AdjustmentConfig::default(),
            classifier: ClassifierConfig::default(),
            parser: ParserConfig::default(),
            selection: SelectionConfig::default(),
            pipeline: PipelineConfig::default(),
            logging: LogConfig::default(),
        }
    }
}

/// Configuration metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigMetadata {
    /// Configuration format version
    pub version: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

impl Default for ConfigMetadata {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            version: CONFIG_VERSION.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl AppConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: AppConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML configuration: {}", path.as_ref().display()))?;

        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.metadata.updated_at = Utc::now();

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let toml_content =
            toml::to_string_pretty(self).with_context(|| "Failed to serialize configuration to TOML")?;

        fs::write(&path, toml_content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// `~/.zwotrim/config.toml`
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".zwotrim")
            .join("config.toml")
    }

    /// Load the given file, or the default location, falling back to defaults
    /// when no file exists. A file that exists but does not parse is an error.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let config_path = path.map(Path::to_path_buf).unwrap_or_else(Self::default_config_path);

        if config_path.exists() {
            Self::load_from_file(&config_path)
        } else if path.is_some() {
            Err(anyhow::anyhow!("Config file not found: {}", config_path.display()))
        } else {
            Ok(Self::default())
        }
    }

    /// Load like [`AppConfig::load_or_default`], except that a missing
    /// explicit file also falls back to defaults. Used when the file is
    /// about to be created.
    pub fn load_if_present(path: Option<&Path>) -> Result<Self> {
        let config_path = path.map(Path::to_path_buf).unwrap_or_else(Self::default_config_path);
        if config_path.exists() {
            Self::load_from_file(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn adjustment_config(&self) -> AdjustmentConfig {
        AdjustmentConfig {
            high_intensity_threshold: self.high_intensity_threshold,
            ..self.adjustment.clone()
        }
    }

    pub fn classifier_config(&self) -> ClassifierConfig {
        ClassifierConfig {
            high_intensity_threshold: self.high_intensity_threshold,
            ..self.classifier.clone()
        }
    }

    pub fn parser_config(&self) -> ParserConfig {
        ParserConfig {
            boundary_threshold: self.high_intensity_threshold,
            ..self.parser.clone()
        }
    }

    /// Set the weekday target in whole minutes
    pub fn set_target_minutes(&mut self, minutes: u32) {
        self.adjustment.target_duration_s = minutes * 60;
    }
}
