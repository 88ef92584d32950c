//! Application settings for outcomes-synth
//!
//! TOML-based settings with defaults and validation.
//! Location: ~/.outcomes-synth/config.toml

use crate::errors::{Result, SynthError};
use crate::narrative::client::{DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_TEMPERATURE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Complete application settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub narrative: NarrativeSettings,
    pub analysis: AnalysisSettings,
    pub output: OutputSettings,
}

/// Chat-completions endpoint configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrativeSettings {
    pub base_url: String,
    pub model: String,
    pub temperature: f64,
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub timeout_secs: u64,
}

/// Analysis knobs outside the study config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    pub sensor_features: Vec<String>,
    pub text_sample_size: usize,
    pub sample_seed: u64,
    pub text_column: String,
}

/// Output locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub report_file: String,
    pub plots_dir: String,
}

impl Default for NarrativeSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 120,
        }
    }
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            sensor_features: vec![
                "avg_steps".to_string(),
                "sleep_hours".to_string(),
                "phone_usage_minutes".to_string(),
            ],
            text_sample_size: 5,
            sample_seed: 42,
            text_column: "note_text".to_string(),
        }
    }
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            report_file: "longitudinal_multimodal_report.md".to_string(),
            plots_dir: "plots".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from `path`, or from the default location
    ///
    /// A missing file at the default location is created with defaults.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        if let Some(settings_path) = path {
            return Self::load_from_file(&settings_path);
        }

        match Self::default_path() {
            Some(default_path) if default_path.exists() => Self::load_from_file(&default_path),
            Some(default_path) => {
                let settings = Settings::default();
                // an unwritable home directory should not block a run
                if let Err(e) = settings.save(&default_path) {
                    tracing::warn!(error = %e, "Could not write default settings");
                }
                Ok(settings)
            }
            None => Ok(Settings::default()),
        }
    }

    /// Load settings from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| SynthError::Settings(format!("Failed to read settings: {}", e)))?;

        let settings: Settings = toml::from_str(&contents)
            .map_err(|e| SynthError::Settings(format!("Failed to parse settings: {}", e)))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Standard settings location
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".outcomes-synth").join("config.toml"))
    }

    /// Validate settings values
    pub fn validate(&self) -> Result<()> {
        if self.narrative.base_url.trim().is_empty() {
            return Err(SynthError::Settings("base_url must not be empty".to_string()));
        }

        if !(0.0..=2.0).contains(&self.narrative.temperature) {
            return Err(SynthError::Settings(
                "temperature must be between 0.0 and 2.0".to_string(),
            ));
        }

        if self.narrative.timeout_secs == 0 {
            return Err(SynthError::Settings(
                "timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.output.report_file.trim().is_empty() {
            return Err(SynthError::Settings(
                "report_file must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Save settings to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| SynthError::Settings(format!("Failed to serialize settings: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                SynthError::Settings(format!("Failed to create settings dir: {}", e))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| SynthError::Settings(format!("Failed to write settings: {}", e)))?;

        Ok(())
    }

    /// Render as TOML for display
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| SynthError::Settings(format!("Failed to serialize settings: {}", e)))
    }
}
