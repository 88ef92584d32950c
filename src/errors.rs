//! Error types for the outcomes synthesizer
//!
//! Every pipeline stage fails fast with one of these variants; the shell
//! catches them at the top level and shows the message to the user.

use thiserror::Error;

/// Main error type for the analysis pipeline
#[derive(Error, Debug)]
pub enum SynthError {
    /// Malformed study configuration
    #[error("Config parse error: {0}")]
    ConfigParse(String),

    /// Malformed clinical or modality CSV
    #[error("Data parse error: {0}")]
    DataParse(String),

    /// A configured modality file could not be read
    #[error("Failed to load modality '{name}' from {path}: {reason}")]
    ModalityLoad {
        name: String,
        path: String,
        reason: String,
    },

    /// Required columns absent from the merged table
    #[error("Missing columns in data: {}", missing.join(", "))]
    Validation { missing: Vec<String> },

    /// Join keys absent from one side of a merge
    #[error("Merge error: {0}")]
    Merge(String),

    /// Column present but unusable for the requested computation
    #[error("Column '{column}' {reason}")]
    InvalidColumn { column: String, reason: String },

    /// Mixed-effects model could not be fitted
    #[error("Model fit error: {0}")]
    ModelFit(String),

    /// Narrative generation call failed or returned nothing
    #[error("Narrative service error: {0}")]
    NarrativeService(String),

    /// Chart rendering errors
    #[error("Plot error: {0}")]
    Plot(String),

    /// Application settings errors
    #[error("Settings error: {0}")]
    Settings(String),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, SynthError>;

impl SynthError {
    /// Short category name used in status lines and telemetry
    pub fn kind(&self) -> &'static str {
        match self {
            SynthError::ConfigParse(_) => "ConfigParseError",
            SynthError::DataParse(_) => "DataParseError",
            SynthError::ModalityLoad { .. } => "ModalityLoadError",
            SynthError::Validation { .. } => "ValidationError",
            SynthError::Merge(_) => "MergeError",
            SynthError::InvalidColumn { .. } => "InvalidColumnError",
            SynthError::ModelFit(_) => "ModelFitError",
            SynthError::NarrativeService(_) => "NarrativeServiceError",
            SynthError::Plot(_) => "PlotError",
            SynthError::Settings(_) => "SettingsError",
            SynthError::Http(_) => "HttpError",
            SynthError::Serialization(_) => "SerializationError",
            SynthError::Io(_) => "IoError",
        }
    }
}
