//! Study configuration
//!
//! The JSON document naming the columns of the clinical table and the
//! optional modality files joined into it.

use crate::errors::{Result, SynthError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Name of the modality whose columns are joined into the clinical table
pub const SENSOR_MODALITY: &str = "sensor";

/// Name of the modality holding free-text notes
pub const TEXT_MODALITY: &str = "text";

/// Column layout of a longitudinal study
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyConfig {
    pub id_col: String,
    pub time_col: String,
    /// First entry is the analyzed outcome
    pub outcome_cols: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_col: Option<String>,
    #[serde(default)]
    pub covariates: Vec<String>,
    #[serde(default)]
    pub modalities: BTreeMap<String, ModalityConfig>,
}

/// One additional data source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ModalityConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default)]
    pub merge_on: Vec<String>,
}

impl StudyConfig {
    /// Parse configuration from a JSON string
    pub fn from_json(source: &str) -> Result<Self> {
        let config: StudyConfig =
            serde_json::from_str(source).map_err(|e| SynthError::ConfigParse(e.to_string()))?;

        if config.outcome_cols.is_empty() {
            return Err(SynthError::ConfigParse(
                "outcome_cols must name at least one column".to_string(),
            ));
        }

        Ok(config)
    }

    /// The analyzed outcome column
    pub fn primary_outcome(&self) -> &str {
        // Non-empty after from_json
        self.outcome_cols.first().map(String::as_str).unwrap_or_default()
    }

    /// Grouping column, ignoring an empty string
    pub fn group(&self) -> Option<&str> {
        self.group_col.as_deref().filter(|g| !g.is_empty())
    }

    /// Every column the analysis needs, in declaration order
    pub fn required_columns(&self) -> Vec<&str> {
        let mut cols = vec![self.id_col.as_str(), self.time_col.as_str()];
        cols.extend(self.outcome_cols.iter().map(String::as_str));
        if let Some(group) = self.group() {
            cols.push(group);
        }
        cols.extend(self.covariates.iter().map(String::as_str));
        cols
    }

    /// Configuration of a named modality, if declared
    pub fn modality(&self, name: &str) -> Option<&ModalityConfig> {
        self.modalities.get(name)
    }
}

/// Load a study configuration from a JSON file
pub fn load_config(path: impl AsRef<Path>) -> Result<StudyConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| {
        SynthError::ConfigParse(format!("cannot read {}: {}", path.display(), e))
    })?;
    StudyConfig::from_json(&contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"{
        "id_col": "participant_id",
        "time_col": "timepoint",
        "outcome_cols": ["symptom_score", "qol"],
        "group_col": "treatment_group",
        "covariates": ["age", "gender"],
        "modalities": {
            "sensor": {"file": "data/sensor.csv", "merge_on": ["participant_id", "timepoint"]},
            "text": {"file": "data/notes.csv", "merge_on": ["participant_id", "timepoint"]}
        }
    }"#;

    #[test]
    fn test_parse_full_config() {
        let config = StudyConfig::from_json(FULL).unwrap();
        assert_eq!(config.primary_outcome(), "symptom_score");
        assert_eq!(config.group(), Some("treatment_group"));
        assert_eq!(config.covariates, vec!["age", "gender"]);
        let sensor = config.modality(SENSOR_MODALITY).unwrap();
        assert_eq!(sensor.file.as_deref(), Some("data/sensor.csv"));
        assert_eq!(sensor.merge_on.len(), 2);
    }

    #[test]
    fn test_optional_fields_default() {
        let config = StudyConfig::from_json(
            r#"{"id_col": "id", "time_col": "t", "outcome_cols": ["y"]}"#,
        )
        .unwrap();
        assert!(config.group().is_none());
        assert!(config.covariates.is_empty());
        assert!(config.modalities.is_empty());
    }

    #[test]
    fn test_required_columns_order() {
        let config = StudyConfig::from_json(FULL).unwrap();
        assert_eq!(
            config.required_columns(),
            vec![
                "participant_id",
                "timepoint",
                "symptom_score",
                "qol",
                "treatment_group",
                "age",
                "gender"
            ]
        );
    }

    #[test]
    fn test_malformed_json_is_config_parse_error() {
        let err = StudyConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, SynthError::ConfigParse(_)));
    }

    #[test]
    fn test_empty_outcomes_rejected() {
        let err = StudyConfig::from_json(r#"{"id_col": "id", "time_col": "t", "outcome_cols": []}"#)
            .unwrap_err();
        assert!(matches!(err, SynthError::ConfigParse(_)));
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("study.json");
        fs::write(&path, FULL).unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.id_col, "participant_id");
    }

    #[test]
    fn test_missing_file_is_config_parse_error() {
        let err = load_config("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, SynthError::ConfigParse(_)));
    }
}
