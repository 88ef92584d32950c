//! Integration tests for outcomes-synth
//!
//! Runs the full pipeline on files in a temp directory with a scripted
//! narrative service, so no network is needed.

use outcomes_synth::{
    analysis::GROUP_VAR,
    narrative::ScriptedNarrativeService,
    pipeline::{prepare, run_analysis, write_outputs, AnalysisOptions},
    report::SECTION_HEADINGS,
    telemetry::{Stage, TelemetryCollector},
    SynthError,
};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const CLINICAL: &str = "participant_id,timepoint,treatment_group,symptom_score\n\
                        1,1,control,21.0\n\
                        1,2,control,20.4\n\
                        1,3,control,18.9\n\
                        2,1,treated,23.1\n\
                        2,2,treated,19.0\n\
                        2,3,treated,16.2\n";

const STUDY: &str = r#"{
    "id_col": "participant_id",
    "time_col": "timepoint",
    "outcome_cols": ["symptom_score"],
    "group_col": "treatment_group"
}"#;

const REPLY: &str = "METHODS:\n\
                     A linear mixed model with a random intercept was fit by maximum likelihood.\n\
                     RESULTS:\n\
                     Symptom scores declined over time.\n\
                     EXECUTIVE SUMMARY:\n\
                     Participants improved.\n";

fn write_inputs(dir: &TempDir, clinical: &str, study: &str) -> (PathBuf, PathBuf) {
    let data = dir.path().join("clinical.csv");
    let config = dir.path().join("config.json");
    fs::write(&data, clinical).unwrap();
    fs::write(&config, study).unwrap();
    (data, config)
}

#[tokio::test]
async fn test_two_by_three_end_to_end() {
    let dir = TempDir::new().unwrap();
    let (data, config) = write_inputs(&dir, CLINICAL, STUDY);
    let telemetry = TelemetryCollector::new();

    let study = prepare(&data, &config, dir.path(), &telemetry).unwrap();
    assert_eq!(study.table.n_rows(), 6);

    let service = ScriptedNarrativeService::with_reply(REPLY);
    let outcome = run_analysis(
        &study,
        &AnalysisOptions::default(),
        Some(&service),
        &telemetry,
    )
    .await
    .unwrap();

    assert_eq!(outcome.eda.overall.count, 6);
    assert!(outcome.eda.overall.mean.is_some());
    let groups = outcome.eda.by_group.as_ref().unwrap();
    assert_eq!(groups.len(), 2);

    let summary = &outcome.model.summary;
    assert!(summary.param("Intercept").is_some());
    assert!(summary.param("timepoint").is_some());
    assert!(summary.param(GROUP_VAR).is_some());
    assert!(summary.pvalue(GROUP_VAR).is_none());
    assert!(outcome.model.scale > 0.0);
    assert_eq!(outcome.model.n_groups, 2);

    assert!(!outcome.report.is_empty());
    for heading in SECTION_HEADINGS {
        assert!(outcome.report.contains(heading), "missing {}", heading);
    }
    assert!(outcome.report.contains("Symptom scores declined over time."));

    // prompt carries the fitted formula
    let prompts = service.prompts();
    assert!(prompts[0][1].content.contains(&summary.formula));

    let stats = telemetry.get_stats();
    assert_eq!(stats.stages_failed, 0);
    assert_eq!(stats.stages_succeeded, 8);
}

#[tokio::test]
async fn test_outputs_written() {
    let dir = TempDir::new().unwrap();
    let (data, config) = write_inputs(&dir, CLINICAL, STUDY);
    let telemetry = TelemetryCollector::new();
    let study = prepare(&data, &config, dir.path(), &telemetry).unwrap();
    let outcome = run_analysis(&study, &AnalysisOptions::default(), None, &telemetry)
        .await
        .unwrap();

    let report = dir.path().join("report.md");
    let plots = dir.path().join("plots");
    let written = write_outputs(&outcome, &report, &plots).unwrap();

    assert_eq!(written[0], report);
    let svg = fs::read_to_string(plots.join("trajectory_symptom_score.svg")).unwrap();
    assert!(svg.contains("<svg"));
    let markdown = fs::read_to_string(&report).unwrap();
    assert!(markdown.contains("_No draft text was returned for this section._"));
}

#[test]
fn test_missing_column_fails_validation() {
    let dir = TempDir::new().unwrap();
    let study = r#"{
        "id_col": "participant_id",
        "time_col": "timepoint",
        "outcome_cols": ["symptom_score"],
        "group_col": "arm",
        "covariates": ["age"]
    }"#;
    let (data, config) = write_inputs(&dir, CLINICAL, study);
    let telemetry = TelemetryCollector::new();

    let err = prepare(&data, &config, dir.path(), &telemetry).unwrap_err();
    match &err {
        SynthError::Validation { missing } => assert_eq!(missing, &["arm", "age"]),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(err.to_string(), "Missing columns in data: arm, age");
    assert_eq!(telemetry.failed_stage(), Some(Stage::Validate));
}

#[test]
fn test_missing_modality_file_is_load_error() {
    let dir = TempDir::new().unwrap();
    let study = r#"{
        "id_col": "participant_id",
        "time_col": "timepoint",
        "outcome_cols": ["symptom_score"],
        "modalities": {
            "sensor": {"file": "nowhere.csv", "merge_on": ["participant_id", "timepoint"]}
        }
    }"#;
    let (data, config) = write_inputs(&dir, CLINICAL, study);
    let telemetry = TelemetryCollector::new();

    let err = prepare(&data, &config, dir.path(), &telemetry).unwrap_err();
    assert!(matches!(err, SynthError::ModalityLoad { .. }));
    assert_eq!(telemetry.failed_stage(), Some(Stage::Load));
}

#[test]
fn test_malformed_config_is_parse_error() {
    let dir = TempDir::new().unwrap();
    let (data, config) = write_inputs(&dir, CLINICAL, "{\"id_col\": ");
    let err = prepare(&data, &config, dir.path(), &TelemetryCollector::new()).unwrap_err();
    assert!(matches!(err, SynthError::ConfigParse(_)));
}
