//! Run orchestration
//!
//! Load → Merge → Validate → EDA → Model → Plot → Narrative → Report, each
//! stage recorded on a `TelemetryCollector`. A failing stage ends the run
//! and its error is returned unchanged.

use crate::analysis::{run_eda, run_mixed_model, EdaSummary, MixedModelFit};
use crate::cli::config::AnalysisSettings;
use crate::config::{load_config, StudyConfig, TEXT_MODALITY};
use crate::data::{
    load_data, load_multimodal_from, merge_sensor_into_main, sample_text_excerpts,
    validate_data, Modalities, Table,
};
use crate::errors::Result;
use crate::narrative::{generate_methods_results_text, NarrativeSections, NarrativeService};
use crate::plotting::{plot_sensor_feature, plot_trajectories, TrajectoryChart};
use crate::report::build_markdown_report;
use crate::telemetry::{Stage, TelemetryCollector};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Analysis knobs that are not part of the study config
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    /// Sensor columns plotted when present in the merged table
    pub sensor_features: Vec<String>,
    pub text_column: String,
    pub text_sample_size: usize,
    pub sample_seed: u64,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self::from(&AnalysisSettings::default())
    }
}

impl From<&AnalysisSettings> for AnalysisOptions {
    fn from(settings: &AnalysisSettings) -> Self {
        Self {
            sensor_features: settings.sensor_features.clone(),
            text_column: settings.text_column.clone(),
            text_sample_size: settings.text_sample_size,
            sample_seed: settings.sample_seed,
        }
    }
}

/// Merged and validated inputs of one run
#[derive(Debug, Clone)]
pub struct PreparedStudy {
    pub config: StudyConfig,
    pub table: Table,
    pub modalities: Modalities,
}

impl PreparedStudy {
    /// Text-notes table, when that modality was loaded
    pub fn text_table(&self) -> Option<&Table> {
        self.modalities.get(TEXT_MODALITY)
    }
}

/// A rendered-to-be chart with the file stem it is saved under
#[derive(Debug, Clone)]
pub struct NamedChart {
    pub name: String,
    pub chart: TrajectoryChart,
}

/// Everything a run produced
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub eda: EdaSummary,
    pub model: MixedModelFit,
    pub charts: Vec<NamedChart>,
    pub text_examples: Option<String>,
    pub sections: NarrativeSections,
    pub report: String,
}

/// Load the config, clinical table and modalities, then merge and validate
pub fn prepare(
    data: &Path,
    config: &Path,
    modality_root: &Path,
    telemetry: &TelemetryCollector,
) -> Result<PreparedStudy> {
    let (config, clinical, modalities) = telemetry.track(Stage::Load, || {
        let config = load_config(config)?;
        let clinical = load_data(data)?;
        let modalities = load_multimodal_from(&config, modality_root)?;
        Ok((config, clinical, modalities))
    })?;
    prepare_tables(config, clinical, modalities, telemetry)
}

/// Merge and validate already-loaded tables
pub fn prepare_tables(
    config: StudyConfig,
    clinical: Table,
    modalities: Modalities,
    telemetry: &TelemetryCollector,
) -> Result<PreparedStudy> {
    let table = telemetry.track(Stage::Merge, || {
        merge_sensor_into_main(clinical, &config, &modalities)
    })?;
    telemetry.track(Stage::Validate, || validate_data(&table, &config))?;

    info!(
        rows = table.n_rows(),
        cols = table.n_cols(),
        modalities = modalities.len(),
        "Inputs validated"
    );
    Ok(PreparedStudy {
        config,
        table,
        modalities,
    })
}

fn build_charts(study: &PreparedStudy, options: &AnalysisOptions) -> Result<Vec<NamedChart>> {
    let mut charts = vec![NamedChart {
        name: format!("trajectory_{}", study.config.primary_outcome()),
        chart: plot_trajectories(&study.table, &study.config)?,
    }];

    for feature in &options.sensor_features {
        if !study.table.has_column(feature) {
            debug!(feature = %feature, "Sensor feature not in merged table; no chart");
            continue;
        }
        charts.push(NamedChart {
            name: format!("sensor_{}", feature),
            chart: plot_sensor_feature(&study.table, feature, &study.config)?,
        });
    }
    Ok(charts)
}

/// Run the analysis stages on a prepared study
///
/// With no `narrator` the narrative sections stay empty and no request is
/// made; the report is still assembled.
pub async fn run_analysis(
    study: &PreparedStudy,
    options: &AnalysisOptions,
    narrator: Option<&dyn NarrativeService>,
    telemetry: &TelemetryCollector,
) -> Result<AnalysisOutcome> {
    let eda = telemetry.track(Stage::Eda, || run_eda(&study.table, &study.config))?;
    let model = telemetry.track(Stage::Model, || {
        run_mixed_model(&study.table, &study.config)
    })?;
    let charts = telemetry.track(Stage::Plot, || build_charts(study, options))?;

    let text_examples = study.text_table().and_then(|text| {
        sample_text_excerpts(
            text,
            &options.text_column,
            options.text_sample_size,
            options.sample_seed,
        )
    });

    let sections = match narrator {
        Some(service) => {
            let started = telemetry.start(Stage::Narrative);
            let result = generate_methods_results_text(
                service,
                &study.config,
                &model.summary,
                text_examples.as_deref(),
            )
            .await;
            telemetry.finish(Stage::Narrative, started, result.is_ok());
            result?
        }
        None => {
            info!("Narrative generation skipped");
            NarrativeSections::default()
        }
    };

    let report = telemetry.track(Stage::Report, || {
        Ok(build_markdown_report(
            &study.config,
            &eda,
            &model.summary_text,
            &sections,
        ))
    })?;

    Ok(AnalysisOutcome {
        eda,
        model,
        charts,
        text_examples,
        sections,
        report,
    })
}

/// Write the report and one SVG per chart, returning the paths written
pub fn write_outputs(
    outcome: &AnalysisOutcome,
    report_path: &Path,
    plots_dir: &Path,
) -> Result<Vec<PathBuf>> {
    if let Some(parent) = report_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(report_path, &outcome.report)?;
    let mut written = vec![report_path.to_path_buf()];

    fs::create_dir_all(plots_dir)?;
    for named in &outcome.charts {
        let path = plots_dir.join(format!("{}.svg", named.name));
        named.chart.save_svg(&path)?;
        written.push(path);
    }

    info!(files = written.len(), "Outputs written");
    Ok(written)
}
