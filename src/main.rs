//! outcomes-synth - Main CLI Entry Point

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use outcomes_synth::{
    cli::{Args, Commands, RunArgs, Settings, Verbosity},
    datagen::{write_demo_data, DemoSpec},
    narrative::{ChatCompletionClient, NarrativeService},
    pipeline::{prepare, run_analysis, write_outputs, AnalysisOptions, PreparedStudy},
    telemetry::{TelemetryCollector, TelemetryDisplay},
    SynthError,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Rows shown in the data previews
const PREVIEW_ROWS: usize = 5;

fn init_tracing(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.log_directive()));
    // a second init (e.g. under a test harness) is not an error worth surfacing
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Spinner for a long stage, hidden in quiet mode
fn spinner(verbosity: Verbosity, message: &str) -> Result<ProgressBar> {
    if !verbosity.show_progress() {
        return Ok(ProgressBar::hidden());
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();
    let verbosity = args.verbosity();
    init_tracing(verbosity);

    let outcome = match &args.command {
        Commands::Run(run) => run_command(&args, run).await,
        Commands::Validate {
            data,
            config,
            modality_root,
        } => validate_command(verbosity, data, config, modality_root.as_deref()),
        Commands::DemoData {
            out_dir,
            participants,
            timepoints,
            seed,
        } => demo_data_command(
            verbosity,
            out_dir,
            DemoSpec {
                participants: *participants,
                timepoints: *timepoints,
                seed: *seed,
            },
        ),
        Commands::Settings => show_settings(&args),
    };

    if let Err(e) = outcome {
        match e.downcast_ref::<SynthError>() {
            Some(synth) => eprintln!("{} {}: {}", "❌".red(), synth.kind().red().bold(), synth),
            None => eprintln!("{} {}", "❌ Error:".red().bold(), e),
        }
        std::process::exit(1);
    }
}

fn print_preview(verbosity: Verbosity, study: &PreparedStudy) {
    if verbosity == Verbosity::Quiet {
        return;
    }
    println!("\n{}", "Data Preview (Clinical + Sensor)".bold());
    println!("{}", study.table.preview(PREVIEW_ROWS));

    if let Some(text) = study.text_table() {
        println!("\n{}", "Text Notes Preview".bold());
        println!("{}", text.preview(PREVIEW_ROWS));
    }
}

/// Build the narrative client from settings and CLI overrides
fn narrative_client(settings: &Settings, run: &RunArgs) -> Result<ChatCompletionClient> {
    let narrative = &settings.narrative;
    let client = ChatCompletionClient::from_env(
        &narrative.api_key_env,
        run.base_url.as_deref().unwrap_or(&narrative.base_url),
        run.model.as_deref().unwrap_or(&narrative.model),
        narrative.temperature,
        Duration::from_secs(narrative.timeout_secs),
    )?;
    Ok(client)
}

async fn run_command(args: &Args, run: &RunArgs) -> Result<()> {
    let verbosity = args.verbosity();
    let settings = Settings::load(args.settings.clone())?;
    let run_id = Uuid::new_v4();
    let started_at = chrono::Local::now();
    tracing::info!(
        run_id = %run_id,
        started = %started_at.to_rfc3339(),
        "Starting analysis run"
    );

    // fail on a missing credential before any work is done
    let client = if run.skip_narrative {
        None
    } else {
        Some(narrative_client(&settings, run)?)
    };

    let telemetry = TelemetryCollector::new();
    let pb = spinner(verbosity, "Loading and validating inputs...")?;
    let prepared = prepare(&run.data, &run.config, &run.modality_root(), &telemetry);
    pb.finish_and_clear();
    let study = prepared?;

    if verbosity.show_progress() {
        println!(
            "{} Data, multimodal inputs, and config loaded successfully.",
            "✓".green()
        );
    }
    print_preview(verbosity, &study);

    let options = AnalysisOptions::from(&settings.analysis);
    let narrator = client.as_ref().map(|c| c as &dyn NarrativeService);
    let message = if narrator.is_some() {
        "Running analysis and drafting Methods, Results, and Summary..."
    } else {
        "Running EDA and mixed-effects model..."
    };
    let pb = spinner(verbosity, message)?;
    let analysis = run_analysis(&study, &options, narrator, &telemetry).await;
    pb.finish_and_clear();
    let outcome = analysis?;

    if verbosity != Verbosity::Quiet {
        println!("\n{}", "Descriptive Statistics".bold());
        for (name, value) in outcome.eda.overall.rows() {
            let value = value.map_or("NaN".to_string(), |v| format!("{:.3}", v));
            println!("  {:<6} {}", name, value);
        }
        println!("\n{}", "Model Summary".bold());
        println!("{}", outcome.model.summary_text);
    }

    let report_path = run
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(&settings.output.report_file));
    let plots_dir = run
        .plots_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(&settings.output.plots_dir));
    let written = write_outputs(&outcome, &report_path, &plots_dir)?;

    if verbosity.show_progress() {
        println!("{} Report written to {}", "✓".green(), report_path.display());
        for path in written.iter().skip(1) {
            println!("  chart: {}", path.display());
        }
    }

    TelemetryDisplay::new(telemetry, verbosity).display_summary();
    Ok(())
}

fn validate_command(
    verbosity: Verbosity,
    data: &Path,
    config: &Path,
    modality_root: Option<&Path>,
) -> Result<()> {
    let telemetry = TelemetryCollector::new();
    let study = prepare(
        data,
        config,
        modality_root.unwrap_or(Path::new(".")),
        &telemetry,
    )?;

    if verbosity != Verbosity::Quiet {
        println!(
            "{} {} rows, {} columns; all configured columns present.",
            "✓".green(),
            study.table.n_rows(),
            study.table.n_cols()
        );
    }
    print_preview(verbosity, &study);
    TelemetryDisplay::new(telemetry, verbosity).display_summary();
    Ok(())
}

fn demo_data_command(verbosity: Verbosity, out_dir: &Path, spec: DemoSpec) -> Result<()> {
    let files = write_demo_data(out_dir, &spec)?;
    if verbosity != Verbosity::Quiet {
        println!(
            "{} Saved clinical, sensor, and text data to {}",
            "✓".green(),
            out_dir.display()
        );
        for path in [&files.clinical, &files.sensor, &files.text, &files.config] {
            println!("  {}", path.display());
        }
        println!(
            "\nTry: outcomes-synth run --data {} --config {}",
            files.clinical.display(),
            files.config.display()
        );
    }
    Ok(())
}

fn show_settings(args: &Args) -> Result<()> {
    let settings = Settings::load(args.settings.clone())?;
    let location = args
        .settings
        .clone()
        .or_else(Settings::default_path)
        .map_or("<built-in defaults>".to_string(), |p| p.display().to_string());

    println!("{} {}", "Settings:".bold(), location);
    println!();
    print!("{}", settings.to_toml()?);
    println!("Verbosity: {}", args.verbosity().as_str());
    Ok(())
}
