//! Command-line argument parsing for outcomes-synth
//!
//! Provides clap-based CLI with subcommands and verbosity control.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// outcomes-synth - Multimodal longitudinal analysis with AI-drafted write-ups
#[derive(Parser, Debug)]
#[command(name = "outcomes-synth")]
#[command(author = "Jerome (Kubashen) Naidoo")]
#[command(version)]
#[command(about = "Analyze longitudinal outcome data and draft a Markdown report", long_about = None)]
pub struct Args {
    /// Application settings file (TOML)
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Verbosity level: -q (quiet), default (normal), -v (verbose), -vv (very verbose)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full analysis and write the report
    Run(RunArgs),

    /// Load, merge and check required columns without fitting anything
    Validate {
        /// Clinical CSV file
        #[arg(long)]
        data: PathBuf,

        /// Study configuration JSON
        #[arg(long)]
        config: PathBuf,

        /// Directory modality file paths are resolved against
        #[arg(long)]
        modality_root: Option<PathBuf>,
    },

    /// Write a synthetic multimodal dataset and matching study config
    DemoData {
        /// Output directory
        #[arg(long, default_value = "data")]
        out_dir: PathBuf,

        /// Number of participants
        #[arg(long, default_value_t = 120)]
        participants: usize,

        /// Visits per participant
        #[arg(long, default_value_t = 6)]
        timepoints: usize,

        /// Random seed
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },

    /// Display effective application settings
    Settings,
}

/// Arguments of the `run` subcommand
#[derive(clap::Args, Debug, Clone)]
pub struct RunArgs {
    /// Clinical CSV file
    #[arg(long)]
    pub data: PathBuf,

    /// Study configuration JSON
    #[arg(long)]
    pub config: PathBuf,

    /// Report path (overrides settings)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Directory for trajectory SVGs (overrides settings)
    #[arg(long)]
    pub plots_dir: Option<PathBuf>,

    /// Directory modality file paths are resolved against
    #[arg(long)]
    pub modality_root: Option<PathBuf>,

    /// Narrative model name (overrides settings)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Chat-completions base URL (overrides settings)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Build the report with empty narrative sections
    #[arg(long)]
    pub skip_narrative: bool,
}

/// Verbosity level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    VeryVerbose,
}

impl Args {
    /// Get verbosity level based on flags
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::VeryVerbose,
            }
        }
    }
}

impl RunArgs {
    /// Modality root (current directory if not specified)
    pub fn modality_root(&self) -> PathBuf {
        self.modality_root
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

impl Verbosity {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "quiet",
            Verbosity::Normal => "normal",
            Verbosity::Verbose => "verbose",
            Verbosity::VeryVerbose => "very_verbose",
        }
    }

    /// Default tracing filter directive when RUST_LOG is unset
    pub fn log_directive(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "error",
            Verbosity::Normal => "warn",
            Verbosity::Verbose => "info",
            Verbosity::VeryVerbose => "debug",
        }
    }

    /// Check if should show progress spinners
    pub fn show_progress(&self) -> bool {
        !matches!(self, Verbosity::Quiet)
    }

    /// Check if should show detailed events
    pub fn show_events(&self) -> bool {
        matches!(self, Verbosity::Verbose | Verbosity::VeryVerbose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_verbosity_quiet() {
        let args = parse(&["outcomes-synth", "-q", "settings"]);
        assert_eq!(args.verbosity(), Verbosity::Quiet);
    }

    #[test]
    fn test_verbosity_normal() {
        let args = parse(&["outcomes-synth", "settings"]);
        assert_eq!(args.verbosity(), Verbosity::Normal);
    }

    #[test]
    fn test_verbosity_verbose() {
        let args = parse(&["outcomes-synth", "-v", "settings"]);
        assert_eq!(args.verbosity(), Verbosity::Verbose);
    }

    #[test]
    fn test_verbosity_very_verbose() {
        let args = parse(&["outcomes-synth", "settings", "-vv"]);
        assert_eq!(args.verbosity(), Verbosity::VeryVerbose);
    }

    #[test]
    fn test_run_args() {
        let args = parse(&[
            "outcomes-synth",
            "run",
            "--data",
            "clinical.csv",
            "--config",
            "study.json",
            "--skip-narrative",
            "--model",
            "gpt-4o",
        ]);
        match args.command {
            Commands::Run(run) => {
                assert_eq!(run.data, PathBuf::from("clinical.csv"));
                assert_eq!(run.config, PathBuf::from("study.json"));
                assert!(run.skip_narrative);
                assert_eq!(run.model.as_deref(), Some("gpt-4o"));
                assert!(run.output.is_none());
                assert_eq!(run.modality_root(), PathBuf::from("."));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_run_requires_data_and_config() {
        assert!(Args::try_parse_from(["outcomes-synth", "run", "--data", "x.csv"]).is_err());
    }

    #[test]
    fn test_demo_data_defaults() {
        let args = parse(&["outcomes-synth", "demo-data"]);
        match args.command {
            Commands::DemoData {
                out_dir,
                participants,
                timepoints,
                seed,
            } => {
                assert_eq!(out_dir, PathBuf::from("data"));
                assert_eq!(participants, 120);
                assert_eq!(timepoints, 6);
                assert_eq!(seed, 42);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_verbosity_methods() {
        assert!(!Verbosity::Quiet.show_progress());
        assert!(Verbosity::Normal.show_progress());

        assert!(!Verbosity::Normal.show_events());
        assert!(Verbosity::Verbose.show_events());

        assert_eq!(Verbosity::Quiet.log_directive(), "error");
        assert_eq!(Verbosity::VeryVerbose.log_directive(), "debug");
    }
}
