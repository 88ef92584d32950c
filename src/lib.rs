//! outcomes-synth - Longitudinal Outcomes Synthesizer
//!
//! Ingests a longitudinal clinical table plus optional sensor and text
//! modality tables, fits a random-intercept mixed model, charts outcome
//! trajectories and drafts report prose through a chat-completions service.
//!
//! # Architecture
//!
//! - **Inputs**: study config, typed tables, modality merge and validation
//! - **Analysis**: descriptive statistics, formula building, ML mixed model
//! - **Outputs**: SVG trajectory charts, narrative sections, Markdown report

// Inputs
pub mod config;
pub mod data;
pub mod errors;

// Re-export commonly used types
pub use errors::{Result, SynthError};

// Analysis stages
pub mod analysis;
pub mod narrative;
pub mod plotting;
pub mod report;

// Orchestration and shell
pub mod cli;
pub mod datagen;
pub mod pipeline;
pub mod telemetry;
