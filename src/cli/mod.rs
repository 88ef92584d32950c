//! CLI module for outcomes-synth
//!
//! Handles command-line argument parsing and application settings.

pub mod args;
pub mod config;

pub use args::{Args, Commands, RunArgs, Verbosity};
pub use config::Settings;
