//! Analysis module
//!
//! Descriptive statistics and the random-intercept mixed-effects model.

pub mod eda;
pub mod formula;
pub mod linalg;
pub mod mixed;

// Re-export commonly used types
pub use eda::{run_eda, Describe, EdaSummary, GroupDescribe, MissingCount};
pub use formula::{build_formula, Formula, Term};
pub use mixed::{run_mixed_model, FixedEffect, MixedModelFit, ModelSummary, GROUP_VAR};
