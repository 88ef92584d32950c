//! Descriptive statistics for the primary outcome

use crate::config::StudyConfig;
use crate::data::Table;
use crate::errors::{Result, SynthError};
use serde::Serialize;
use statrs::statistics::Statistics;
use std::cmp::Ordering;

/// Count, moments and quartiles of a numeric sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Describe {
    pub count: usize,
    pub mean: Option<f64>,
    /// Sample standard deviation (n - 1); undefined below two values
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub p25: Option<f64>,
    pub p50: Option<f64>,
    pub p75: Option<f64>,
    pub max: Option<f64>,
}

/// Statistics for one level of the grouping column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupDescribe {
    pub group: String,
    pub stats: Describe,
}

/// Missing-value count of one column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingCount {
    pub column: String,
    pub missing: usize,
}

/// Result of the descriptive-statistics stage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdaSummary {
    pub outcome: String,
    pub overall: Describe,
    pub group_col: Option<String>,
    /// Present only when grouping is configured and the column exists
    pub by_group: Option<Vec<GroupDescribe>>,
    pub missing_counts: Vec<MissingCount>,
}

/// Linear-interpolated quantile of sorted values
fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

impl Describe {
    pub fn from_values(values: &[f64]) -> Self {
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        let n = sorted.len();

        let mean = (n > 0).then(|| sorted.iter().mean());
        let std = (n > 1).then(|| sorted.iter().std_dev());

        Self {
            count: n,
            mean,
            std,
            min: sorted.first().copied(),
            p25: quantile(&sorted, 0.25),
            p50: quantile(&sorted, 0.50),
            p75: quantile(&sorted, 0.75),
            max: sorted.last().copied(),
        }
    }

    /// Rows of (statistic name, value) in reporting order
    pub fn rows(&self) -> Vec<(&'static str, Option<f64>)> {
        vec![
            ("count", Some(self.count as f64)),
            ("mean", self.mean),
            ("std", self.std),
            ("min", self.min),
            ("25%", self.p25),
            ("50%", self.p50),
            ("75%", self.p75),
            ("max", self.max),
        ]
    }
}

/// Compute overall and per-group descriptives of the first outcome plus
/// per-column missing counts
pub fn run_eda(table: &Table, config: &StudyConfig) -> Result<EdaSummary> {
    let outcome_name = config.primary_outcome();
    let outcome = table.column(outcome_name).ok_or_else(|| SynthError::Validation {
        missing: vec![outcome_name.to_string()],
    })?;
    if !outcome.is_numeric() {
        return Err(SynthError::InvalidColumn {
            column: outcome_name.to_string(),
            reason: "must be numeric to compute descriptive statistics".to_string(),
        });
    }

    let overall = Describe::from_values(&outcome.present_numbers());

    let by_group = match config.group().filter(|g| table.has_column(g)) {
        Some(group) => Some(
            table
                .partition_by(group)?
                .into_iter()
                .map(|(level, part)| {
                    let values = part
                        .column(outcome_name)
                        .map(|c| c.present_numbers())
                        .unwrap_or_default();
                    GroupDescribe {
                        group: level,
                        stats: Describe::from_values(&values),
                    }
                })
                .collect(),
        ),
        None => None,
    };

    let missing_counts = table
        .frame()
        .get_columns()
        .iter()
        .map(|c| MissingCount {
            column: c.name().to_string(),
            missing: c.null_count(),
        })
        .collect();

    Ok(EdaSummary {
        outcome: outcome_name.to_string(),
        overall,
        group_col: config.group().map(str::to_string),
        by_group,
        missing_counts,
    })
}
