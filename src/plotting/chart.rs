//! Trajectory charts as plain values
//!
//! A chart holds the mean of a column at each time value with a 95%
//! Student-t confidence band, one series per group level. Building a chart
//! is deterministic; rendering lives in `render`.

use crate::config::StudyConfig;
use crate::data::{Column, Table};
use crate::errors::{Result, SynthError};
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, StudentsT};
use statrs::statistics::Statistics;
use std::cmp::Ordering;

/// Label of the single series drawn when no grouping is configured
pub const ALL_SERIES: &str = "all";

/// Mean and confidence band at one time value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrajectoryPoint {
    pub x: f64,
    pub mean: f64,
    pub lower: f64,
    pub upper: f64,
    pub n: usize,
}

/// One line of the chart
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub label: String,
    pub points: Vec<TrajectoryPoint>,
}

/// What the chart shows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ChartContent {
    Lines(Vec<Series>),
    Placeholder(String),
}

/// Renderable chart
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrajectoryChart {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub content: ChartContent,
}

impl TrajectoryChart {
    fn placeholder(title: String, x_label: &str, y_label: &str, message: String) -> Self {
        Self {
            title,
            x_label: x_label.to_string(),
            y_label: y_label.to_string(),
            content: ChartContent::Placeholder(message),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self.content, ChartContent::Placeholder(_))
    }

    pub fn series(&self) -> &[Series] {
        match &self.content {
            ChartContent::Lines(series) => series,
            ChartContent::Placeholder(_) => &[],
        }
    }
}

/// Mean with a closed-form 95% t interval; a single value gives a zero-width band
fn mean_ci(values: &[f64]) -> (f64, f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().mean();
    if values.len() < 2 {
        return (mean, mean, mean);
    }
    let sd = values.iter().std_dev();
    let t = StudentsT::new(0.0, 1.0, n - 1.0)
        .map(|dist| dist.inverse_cdf(0.975))
        .unwrap_or(1.96);
    let half = t * sd / n.sqrt();
    (mean, mean - half, mean + half)
}

/// x position of a row: the time value, or the level ordinal for a categorical time
fn x_position(time: &Column<'_>, levels: &[String], row: usize) -> Option<f64> {
    if time.is_numeric() {
        time.number(row)
    } else {
        let label = time.label(row)?;
        levels.iter().position(|l| *l == label).map(|i| i as f64)
    }
}

fn build_points(mut observations: Vec<(f64, f64)>) -> Vec<TrajectoryPoint> {
    observations.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
    let mut points = Vec::new();
    let mut start = 0;
    while start < observations.len() {
        let x = observations[start].0;
        let end = observations[start..]
            .iter()
            .position(|(ox, _)| *ox != x)
            .map_or(observations.len(), |off| start + off);
        let values: Vec<f64> = observations[start..end].iter().map(|(_, v)| *v).collect();
        let (mean, lower, upper) = mean_ci(&values);
        points.push(TrajectoryPoint {
            x,
            mean,
            lower,
            upper,
            n: values.len(),
        });
        start = end;
    }
    points
}

fn trajectory(table: &Table, value_col: &str, config: &StudyConfig) -> Result<TrajectoryChart> {
    let time_col = config.time_col.as_str();
    let title = format!("{} over {}", value_col, time_col);

    let Some(values) = table.column(value_col) else {
        return Ok(TrajectoryChart::placeholder(
            title,
            time_col,
            value_col,
            format!("{} not found", value_col),
        ));
    };
    let Some(time) = table.column(time_col) else {
        return Ok(TrajectoryChart::placeholder(
            title,
            time_col,
            value_col,
            format!("{} not found", time_col),
        ));
    };
    if !values.is_numeric() {
        return Err(SynthError::InvalidColumn {
            column: value_col.to_string(),
            reason: "must be numeric to plot a trajectory".to_string(),
        });
    }

    let time_levels = time.levels();
    let observations = |part: &Table| -> Vec<(f64, f64)> {
        let (Some(time), Some(values)) = (part.column(time_col), part.column(value_col)) else {
            return Vec::new();
        };
        (0..part.n_rows())
            .filter_map(|row| Some((x_position(&time, &time_levels, row)?, values.number(row)?)))
            .collect()
    };

    let series = match config.group().filter(|g| table.has_column(g)) {
        Some(group) => table
            .partition_by(group)?
            .into_iter()
            .map(|(level, part)| Series {
                label: level,
                points: build_points(observations(&part)),
            })
            .collect(),
        None => vec![Series {
            label: ALL_SERIES.to_string(),
            points: build_points(observations(table)),
        }],
    };

    Ok(TrajectoryChart {
        title,
        x_label: time_col.to_string(),
        y_label: value_col.to_string(),
        content: ChartContent::Lines(series),
    })
}

/// Mean primary outcome over time, split by group when configured
pub fn plot_trajectories(table: &Table, config: &StudyConfig) -> Result<TrajectoryChart> {
    trajectory(table, config.primary_outcome(), config)
}

/// Mean of a sensor feature over time; absent features give a placeholder
pub fn plot_sensor_feature(
    table: &Table,
    feature: &str,
    config: &StudyConfig,
) -> Result<TrajectoryChart> {
    trajectory(table, feature, config)
}
