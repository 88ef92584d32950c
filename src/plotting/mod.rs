//! Plotting module
//!
//! Trajectory charts of the outcome and sensor features over time.

pub mod chart;
pub mod render;

// Re-export commonly used types
pub use chart::{
    plot_sensor_feature, plot_trajectories, ChartContent, Series, TrajectoryChart,
    TrajectoryPoint,
};
pub use render::DEFAULT_SIZE;
