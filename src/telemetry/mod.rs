//! Telemetry for pipeline runs
//!
//! Records stage start/completion events with durations and prints a
//! timing table after a run.

use crate::cli::Verbosity;
use crate::errors::Result;
use colored::Colorize;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Pipeline stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Load,
    Merge,
    Validate,
    Eda,
    Model,
    Plot,
    Narrative,
    Report,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Load => "load",
            Stage::Merge => "merge",
            Stage::Validate => "validate",
            Stage::Eda => "eda",
            Stage::Model => "model",
            Stage::Plot => "plot",
            Stage::Narrative => "narrative",
            Stage::Report => "report",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Telemetry event types
#[derive(Debug, Clone)]
pub enum TelemetryEvent {
    StageStarted {
        stage: Stage,
        timestamp: Instant,
    },
    StageCompleted {
        stage: Stage,
        duration_ms: u64,
        success: bool,
        timestamp: Instant,
    },
}

/// Telemetry statistics
#[derive(Debug, Clone, Default)]
pub struct TelemetryStats {
    pub stages_started: usize,
    pub stages_succeeded: usize,
    pub stages_failed: usize,
}

/// Telemetry collector
#[derive(Clone)]
pub struct TelemetryCollector {
    events: Arc<Mutex<Vec<TelemetryEvent>>>,
    stats: Arc<Mutex<TelemetryStats>>,
    start_time: Instant,
}

impl TelemetryCollector {
    /// Create a new telemetry collector
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            stats: Arc::new(Mutex::new(TelemetryStats::default())),
            start_time: Instant::now(),
        }
    }

    /// Record an event
    pub fn record(&self, event: TelemetryEvent) {
        if let Ok(mut stats) = self.stats.lock() {
            match &event {
                TelemetryEvent::StageStarted { .. } => stats.stages_started += 1,
                TelemetryEvent::StageCompleted { success: true, .. } => {
                    stats.stages_succeeded += 1
                }
                TelemetryEvent::StageCompleted { success: false, .. } => stats.stages_failed += 1,
            }
        }

        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }

    /// Mark a stage as started, returning its start instant
    pub fn start(&self, stage: Stage) -> Instant {
        let now = Instant::now();
        self.record(TelemetryEvent::StageStarted {
            stage,
            timestamp: now,
        });
        now
    }

    /// Mark a stage started at `started` as finished
    pub fn finish(&self, stage: Stage, started: Instant, success: bool) {
        self.record(TelemetryEvent::StageCompleted {
            stage,
            duration_ms: started.elapsed().as_millis() as u64,
            success,
            timestamp: Instant::now(),
        });
    }

    /// Run a synchronous stage, recording its outcome
    pub fn track<T>(&self, stage: Stage, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let started = self.start(stage);
        let result = f();
        self.finish(stage, started, result.is_ok());
        result
    }

    /// Get current statistics
    pub fn get_stats(&self) -> TelemetryStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Get elapsed time since start
    pub fn elapsed(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }

    /// Get event count
    pub fn event_count(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// Completed stages with duration and outcome, in completion order
    pub fn stage_timings(&self) -> Vec<(Stage, u64, bool)> {
        self.events
            .lock()
            .map(|events| {
                events
                    .iter()
                    .filter_map(|e| match e {
                        TelemetryEvent::StageCompleted {
                            stage,
                            duration_ms,
                            success,
                            ..
                        } => Some((*stage, *duration_ms, *success)),
                        TelemetryEvent::StageStarted { .. } => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Stage that failed, if any
    pub fn failed_stage(&self) -> Option<Stage> {
        self.stage_timings()
            .into_iter()
            .find(|(_, _, ok)| !ok)
            .map(|(stage, _, _)| stage)
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Simple telemetry display
pub struct TelemetryDisplay {
    collector: TelemetryCollector,
    verbosity: Verbosity,
}

impl TelemetryDisplay {
    /// Create a new display
    pub fn new(collector: TelemetryCollector, verbosity: Verbosity) -> Self {
        Self {
            collector,
            verbosity,
        }
    }

    /// Display per-stage timings
    pub fn display_summary(&self) {
        if !self.should_show_details() {
            return;
        }

        println!("\n{}", "Run Summary".bold());
        println!("─────────────────────────────────────");
        for (stage, ms, ok) in self.collector.stage_timings() {
            let status = if ok { "ok".green() } else { "failed".red() };
            println!("{:<12} {:>8} ms  {}", stage.as_str(), ms, status);
        }
        println!("{:<12} {:>8} ms", "total", self.collector.elapsed().as_millis());
        println!();
    }

    /// Check if should show detailed output
    pub fn should_show_details(&self) -> bool {
        self.verbosity.show_events()
    }
}
