//! # Pipeline Performance
//!
//! Timing and budgeting for pipeline runs:
//!
//! - **Budget**: deadline and work cap checked from inside the extraction and
//!   slicing loops; exceeding it aborts the run with `RESOURCE_EXCEEDED`
//! - **PipelineStats**: per-stage durations and the reduction achieved by one run
//! - **PipelineMonitor**: rolling window of recent runs for averaging
//!
//! ## Usage
//!
//! ```rust
//! use geoslice::performance::{Budget, PipelineMonitor, PipelineStats, Stage};
//! use std::time::Duration;
//!
//! let mut budget = Budget::new(Duration::from_secs(5), 1_000_000);
//! budget.charge(10).unwrap();
//!
//! let mut stats = PipelineStats::default();
//! let timer = stats.begin(Stage::Extract);
//! // ... extract ...
//! stats.end(timer);
//!
//! let mut monitor = PipelineMonitor::new();
//! monitor.record(&stats);
//! assert_eq!(monitor.metrics().runs, 1);
//! ```

use crate::error::{PipelineError, Result};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Units of work between two deadline checks
const CHECK_INTERVAL: u64 = 4096;

/// Time and work allowance for a single pipeline run
#[derive(Debug, Clone)]
pub struct Budget {
    deadline: Instant,
    timeout: Duration,
    max_work: u64,
    spent: u64,
    next_check: u64,
}

impl Budget {
    /// Budget starting now, expiring after `timeout` or `max_work` units
    pub fn new(timeout: Duration, max_work: u64) -> Self {
        Self {
            deadline: Instant::now() + timeout,
            timeout,
            max_work,
            spent: 0,
            next_check: CHECK_INTERVAL,
        }
    }

    /// Budget that never runs out
    pub fn unlimited() -> Self {
        Self::new(Duration::from_secs(60 * 60 * 24 * 365), u64::MAX)
    }

    /// Records `units` of work, failing once either limit is crossed
    ///
    /// The clock is read only every few thousand units to keep the hot loops
    /// cheap.
    #[inline]
    pub fn charge(&mut self, units: u64) -> Result<()> {
        self.spent = self.spent.saturating_add(units);
        if self.spent > self.max_work {
            return Err(PipelineError::ResourceExceeded(format!(
                "work limit of {} units exceeded",
                self.max_work
            )));
        }
        if self.spent >= self.next_check {
            self.next_check = self.spent.saturating_add(CHECK_INTERVAL);
            self.check_deadline()?;
        }
        Ok(())
    }

    /// Fails if the deadline has passed
    pub fn check_deadline(&self) -> Result<()> {
        if Instant::now() > self.deadline {
            return Err(PipelineError::ResourceExceeded(format!(
                "computation exceeded its {} ms timeout",
                self.timeout.as_millis()
            )));
        }
        Ok(())
    }

    pub fn spent(&self) -> u64 {
        self.spent
    }
}

/// Pipeline stages that are timed individually
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Extract,
    Colorize,
    Slice,
    Package,
}

/// Running timer handed out by [`PipelineStats::begin`]
#[must_use]
pub struct StageTimer {
    stage: Stage,
    start: Instant,
}

/// Measurements of one pipeline run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineStats {
    pub extract: Duration,
    pub colorize: Duration,
    pub slice: Duration,
    pub package: Duration,
    /// Points in the source mesh
    pub input_vertices: usize,
    /// Vertices in the emitted payload
    pub output_vertices: usize,
    /// Whether the surface came from the session cache
    pub surface_cached: bool,
}

impl PipelineStats {
    pub fn begin(&self, stage: Stage) -> StageTimer {
        StageTimer {
            stage,
            start: Instant::now(),
        }
    }

    pub fn end(&mut self, timer: StageTimer) {
        let elapsed = timer.start.elapsed();
        match timer.stage {
            Stage::Extract => self.extract += elapsed,
            Stage::Colorize => self.colorize += elapsed,
            Stage::Slice => self.slice += elapsed,
            Stage::Package => self.package += elapsed,
        }
    }

    pub fn total(&self) -> Duration {
        self.extract + self.colorize + self.slice + self.package
    }

    /// Fraction of input vertices that did not make it into the payload
    pub fn reduction_ratio(&self) -> f64 {
        if self.input_vertices == 0 {
            return 0.0;
        }
        1.0 - self.output_vertices as f64 / self.input_vertices as f64
    }
}

/// Aggregated metrics over recent runs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineMetrics {
    /// Runs recorded since creation or the last reset
    pub runs: u64,
    pub avg_run_ms: f64,
    pub min_run_ms: f64,
    pub max_run_ms: f64,
    /// Mean reduction ratio over the window
    pub avg_reduction: f64,
}

/// Rolling window of recent pipeline runs
pub struct PipelineMonitor {
    samples: VecDeque<(Duration, f64)>,
    max_samples: usize,
    runs: u64,
}

impl PipelineMonitor {
    pub fn new() -> Self {
        Self::with_capacity(120)
    }

    pub fn with_capacity(max_samples: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(max_samples),
            max_samples: max_samples.max(1),
            runs: 0,
        }
    }

    pub fn record(&mut self, stats: &PipelineStats) {
        if self.samples.len() >= self.max_samples {
            self.samples.pop_front();
        }
        self.samples.push_back((stats.total(), stats.reduction_ratio()));
        self.runs += 1;
    }

    pub fn metrics(&self) -> PipelineMetrics {
        if self.samples.is_empty() {
            return PipelineMetrics {
                runs: self.runs,
                ..Default::default()
            };
        }

        let millis = |d: &Duration| d.as_secs_f64() * 1000.0;
        let count = self.samples.len() as f64;
        let total: f64 = self.samples.iter().map(|(d, _)| millis(d)).sum();
        let reduction: f64 = self.samples.iter().map(|(_, r)| r).sum();

        PipelineMetrics {
            runs: self.runs,
            avg_run_ms: total / count,
            min_run_ms: self
                .samples
                .iter()
                .map(|(d, _)| millis(d))
                .fold(f64::INFINITY, f64::min),
            max_run_ms: self
                .samples
                .iter()
                .map(|(d, _)| millis(d))
                .fold(0.0, f64::max),
            avg_reduction: reduction / count,
        }
    }

    pub fn reset(&mut self) {
        self.samples.clear();
        self.runs = 0;
    }
}

impl Default for PipelineMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_work_limit() {
        let mut budget = Budget::new(Duration::from_secs(60), 100);
        budget.charge(100).unwrap();
        let err = budget.charge(1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceExceeded);
    }

    #[test]
    fn test_expired_deadline() {
        let mut budget = Budget::new(Duration::ZERO, u64::MAX);
        std::thread::sleep(Duration::from_millis(2));
        let err = budget.charge(CHECK_INTERVAL).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceExceeded);
    }

    #[test]
    fn test_reduction_ratio() {
        let stats = PipelineStats {
            input_vertices: 1000,
            output_vertices: 50,
            ..Default::default()
        };
        assert!((stats.reduction_ratio() - 0.95).abs() < 1e-12);
        assert_eq!(PipelineStats::default().reduction_ratio(), 0.0);
    }

    #[test]
    fn test_monitor_window() {
        let mut monitor = PipelineMonitor::with_capacity(2);
        for ms in [10, 20, 30] {
            monitor.record(&PipelineStats {
                slice: Duration::from_millis(ms),
                ..Default::default()
            });
        }
        let metrics = monitor.metrics();
        assert_eq!(metrics.runs, 3);
        assert!((metrics.avg_run_ms - 25.0).abs() < 1e-6);
        assert!((metrics.min_run_ms - 20.0).abs() < 1e-6);
    }
}
