//! Coarse wall-clock profiling of the scheduler's event loop.
//!
//! Grounded on `runtime::bench::Profiler` for the shape (a struct
//! tracking start time, duration, and an event count), but scaled down
//! to what `COCOTB_ENABLE_PROFILING` (`original_source/src/cocotb/_profiling.py`)
//! actually gates: the original wraps the whole test run in a
//! `cProfile.Profile`; dumping a full call-graph profile format is out
//! of scope (§1 names profiling as a named collaborator, not a core
//! concern), so this just accumulates wall-clock time and a resume count.

use std::time::{Duration, Instant};

/// Accumulates timing statistics over a scheduler run, active only when
/// `COCOTB_ENABLE_PROFILING` is set (see [`crate::config::Config::enable_profiling`]).
#[derive(Debug, Clone)]
pub struct Profiler {
    enabled: bool,
    started: Option<Instant>,
    total: Duration,
    resumes: u64,
}

impl Profiler {
    /// Creates a profiler; `enabled` gates whether [`Profiler::enable`]/[`Profiler::disable`] do anything.
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            started: None,
            total: Duration::ZERO,
            resumes: 0,
        }
    }

    /// Starts (or resumes) accounting time.
    pub fn enable(&mut self) {
        if self.enabled {
            self.started = Some(Instant::now());
        }
    }

    /// Stops accounting time, folding the elapsed interval into the running total.
    pub fn disable(&mut self) {
        if let Some(start) = self.started.take() {
            self.total += start.elapsed();
            self.resumes += 1;
        }
    }

    /// Total wall-clock time spent between matched `enable`/`disable` calls.
    pub fn total(&self) -> Duration {
        self.total
    }

    /// Number of completed `enable`/`disable` intervals (roughly, task resumes).
    pub fn resumes(&self) -> u64 {
        self.resumes
    }

    /// Logs a summary via `tracing` - the stand-in for the original's
    /// `cocotb.pstat` dump, which this crate does not reproduce.
    pub fn finalize(&self) {
        if self.enabled {
            tracing::info!(
                total_ms = self.total.as_millis() as u64,
                resumes = self.resumes,
                "scheduler profiling summary"
            );
        }
    }
}
