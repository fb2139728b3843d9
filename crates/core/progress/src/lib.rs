use std::time::{Duration, Instant};

use serde::Serialize;

/// Tracks how far along a job of `count` steps is.
///
/// Not synchronised: keep it behind whatever lock guards the job itself.
#[derive(Clone, Debug, Default)]
pub struct Progress {
    count: usize,
    index: usize,
    started: Option<Instant>,
    finished: Option<Instant>,
    success: Option<bool>,
    error: Option<String>,
}

/// Point-in-time view of a [`Progress`], for reporting
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ProgressSnapshot {
    pub count: usize,
    pub index: usize,
    pub ratio: f64,
    pub elapsed_ms: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta_ms: Option<u128>,
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin (or restart) tracking a job of `count` steps
    pub fn start(&mut self, count: usize) {
        *self = Self {
            count,
            started: Some(Instant::now()),
            ..Self::default()
        };
    }

    /// Jump to step `index`, capped at the step count
    pub fn set_index(&mut self, index: usize) {
        self.index = index.min(self.count);
    }

    /// Move one step forward
    pub fn advance(&mut self) {
        self.set_index(self.index.saturating_add(1));
    }

    /// Mark the job as done
    pub fn finish(&mut self, success: bool) {
        if success {
            self.index = self.count;
        }

        self.finished = Some(Instant::now());
        self.success = Some(success);
    }

    /// Mark the job as failed with a reason
    pub fn failed(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
        self.finish(false);
    }

    /// Mark the job as failed because of `error`
    pub fn failed_with(&mut self, error: &dyn std::error::Error) {
        self.failed(error.to_string());
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_running(&self) -> bool {
        self.started.is_some() && self.finished.is_none()
    }

    pub fn is_finished(&self) -> bool {
        self.finished.is_some()
    }

    /// `None` until finished
    pub fn succeeded(&self) -> Option<bool> {
        self.success
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Fraction of steps done, between 0 and 1
    pub fn ratio(&self) -> f64 {
        if self.count == 0 {
            return if self.success == Some(true) { 1.0 } else { 0.0 };
        }

        self.index as f64 / self.count as f64
    }

    /// Time spent so far, or in total once finished
    pub fn elapsed(&self) -> Duration {
        match (self.started, self.finished) {
            (Some(started), Some(finished)) => finished.saturating_duration_since(started),
            (Some(started), None) => started.elapsed(),
            _ => Duration::ZERO,
        }
    }

    /// Estimated time left, extrapolated from the pace so far.
    ///
    /// Unknown until at least one step is done and while not running.
    pub fn eta(&self) -> Option<Duration> {
        if !self.is_running() || self.index == 0 {
            return None;
        }

        let remaining = (self.count - self.index) as u128;
        let nanos = self.elapsed().as_nanos().saturating_mul(remaining) / self.index as u128;
        Some(Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX)))
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            count: self.count,
            index: self.index,
            ratio: self.ratio(),
            elapsed_ms: self.elapsed().as_millis(),
            eta_ms: self.eta().map(|eta| eta.as_millis()),
            running: self.is_running(),
            success: self.success,
            error: self.error.clone(),
        }
    }
}
