//! Counters a solver client reports into

use std::sync::atomic::{AtomicU64, Ordering};

/// Sink for solver request outcomes
pub trait SolverMetrics: Send + Sync {
    fn request(&self);

    fn success(&self);

    fn failure(&self);

    /// A solved position turned out to be historical
    fn buffered(&self);
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl SolverMetrics for NoopMetrics {
    fn request(&self) {}

    fn success(&self) {}

    fn failure(&self) {}

    fn buffered(&self) {}
}

/// In-process atomic counters
#[derive(Debug, Default)]
pub struct CountingMetrics {
    requests: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    buffered: AtomicU64,
}

impl CountingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn buffered_positions(&self) -> u64 {
        self.buffered.load(Ordering::Relaxed)
    }
}

impl SolverMetrics for CountingMetrics {
    fn request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    fn success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    fn failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    fn buffered(&self) {
        self.buffered.fetch_add(1, Ordering::Relaxed);
    }
}
