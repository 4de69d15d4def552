use std::time::{Duration, Instant};

/// Wall-clock timer accumulating time only while started.
///
/// `start` and `stop` are idempotent, so callers can re-sync it after every
/// status change without tracking edges.
#[derive(Debug, Clone, Default)]
pub struct SimTimer {
    started_at: Option<Instant>,
    accumulated: Duration,
}

impl SimTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn start(&mut self) {
        if self.started_at.is_none() {
            self.started_at = Some(Instant::now());
        }
    }

    pub fn stop(&mut self) {
        if let Some(started_at) = self.started_at.take() {
            self.accumulated += started_at.elapsed();
        }
    }

    /// Total running time, including the current interval.
    pub fn elapsed(&self) -> Duration {
        self.accumulated + self.started_at.map_or(Duration::ZERO, |at| at.elapsed())
    }
}
