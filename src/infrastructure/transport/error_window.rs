//! Rolling decode-failure ratio.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::infrastructure::config::DecodeErrorConfig;

/// Tracks decode outcomes over a sliding time window.
#[derive(Debug)]
pub struct RollingErrorWindow {
    window: Duration,
    max_ratio: f64,
    min_samples: usize,
    samples: VecDeque<(Instant, bool)>,
    failures: usize,
}

impl RollingErrorWindow {
    pub fn new(config: &DecodeErrorConfig) -> Self {
        Self {
            window: Duration::from_millis(config.window_ms),
            max_ratio: config.max_ratio,
            min_samples: config.min_samples.max(1),
            samples: VecDeque::new(),
            failures: 0,
        }
    }

    /// Record one decoded frame. `ok` is false for a decode failure.
    pub fn record(&mut self, ok: bool, now: Instant) {
        self.samples.push_back((now, ok));
        if !ok {
            self.failures += 1;
        }
        self.evict(now);
    }

    fn evict(&mut self, now: Instant) {
        while let Some(&(at, ok)) = self.samples.front() {
            if now.saturating_duration_since(at) <= self.window {
                break;
            }
            self.samples.pop_front();
            if !ok {
                self.failures -= 1;
            }
        }
    }

    /// Failure share of the frames currently in the window.
    #[must_use]
    pub fn ratio(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.failures as f64 / self.samples.len() as f64
    }

    /// Returns true once enough samples exist and the ratio is over the bound.
    #[must_use]
    pub fn exceeded(&self) -> bool {
        self.samples.len() >= self.min_samples && self.ratio() > self.max_ratio
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.failures = 0;
    }
}
