//! Reconnect delay policy.
//!
//! Exponential backoff with a cap and random jitter, plus a circuit breaker
//! that pauses attempts after too many consecutive failures.

use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{error, info};

use crate::infrastructure::config::ReconnectionConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Breaker {
    Closed,
    /// No attempts before `until`.
    Open { until: Instant },
}

/// Backoff state owned by one connector.
#[derive(Debug)]
pub struct Backoff {
    config: ReconnectionConfig,
    failures: u32,
    /// Base of the next delay, before jitter.
    delay_ms: u64,
    breaker: Breaker,
}

impl Backoff {
    pub fn new(config: ReconnectionConfig) -> Self {
        let delay_ms = config.initial_delay_ms;
        Self {
            config,
            failures: 0,
            delay_ms,
            breaker: Breaker::Closed,
        }
    }

    /// Clear the failure count and return to the initial delay.
    pub fn reset(&mut self) {
        self.failures = 0;
        self.delay_ms = self.config.initial_delay_ms;
        self.breaker = Breaker::Closed;
    }

    /// Reset only if the connection stayed live for the stability period.
    ///
    /// Returns true if the backoff was reset.
    pub fn reset_if_stable(&mut self, live_for: Duration) -> bool {
        let stable = live_for >= Duration::from_millis(self.config.min_stable_ms);
        if stable {
            self.reset();
        }
        stable
    }

    /// Current delay plus jitter; advances the delay for the next call.
    pub fn next_delay(&mut self) -> Duration {
        let base = Duration::from_millis(self.delay_ms);
        let grown = (self.delay_ms as f64 * self.config.backoff_multiplier) as u64;
        self.delay_ms = grown.min(self.config.max_delay_ms);
        base + self.jitter(base)
    }

    /// Delay used after direct and every proxy refused the handshake.
    #[must_use]
    pub fn handshake_delay(&self) -> Duration {
        let base = Duration::from_millis(self.config.handshake_retry_delay_ms.max(self.delay_ms));
        base + self.jitter(base)
    }

    fn jitter(&self, base: Duration) -> Duration {
        let spread_ms = (base.as_millis() as f64 * self.config.jitter_ratio) as u64;
        if spread_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=spread_ms))
    }

    /// Record a failed attempt, opening the breaker at the threshold.
    pub fn record_failure(&mut self) {
        self.failures += 1;
        if self.failures < self.config.max_consecutive_failures {
            return;
        }

        let cooldown = Duration::from_millis(self.config.circuit_breaker_cooldown_ms);
        self.breaker = Breaker::Open {
            until: Instant::now() + cooldown,
        };
        error!(
            failures = self.failures,
            cooldown_ms = self.config.circuit_breaker_cooldown_ms,
            "Too many consecutive failures, circuit breaker open"
        );
    }

    /// Returns true if the breaker is closed or its cooldown has passed.
    /// A passed cooldown resets the backoff.
    pub fn circuit_allows_connection(&mut self) -> bool {
        let Breaker::Open { until } = self.breaker else {
            return true;
        };
        if Instant::now() < until {
            return false;
        }
        info!("Circuit breaker cooldown over, resuming attempts");
        self.reset();
        true
    }

    /// Time left before the breaker closes, if it is open.
    #[must_use]
    pub fn circuit_remaining(&self) -> Option<Duration> {
        match self.breaker {
            Breaker::Closed => None,
            Breaker::Open { until } => Some(until.saturating_duration_since(Instant::now())),
        }
    }

    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.failures
    }
}
