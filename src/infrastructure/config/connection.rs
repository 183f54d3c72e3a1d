//! Reconnection, heartbeat, timeout and decode-error tuning.

use std::time::Duration;

use serde::Deserialize;

/// WebSocket reconnection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectionConfig {
    /// Initial delay before first reconnection attempt (milliseconds).
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Maximum delay between reconnection attempts (milliseconds).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Multiplier applied to delay after each failed attempt.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Upper bound of random jitter, as a fraction of the delay.
    #[serde(default = "default_jitter_ratio")]
    pub jitter_ratio: f64,
    /// A live period at least this long resets the backoff (milliseconds).
    #[serde(default = "default_min_stable_ms")]
    pub min_stable_ms: u64,
    /// Maximum consecutive failures before circuit breaker trips.
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
    /// Cooldown period after circuit breaker trips (milliseconds).
    #[serde(default = "default_circuit_breaker_cooldown_ms")]
    pub circuit_breaker_cooldown_ms: u64,
    /// Wait after direct and every proxy refused the handshake (milliseconds).
    #[serde(default = "default_handshake_retry_delay_ms")]
    pub handshake_retry_delay_ms: u64,
}

fn default_initial_delay_ms() -> u64 {
    1000 // 1 second
}

fn default_max_delay_ms() -> u64 {
    60000 // 60 seconds
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_jitter_ratio() -> f64 {
    0.2
}

fn default_min_stable_ms() -> u64 {
    30000
}

fn default_max_consecutive_failures() -> u32 {
    10
}

fn default_circuit_breaker_cooldown_ms() -> u64 {
    300000 // 5 minutes
}

fn default_handshake_retry_delay_ms() -> u64 {
    120000
}

impl Default for ReconnectionConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter_ratio: default_jitter_ratio(),
            min_stable_ms: default_min_stable_ms(),
            max_consecutive_failures: default_max_consecutive_failures(),
            circuit_breaker_cooldown_ms: default_circuit_breaker_cooldown_ms(),
            handshake_retry_delay_ms: default_handshake_retry_delay_ms(),
        }
    }
}

/// Keepalive settings.
#[derive(Debug, Clone, Deserialize)]
pub struct HeartbeatConfig {
    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,
    /// A ping not answered within this window forces a reconnect.
    #[serde(default = "default_pong_timeout_ms")]
    pub pong_timeout_ms: u64,
    /// Silence longer than this forces a reconnect.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

const fn default_ping_interval_ms() -> u64 {
    20_000
}

const fn default_pong_timeout_ms() -> u64 {
    10_000
}

const fn default_read_timeout_ms() -> u64 {
    60_000
}

impl HeartbeatConfig {
    #[must_use]
    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    #[must_use]
    pub fn pong_timeout(&self) -> Duration {
        Duration::from_millis(self.pong_timeout_ms)
    }

    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            ping_interval_ms: default_ping_interval_ms(),
            pong_timeout_ms: default_pong_timeout_ms(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

/// Bounds on each handshake phase.
#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_connect_ms")]
    pub connect_ms: u64,
    #[serde(default = "default_auth_ms")]
    pub auth_ms: u64,
    #[serde(default = "default_subscribe_ms")]
    pub subscribe_ms: u64,
    /// How long `stop` waits for a connector before aborting it.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

const fn default_connect_ms() -> u64 {
    10_000
}

const fn default_auth_ms() -> u64 {
    10_000
}

const fn default_subscribe_ms() -> u64 {
    10_000
}

const fn default_shutdown_grace_ms() -> u64 {
    2_000
}

impl TimeoutConfig {
    #[must_use]
    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }

    #[must_use]
    pub fn auth(&self) -> Duration {
        Duration::from_millis(self.auth_ms)
    }

    #[must_use]
    pub fn subscribe(&self) -> Duration {
        Duration::from_millis(self.subscribe_ms)
    }

    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: default_connect_ms(),
            auth_ms: default_auth_ms(),
            subscribe_ms: default_subscribe_ms(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

/// When decode failures become bad enough to drop the connection.
#[derive(Debug, Clone, Deserialize)]
pub struct DecodeErrorConfig {
    /// Rolling window length (milliseconds).
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
    /// Failure share above which the connection is recycled.
    #[serde(default = "default_max_ratio")]
    pub max_ratio: f64,
    /// Frames required in the window before the ratio is trusted.
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,
}

const fn default_window_ms() -> u64 {
    60_000
}

const fn default_max_ratio() -> f64 {
    0.5
}

const fn default_min_samples() -> usize {
    20
}

impl Default for DecodeErrorConfig {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            max_ratio: default_max_ratio(),
            min_samples: default_min_samples(),
        }
    }
}

/// Connection tuning shared by every connector.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTuning {
    pub reconnection: ReconnectionConfig,
    pub heartbeat: HeartbeatConfig,
    pub timeouts: TimeoutConfig,
    pub decode_errors: DecodeErrorConfig,
}
