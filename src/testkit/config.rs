//! Canonical test configurations.
//!
//! Single source of truth for config structs used across tests.

use std::time::Duration;

use rust_decimal::Decimal;

use crate::adapter::ExchangeKind;
use crate::domain::{ExchangeId, Symbol};
use crate::infrastructure::config::{
    ConnectionTuning, DecodeErrorConfig, ExchangeConfig, HeartbeatConfig, ReconnectionConfig,
    TimeoutConfig, TransportKind,
};

/// Reconnection with millisecond delays and no jitter.
pub fn reconnection() -> ReconnectionConfig {
    ReconnectionConfig {
        initial_delay_ms: 5,
        max_delay_ms: 20,
        backoff_multiplier: 2.0,
        jitter_ratio: 0.0,
        min_stable_ms: 50,
        max_consecutive_failures: 1_000,
        circuit_breaker_cooldown_ms: 20,
        handshake_retry_delay_ms: 20,
    }
}

/// Tuning for connector tests: fast backoff, long heartbeats.
///
/// Heartbeats are long enough that they never fire unless a test shortens
/// them.
pub fn tuning() -> ConnectionTuning {
    ConnectionTuning {
        reconnection: reconnection(),
        heartbeat: HeartbeatConfig {
            ping_interval_ms: 60_000,
            pong_timeout_ms: 60_000,
            read_timeout_ms: 60_000,
        },
        timeouts: TimeoutConfig {
            connect_ms: 1_000,
            auth_ms: 1_000,
            subscribe_ms: 1_000,
            shutdown_grace_ms: 200,
        },
        decode_errors: DecodeErrorConfig {
            window_ms: 60_000,
            max_ratio: 0.5,
            min_samples: 4,
        },
    }
}

/// Resolved config for `kind` over `symbols`, WebSocket without fallback.
pub fn exchange(kind: ExchangeKind, symbols: Vec<Symbol>) -> ExchangeConfig {
    ExchangeConfig {
        id: ExchangeId::new(kind.as_str()),
        kind,
        ws_url: kind.default_ws_url().map(str::to_string),
        rest_url: kind.default_rest_url().to_string(),
        taker_fee: kind.default_taker_fee_pct() / Decimal::ONE_HUNDRED,
        transport: if kind.supports_websocket() {
            TransportKind::WebSocket
        } else {
            TransportKind::Rest
        },
        rest_fallback: false,
        prefer_proxy: false,
        credentials: None,
        poll_interval: Duration::from_millis(10),
        fallback_retry: Duration::from_millis(100),
        symbols,
    }
}
