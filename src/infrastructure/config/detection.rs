//! Detection thresholds and triangular chain configuration.

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::domain::{Asset, ExchangeId, Leg};

/// Arbitrage detection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DetectionConfig {
    /// Minimum net profit, in percent, for an opportunity to be emitted.
    #[serde(default = "default_min_profit_pct")]
    pub min_profit_pct: Decimal,
    /// Quotes older than this are ignored (milliseconds).
    #[serde(default = "default_max_quote_age_ms")]
    pub max_quote_age_ms: u64,
    /// Maximum spread between the oldest and newest leg of a chain (milliseconds).
    #[serde(default = "default_max_leg_skew_ms")]
    pub max_leg_skew_ms: u64,
    /// Capacity of the cache → engine notification queue.
    #[serde(default = "default_notification_capacity")]
    pub notification_capacity: usize,
    /// Capacity of the opportunity output channel.
    #[serde(default = "default_opportunity_capacity")]
    pub opportunity_capacity: usize,
    #[serde(default = "default_true")]
    pub cross_exchange: bool,
    #[serde(default = "default_true")]
    pub triangular: bool,
}

fn default_min_profit_pct() -> Decimal {
    Decimal::new(15, 2) // 0.15%
}

const fn default_max_quote_age_ms() -> u64 {
    2_000
}

const fn default_max_leg_skew_ms() -> u64 {
    1_000
}

const fn default_notification_capacity() -> usize {
    4_096
}

const fn default_opportunity_capacity() -> usize {
    1_024
}

const fn default_true() -> bool {
    true
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_profit_pct: default_min_profit_pct(),
            max_quote_age_ms: default_max_quote_age_ms(),
            max_leg_skew_ms: default_max_leg_skew_ms(),
            notification_capacity: default_notification_capacity(),
            opportunity_capacity: default_opportunity_capacity(),
            cross_exchange: true,
            triangular: true,
        }
    }
}

/// A configured chain.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub exchange: ExchangeId,
    pub legs: Vec<Leg>,
}

/// Triangular detection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TriangularConfig {
    /// Derive chains from the symbol list in addition to `chains`.
    #[serde(default)]
    pub auto_discover: bool,
    /// Assets a discovered chain starts and ends on.
    #[serde(default = "default_anchors")]
    pub anchors: Vec<Asset>,
    /// Assets a discovered chain may pass through.
    #[serde(default = "default_intermediates")]
    pub intermediates: Vec<Asset>,
    #[serde(default)]
    pub chains: Vec<ChainConfig>,
}

fn default_anchors() -> Vec<Asset> {
    vec![Asset::new("USDT"), Asset::new("USDC")]
}

fn default_intermediates() -> Vec<Asset> {
    vec![Asset::new("BTC"), Asset::new("ETH"), Asset::new("BNB")]
}

impl Default for TriangularConfig {
    fn default() -> Self {
        Self {
            auto_discover: false,
            anchors: default_anchors(),
            intermediates: default_intermediates(),
            chains: Vec::new(),
        }
    }
}
