//! Pure arbitrage detectors.
//!
//! Detectors read quotes and return opportunities. They never touch the
//! cache, the clock or any channel themselves; the engine hands them a
//! snapshot and a `now`.
//!
//! - [`cross`] - Same symbol, two exchanges
//! - [`triangular`] - Closed conversion loop on one exchange
//! - [`discover`] - Chain generation from a symbol list

pub mod cross;
pub mod discover;
pub mod triangular;

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::domain::ExchangeId;

pub use cross::{detect_cross_exchange, gross_spread_pct, net_profit_pct};
pub use discover::discover_chains;
pub use triangular::{detect_triangular, evaluate_chain, ChainEvaluation};

/// Taker fee per exchange, as a fraction (`0.001` is 0.1%).
#[derive(Debug, Clone, Default)]
pub struct FeeSchedule {
    fees: BTreeMap<ExchangeId, Decimal>,
    default: Decimal,
}

impl FeeSchedule {
    /// Schedule charging `default` on every exchange without its own fee.
    #[must_use]
    pub fn new(default: Decimal) -> Self {
        Self {
            fees: BTreeMap::new(),
            default,
        }
    }

    #[must_use]
    pub fn with_fee(mut self, exchange: ExchangeId, fee: Decimal) -> Self {
        self.fees.insert(exchange, fee);
        self
    }

    #[must_use]
    pub fn fee(&self, exchange: &ExchangeId) -> Decimal {
        self.fees.get(exchange).copied().unwrap_or(self.default)
    }
}

impl From<BTreeMap<ExchangeId, Decimal>> for FeeSchedule {
    fn from(fees: BTreeMap<ExchangeId, Decimal>) -> Self {
        Self {
            fees,
            default: Decimal::ZERO,
        }
    }
}

/// Thresholds shared by both detectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    /// Minimum net profit, in percent.
    pub min_profit_pct: Decimal,
    /// Quotes older than this are ignored.
    pub max_quote_age_ms: i64,
    /// Largest allowed gap between the oldest and newest leg of a chain.
    pub max_leg_skew_ms: i64,
}
