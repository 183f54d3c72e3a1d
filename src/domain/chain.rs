//! Triangular arbitrage chains.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::id::{Asset, ExchangeId, Symbol};
use crate::error::ConfigError;

/// Direction of a chain leg against its symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Spend the quote asset to acquire the base asset, paying the ask.
    Buy,
    /// Spend the base asset to acquire the quote asset, hitting the bid.
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// One conversion step of a chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Leg {
    pub symbol: Symbol,
    pub side: Side,
}

impl Leg {
    pub fn new(symbol: Symbol, side: Side) -> Self {
        Self { symbol, side }
    }

    /// Asset spent by this leg.
    #[must_use]
    pub fn from_asset(&self) -> &Asset {
        match self.side {
            Side::Buy => self.symbol.quote(),
            Side::Sell => self.symbol.base(),
        }
    }

    /// Asset received by this leg.
    #[must_use]
    pub fn to_asset(&self) -> &Asset {
        match self.side {
            Side::Buy => self.symbol.base(),
            Side::Sell => self.symbol.quote(),
        }
    }
}

/// A closed sequence of at least three legs on a single exchange.
///
/// Construction validates the loop: each leg spends what the previous one
/// received, and the last leg returns to the starting asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ArbitrageChain {
    exchange: ExchangeId,
    legs: Vec<Leg>,
}

impl ArbitrageChain {
    /// Minimum number of legs in a chain.
    pub const MIN_LEGS: usize = 3;

    /// Build and validate a chain.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if the chain is too short, has a
    /// gap between legs, or does not end on its starting asset.
    pub fn new(exchange: ExchangeId, legs: Vec<Leg>) -> Result<Self, ConfigError> {
        if legs.len() < Self::MIN_LEGS {
            return Err(ConfigError::InvalidValue {
                field: "triangular.chains.legs",
                reason: format!(
                    "chain on {exchange} has {} legs, need at least {}",
                    legs.len(),
                    Self::MIN_LEGS
                ),
            });
        }

        for pair in legs.windows(2) {
            if pair[0].to_asset() != pair[1].from_asset() {
                return Err(ConfigError::InvalidValue {
                    field: "triangular.chains.legs",
                    reason: format!(
                        "leg {} {} yields {} but next leg {} {} spends {}",
                        pair[0].side,
                        pair[0].symbol,
                        pair[0].to_asset(),
                        pair[1].side,
                        pair[1].symbol,
                        pair[1].from_asset()
                    ),
                });
            }
        }

        let (first, last) = (&legs[0], &legs[legs.len() - 1]);
        if last.to_asset() != first.from_asset() {
            return Err(ConfigError::InvalidValue {
                field: "triangular.chains.legs",
                reason: format!(
                    "chain starts with {} but ends with {}",
                    first.from_asset(),
                    last.to_asset()
                ),
            });
        }

        Ok(Self { exchange, legs })
    }

    #[must_use]
    pub fn exchange(&self) -> &ExchangeId {
        &self.exchange
    }

    #[must_use]
    pub fn legs(&self) -> &[Leg] {
        &self.legs
    }

    /// Asset the chain starts and ends on.
    #[must_use]
    pub fn start_asset(&self) -> &Asset {
        self.legs[0].from_asset()
    }

    /// Ordered asset path, start asset repeated at the end (`USDT → BTC → ETH → USDT`).
    #[must_use]
    pub fn assets(&self) -> Vec<Asset> {
        let mut path = Vec::with_capacity(self.legs.len() + 1);
        path.push(self.start_asset().clone());
        path.extend(self.legs.iter().map(|leg| leg.to_asset().clone()));
        path
    }

    /// Returns true if any leg trades `symbol`.
    #[must_use]
    pub fn uses_symbol(&self, symbol: &Symbol) -> bool {
        self.legs.iter().any(|leg| &leg.symbol == symbol)
    }
}

impl fmt::Display for ArbitrageChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path: Vec<String> = self.assets().iter().map(ToString::to_string).collect();
        write!(f, "{}:{}", self.exchange, path.join("->"))
    }
}
