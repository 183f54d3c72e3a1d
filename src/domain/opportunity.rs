//! Detected arbitrage opportunities.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::chain::ArbitrageChain;
use super::id::{Asset, ExchangeId, Symbol};

/// Which detector produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OpportunityKind {
    CrossExchange,
    Triangular,
}

/// Buy on one exchange's ask, sell on another's bid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossExchangeOpportunity {
    pub symbol: Symbol,
    pub buy_exchange: ExchangeId,
    pub sell_exchange: ExchangeId,
    pub buy_price: Decimal,
    pub sell_price: Decimal,
    /// `(sell - buy) / buy * 100`, before fees.
    pub gross_spread_pct: Decimal,
    pub net_profit_pct: Decimal,
    pub detected_at: DateTime<Utc>,
}

/// A closed conversion loop on a single exchange.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriangularOpportunity {
    pub exchange: ExchangeId,
    /// Asset path, starting and ending on the same asset.
    pub chain: Vec<Asset>,
    /// Price used for each leg, in leg order.
    pub leg_prices: Vec<Decimal>,
    pub net_profit_pct: Decimal,
    pub detected_at: DateTime<Utc>,
}

impl TriangularOpportunity {
    pub fn new(
        chain: &ArbitrageChain,
        leg_prices: Vec<Decimal>,
        net_profit_pct: Decimal,
        detected_at: DateTime<Utc>,
    ) -> Self {
        Self {
            exchange: chain.exchange().clone(),
            chain: chain.assets(),
            leg_prices,
            net_profit_pct,
            detected_at,
        }
    }
}

/// Immutable event handed to opportunity consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum OpportunityEvent {
    CrossExchange(CrossExchangeOpportunity),
    Triangular(TriangularOpportunity),
}

impl OpportunityEvent {
    #[must_use]
    pub fn kind(&self) -> OpportunityKind {
        match self {
            Self::CrossExchange(_) => OpportunityKind::CrossExchange,
            Self::Triangular(_) => OpportunityKind::Triangular,
        }
    }

    #[must_use]
    pub fn net_profit_pct(&self) -> Decimal {
        match self {
            Self::CrossExchange(o) => o.net_profit_pct,
            Self::Triangular(o) => o.net_profit_pct,
        }
    }

    #[must_use]
    pub fn detected_at(&self) -> DateTime<Utc> {
        match self {
            Self::CrossExchange(o) => o.detected_at,
            Self::Triangular(o) => o.detected_at,
        }
    }

    /// Stable identity of the opportunity, independent of prices and time.
    ///
    /// Consumers can use it to collapse repeated detections of the same route.
    #[must_use]
    pub fn key(&self) -> String {
        match self {
            Self::CrossExchange(o) => {
                format!("cross:{}:{}>{}", o.symbol, o.buy_exchange, o.sell_exchange)
            }
            Self::Triangular(o) => {
                let path: Vec<&str> = o.chain.iter().map(Asset::as_str).collect();
                format!("tri:{}:{}", o.exchange, path.join(">"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_cross_event_accessors() {
        let event = OpportunityEvent::CrossExchange(CrossExchangeOpportunity {
            symbol: Symbol::new("BTC", "USDT"),
            buy_exchange: ExchangeId::from("binance"),
            sell_exchange: ExchangeId::from("okx"),
            buy_price: dec!(100),
            sell_price: dec!(100.5),
            gross_spread_pct: dec!(0.5),
            net_profit_pct: dec!(0.2642),
            detected_at: Utc::now(),
        });

        assert_eq!(event.kind(), OpportunityKind::CrossExchange);
        assert_eq!(event.net_profit_pct(), dec!(0.2642));
        assert_eq!(event.key(), "cross:BTC/USDT:binance>okx");

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "CrossExchange");
        assert_eq!(json["buy_exchange"], "binance");
    }
}
