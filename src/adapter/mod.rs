//! Protocol adapters, one per supported exchange.
//!
//! [`ExchangeKind`] is the registry: it knows each exchange's public
//! endpoints, default taker fee and how to build its adapter.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;

use crate::domain::{ExchangeId, Symbol};
use crate::error::ConfigError;
use crate::port::ProtocolAdapter;

pub mod auth;
pub mod binance;
pub mod bitget;
pub mod bybit;
pub mod gate;
pub mod huobi;
pub mod kraken;
pub mod kucoin;
pub mod mexc;
pub mod okx;
pub mod symbol;
mod wire;

pub use binance::BinanceAdapter;
pub use bitget::BitgetAdapter;
pub use bybit::BybitAdapter;
pub use gate::GateAdapter;
pub use huobi::HuobiAdapter;
pub use kraken::KrakenAdapter;
pub use kucoin::KucoinAdapter;
pub use mexc::MexcAdapter;
pub use okx::OkxAdapter;
pub use symbol::SymbolMap;

/// Supported exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExchangeKind {
    Binance,
    Bybit,
    Okx,
    Kucoin,
    Kraken,
    Bitget,
    Mexc,
    Gate,
    Huobi,
}

impl ExchangeKind {
    pub const ALL: [ExchangeKind; 9] = [
        Self::Binance,
        Self::Bybit,
        Self::Okx,
        Self::Kucoin,
        Self::Kraken,
        Self::Bitget,
        Self::Mexc,
        Self::Gate,
        Self::Huobi,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Binance => "binance",
            Self::Bybit => "bybit",
            Self::Okx => "okx",
            Self::Kucoin => "kucoin",
            Self::Kraken => "kraken",
            Self::Bitget => "bitget",
            Self::Mexc => "mexc",
            Self::Gate => "gate",
            Self::Huobi => "huobi",
        }
    }

    /// Resolve a configured exchange id.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownExchange`] for unsupported names.
    pub fn from_id(id: &ExchangeId) -> Result<Self, ConfigError> {
        id.as_str().parse()
    }

    /// Public WebSocket endpoint. `None` when the endpoint is discovered at
    /// connect time or the exchange is REST-only.
    #[must_use]
    pub const fn default_ws_url(&self) -> Option<&'static str> {
        match self {
            Self::Binance => Some("wss://stream.binance.com:9443/ws"),
            Self::Bybit => Some("wss://stream.bybit.com/v5/public/spot"),
            Self::Okx => Some("wss://ws.okx.com:8443/ws/v5/public"),
            Self::Kraken => Some("wss://ws.kraken.com"),
            Self::Bitget => Some("wss://ws.bitget.com/v2/ws/public"),
            Self::Gate => Some("wss://api.gateio.ws/ws/v4/"),
            Self::Huobi => Some("wss://api.huobi.pro/ws"),
            Self::Kucoin | Self::Mexc => None,
        }
    }

    #[must_use]
    pub const fn default_rest_url(&self) -> &'static str {
        match self {
            Self::Binance => "https://api.binance.com",
            Self::Bybit => "https://api.bybit.com",
            Self::Okx => "https://www.okx.com",
            Self::Kucoin => "https://api.kucoin.com",
            Self::Kraken => "https://api.kraken.com",
            Self::Bitget => "https://api.bitget.com",
            Self::Mexc => "https://api.mexc.com",
            Self::Gate => "https://api.gateio.ws",
            Self::Huobi => "https://api.huobi.pro",
        }
    }

    /// Default spot taker fee, in percent.
    #[must_use]
    pub fn default_taker_fee_pct(&self) -> Decimal {
        match self {
            Self::Binance => Decimal::new(75, 3),
            Self::Bybit | Self::Kucoin => Decimal::new(8, 2),
            Self::Okx | Self::Bitget | Self::Mexc => Decimal::new(1, 1),
            Self::Kraken => Decimal::new(26, 2),
            Self::Gate | Self::Huobi => Decimal::new(2, 1),
        }
    }

    /// Returns true if the exchange has a usable WebSocket feed.
    #[must_use]
    pub const fn supports_websocket(&self) -> bool {
        !matches!(self, Self::Mexc)
    }

    /// Build the adapter for `symbols`.
    #[must_use]
    pub fn adapter(&self, symbols: &[Symbol]) -> Arc<dyn ProtocolAdapter> {
        match self {
            Self::Binance => Arc::new(BinanceAdapter::new(symbols)),
            Self::Bybit => Arc::new(BybitAdapter::new(symbols)),
            Self::Okx => Arc::new(OkxAdapter::new(symbols)),
            Self::Kucoin => Arc::new(KucoinAdapter::new(symbols)),
            Self::Kraken => Arc::new(KrakenAdapter::new(symbols)),
            Self::Bitget => Arc::new(BitgetAdapter::new(symbols)),
            Self::Mexc => Arc::new(MexcAdapter::new(symbols)),
            Self::Gate => Arc::new(GateAdapter::new(symbols)),
            Self::Huobi => Arc::new(HuobiAdapter::new(symbols)),
        }
    }
}

impl fmt::Display for ExchangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExchangeKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "gateio" | "gate.io" => Ok(Self::Gate),
            "htx" => Ok(Self::Huobi),
            other => Self::ALL
                .into_iter()
                .find(|kind| kind.as_str() == other)
                .ok_or_else(|| ConfigError::UnknownExchange(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_names() {
        assert_eq!("Binance".parse::<ExchangeKind>().unwrap(), ExchangeKind::Binance);
        assert_eq!("gate.io".parse::<ExchangeKind>().unwrap(), ExchangeKind::Gate);
        assert_eq!("HTX".parse::<ExchangeKind>().unwrap(), ExchangeKind::Huobi);
        assert!(matches!(
            "phemex".parse::<ExchangeKind>(),
            Err(ConfigError::UnknownExchange(_))
        ));
    }

    #[test]
    fn test_every_kind_builds_its_adapter() {
        for kind in ExchangeKind::ALL {
            assert_eq!(kind.adapter(&[]).name(), kind.as_str());
        }
    }

    #[test]
    fn test_defaults() {
        assert_eq!(ExchangeKind::Binance.default_taker_fee_pct(), dec!(0.075));
        assert_eq!(ExchangeKind::Kraken.default_taker_fee_pct(), dec!(0.26));
        assert!(!ExchangeKind::Mexc.supports_websocket());
        assert!(ExchangeKind::Kucoin.default_ws_url().is_none());
        assert!(ExchangeKind::Kucoin.supports_websocket());
    }
}
