//! Identifier types for exchanges, assets and trading pairs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Exchange identifier - newtype for type safety.
///
/// Always stored lowercase so `"Binance"` and `"binance"` name the same venue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String")]
pub struct ExchangeId(String);

impl ExchangeId {
    /// Create a new `ExchangeId`, normalizing to lowercase.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_ascii_lowercase())
    }

    /// Get the exchange ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Prefix used for credential environment variables (`BINANCE_API_KEY`).
    #[must_use]
    pub fn env_prefix(&self) -> String {
        self.0.to_ascii_uppercase().replace('-', "_")
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ExchangeId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for ExchangeId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Asset (currency) code, uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String")]
pub struct Asset(String);

impl Asset {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().trim().to_ascii_uppercase())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Asset {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Canonical trading pair, written `BASE/QUOTE`.
///
/// Exchange-native spellings (`BTCUSDT`, `BTC-USDT`, `XBT/USDT`) never leave
/// the protocol adapters; everything past them speaks `Symbol`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol {
    base: Asset,
    quote: Asset,
}

impl Symbol {
    pub fn new(base: impl Into<Asset>, quote: impl Into<Asset>) -> Self {
        Self {
            base: base.into(),
            quote: quote.into(),
        }
    }

    #[must_use]
    pub fn base(&self) -> &Asset {
        &self.base
    }

    #[must_use]
    pub fn quote(&self) -> &Asset {
        &self.quote
    }

    /// Returns true if `asset` is either side of the pair.
    #[must_use]
    pub fn involves(&self, asset: &Asset) -> bool {
        &self.base == asset || &self.quote == asset
    }

    /// Join base and quote with an exchange-specific separator.
    #[must_use]
    pub fn joined(&self, separator: &str) -> String {
        format!("{}{}{}", self.base, separator, self.quote)
    }
}

impl From<String> for Asset {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

impl FromStr for Symbol {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (base, quote) = s.split_once('/').ok_or_else(|| ConfigError::InvalidValue {
            field: "symbol",
            reason: format!("'{s}' is not in BASE/QUOTE form"),
        })?;
        let (base, quote) = (base.trim(), quote.trim());
        if base.is_empty() || quote.is_empty() || base.eq_ignore_ascii_case(quote) {
            return Err(ConfigError::InvalidValue {
                field: "symbol",
                reason: format!("'{s}' needs two distinct assets"),
            });
        }
        Ok(Self::new(base, quote))
    }
}

impl Serialize for Symbol {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Symbol {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
