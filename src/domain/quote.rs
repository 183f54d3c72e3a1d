//! Canonical top-of-book quotes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{ExchangeId, Symbol};

/// Cache key for a quote: one entry per (exchange, symbol).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuoteKey {
    pub exchange: ExchangeId,
    pub symbol: Symbol,
}

impl QuoteKey {
    pub fn new(exchange: ExchangeId, symbol: Symbol) -> Self {
        Self { exchange, symbol }
    }
}

/// Best bid/ask for one symbol on one exchange.
///
/// Either side may be absent: one-sided frames update only the side they
/// carry, and the cache merges them into the stored quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub exchange: ExchangeId,
    pub symbol: Symbol,
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
    /// Local capture time.
    pub timestamp: DateTime<Utc>,
    /// Per-exchange monotonically increasing counter.
    pub sequence: u64,
}

impl Quote {
    #[must_use]
    pub fn key(&self) -> QuoteKey {
        QuoteKey::new(self.exchange.clone(), self.symbol.clone())
    }

    /// Returns true if both sides are present.
    #[must_use]
    pub fn is_two_sided(&self) -> bool {
        self.bid.is_some() && self.ask.is_some()
    }

    /// Returns true if the quote is crossed (`bid > ask`).
    #[must_use]
    pub fn is_crossed(&self) -> bool {
        matches!((self.bid, self.ask), (Some(bid), Some(ask)) if bid > ask)
    }

    /// Age of the quote at `now`, in milliseconds (never negative).
    #[must_use]
    pub fn age_ms(&self, now: DateTime<Utc>) -> i64 {
        (now - self.timestamp).num_milliseconds().max(0)
    }

    /// Returns true if the quote is older than `max_age_ms` at `now`.
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>, max_age_ms: i64) -> bool {
        self.age_ms(now) > max_age_ms
    }
}

/// A decoded, not yet sequenced, quote change produced by a protocol adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteUpdate {
    pub symbol: Symbol,
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
}

impl QuoteUpdate {
    /// Both sides replaced together.
    pub fn both(symbol: Symbol, bid: Decimal, ask: Decimal) -> Self {
        Self {
            symbol,
            bid: Some(bid),
            ask: Some(ask),
        }
    }

    /// Returns true if the update carries at least one side.
    #[must_use]
    pub fn has_price(&self) -> bool {
        self.bid.is_some() || self.ask.is_some()
    }

    /// Stamp the update into a [`Quote`].
    #[must_use]
    pub fn into_quote(self, exchange: ExchangeId, sequence: u64, now: DateTime<Utc>) -> Quote {
        Quote {
            exchange,
            symbol: self.symbol,
            bid: self.bid,
            ask: self.ask,
            timestamp: now,
            sequence,
        }
    }
}
