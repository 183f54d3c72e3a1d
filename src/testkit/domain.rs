//! Builders for domain primitives used across tests.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::{ArbitrageChain, ExchangeId, Leg, Quote, QuoteKey, QuoteUpdate, Side, Symbol};

/// Parse a `BASE/QUOTE` symbol.
///
/// # Panics
///
/// Panics on a malformed symbol.
pub fn symbol(s: &str) -> Symbol {
    s.parse().expect("valid symbol")
}

pub fn key(exchange: &str, s: &str) -> QuoteKey {
    QuoteKey::new(ExchangeId::new(exchange), symbol(s))
}

/// Two-sided quote captured now.
pub fn quote(exchange: &str, s: &str, bid: Decimal, ask: Decimal, sequence: u64) -> Quote {
    quote_at(exchange, s, bid, ask, sequence, Utc::now())
}

/// Two-sided quote captured at `at`.
pub fn quote_at(
    exchange: &str,
    s: &str,
    bid: Decimal,
    ask: Decimal,
    sequence: u64,
    at: DateTime<Utc>,
) -> Quote {
    QuoteUpdate::both(symbol(s), bid, ask).into_quote(ExchangeId::new(exchange), sequence, at)
}

/// Chain from `(symbol, side)` pairs.
///
/// # Panics
///
/// Panics if the legs do not form a closed loop.
pub fn chain(exchange: &str, legs: &[(&str, Side)]) -> ArbitrageChain {
    let legs = legs
        .iter()
        .map(|(s, side)| Leg::new(symbol(s), *side))
        .collect();
    ArbitrageChain::new(ExchangeId::new(exchange), legs).expect("closed chain")
}
