//! Triangular arbitrage: a closed conversion loop on a single exchange.
//!
//! Starting from one unit of the chain's first asset, a buy leg divides the
//! running amount by the ask and a sell leg multiplies it by the bid; every
//! leg then pays the exchange's taker fee. The loop is profitable when more
//! than one unit comes back.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::Thresholds;
use crate::domain::{ArbitrageChain, Quote, Side, TriangularOpportunity};

/// Result of walking a chain once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainEvaluation {
    /// Amount of the start asset after the last leg, starting from 1.
    pub final_amount: Decimal,
    /// `(final_amount - 1) * 100`.
    pub net_profit_pct: Decimal,
    /// Price used for each leg, in leg order.
    pub leg_prices: Vec<Decimal>,
}

/// Walk `chain` over `quotes` (one per leg, in leg order).
///
/// Returns `None` unless every leg has a quote on the chain's exchange that
/// is no older than `max_quote_age_ms` and carries the side the leg trades
/// against, and the oldest and newest leg are at most `max_leg_skew_ms` apart.
#[must_use]
pub fn evaluate_chain(
    chain: &ArbitrageChain,
    quotes: &[Option<Quote>],
    fee: Decimal,
    thresholds: &Thresholds,
    now: DateTime<Utc>,
) -> Option<ChainEvaluation> {
    let legs = chain.legs();
    if quotes.len() != legs.len() {
        return None;
    }

    let mut amount = Decimal::ONE;
    let mut leg_prices = Vec::with_capacity(legs.len());
    let mut oldest = now;
    let mut newest = DateTime::<Utc>::MIN_UTC;
    let keep = Decimal::ONE - fee;

    for (leg, quote) in legs.iter().zip(quotes) {
        let quote = quote.as_ref()?;
        if quote.symbol != leg.symbol
            || &quote.exchange != chain.exchange()
            || quote.is_stale(now, thresholds.max_quote_age_ms)
        {
            return None;
        }
        oldest = oldest.min(quote.timestamp);
        newest = newest.max(quote.timestamp);

        let price = match leg.side {
            Side::Buy => quote.ask?,
            Side::Sell => quote.bid?,
        };
        if price <= Decimal::ZERO {
            return None;
        }
        amount = match leg.side {
            Side::Buy => amount / price * keep,
            Side::Sell => amount * price * keep,
        };
        leg_prices.push(price);
    }

    if (newest - oldest).num_milliseconds() > thresholds.max_leg_skew_ms {
        return None;
    }

    Some(ChainEvaluation {
        final_amount: amount,
        net_profit_pct: (amount - Decimal::ONE) * Decimal::ONE_HUNDRED,
        leg_prices,
    })
}

/// Evaluate `chain` and keep it if the net profit reaches the threshold.
#[must_use]
pub fn detect_triangular(
    chain: &ArbitrageChain,
    quotes: &[Option<Quote>],
    fee: Decimal,
    thresholds: &Thresholds,
    now: DateTime<Utc>,
) -> Option<TriangularOpportunity> {
    let evaluation = evaluate_chain(chain, quotes, fee, thresholds, now)?;
    if evaluation.net_profit_pct < thresholds.min_profit_pct {
        return None;
    }
    Some(TriangularOpportunity::new(
        chain,
        evaluation.leg_prices,
        evaluation.net_profit_pct,
        now,
    ))
}
