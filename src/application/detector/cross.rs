//! Cross-exchange arbitrage: buy one exchange's ask, sell another's bid.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::{FeeSchedule, Thresholds};
use crate::domain::{CrossExchangeOpportunity, Quote};

/// Spread before fees, in percent. `None` if `buy` is not positive.
#[must_use]
pub fn gross_spread_pct(buy: Decimal, sell: Decimal) -> Option<Decimal> {
    if buy <= Decimal::ZERO {
        return None;
    }
    Some((sell - buy) / buy * Decimal::ONE_HUNDRED)
}

/// Profit after both taker fees, in percent of the buy price.
///
/// `((sell * (1 - fee_sell) - buy * (1 + fee_buy)) / buy) * 100`.
/// `None` if `buy` is not positive.
#[must_use]
pub fn net_profit_pct(buy: Decimal, sell: Decimal, fee_buy: Decimal, fee_sell: Decimal) -> Option<Decimal> {
    if buy <= Decimal::ZERO {
        return None;
    }
    let proceeds = sell * (Decimal::ONE - fee_sell);
    let cost = buy * (Decimal::ONE + fee_buy);
    Some((proceeds - cost) / buy * Decimal::ONE_HUNDRED)
}

/// Compare `changed` against every other exchange's quote for its symbol.
///
/// Both directions are checked for each pair. Quotes for other symbols, on
/// the same exchange, or older than `max_quote_age_ms` are ignored; a stale
/// `changed` quote yields nothing.
#[must_use]
pub fn detect_cross_exchange(
    changed: &Quote,
    others: &[Quote],
    fees: &FeeSchedule,
    thresholds: &Thresholds,
    now: DateTime<Utc>,
) -> Vec<CrossExchangeOpportunity> {
    if changed.is_stale(now, thresholds.max_quote_age_ms) {
        return Vec::new();
    }

    let mut found = Vec::new();
    for other in others {
        if other.exchange == changed.exchange
            || other.symbol != changed.symbol
            || other.is_stale(now, thresholds.max_quote_age_ms)
        {
            continue;
        }

        for (buy, sell) in [(changed, other), (other, changed)] {
            if let Some(opportunity) = evaluate(buy, sell, fees, thresholds, now) {
                found.push(opportunity);
            }
        }
    }
    found
}

fn evaluate(
    buy: &Quote,
    sell: &Quote,
    fees: &FeeSchedule,
    thresholds: &Thresholds,
    now: DateTime<Utc>,
) -> Option<CrossExchangeOpportunity> {
    let buy_price = buy.ask?;
    let sell_price = sell.bid?;

    let net = net_profit_pct(
        buy_price,
        sell_price,
        fees.fee(&buy.exchange),
        fees.fee(&sell.exchange),
    )?;
    if net < thresholds.min_profit_pct {
        return None;
    }

    Some(CrossExchangeOpportunity {
        symbol: buy.symbol.clone(),
        buy_exchange: buy.exchange.clone(),
        sell_exchange: sell.exchange.clone(),
        buy_price,
        sell_price,
        gross_spread_pct: gross_spread_pct(buy_price, sell_price)?,
        net_profit_pct: net,
        detected_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ExchangeId, QuoteUpdate, Symbol};
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn quote(exchange: &str, bid: Decimal, ask: Decimal, now: DateTime<Utc>) -> Quote {
        QuoteUpdate::both(Symbol::new("BTC", "USDT"), bid, ask).into_quote(
            ExchangeId::new(exchange),
            1,
            now,
        )
    }

    fn fees() -> FeeSchedule {
        FeeSchedule::new(Decimal::ZERO)
            .with_fee(ExchangeId::new("binance"), dec!(0.00075))
            .with_fee(ExchangeId::new("okx"), dec!(0.0016))
    }

    fn thresholds(min_profit_pct: Decimal) -> Thresholds {
        Thresholds {
            min_profit_pct,
            max_quote_age_ms: 2_000,
            max_leg_skew_ms: 1_000,
        }
    }

    #[test]
    fn test_net_profit_fixture() {
        let net = net_profit_pct(dec!(100), dec!(100.5), dec!(0.00075), dec!(0.0016)).unwrap();
        assert_eq!(net, dec!(0.2642));
        assert_eq!(gross_spread_pct(dec!(100), dec!(100.5)), Some(dec!(0.5)));
        assert_eq!(net_profit_pct(Decimal::ZERO, dec!(1), dec!(0), dec!(0)), None);
    }

    #[test]
    fn test_threshold_gates_emission() {
        let now = Utc::now();
        let binance = quote("binance", dec!(99.9), dec!(100), now);
        let okx = quote("okx", dec!(100.5), dec!(100.6), now);

        let none = detect_cross_exchange(&binance, &[okx.clone()], &fees(), &thresholds(dec!(0.5)), now);
        assert!(none.is_empty());

        let found = detect_cross_exchange(&binance, &[okx], &fees(), &thresholds(dec!(0.1)), now);
        assert_eq!(found.len(), 1);
        let opp = &found[0];
        assert_eq!(opp.buy_exchange.as_str(), "binance");
        assert_eq!(opp.sell_exchange.as_str(), "okx");
        assert_eq!(opp.net_profit_pct, dec!(0.2642));
        assert_eq!(opp.gross_spread_pct, dec!(0.5));
    }

    #[test]
    fn test_checks_both_directions() {
        let now = Utc::now();
        // The changed quote is the expensive side: buy on okx, sell on binance.
        let binance = quote("binance", dec!(101), dec!(101.1), now);
        let okx = quote("okx", dec!(99.9), dec!(100), now);

        let found = detect_cross_exchange(&binance, &[okx], &fees(), &thresholds(dec!(0.1)), now);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].buy_exchange.as_str(), "okx");
        assert_eq!(found[0].sell_exchange.as_str(), "binance");
    }

    #[test]
    fn test_stale_quotes_excluded() {
        let now = Utc::now();
        let binance = quote("binance", dec!(99.9), dec!(100), now);
        let okx = quote("okx", dec!(100.5), dec!(100.6), now - Duration::seconds(5));

        let found = detect_cross_exchange(&binance, &[okx.clone()], &fees(), &thresholds(dec!(0.1)), now);
        assert!(found.is_empty());

        let found = detect_cross_exchange(&okx, &[binance], &fees(), &thresholds(dec!(0.1)), now);
        assert!(found.is_empty());
    }

    #[test]
    fn test_ignores_same_exchange_and_one_sided() {
        let now = Utc::now();
        let binance = quote("binance", dec!(99.9), dec!(100), now);
        let also_binance = quote("binance", dec!(100.5), dec!(100.6), now);
        let mut bidless = quote("okx", dec!(100.5), dec!(100.6), now);
        bidless.bid = None;

        let found = detect_cross_exchange(
            &binance,
            &[also_binance, bidless],
            &fees(),
            &thresholds(dec!(0.1)),
            now,
        );
        assert!(found.is_empty());
    }
}
