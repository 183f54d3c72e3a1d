//! Triangular chain discovery.

use std::collections::{BTreeSet, HashSet};

use crate::domain::{ArbitrageChain, Asset, ExchangeId, Leg, Side, Symbol};

/// Every three-leg loop `anchor -> intermediate -> other -> anchor` that the
/// listed symbols can trade on `exchange`, in both directions.
///
/// A pair of assets is tradable if either orientation is listed; the leg
/// side follows from which asset is spent.
#[must_use]
pub fn discover_chains(
    exchange: &ExchangeId,
    symbols: &[Symbol],
    anchors: &[Asset],
    intermediates: &[Asset],
) -> Vec<ArbitrageChain> {
    let assets: BTreeSet<&Asset> = symbols
        .iter()
        .flat_map(|symbol| [symbol.base(), symbol.quote()])
        .collect();

    let mut seen = HashSet::new();
    let mut chains = Vec::new();

    for anchor in anchors {
        for middle in intermediates {
            if middle == anchor {
                continue;
            }
            for &other in &assets {
                if other == anchor || other == middle {
                    continue;
                }
                for path in [[anchor, middle, other], [anchor, other, middle]] {
                    let Some(chain) = build(exchange, symbols, &path) else {
                        continue;
                    };
                    if seen.insert(chain.clone()) {
                        chains.push(chain);
                    }
                }
            }
        }
    }
    chains
}

fn build(exchange: &ExchangeId, symbols: &[Symbol], path: &[&Asset; 3]) -> Option<ArbitrageChain> {
    let legs = (0..path.len())
        .map(|i| leg(symbols, path[i], path[(i + 1) % path.len()]))
        .collect::<Option<Vec<_>>>()?;
    ArbitrageChain::new(exchange.clone(), legs).ok()
}

fn leg(symbols: &[Symbol], from: &Asset, to: &Asset) -> Option<Leg> {
    symbols.iter().find_map(|symbol| {
        if symbol.quote() == from && symbol.base() == to {
            Some(Leg::new(symbol.clone(), Side::Buy))
        } else if symbol.base() == from && symbol.quote() == to {
            Some(Leg::new(symbol.clone(), Side::Sell))
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbols(list: &[&str]) -> Vec<Symbol> {
        list.iter().map(|s| s.parse().unwrap()).collect()
    }

    #[test]
    fn test_discovers_both_directions() {
        let chains = discover_chains(
            &ExchangeId::new("binance"),
            &symbols(&["BTC/USDT", "ETH/USDT", "ETH/BTC"]),
            &[Asset::new("USDT")],
            &[Asset::new("BTC"), Asset::new("ETH")],
        );

        let paths: Vec<String> = chains.iter().map(ToString::to_string).collect();
        assert_eq!(chains.len(), 2, "{paths:?}");
        assert!(paths.contains(&"binance:USDT->BTC->ETH->USDT".to_string()));
        assert!(paths.contains(&"binance:USDT->ETH->BTC->USDT".to_string()));

        let forward = chains
            .iter()
            .find(|c| c.to_string() == "binance:USDT->BTC->ETH->USDT")
            .unwrap();
        let sides: Vec<Side> = forward.legs().iter().map(|l| l.side).collect();
        assert_eq!(sides, vec![Side::Buy, Side::Buy, Side::Sell]);
    }

    #[test]
    fn test_missing_pair_yields_nothing() {
        let chains = discover_chains(
            &ExchangeId::new("binance"),
            &symbols(&["BTC/USDT", "ETH/USDT"]),
            &[Asset::new("USDT")],
            &[Asset::new("BTC"), Asset::new("ETH")],
        );
        assert!(chains.is_empty());
    }

    #[test]
    fn test_other_asset_outside_intermediates() {
        let chains = discover_chains(
            &ExchangeId::new("okx"),
            &symbols(&["BTC/USDC", "SOL/USDC", "SOL/BTC"]),
            &[Asset::new("USDT"), Asset::new("USDC")],
            &[Asset::new("BTC")],
        );
        assert_eq!(chains.len(), 2);
        assert!(chains.iter().all(|c| c.start_asset().as_str() == "USDC"));
    }
}
