//! Canonical ↔ exchange-native symbol translation.

use std::collections::HashMap;

use crate::domain::Symbol;
use crate::error::DecodeError;

/// Bidirectional map between canonical symbols and one exchange's spelling.
///
/// Native lookups are case-insensitive: Binance streams echo `btcusdt` while
/// its REST API answers `BTCUSDT`.
#[derive(Debug, Clone, Default)]
pub struct SymbolMap {
    to_native: HashMap<Symbol, String>,
    to_canonical: HashMap<String, Symbol>,
}

impl SymbolMap {
    pub fn new<F>(symbols: &[Symbol], native: F) -> Self
    where
        F: Fn(&Symbol) -> String,
    {
        let mut map = Self::default();
        for symbol in symbols {
            let spelled = native(symbol);
            map.to_canonical
                .insert(spelled.to_ascii_uppercase(), symbol.clone());
            map.to_native.insert(symbol.clone(), spelled);
        }
        map
    }

    #[must_use]
    pub fn native(&self, symbol: &Symbol) -> Option<&str> {
        self.to_native.get(symbol).map(String::as_str)
    }

    #[must_use]
    pub fn canonical(&self, native: &str) -> Option<&Symbol> {
        self.to_canonical.get(&native.to_ascii_uppercase())
    }

    /// Like [`canonical`](Self::canonical) but fails for unknown spellings.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::UnknownSymbol`] if `native` was never registered.
    pub fn resolve(&self, native: &str) -> Result<Symbol, DecodeError> {
        self.canonical(native)
            .cloned()
            .ok_or_else(|| DecodeError::UnknownSymbol(native.to_string()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.to_native.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_native.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_lookup() {
        let symbols = vec![Symbol::new("BTC", "USDT"), Symbol::new("ETH", "BTC")];
        let map = SymbolMap::new(&symbols, |s| s.joined("-"));

        assert_eq!(map.native(&symbols[0]), Some("BTC-USDT"));
        assert_eq!(map.canonical("eth-btc"), Some(&symbols[1]));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_unknown_symbol() {
        let map = SymbolMap::new(&[Symbol::new("BTC", "USDT")], |s| s.joined(""));
        let err = map.resolve("DOGEUSDT").unwrap_err();
        assert!(matches!(err, DecodeError::UnknownSymbol(ref s) if s == "DOGEUSDT"));
    }
}
