//! MEXC spot, polled over REST.
//!
//! The public WebSocket feed only carries protobuf payloads, so MEXC runs on
//! the REST connector. The `bookTicker` endpoint matches Binance's shape.

use super::binance::{decode_book_ticker_rest, native_symbol};
use super::symbol::SymbolMap;
use crate::domain::{QuoteUpdate, Symbol};
use crate::error::DecodeError;
use crate::port::{DecodedFrame, ProtocolAdapter};

pub struct MexcAdapter {
    symbols: SymbolMap,
}

impl MexcAdapter {
    pub fn new(symbols: &[Symbol]) -> Self {
        Self {
            symbols: SymbolMap::new(symbols, native_symbol),
        }
    }
}

impl ProtocolAdapter for MexcAdapter {
    fn name(&self) -> &'static str {
        "mexc"
    }

    fn encode_subscribe(&self, _symbols: &[Symbol]) -> Vec<String> {
        Vec::new()
    }

    fn decode_frame(&self, _text: &str) -> Result<DecodedFrame, DecodeError> {
        Err(DecodeError::Unsupported("mexc websocket"))
    }

    fn rest_poll_url(&self, rest_base: &str, _symbols: &[Symbol]) -> Option<String> {
        Some(format!(
            "{}/api/v3/ticker/bookTicker",
            rest_base.trim_end_matches('/')
        ))
    }

    fn decode_rest(&self, body: &str) -> Result<Vec<QuoteUpdate>, DecodeError> {
        decode_book_ticker_rest(body, &self.symbols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_decode_rest_filters_to_configured_symbols() {
        let adapter = MexcAdapter::new(&[Symbol::new("BTC", "USDT")]);
        let body = r#"[{"symbol":"BTCUSDT","bidPrice":"64000.1","bidQty":"1","askPrice":"64000.5","askQty":"2"},
                       {"symbol":"ETHUSDT","bidPrice":"3000","bidQty":"1","askPrice":"3001","askQty":"1"}]"#;
        let updates = adapter.decode_rest(body).unwrap();
        assert_eq!(updates, vec![QuoteUpdate::both(Symbol::new("BTC", "USDT"), dec!(64000.1), dec!(64000.5))]);
    }

    #[test]
    fn test_poll_url() {
        let adapter = MexcAdapter::new(&[]);
        assert_eq!(
            adapter.rest_poll_url("https://api.mexc.com", &[]).unwrap(),
            "https://api.mexc.com/api/v3/ticker/bookTicker"
        );
    }
}
