//! Binance spot `bookTicker` streams.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use super::symbol::SymbolMap;
use super::wire;
use crate::domain::{QuoteUpdate, Symbol};
use crate::error::DecodeError;
use crate::port::{DecodedFrame, ProtocolAdapter};

/// Binance accepts up to 1024 streams per connection but caps request size.
const STREAMS_PER_REQUEST: usize = 200;

pub struct BinanceAdapter {
    symbols: SymbolMap,
    next_id: AtomicU64,
}

impl BinanceAdapter {
    pub fn new(symbols: &[Symbol]) -> Self {
        Self {
            symbols: SymbolMap::new(symbols, native_symbol),
            next_id: AtomicU64::new(1),
        }
    }
}

pub(crate) fn native_symbol(symbol: &Symbol) -> String {
    symbol.joined("")
}

#[derive(Debug, Deserialize)]
struct BookTicker {
    s: String,
    b: String,
    a: String,
}

/// REST `/api/v3/ticker/bookTicker` row, shared with MEXC.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RestBookTicker {
    symbol: String,
    bid_price: Option<String>,
    ask_price: Option<String>,
}

/// Decode a `bookTicker` REST body (array or single object).
pub(crate) fn decode_book_ticker_rest(
    body: &str,
    symbols: &SymbolMap,
) -> Result<Vec<QuoteUpdate>, DecodeError> {
    let value: Value = serde_json::from_str(body)?;
    if let Some(code) = value.get("code").filter(|_| value.get("symbol").is_none()) {
        return Err(DecodeError::Rejected(format!(
            "{code}: {}",
            wire::message_of(&value, &["msg"])
        )));
    }

    let rows: Vec<RestBookTicker> = match value {
        Value::Array(_) => serde_json::from_value(value)?,
        other => vec![serde_json::from_value(other)?],
    };

    let mut updates = Vec::new();
    for row in rows {
        let Some(symbol) = symbols.canonical(&row.symbol) else {
            continue;
        };
        let bid = wire::optional_price("bidPrice", row.bid_price.as_deref())?;
        let ask = wire::optional_price("askPrice", row.ask_price.as_deref())?;
        updates.extend(wire::update(symbol.clone(), bid, ask));
    }
    Ok(updates)
}

impl ProtocolAdapter for BinanceAdapter {
    fn name(&self) -> &'static str {
        "binance"
    }

    fn encode_subscribe(&self, symbols: &[Symbol]) -> Vec<String> {
        let streams: Vec<String> = symbols
            .iter()
            .map(|s| format!("{}@bookTicker", native_symbol(s).to_ascii_lowercase()))
            .collect();

        streams
            .chunks(STREAMS_PER_REQUEST)
            .map(|chunk| {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                json!({ "method": "SUBSCRIBE", "params": chunk, "id": id }).to_string()
            })
            .collect()
    }

    fn decode_frame(&self, text: &str) -> Result<DecodedFrame, DecodeError> {
        let value: Value = serde_json::from_str(text)?;

        // Combined-stream endpoint wraps payloads as {"stream": .., "data": ..}.
        let payload = value.get("data").unwrap_or(&value);

        if let Some(error) = payload.get("error") {
            return Err(DecodeError::Rejected(wire::message_of(error, &["msg"])));
        }
        if payload.get("id").is_some() && payload.get("result").is_some() {
            return Ok(DecodedFrame::SubscribeAck);
        }
        if payload.get("s").is_none() || payload.get("b").is_none() {
            return Ok(DecodedFrame::Unrecognized);
        }

        let ticker: BookTicker = serde_json::from_value(payload.clone())?;
        let symbol = self.symbols.resolve(&ticker.s)?;
        let bid = wire::price("b", &ticker.b)?;
        let ask = wire::price("a", &ticker.a)?;
        Ok(DecodedFrame::Quotes(
            wire::update(symbol, bid, ask).into_iter().collect(),
        ))
    }

    fn rest_poll_url(&self, rest_base: &str, symbols: &[Symbol]) -> Option<String> {
        let natives: Vec<String> = symbols.iter().map(native_symbol).collect();
        let param = serde_json::to_string(&natives).ok()?;
        let url = Url::parse_with_params(
            &format!("{}/api/v3/ticker/bookTicker", rest_base.trim_end_matches('/')),
            &[("symbols", param)],
        )
        .ok()?;
        Some(url.into())
    }

    fn decode_rest(&self, body: &str) -> Result<Vec<QuoteUpdate>, DecodeError> {
        decode_book_ticker_rest(body, &self.symbols)
    }
}
