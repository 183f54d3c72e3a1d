//! Gate.io v4 `spot.book_ticker` channel.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use super::symbol::SymbolMap;
use super::wire;
use crate::domain::{QuoteUpdate, Symbol};
use crate::error::DecodeError;
use crate::port::{DecodedFrame, PingMessage, ProtocolAdapter};

const CHANNEL: &str = "spot.book_ticker";

pub struct GateAdapter {
    symbols: SymbolMap,
}

impl GateAdapter {
    pub fn new(symbols: &[Symbol]) -> Self {
        Self {
            symbols: SymbolMap::new(symbols, |s| s.joined("_")),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BookTicker {
    s: String,
    b: Option<String>,
    a: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RestTicker {
    currency_pair: String,
    highest_bid: Option<String>,
    lowest_ask: Option<String>,
}

impl ProtocolAdapter for GateAdapter {
    fn name(&self) -> &'static str {
        "gate"
    }

    fn encode_subscribe(&self, symbols: &[Symbol]) -> Vec<String> {
        let payload: Vec<String> = symbols.iter().map(|s| s.joined("_")).collect();
        vec![json!({
            "time": Utc::now().timestamp(),
            "channel": CHANNEL,
            "event": "subscribe",
            "payload": payload,
        })
        .to_string()]
    }

    fn encode_ping(&self, now: DateTime<Utc>) -> PingMessage {
        PingMessage::Text(json!({ "time": now.timestamp(), "channel": "spot.ping" }).to_string())
    }

    fn decode_frame(&self, text: &str) -> Result<DecodedFrame, DecodeError> {
        let value: Value = serde_json::from_str(text)?;
        let Some(channel) = value.get("channel").and_then(Value::as_str) else {
            return Ok(DecodedFrame::Unrecognized);
        };
        if channel == "spot.pong" {
            return Ok(DecodedFrame::Heartbeat { reply: None });
        }
        if channel != CHANNEL {
            return Ok(DecodedFrame::Unrecognized);
        }

        match value.get("event").and_then(Value::as_str) {
            Some("subscribe") => match value.get("error").filter(|e| !e.is_null()) {
                Some(error) => Err(DecodeError::Rejected(wire::message_of(error, &["message"]))),
                None => Ok(DecodedFrame::SubscribeAck),
            },
            Some("update") => {
                let result = value.get("result").ok_or(DecodeError::MissingField("result"))?;
                let ticker: BookTicker = serde_json::from_value(result.clone())?;
                let symbol = self.symbols.resolve(&ticker.s)?;
                let bid = wire::optional_price("b", ticker.b.as_deref())?;
                let ask = wire::optional_price("a", ticker.a.as_deref())?;
                Ok(DecodedFrame::Quotes(
                    wire::update(symbol, bid, ask).into_iter().collect(),
                ))
            }
            _ => Ok(DecodedFrame::Unrecognized),
        }
    }

    fn rest_poll_url(&self, rest_base: &str, _symbols: &[Symbol]) -> Option<String> {
        Some(format!("{}/api/v4/spot/tickers", rest_base.trim_end_matches('/')))
    }

    fn decode_rest(&self, body: &str) -> Result<Vec<QuoteUpdate>, DecodeError> {
        let value: Value = serde_json::from_str(body)?;
        if value.is_object() {
            return Err(DecodeError::Rejected(wire::message_of(&value, &["message", "label"])));
        }

        let rows: Vec<RestTicker> = serde_json::from_value(value)?;
        let mut updates = Vec::new();
        for row in rows {
            let Some(symbol) = self.symbols.canonical(&row.currency_pair) else {
                continue;
            };
            let bid = wire::optional_price("highest_bid", row.highest_bid.as_deref())?;
            let ask = wire::optional_price("lowest_ask", row.lowest_ask.as_deref())?;
            updates.extend(wire::update(symbol.clone(), bid, ask));
        }
        Ok(updates)
    }
}
