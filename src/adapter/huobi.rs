//! HTX (formerly Huobi) market feed, top-of-book via `market.$symbol.bbo`.
//!
//! Every server frame is gzip-compressed JSON sent as a binary message.
//! The server pings with `{"ping": n}` and drops clients that do not echo
//! `{"pong": n}` back.

use std::io::Read;

use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use super::symbol::SymbolMap;
use super::wire;
use crate::domain::{QuoteUpdate, Symbol};
use crate::error::DecodeError;
use crate::port::{DecodedFrame, PingMessage, ProtocolAdapter};

pub struct HuobiAdapter {
    symbols: SymbolMap,
}

impl HuobiAdapter {
    pub fn new(symbols: &[Symbol]) -> Self {
        Self {
            symbols: SymbolMap::new(symbols, native),
        }
    }

    fn decode_json(&self, value: &Value) -> Result<DecodedFrame, DecodeError> {
        if let Some(ping) = value.get("ping") {
            let reply = json!({ "pong": ping }).to_string();
            return Ok(DecodedFrame::Heartbeat { reply: Some(reply) });
        }
        if value.get("pong").is_some() {
            return Ok(DecodedFrame::Heartbeat { reply: None });
        }

        if let Some(status) = value.get("status").and_then(Value::as_str) {
            return match status {
                "ok" if value.get("subbed").is_some() => Ok(DecodedFrame::SubscribeAck),
                "ok" => Ok(DecodedFrame::Unrecognized),
                _ => Err(DecodeError::Rejected(wire::message_of(
                    value,
                    &["err-msg", "err-code"],
                ))),
            };
        }

        let Some(channel) = value.get("ch").and_then(Value::as_str) else {
            return Ok(DecodedFrame::Unrecognized);
        };
        let Some(native) = channel
            .strip_prefix("market.")
            .and_then(|rest| rest.strip_suffix(".bbo"))
        else {
            return Ok(DecodedFrame::Unrecognized);
        };

        let tick = value.get("tick").ok_or(DecodeError::MissingField("tick"))?;
        let symbol = self.symbols.resolve(native)?;
        let bid = number(tick, "bid")?;
        let ask = number(tick, "ask")?;
        Ok(DecodedFrame::Quotes(
            wire::update(symbol, bid, ask).into_iter().collect(),
        ))
    }
}

fn native(symbol: &Symbol) -> String {
    symbol.joined("").to_ascii_lowercase()
}

/// Prices arrive as JSON numbers; parse their decimal text, never an `f64`.
fn number(value: &Value, field: &'static str) -> Result<Option<Decimal>, DecodeError> {
    match value.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => wire::price(field, &n.to_string()),
        Some(Value::String(s)) => wire::price(field, s),
        Some(other) => Err(DecodeError::InvalidNumber {
            field,
            value: other.to_string(),
        }),
    }
}

fn gunzip(bytes: &[u8]) -> Result<String, DecodeError> {
    let mut text = String::new();
    GzDecoder::new(bytes)
        .read_to_string(&mut text)
        .map_err(DecodeError::Decompress)?;
    Ok(text)
}

impl ProtocolAdapter for HuobiAdapter {
    fn name(&self) -> &'static str {
        "huobi"
    }

    fn encode_subscribe(&self, symbols: &[Symbol]) -> Vec<String> {
        symbols
            .iter()
            .map(|s| {
                let native = native(s);
                json!({ "sub": format!("market.{native}.bbo"), "id": format!("bbo_{native}") })
                    .to_string()
            })
            .collect()
    }

    fn encode_ping(&self, now: DateTime<Utc>) -> PingMessage {
        PingMessage::Text(json!({ "ping": now.timestamp_millis() }).to_string())
    }

    fn decode_frame(&self, text: &str) -> Result<DecodedFrame, DecodeError> {
        let value: Value = serde_json::from_str(text)?;
        self.decode_json(&value)
    }

    fn decode_binary(&self, bytes: &[u8]) -> Result<DecodedFrame, DecodeError> {
        self.decode_frame(&gunzip(bytes)?)
    }

    fn rest_poll_url(&self, rest_base: &str, _symbols: &[Symbol]) -> Option<String> {
        Some(format!("{}/market/tickers", rest_base.trim_end_matches('/')))
    }

    fn decode_rest(&self, body: &str) -> Result<Vec<QuoteUpdate>, DecodeError> {
        let value: Value = serde_json::from_str(body)?;
        if value.get("status").and_then(Value::as_str) != Some("ok") {
            return Err(DecodeError::Rejected(wire::message_of(
                &value,
                &["err-msg", "err-code"],
            )));
        }

        let rows = value
            .get("data")
            .and_then(Value::as_array)
            .ok_or(DecodeError::MissingField("data"))?;
        let mut updates = Vec::new();
        for row in rows {
            let Some(symbol) = row
                .get("symbol")
                .and_then(Value::as_str)
                .and_then(|s| self.symbols.canonical(s))
            else {
                continue;
            };
            let bid = number(row, "bid")?;
            let ask = number(row, "ask")?;
            updates.extend(wire::update(symbol.clone(), bid, ask));
        }
        Ok(updates)
    }
}
