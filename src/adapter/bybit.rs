//! Bybit v5 public spot, top-of-book via `orderbook.1`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};

use super::auth;
use super::symbol::SymbolMap;
use super::wire;
use crate::domain::{QuoteUpdate, Symbol};
use crate::error::{DecodeError, Result};
use crate::port::{Credentials, DecodedFrame, PingMessage, ProtocolAdapter};

/// Spot connections accept at most ten topics per subscribe request.
const TOPICS_PER_REQUEST: usize = 10;

/// Lifetime of an auth signature.
const AUTH_EXPIRY_MS: i64 = 10_000;

pub struct BybitAdapter {
    symbols: SymbolMap,
}

impl BybitAdapter {
    pub fn new(symbols: &[Symbol]) -> Self {
        Self {
            symbols: SymbolMap::new(symbols, |s| s.joined("")),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BookData {
    s: String,
    #[serde(default)]
    b: Vec<[String; 2]>,
    #[serde(default)]
    a: Vec<[String; 2]>,
}

/// Best level of one side. A delta without levels, or a level with zero
/// size, leaves that side unchanged.
fn best_level(
    field: &'static str,
    levels: &[[String; 2]],
) -> std::result::Result<Option<Decimal>, DecodeError> {
    let Some([price, size]) = levels.first() else {
        return Ok(None);
    };
    if wire::price("size", size)?.is_none() {
        return Ok(None);
    }
    wire::price(field, price)
}

#[derive(Debug, Deserialize)]
struct RestResponse {
    #[serde(rename = "retCode")]
    ret_code: i64,
    #[serde(rename = "retMsg", default)]
    ret_msg: String,
    result: Option<RestResult>,
}

#[derive(Debug, Deserialize)]
struct RestResult {
    #[serde(default)]
    list: Vec<RestTicker>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RestTicker {
    symbol: String,
    bid1_price: Option<String>,
    ask1_price: Option<String>,
}

impl ProtocolAdapter for BybitAdapter {
    fn name(&self) -> &'static str {
        "bybit"
    }

    fn encode_subscribe(&self, symbols: &[Symbol]) -> Vec<String> {
        let topics: Vec<String> = symbols
            .iter()
            .map(|s| format!("orderbook.1.{}", s.joined("")))
            .collect();
        topics
            .chunks(TOPICS_PER_REQUEST)
            .map(|chunk| json!({ "op": "subscribe", "args": chunk }).to_string())
            .collect()
    }

    fn supports_auth(&self) -> bool {
        true
    }

    fn encode_auth(&self, credentials: &Credentials, now: DateTime<Utc>) -> Result<Option<String>> {
        let expires = now.timestamp_millis() + AUTH_EXPIRY_MS;
        let signature = auth::sign_hex(&credentials.api_secret, &format!("GET/realtime{expires}"))?;
        Ok(Some(
            json!({ "op": "auth", "args": [credentials.api_key, expires, signature] }).to_string(),
        ))
    }

    fn encode_ping(&self, _now: DateTime<Utc>) -> PingMessage {
        PingMessage::Text(json!({ "op": "ping" }).to_string())
    }

    fn decode_frame(&self, text: &str) -> std::result::Result<DecodedFrame, DecodeError> {
        let value: Value = serde_json::from_str(text)?;

        if let Some(op) = value.get("op").and_then(Value::as_str) {
            let success = value.get("success").and_then(Value::as_bool).unwrap_or(true);
            return match op {
                "pong" | "ping" => Ok(DecodedFrame::Heartbeat { reply: None }),
                "subscribe" if success => Ok(DecodedFrame::SubscribeAck),
                "auth" if success => Ok(DecodedFrame::AuthAck),
                "subscribe" | "auth" => Err(DecodeError::Rejected(wire::message_of(
                    &value,
                    &["ret_msg", "retMsg"],
                ))),
                _ => Ok(DecodedFrame::Unrecognized),
            };
        }

        let Some(topic) = value.get("topic").and_then(Value::as_str) else {
            return Ok(DecodedFrame::Unrecognized);
        };
        if !topic.starts_with("orderbook.") {
            return Ok(DecodedFrame::Unrecognized);
        }

        let data = value.get("data").ok_or(DecodeError::MissingField("data"))?;
        let book: BookData = serde_json::from_value(data.clone())?;
        let symbol = self.symbols.resolve(&book.s)?;
        let bid = best_level("b", &book.b)?;
        let ask = best_level("a", &book.a)?;
        Ok(DecodedFrame::Quotes(
            wire::update(symbol, bid, ask).into_iter().collect(),
        ))
    }

    fn rest_poll_url(&self, rest_base: &str, _symbols: &[Symbol]) -> Option<String> {
        Some(format!(
            "{}/v5/market/tickers?category=spot",
            rest_base.trim_end_matches('/')
        ))
    }

    fn decode_rest(&self, body: &str) -> std::result::Result<Vec<QuoteUpdate>, DecodeError> {
        let response: RestResponse = serde_json::from_str(body)?;
        if response.ret_code != 0 {
            return Err(DecodeError::Rejected(format!(
                "{}: {}",
                response.ret_code, response.ret_msg
            )));
        }

        let mut updates = Vec::new();
        for row in response.result.map(|r| r.list).unwrap_or_default() {
            let Some(symbol) = self.symbols.canonical(&row.symbol) else {
                continue;
            };
            let bid = wire::optional_price("bid1Price", row.bid1_price.as_deref())?;
            let ask = wire::optional_price("ask1Price", row.ask1_price.as_deref())?;
            updates.extend(wire::update(symbol.clone(), bid, ask));
        }
        Ok(updates)
    }
}
