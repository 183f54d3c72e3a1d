//! Kraken v1 public `ticker` channel.
//!
//! Kraken spells some assets differently (`XBT` for `BTC`, `XDG` for `DOGE`)
//! and publishes data as JSON arrays rather than objects.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use super::symbol::SymbolMap;
use super::wire;
use crate::domain::{Asset, Symbol};
use crate::error::DecodeError;
use crate::port::{DecodedFrame, PingMessage, ProtocolAdapter};

const ALIASES: &[(&str, &str)] = &[("BTC", "XBT"), ("DOGE", "XDG")];

fn kraken_asset(asset: &Asset) -> &str {
    ALIASES
        .iter()
        .find(|(canonical, _)| *canonical == asset.as_str())
        .map_or(asset.as_str(), |(_, native)| *native)
}

fn native_pair(symbol: &Symbol) -> String {
    format!("{}/{}", kraken_asset(symbol.base()), kraken_asset(symbol.quote()))
}

pub struct KrakenAdapter {
    symbols: SymbolMap,
    next_reqid: AtomicU64,
}

impl KrakenAdapter {
    pub fn new(symbols: &[Symbol]) -> Self {
        Self {
            symbols: SymbolMap::new(symbols, native_pair),
            next_reqid: AtomicU64::new(1),
        }
    }

    /// `[channelID, {"a": [price, ..], "b": [price, ..], ..}, "ticker", "XBT/USDT"]`
    fn decode_array(&self, items: &[Value]) -> Result<DecodedFrame, DecodeError> {
        if items.len() < 4 || items[items.len() - 2].as_str() != Some("ticker") {
            return Ok(DecodedFrame::Unrecognized);
        }
        let pair = items[items.len() - 1]
            .as_str()
            .ok_or(DecodeError::MissingField("pair"))?;
        let symbol = self.symbols.resolve(pair)?;
        let payload = &items[1];

        let side = |field: &'static str| -> Result<Option<rust_decimal::Decimal>, DecodeError> {
            match payload.get(field).and_then(|v| v.get(0)).and_then(Value::as_str) {
                Some(raw) => wire::price(field, raw),
                None => Ok(None),
            }
        };
        let bid = side("b")?;
        let ask = side("a")?;
        Ok(DecodedFrame::Quotes(
            wire::update(symbol, bid, ask).into_iter().collect(),
        ))
    }
}

impl ProtocolAdapter for KrakenAdapter {
    fn name(&self) -> &'static str {
        "kraken"
    }

    fn encode_subscribe(&self, symbols: &[Symbol]) -> Vec<String> {
        let pairs: Vec<String> = symbols.iter().map(native_pair).collect();
        vec![json!({
            "event": "subscribe",
            "pair": pairs,
            "subscription": { "name": "ticker" },
        })
        .to_string()]
    }

    fn encode_ping(&self, _now: DateTime<Utc>) -> PingMessage {
        let reqid = self.next_reqid.fetch_add(1, Ordering::Relaxed);
        PingMessage::Text(json!({ "event": "ping", "reqid": reqid }).to_string())
    }

    fn decode_frame(&self, text: &str) -> Result<DecodedFrame, DecodeError> {
        let value: Value = serde_json::from_str(text)?;
        if let Value::Array(items) = &value {
            return self.decode_array(items);
        }

        let Some(event) = value.get("event").and_then(Value::as_str) else {
            return Ok(DecodedFrame::Unrecognized);
        };
        match event {
            "heartbeat" | "pong" => Ok(DecodedFrame::Heartbeat { reply: None }),
            "subscriptionStatus" => match value.get("status").and_then(Value::as_str) {
                Some("subscribed") => Ok(DecodedFrame::SubscribeAck),
                Some("error") => Err(DecodeError::Rejected(wire::message_of(
                    &value,
                    &["errorMessage"],
                ))),
                _ => Ok(DecodedFrame::Unrecognized),
            },
            _ => Ok(DecodedFrame::Unrecognized),
        }
    }
}
