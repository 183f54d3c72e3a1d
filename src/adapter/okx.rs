//! OKX v5 public `tickers` channel.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use super::auth;
use super::symbol::SymbolMap;
use super::wire;
use crate::domain::{QuoteUpdate, Symbol};
use crate::error::{ConfigError, DecodeError, Result};
use crate::port::{Credentials, DecodedFrame, PingMessage, ProtocolAdapter};

pub struct OkxAdapter {
    symbols: SymbolMap,
}

impl OkxAdapter {
    pub fn new(symbols: &[Symbol]) -> Self {
        Self {
            symbols: SymbolMap::new(symbols, |s| s.joined("-")),
        }
    }

    fn decode_tickers(&self, rows: &[Ticker], strict: bool) -> std::result::Result<Vec<QuoteUpdate>, DecodeError> {
        let mut updates = Vec::with_capacity(rows.len());
        for row in rows {
            let symbol = match self.symbols.canonical(&row.inst_id) {
                Some(symbol) => symbol.clone(),
                None if strict => return Err(DecodeError::UnknownSymbol(row.inst_id.clone())),
                None => continue,
            };
            let bid = wire::optional_price("bidPx", row.bid_px.as_deref())?;
            let ask = wire::optional_price("askPx", row.ask_px.as_deref())?;
            updates.extend(wire::update(symbol, bid, ask));
        }
        Ok(updates)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker {
    inst_id: String,
    bid_px: Option<String>,
    ask_px: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RestResponse {
    code: String,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: Vec<Ticker>,
}

impl ProtocolAdapter for OkxAdapter {
    fn name(&self) -> &'static str {
        "okx"
    }

    fn encode_subscribe(&self, symbols: &[Symbol]) -> Vec<String> {
        let args: Vec<Value> = symbols
            .iter()
            .map(|s| json!({ "channel": "tickers", "instId": s.joined("-") }))
            .collect();
        vec![json!({ "op": "subscribe", "args": args }).to_string()]
    }

    fn supports_auth(&self) -> bool {
        true
    }

    fn encode_auth(&self, credentials: &Credentials, now: DateTime<Utc>) -> Result<Option<String>> {
        let passphrase = credentials.passphrase.as_deref().ok_or_else(|| {
            ConfigError::MissingCredential {
                exchange: "okx".into(),
                variable: "OKX_API_PASSPHRASE".into(),
            }
        })?;
        let timestamp = now.timestamp().to_string();
        let sign = auth::sign_base64(
            &credentials.api_secret,
            &format!("{timestamp}GET/users/self/verify"),
        )?;
        Ok(Some(
            json!({
                "op": "login",
                "args": [{
                    "apiKey": credentials.api_key,
                    "passphrase": passphrase,
                    "timestamp": timestamp,
                    "sign": sign,
                }]
            })
            .to_string(),
        ))
    }

    fn encode_ping(&self, _now: DateTime<Utc>) -> PingMessage {
        PingMessage::Text("ping".into())
    }

    fn decode_frame(&self, text: &str) -> std::result::Result<DecodedFrame, DecodeError> {
        if text == "pong" {
            return Ok(DecodedFrame::Heartbeat { reply: None });
        }

        let value: Value = serde_json::from_str(text)?;
        if let Some(event) = value.get("event").and_then(Value::as_str) {
            return match event {
                "subscribe" => Ok(DecodedFrame::SubscribeAck),
                "login" if value.get("code").is_some_and(|c| wire::code_is(c, "0")) => {
                    Ok(DecodedFrame::AuthAck)
                }
                "login" | "error" => Err(DecodeError::Rejected(wire::message_of(&value, &["msg"]))),
                _ => Ok(DecodedFrame::Unrecognized),
            };
        }

        let is_tickers = value
            .pointer("/arg/channel")
            .and_then(Value::as_str)
            .is_some_and(|c| c == "tickers");
        let Some(data) = value.get("data").filter(|_| is_tickers) else {
            return Ok(DecodedFrame::Unrecognized);
        };

        let rows: Vec<Ticker> = serde_json::from_value(data.clone())?;
        Ok(DecodedFrame::Quotes(self.decode_tickers(&rows, true)?))
    }

    fn rest_poll_url(&self, rest_base: &str, _symbols: &[Symbol]) -> Option<String> {
        Some(format!(
            "{}/api/v5/market/tickers?instType=SPOT",
            rest_base.trim_end_matches('/')
        ))
    }

    fn decode_rest(&self, body: &str) -> std::result::Result<Vec<QuoteUpdate>, DecodeError> {
        let response: RestResponse = serde_json::from_str(body)?;
        if response.code != "0" {
            return Err(DecodeError::Rejected(format!("{}: {}", response.code, response.msg)));
        }
        self.decode_tickers(&response.data, false)
    }
}
