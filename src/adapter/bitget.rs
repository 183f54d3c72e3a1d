//! Bitget v2 public spot `ticker` channel.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use super::auth;
use super::symbol::SymbolMap;
use super::wire;
use crate::domain::{QuoteUpdate, Symbol};
use crate::error::{ConfigError, DecodeError, Result};
use crate::port::{Credentials, DecodedFrame, PingMessage, ProtocolAdapter};

pub struct BitgetAdapter {
    symbols: SymbolMap,
}

impl BitgetAdapter {
    pub fn new(symbols: &[Symbol]) -> Self {
        Self {
            symbols: SymbolMap::new(symbols, |s| s.joined("")),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker {
    inst_id: String,
    bid_pr: Option<String>,
    ask_pr: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RestResponse {
    code: String,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: Vec<RestTicker>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RestTicker {
    symbol: String,
    bid_pr: Option<String>,
    ask_pr: Option<String>,
}

impl ProtocolAdapter for BitgetAdapter {
    fn name(&self) -> &'static str {
        "bitget"
    }

    fn encode_subscribe(&self, symbols: &[Symbol]) -> Vec<String> {
        let args: Vec<Value> = symbols
            .iter()
            .map(|s| json!({ "instType": "SPOT", "channel": "ticker", "instId": s.joined("") }))
            .collect();
        vec![json!({ "op": "subscribe", "args": args }).to_string()]
    }

    fn supports_auth(&self) -> bool {
        true
    }

    fn encode_auth(&self, credentials: &Credentials, now: DateTime<Utc>) -> Result<Option<String>> {
        let passphrase = credentials.passphrase.as_deref().ok_or_else(|| {
            ConfigError::MissingCredential {
                exchange: "bitget".into(),
                variable: "BITGET_API_PASSPHRASE".into(),
            }
        })?;
        let timestamp = now.timestamp().to_string();
        let sign = auth::sign_base64(&credentials.api_secret, &format!("{timestamp}GET/user/verify"))?;
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

        let is_ticker = value
            .pointer("/arg/channel")
            .and_then(Value::as_str)
            .is_some_and(|c| c == "ticker");
        let Some(data) = value.get("data").filter(|_| is_ticker) else {
            return Ok(DecodedFrame::Unrecognized);
        };

        let rows: Vec<Ticker> = serde_json::from_value(data.clone())?;
        let mut updates = Vec::with_capacity(rows.len());
        for row in rows {
            let symbol = self.symbols.resolve(&row.inst_id)?;
            let bid = wire::optional_price("bidPr", row.bid_pr.as_deref())?;
            let ask = wire::optional_price("askPr", row.ask_pr.as_deref())?;
            updates.extend(wire::update(symbol, bid, ask));
        }
        Ok(DecodedFrame::Quotes(updates))
    }

    fn rest_poll_url(&self, rest_base: &str, _symbols: &[Symbol]) -> Option<String> {
        Some(format!(
            "{}/api/v2/spot/market/tickers",
            rest_base.trim_end_matches('/')
        ))
    }

    fn decode_rest(&self, body: &str) -> std::result::Result<Vec<QuoteUpdate>, DecodeError> {
        let response: RestResponse = serde_json::from_str(body)?;
        if response.code != "00000" {
            return Err(DecodeError::Rejected(format!("{}: {}", response.code, response.msg)));
        }

        let mut updates = Vec::new();
        for row in response.data {
            let Some(symbol) = self.symbols.canonical(&row.symbol) else {
                continue;
            };
            let bid = wire::optional_price("bidPr", row.bid_pr.as_deref())?;
            let ask = wire::optional_price("askPr", row.ask_pr.as_deref())?;
            updates.extend(wire::update(symbol.clone(), bid, ask));
        }
        Ok(updates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn adapter() -> BitgetAdapter {
        BitgetAdapter::new(&[Symbol::new("BTC", "USDT")])
    }

    #[test]
    fn test_encode_subscribe() {
        let msgs = adapter().encode_subscribe(&[Symbol::new("BTC", "USDT")]);
        let value: Value = serde_json::from_str(&msgs[0]).unwrap();
        assert_eq!(
            value,
            json!({"op": "subscribe", "args": [{"instType": "SPOT", "channel": "ticker", "instId": "BTCUSDT"}]})
        );
    }

    #[test]
    fn test_decode_ticker() {
        let frame = r#"{"action":"snapshot","arg":{"instType":"SPOT","channel":"ticker","instId":"BTCUSDT"},
            "data":[{"instId":"BTCUSDT","lastPr":"27000.5","bidPr":"27000","askPr":"27000.5","ts":"1695715383021"}],"ts":1695715383039}"#;
        assert_eq!(
            adapter().decode_frame(frame).unwrap(),
            DecodedFrame::Quotes(vec![QuoteUpdate::both(
                Symbol::new("BTC", "USDT"),
                dec!(27000),
                dec!(27000.5)
            )])
        );
    }

    #[test]
    fn test_login_ack_with_numeric_code() {
        assert_eq!(
            adapter().decode_frame(r#"{"event":"login","code":0}"#).unwrap(),
            DecodedFrame::AuthAck
        );
        assert!(matches!(
            adapter().decode_frame(r#"{"event":"error","code":30005,"msg":"Invalid sign"}"#),
            Err(DecodeError::Rejected(ref m)) if m == "Invalid sign"
        ));
    }

    #[test]
    fn test_login_signature() {
        let creds = Credentials {
            api_key: "key".into(),
            api_secret: "secret".into(),
            passphrase: Some("phrase".into()),
        };
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let payload = adapter().encode_auth(&creds, now).unwrap().unwrap();
        let value: Value = serde_json::from_str(&payload).unwrap();
        let args = &value["args"][0];
        assert_eq!(args["apiKey"], "key");
        assert_eq!(args["passphrase"], "phrase");
        assert_eq!(args["timestamp"], "1700000000");
        assert_eq!(
            args["sign"],
            auth::sign_base64("secret", "1700000000GET/user/verify").unwrap()
        );
    }

    #[test]
    fn test_pong() {
        assert_eq!(
            adapter().decode_frame("pong").unwrap(),
            DecodedFrame::Heartbeat { reply: None }
        );
    }

    #[test]
    fn test_decode_rest() {
        let body = r#"{"code":"00000","msg":"success","requestTime":0,"data":[{"symbol":"BTCUSDT","bidPr":"1","askPr":"2"}]}"#;
        assert_eq!(adapter().decode_rest(body).unwrap().len(), 1);
        assert!(adapter().decode_rest(r#"{"code":"40034","msg":"bad","data":[]}"#).is_err());
    }
}
