//! KuCoin spot `/market/ticker` topic.
//!
//! The WebSocket endpoint is not fixed: a token and instance server must be
//! fetched from `bullet-public` before every connection.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;
use uuid::Uuid;

use super::symbol::SymbolMap;
use super::wire;
use crate::domain::{QuoteUpdate, Symbol};
use crate::error::DecodeError;
use crate::port::{BootstrapRequest, DecodedFrame, HttpMethod, PingMessage, ProtocolAdapter};

/// KuCoin caps a single topic at 100 symbols.
const SYMBOLS_PER_TOPIC: usize = 100;

const TICKER_TOPIC: &str = "/market/ticker:";

const SUCCESS: &str = "200000";

pub struct KucoinAdapter {
    symbols: SymbolMap,
}

impl KucoinAdapter {
    pub fn new(symbols: &[Symbol]) -> Self {
        Self {
            symbols: SymbolMap::new(symbols, |s| s.joined("-")),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Bullet {
    code: String,
    data: Option<BulletData>,
    #[serde(default)]
    msg: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BulletData {
    token: String,
    instance_servers: Vec<InstanceServer>,
}

#[derive(Debug, Deserialize)]
struct InstanceServer {
    endpoint: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TickerData {
    best_bid: Option<String>,
    best_ask: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AllTickers {
    code: String,
    #[serde(default)]
    msg: String,
    data: Option<AllTickersData>,
}

#[derive(Debug, Deserialize)]
struct AllTickersData {
    #[serde(default)]
    ticker: Vec<RestTicker>,
}

#[derive(Debug, Deserialize)]
struct RestTicker {
    symbol: String,
    buy: Option<String>,
    sell: Option<String>,
}

impl ProtocolAdapter for KucoinAdapter {
    fn name(&self) -> &'static str {
        "kucoin"
    }

    fn encode_subscribe(&self, symbols: &[Symbol]) -> Vec<String> {
        let natives: Vec<String> = symbols.iter().map(|s| s.joined("-")).collect();
        natives
            .chunks(SYMBOLS_PER_TOPIC)
            .map(|chunk| {
                json!({
                    "id": Uuid::new_v4().to_string(),
                    "type": "subscribe",
                    "topic": format!("{TICKER_TOPIC}{}", chunk.join(",")),
                    "privateChannel": false,
                    "response": true,
                })
                .to_string()
            })
            .collect()
    }

    fn encode_ping(&self, _now: DateTime<Utc>) -> PingMessage {
        PingMessage::Text(json!({ "id": Uuid::new_v4().to_string(), "type": "ping" }).to_string())
    }

    fn decode_frame(&self, text: &str) -> Result<DecodedFrame, DecodeError> {
        let value: Value = serde_json::from_str(text)?;
        let Some(kind) = value.get("type").and_then(Value::as_str) else {
            return Ok(DecodedFrame::Unrecognized);
        };

        match kind {
            "welcome" => Ok(DecodedFrame::Unrecognized),
            "ack" => Ok(DecodedFrame::SubscribeAck),
            "pong" => Ok(DecodedFrame::Heartbeat { reply: None }),
            "ping" => {
                let id = value.get("id").cloned().unwrap_or(Value::Null);
                Ok(DecodedFrame::Heartbeat {
                    reply: Some(json!({ "id": id, "type": "pong" }).to_string()),
                })
            }
            "error" => Err(DecodeError::Rejected(wire::message_of(&value, &["data", "msg"]))),
            "message" => {
                let topic = wire::str_field(&value, "topic")?;
                let Some(native) = topic.strip_prefix(TICKER_TOPIC) else {
                    return Ok(DecodedFrame::Unrecognized);
                };
                let symbol = self.symbols.resolve(native)?;
                let data = value.get("data").ok_or(DecodeError::MissingField("data"))?;
                let ticker: TickerData = serde_json::from_value(data.clone())?;
                let bid = wire::optional_price("bestBid", ticker.best_bid.as_deref())?;
                let ask = wire::optional_price("bestAsk", ticker.best_ask.as_deref())?;
                Ok(DecodedFrame::Quotes(
                    wire::update(symbol, bid, ask).into_iter().collect(),
                ))
            }
            _ => Ok(DecodedFrame::Unrecognized),
        }
    }

    fn bootstrap(&self) -> Option<BootstrapRequest> {
        Some(BootstrapRequest {
            method: HttpMethod::Post,
            path: "/api/v1/bullet-public".into(),
        })
    }

    fn endpoint_from_bootstrap(&self, body: &str) -> Result<String, DecodeError> {
        let bullet: Bullet = serde_json::from_str(body)?;
        if bullet.code != SUCCESS {
            return Err(DecodeError::Rejected(format!("{}: {}", bullet.code, bullet.msg)));
        }
        let data = bullet.data.ok_or(DecodeError::MissingField("data"))?;
        let server = data
            .instance_servers
            .first()
            .ok_or(DecodeError::MissingField("instanceServers"))?;

        let mut url = Url::parse(&server.endpoint)
            .map_err(|e| DecodeError::Rejected(format!("bad endpoint {}: {e}", server.endpoint)))?;
        url.query_pairs_mut()
            .append_pair("token", &data.token)
            .append_pair("connectId", &Uuid::new_v4().to_string());
        Ok(url.into())
    }

    fn rest_poll_url(&self, rest_base: &str, _symbols: &[Symbol]) -> Option<String> {
        Some(format!(
            "{}/api/v1/market/allTickers",
            rest_base.trim_end_matches('/')
        ))
    }

    fn decode_rest(&self, body: &str) -> Result<Vec<QuoteUpdate>, DecodeError> {
        let response: AllTickers = serde_json::from_str(body)?;
        if response.code != SUCCESS {
            return Err(DecodeError::Rejected(format!("{}: {}", response.code, response.msg)));
        }

        let mut updates = Vec::new();
        for row in response.data.map(|d| d.ticker).unwrap_or_default() {
            let Some(symbol) = self.symbols.canonical(&row.symbol) else {
                continue;
            };
            let bid = wire::optional_price("buy", row.buy.as_deref())?;
            let ask = wire::optional_price("sell", row.sell.as_deref())?;
            updates.extend(wire::update(symbol.clone(), bid, ask));
        }
        Ok(updates)
    }
}
