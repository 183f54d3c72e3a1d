//! Protocol adapter port: one wire format per exchange.
//!
//! Adapters are pure translators. They never touch sockets, clocks (beyond
//! the `now` they are handed) or shared state; the transport connector owns
//! all I/O and feeds adapters raw frames.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::domain::{QuoteUpdate, Symbol};
use crate::error::{DecodeError, Result};

/// API credentials read from the environment.
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
    pub passphrase: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .field("passphrase", &self.passphrase.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Canonical meaning of one inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedFrame {
    /// One or more quote changes, in frame order.
    Quotes(Vec<QuoteUpdate>),
    SubscribeAck,
    AuthAck,
    /// Keepalive traffic. `reply` is sent back verbatim when present.
    Heartbeat { reply: Option<String> },
    /// Valid but uninteresting (status banners, info events).
    Unrecognized,
}

/// How the connector keeps a connection alive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PingMessage {
    /// A WebSocket ping control frame.
    Frame,
    /// An application-level text message.
    Text(String),
}

/// HTTP request that must succeed before the WebSocket endpoint is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapRequest {
    pub method: HttpMethod,
    pub path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// Wire format of one exchange.
pub trait ProtocolAdapter: Send + Sync {
    /// Short lowercase name used in logs.
    fn name(&self) -> &'static str;

    /// Subscription requests covering `symbols`, sent in order.
    fn encode_subscribe(&self, symbols: &[Symbol]) -> Vec<String>;

    /// Returns true if the exchange acknowledges subscriptions. When false,
    /// the first data frame confirms the subscription.
    fn acks_subscriptions(&self) -> bool {
        true
    }

    /// Returns true if the exchange supports a WebSocket login.
    fn supports_auth(&self) -> bool {
        false
    }

    /// Signed login payload, or `None` if the exchange has no login step.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials cannot be used for signing.
    fn encode_auth(&self, _credentials: &Credentials, _now: DateTime<Utc>) -> Result<Option<String>> {
        Ok(None)
    }

    /// Keepalive the client sends every ping interval.
    fn encode_ping(&self, _now: DateTime<Utc>) -> PingMessage {
        PingMessage::Frame
    }

    /// Decode one text frame.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] for malformed frames and for explicit
    /// rejections (`DecodeError::Rejected`) of logins or subscriptions.
    fn decode_frame(&self, text: &str) -> std::result::Result<DecodedFrame, DecodeError>;

    /// Decode one binary frame. Most exchanges only send text.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Unsupported`] unless overridden.
    fn decode_binary(&self, _bytes: &[u8]) -> std::result::Result<DecodedFrame, DecodeError> {
        Err(DecodeError::Unsupported("binary frame"))
    }

    /// Request needed to discover the WebSocket endpoint, if any.
    fn bootstrap(&self) -> Option<BootstrapRequest> {
        None
    }

    /// Turn a bootstrap response into the endpoint to dial.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] if the response lacks an endpoint.
    fn endpoint_from_bootstrap(&self, _body: &str) -> std::result::Result<String, DecodeError> {
        Err(DecodeError::Unsupported("bootstrap"))
    }

    /// URL polled by the REST connector, or `None` if the exchange has no
    /// usable ticker endpoint.
    fn rest_poll_url(&self, _rest_base: &str, _symbols: &[Symbol]) -> Option<String> {
        None
    }

    /// Decode a REST ticker response. Symbols that were not requested are
    /// skipped silently.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] for malformed bodies or API-level errors.
    fn decode_rest(&self, _body: &str) -> std::result::Result<Vec<QuoteUpdate>, DecodeError> {
        Err(DecodeError::Unsupported("rest polling"))
    }
}
