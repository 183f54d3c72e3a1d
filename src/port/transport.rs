//! Socket-level seams used by the connectors.
//!
//! The real implementations live in `infrastructure::transport::net`;
//! tests substitute scripted ones from the testkit.

use std::fmt;

use async_trait::async_trait;
use url::Url;

use crate::error::Result;

/// A WebSocket frame, independent of the underlying library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close,
}

/// A proxy from the rotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyEndpoint {
    url: Url,
}

impl ProxyEndpoint {
    pub fn new(url: Url) -> Self {
        Self { url }
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    #[must_use]
    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    /// `host:port`, defaulting the port per scheme.
    #[must_use]
    pub fn authority(&self) -> String {
        let host = self.url.host_str().unwrap_or_default();
        let port = self.url.port_or_known_default().unwrap_or(match self.scheme() {
            "socks5" | "socks5h" | "socks4" => 1080,
            _ => 8080,
        });
        format!("{host}:{port}")
    }

    /// Credentials embedded in the URL, if any.
    #[must_use]
    pub fn basic_auth(&self) -> Option<(String, String)> {
        if self.url.username().is_empty() {
            return None;
        }
        Some((
            self.url.username().to_string(),
            self.url.password().unwrap_or_default().to_string(),
        ))
    }
}

impl fmt::Display for ProxyEndpoint {
    // Never print credentials.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme(), self.authority())
    }
}

/// How a connection reaches the exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Direct,
    Proxy(ProxyEndpoint),
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Direct => write!(f, "direct"),
            Route::Proxy(proxy) => write!(f, "proxy {proxy}"),
        }
    }
}

/// An open, message-oriented connection.
#[async_trait]
pub trait FrameTransport: Send {
    /// Send one frame.
    async fn send(&mut self, frame: Frame) -> Result<()>;

    /// Next inbound frame. `None` means the peer closed the stream.
    async fn recv(&mut self) -> Option<Result<Frame>>;

    /// Best-effort close.
    async fn close(&mut self);
}

/// Opens WebSocket connections.
#[async_trait]
pub trait Dialer: Send + Sync {
    /// Connect to `url` over `route`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::Handshake`] when the exchange refuses
    /// the upgrade with a blocking status, or a transport error otherwise.
    async fn dial(&self, url: &str, route: &Route) -> Result<Box<dyn FrameTransport>>;

    /// Returns `Err(reason)` if this dialer cannot tunnel through `proxy`.
    fn supports_proxy(&self, proxy: &ProxyEndpoint) -> std::result::Result<(), String>;
}

/// Minimal HTTP client used for REST polling and endpoint bootstrap.
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    /// GET `url` and return the body of a 2xx response.
    async fn get(&self, url: &str, route: &Route) -> Result<String>;

    /// POST an empty body to `url` and return the body of a 2xx response.
    async fn post(&self, url: &str, route: &Route) -> Result<String>;

    /// Returns `Err(reason)` if requests cannot be sent through `proxy`.
    fn supports_proxy(&self, proxy: &ProxyEndpoint) -> std::result::Result<(), String>;
}
