//! Network implementations of the transport ports.
//!
//! WebSocket connections use `tokio-tungstenite` with rustls; proxied
//! connections go through an HTTP `CONNECT` tunnel. REST calls use `reqwest`
//! with one client per proxy.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{client_async_tls, connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};
use url::Url;

use crate::error::{is_blocking_status, Error, Result};
use crate::port::{Dialer, Frame, FrameTransport, HttpFetcher, ProxyEndpoint, Route};

const MAX_CONNECT_RESPONSE: usize = 8 * 1024;

/// A live tungstenite connection.
struct WsTransport<S> {
    ws: WebSocketStream<MaybeTlsStream<S>>,
}

#[async_trait]
impl<S> FrameTransport for WsTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, frame: Frame) -> Result<()> {
        let message = match frame {
            Frame::Text(text) => Message::Text(text),
            Frame::Binary(bytes) => Message::Binary(bytes),
            Frame::Ping(payload) => Message::Ping(payload),
            Frame::Pong(payload) => Message::Pong(payload),
            Frame::Close => Message::Close(None),
        };
        self.ws.send(message).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<Frame>> {
        loop {
            let frame = match self.ws.next().await? {
                Ok(Message::Text(text)) => Frame::Text(text),
                Ok(Message::Binary(bytes)) => Frame::Binary(bytes),
                Ok(Message::Ping(payload)) => Frame::Ping(payload),
                Ok(Message::Pong(payload)) => Frame::Pong(payload),
                Ok(Message::Close(_)) => Frame::Close,
                Ok(Message::Frame(_)) => continue,
                Err(e) => return Some(Err(e.into())),
            };
            return Some(Ok(frame));
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.ws.close(None).await {
            debug!(error = %e, "WebSocket close failed");
        }
    }
}

/// Dials WebSocket endpoints directly or through HTTP proxies.
#[derive(Debug, Default, Clone)]
pub struct TungsteniteDialer;

impl TungsteniteDialer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Dialer for TungsteniteDialer {
    async fn dial(&self, url: &str, route: &Route) -> Result<Box<dyn FrameTransport>> {
        match route {
            Route::Direct => {
                let (ws, response) = connect_async(url).await?;
                info!(url = %url, status = %response.status(), "WebSocket connected");
                Ok(Box::new(WsTransport { ws }))
            }
            Route::Proxy(proxy) => {
                let target = Url::parse(url)?;
                let stream = http_connect(proxy, &target).await?;
                let (ws, response) = client_async_tls(url, stream).await?;
                info!(url = %url, proxy = %proxy, status = %response.status(), "WebSocket connected");
                Ok(Box::new(WsTransport { ws }))
            }
        }
    }

    fn supports_proxy(&self, proxy: &ProxyEndpoint) -> std::result::Result<(), String> {
        match proxy.scheme() {
            "http" => Ok(()),
            other => Err(format!("{other} proxies cannot tunnel WebSocket connections")),
        }
    }
}

/// Open a TCP tunnel to `target` through an HTTP proxy.
async fn http_connect(proxy: &ProxyEndpoint, target: &Url) -> Result<TcpStream> {
    let host = target
        .host_str()
        .ok_or_else(|| Error::Transport(format!("{target} has no host")))?;
    let port = target.port_or_known_default().unwrap_or(443);

    let mut stream = TcpStream::connect(proxy.authority()).await?;

    let mut request = format!("CONNECT {host}:{port} HTTP/1.1\r\nHost: {host}:{port}\r\n");
    if let Some((user, password)) = proxy.basic_auth() {
        let token = base64::engine::general_purpose::STANDARD.encode(format!("{user}:{password}"));
        request.push_str(&format!("Proxy-Authorization: Basic {token}\r\n"));
    }
    request.push_str("\r\n");
    stream.write_all(request.as_bytes()).await?;

    // Read byte by byte so no tunneled bytes are consumed.
    let mut head = Vec::with_capacity(256);
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        if head.len() >= MAX_CONNECT_RESPONSE {
            return Err(Error::Transport(format!("oversized CONNECT response from {proxy}")));
        }
        if stream.read(&mut byte).await? == 0 {
            return Err(Error::Transport(format!("{proxy} closed during CONNECT")));
        }
        head.push(byte[0]);
    }

    let head = String::from_utf8_lossy(&head);
    let status = head
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse::<u16>().ok())
        .unwrap_or(0);
    match status {
        200 => Ok(stream),
        s if is_blocking_status(s) => Err(Error::Handshake {
            status: s,
            reason: format!("{proxy} refused CONNECT"),
        }),
        s => Err(Error::Transport(format!("{proxy} answered CONNECT with {s}"))),
    }
}

/// `reqwest`-backed HTTP client.
#[derive(Debug)]
pub struct ReqwestFetcher {
    direct: reqwest::Client,
    proxied: DashMap<String, reqwest::Client>,
    timeout: Duration,
}

impl ReqwestFetcher {
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn new(timeout: Duration) -> Result<Self> {
        let direct = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            direct,
            proxied: DashMap::new(),
            timeout,
        })
    }

    fn client_for(&self, route: &Route) -> Result<reqwest::Client> {
        let proxy = match route {
            Route::Direct => return Ok(self.direct.clone()),
            Route::Proxy(proxy) => proxy,
        };
        let key = proxy.url().as_str().to_string();
        if let Some(client) = self.proxied.get(&key) {
            return Ok(client.clone());
        }
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .proxy(reqwest::Proxy::all(proxy.url().as_str())?)
            .build()?;
        self.proxied.insert(key, client.clone());
        Ok(client)
    }

    async fn read(response: reqwest::Response) -> Result<String> {
        let status = response.status();
        if is_blocking_status(status.as_u16()) {
            return Err(Error::Handshake {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("rejected").to_string(),
            });
        }
        if !status.is_success() {
            return Err(Error::Transport(format!(
                "HTTP {status} from {}",
                response.url()
            )));
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn get(&self, url: &str, route: &Route) -> Result<String> {
        let response = self.client_for(route)?.get(url).send().await?;
        Self::read(response).await
    }

    async fn post(&self, url: &str, route: &Route) -> Result<String> {
        let response = self.client_for(route)?.post(url).send().await?;
        Self::read(response).await
    }

    fn supports_proxy(&self, proxy: &ProxyEndpoint) -> std::result::Result<(), String> {
        match proxy.scheme() {
            "http" | "https" => Ok(()),
            other => Err(format!("{other} proxies are not supported for REST")),
        }
    }
}
