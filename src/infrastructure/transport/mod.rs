//! Connectors and the network plumbing beneath them.
//!
//! - [`websocket`] - WebSocket connector with auth, subscribe, heartbeat and REST fallback
//! - [`rest`] - REST polling connector
//! - [`proxy`] - Route rotation over direct and proxied connections
//! - [`backoff`] - Reconnect delays and circuit breaker
//! - [`error_window`] - Rolling decode-failure ratio
//! - [`net`] - tungstenite and reqwest implementations of the transport ports

pub mod backoff;
pub mod error_window;
pub mod net;
pub mod proxy;
pub mod rest;
pub mod websocket;

pub use backoff::Backoff;
pub use error_window::RollingErrorWindow;
pub use net::{ReqwestFetcher, TungsteniteDialer};
pub use proxy::ProxyRotation;
pub use rest::RestConnector;
pub use websocket::WebSocketConnector;

/// Longest raw-frame excerpt written to the log.
const RAW_PREVIEW_CHARS: usize = 256;

/// Truncate a raw frame for logging, on a char boundary.
pub(crate) fn preview(raw: &str) -> &str {
    match raw.char_indices().nth(RAW_PREVIEW_CHARS) {
        Some((end, _)) => &raw[..end],
        None => raw,
    }
}
