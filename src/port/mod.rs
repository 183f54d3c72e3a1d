//! Trait seams between the domain and the outside world.
//!
//! - [`adapter`] - Exchange wire formats
//! - [`connector`] - Connector lifecycle and quote sink
//! - [`transport`] - WebSocket and HTTP seams

pub mod adapter;
pub mod connector;
pub mod transport;

pub use adapter::{
    BootstrapRequest, Credentials, DecodedFrame, HttpMethod, PingMessage, ProtocolAdapter,
};
pub use connector::{Connector, ConnectorContext, QuoteSink, UpdateOutcome};
pub use transport::{Dialer, Frame, FrameTransport, HttpFetcher, ProxyEndpoint, Route};
