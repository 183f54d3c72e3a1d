//! Infrastructure configuration modules.

pub mod connection;
pub mod detection;
pub mod exchange;
pub mod logging;
pub mod settings;

pub use connection::{
    ConnectionTuning, DecodeErrorConfig, HeartbeatConfig, ReconnectionConfig, TimeoutConfig,
};
pub use detection::{ChainConfig, DetectionConfig, TriangularConfig};
pub use exchange::{ExchangeConfig, ExchangeSettings, ProxyConfig, TransportKind};
pub use logging::LoggingConfig;
pub use settings::Settings;
