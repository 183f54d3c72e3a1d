//! Infrastructure layer.
//!
//! - [`config`] - TOML settings and logging
//! - [`transport`] - WebSocket and REST connectors
//! - [`manager`] - Per-exchange connector supervision
//! - [`factory`] - Connectors built from settings

pub mod config;
pub mod factory;
pub mod manager;
pub mod transport;

pub use factory::ExchangeConnectorFactory;
pub use manager::{ConnectionManager, ConnectorFactory};
