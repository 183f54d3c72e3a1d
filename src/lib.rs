//! Arbwatch - multi-exchange crypto quote ingestion and arbitrage detection.
//!
//! Streams best bid/ask quotes from several spot exchanges over WebSocket
//! (with REST polling as a fallback), keeps the latest quote per exchange
//! and symbol, and reports fee-aware cross-exchange and triangular
//! arbitrage opportunities.
//!
//! # Architecture
//!
//! - **`domain`** - Exchange-agnostic types: symbols, quotes, chains,
//!   opportunities, connection statistics
//! - **`port`** - Trait seams: protocol adapters, connectors, transports
//! - **`adapter`** - One protocol adapter per exchange
//! - **`infrastructure`** - Configuration, connectors and the connection
//!   manager
//! - **`application`** - Price cache, detectors and the detection engine
//! - **`cli`** - `run` and `check-config` commands
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use arbwatch::application::{DetectionEngine, PriceCache};
//! use arbwatch::infrastructure::config::Settings;
//! use arbwatch::infrastructure::{ConnectionManager, ExchangeConnectorFactory};
//!
//! # async fn example() -> arbwatch::error::Result<()> {
//! let settings = Arc::new(Settings::load("config.toml")?);
//! let (cache, notifications) = PriceCache::with_notifications(4096);
//! let cache = Arc::new(cache);
//! let (engine, mut opportunities) = DetectionEngine::from_settings(&settings, cache.clone())?;
//!
//! let factory = ExchangeConnectorFactory::with_network(settings.clone())?.into_factory();
//! let manager = ConnectionManager::new(factory, cache, settings.timeouts.shutdown_grace());
//! manager.start(&settings.enabled_exchanges());
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod application;
pub mod cli;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod port;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
