//! Connector factory.
//!
//! Turns [`Settings`] into one connector per exchange: a
//! [`WebSocketConnector`] for streaming exchanges, a [`RestConnector`] for
//! REST-only ones.

use std::sync::Arc;

use crate::domain::ExchangeId;
use crate::error::Result;
use crate::infrastructure::config::{Settings, TransportKind};
use crate::infrastructure::manager::ConnectorFactory;
use crate::infrastructure::transport::{
    ReqwestFetcher, RestConnector, TungsteniteDialer, WebSocketConnector,
};
use crate::port::{Connector, Dialer, HttpFetcher, ProxyEndpoint};

/// Builds connectors from settings.
pub struct ExchangeConnectorFactory {
    settings: Arc<Settings>,
    dialer: Arc<dyn Dialer>,
    fetcher: Arc<dyn HttpFetcher>,
    proxies: Vec<ProxyEndpoint>,
}

impl ExchangeConnectorFactory {
    /// # Errors
    ///
    /// Returns an error if a proxy URL does not parse.
    pub fn new(
        settings: Arc<Settings>,
        dialer: Arc<dyn Dialer>,
        fetcher: Arc<dyn HttpFetcher>,
    ) -> Result<Self> {
        let proxies = settings.proxy.endpoints()?;
        Ok(Self {
            settings,
            dialer,
            fetcher,
            proxies,
        })
    }

    /// Factory backed by real sockets.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or a proxy URL
    /// does not parse.
    pub fn with_network(settings: Arc<Settings>) -> Result<Self> {
        let fetcher = ReqwestFetcher::new(settings.timeouts.connect())?;
        Self::new(settings, Arc::new(TungsteniteDialer::new()), Arc::new(fetcher))
    }

    /// Build the connector for `id`.
    ///
    /// # Errors
    ///
    /// Returns the configuration error that keeps this exchange from running.
    pub fn build(&self, id: &ExchangeId) -> Result<Box<dyn Connector>> {
        let config = self.settings.exchange_config(id)?;
        let adapter = config.kind.adapter(&config.symbols);

        let connector: Box<dyn Connector> = match config.transport {
            TransportKind::WebSocket => Box::new(WebSocketConnector::new(
                config,
                adapter,
                Arc::clone(&self.dialer),
                Arc::clone(&self.fetcher),
                self.settings.tuning(),
                self.proxies.clone(),
            )),
            TransportKind::Rest => Box::new(RestConnector::new(
                &config,
                adapter,
                Arc::clone(&self.fetcher),
                &self.proxies,
                self.settings.reconnection.clone(),
            )),
        };
        Ok(connector)
    }

    /// Wrap into the closure the connection manager calls.
    #[must_use]
    pub fn into_factory(self) -> ConnectorFactory {
        let this = Arc::new(self);
        Arc::new(move |id: &ExchangeId| this.build(id))
    }
}
