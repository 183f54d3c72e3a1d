//! REST polling: the connector for REST-only exchanges and the degraded
//! mode a WebSocket connector falls back to.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::backoff::Backoff;
use super::preview;
use super::proxy::ProxyRotation;
use crate::domain::{ConnectionStatus, ExchangeId, Symbol};
use crate::infrastructure::config::{ExchangeConfig, ReconnectionConfig};
use crate::port::{Connector, ConnectorContext, HttpFetcher, ProtocolAdapter, ProxyEndpoint};

/// How a polling run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PollEnd {
    Shutdown,
    /// The time budget given to a fallback run elapsed.
    Expired,
    /// The adapter has no ticker endpoint.
    Unsupported,
}

/// Polls an exchange's ticker endpoint.
pub(crate) struct RestPoller {
    exchange: ExchangeId,
    adapter: Arc<dyn ProtocolAdapter>,
    fetcher: Arc<dyn HttpFetcher>,
    rest_url: String,
    symbols: Vec<Symbol>,
    interval: Duration,
    rotation: ProxyRotation,
    backoff: Backoff,
}

impl RestPoller {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        exchange: ExchangeId,
        adapter: Arc<dyn ProtocolAdapter>,
        fetcher: Arc<dyn HttpFetcher>,
        rest_url: String,
        symbols: Vec<Symbol>,
        interval: Duration,
        proxies: &[ProxyEndpoint],
        prefer_proxy: bool,
        reconnection: ReconnectionConfig,
    ) -> Self {
        let rotation =
            ProxyRotation::new(&exchange, proxies, prefer_proxy, |p| fetcher.supports_proxy(p));
        Self {
            exchange,
            adapter,
            fetcher,
            rest_url,
            symbols,
            interval,
            rotation,
            backoff: Backoff::new(reconnection),
        }
    }

    /// Returns true if the adapter exposes a ticker endpoint.
    pub(crate) fn is_supported(&self) -> bool {
        self.adapter
            .rest_poll_url(&self.rest_url, &self.symbols)
            .is_some()
    }

    /// Poll until shutdown or, when `until` is set, until that instant.
    pub(crate) async fn run(&mut self, ctx: &mut ConnectorContext, until: Option<Instant>) -> PollEnd {
        let Some(url) = self.adapter.rest_poll_url(&self.rest_url, &self.symbols) else {
            return PollEnd::Unsupported;
        };

        ctx.set_status(ConnectionStatus::Connecting);
        loop {
            if ctx.is_shutdown() {
                return PollEnd::Shutdown;
            }
            if until.is_some_and(|deadline| Instant::now() >= deadline) {
                return PollEnd::Expired;
            }

            let route = self.rotation.current().clone();
            let result = tokio::select! {
                _ = ctx.shutdown_requested() => return PollEnd::Shutdown,
                result = self.fetcher.get(&url, &route) => result,
            };

            let wait = match result {
                Ok(body) => {
                    ctx.counters.record_message();
                    match self.adapter.decode_rest(&body) {
                        Ok(updates) => {
                            self.backoff.reset();
                            ctx.set_status(ConnectionStatus::Live);
                            debug!(exchange = %self.exchange, quotes = updates.len(), "Polled tickers");
                            for update in updates {
                                ctx.publish(update);
                            }
                        }
                        Err(e) => {
                            ctx.counters.record_error();
                            warn!(
                                exchange = %self.exchange,
                                error = %e,
                                raw = %preview(&body),
                                "Failed to decode ticker response"
                            );
                        }
                    }
                    self.interval
                }
                Err(e) => {
                    warn!(exchange = %self.exchange, route = %route, error = %e, "Ticker poll failed");
                    if e.is_handshake() {
                        self.rotation.advance();
                        ctx.counters.set_proxy_index(self.rotation.index());
                    }
                    self.backoff.record_failure();
                    ctx.set_status(ConnectionStatus::Backoff);
                    self.backoff.next_delay()
                }
            };

            let wake = match until {
                Some(deadline) => (Instant::now() + wait).min(deadline),
                None => Instant::now() + wait,
            };
            tokio::select! {
                _ = ctx.shutdown_requested() => return PollEnd::Shutdown,
                _ = tokio::time::sleep_until(wake) => {}
            }
        }
    }
}

/// Connector for exchanges read over REST only.
pub struct RestConnector {
    exchange: ExchangeId,
    poller: RestPoller,
}

impl RestConnector {
    pub fn new(
        config: &ExchangeConfig,
        adapter: Arc<dyn ProtocolAdapter>,
        fetcher: Arc<dyn HttpFetcher>,
        proxies: &[ProxyEndpoint],
        reconnection: ReconnectionConfig,
    ) -> Self {
        let poller = RestPoller::new(
            config.id.clone(),
            adapter,
            fetcher,
            config.rest_url.clone(),
            config.symbols.clone(),
            config.poll_interval,
            proxies,
            config.prefer_proxy,
            reconnection,
        );
        Self {
            exchange: config.id.clone(),
            poller,
        }
    }
}

#[async_trait]
impl Connector for RestConnector {
    fn exchange(&self) -> &ExchangeId {
        &self.exchange
    }

    async fn run(self: Box<Self>, mut ctx: ConnectorContext) {
        let mut this = *self;
        info!(exchange = %this.exchange, "Starting REST poller");
        if this.poller.run(&mut ctx, None).await == PollEnd::Unsupported {
            warn!(exchange = %this.exchange, "Exchange has no ticker endpoint");
            ctx.set_status(ConnectionStatus::FatalError);
            return;
        }
        ctx.set_status(ConnectionStatus::Disconnected);
    }
}
