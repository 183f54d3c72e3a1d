//! Mock connectors and quote sinks.
//!
//! - [`MockConnector`] - Goes `Live` and counts a message every tick until
//!   shutdown. Can be told to ignore shutdown, to exercise the manager's
//!   abort path.
//! - [`ChannelConnector`] - Publishes updates pushed through a
//!   [`ChannelConnectorHandle`].
//! - [`NullSink`] / [`RecordingSink`] - Quote sinks that accept everything.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::domain::{ConnectionStatus, ExchangeId, Quote, QuoteUpdate};
use crate::port::{Connector, ConnectorContext, QuoteSink, UpdateOutcome};

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Accepts and forgets every quote.
pub struct NullSink;

impl QuoteSink for NullSink {
    fn update(&self, _quote: Quote) -> UpdateOutcome {
        UpdateOutcome::Accepted
    }
}

/// Accepts and keeps every quote.
#[derive(Default)]
pub struct RecordingSink {
    quotes: Mutex<Vec<Quote>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn quotes(&self) -> Vec<Quote> {
        self.quotes.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.quotes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl QuoteSink for RecordingSink {
    fn update(&self, quote: Quote) -> UpdateOutcome {
        self.quotes.lock().push(quote);
        UpdateOutcome::Accepted
    }
}

// ---------------------------------------------------------------------------
// MockConnector
// ---------------------------------------------------------------------------

/// A connector that is `Live` immediately and counts one message per tick.
pub struct MockConnector {
    exchange: ExchangeId,
    tick: Duration,
    ignore_shutdown: bool,
}

impl MockConnector {
    pub fn new(exchange: ExchangeId) -> Self {
        Self {
            exchange,
            tick: Duration::from_millis(5),
            ignore_shutdown: false,
        }
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Keep running after shutdown is requested.
    pub fn ignoring_shutdown(mut self) -> Self {
        self.ignore_shutdown = true;
        self
    }
}

#[async_trait]
impl Connector for MockConnector {
    fn exchange(&self) -> &ExchangeId {
        &self.exchange
    }

    async fn run(self: Box<Self>, mut ctx: ConnectorContext) {
        ctx.set_status(ConnectionStatus::Live);
        loop {
            if self.ignore_shutdown {
                tokio::time::sleep(self.tick).await;
            } else {
                tokio::select! {
                    _ = ctx.shutdown_requested() => break,
                    _ = tokio::time::sleep(self.tick) => {}
                }
            }
            ctx.counters.record_message();
        }
        ctx.set_status(ConnectionStatus::Disconnected);
    }
}

// ---------------------------------------------------------------------------
// ChannelConnector
// ---------------------------------------------------------------------------

/// A connector fed by its [`ChannelConnectorHandle`].
pub struct ChannelConnector {
    exchange: ExchangeId,
    rx: mpsc::Receiver<QuoteUpdate>,
}

/// Control handle for a [`ChannelConnector`].
#[derive(Clone)]
pub struct ChannelConnectorHandle {
    tx: mpsc::Sender<QuoteUpdate>,
}

impl ChannelConnectorHandle {
    /// Push one update; the connector counts a message and publishes it.
    pub async fn send(&self, update: QuoteUpdate) {
        let _ = self.tx.send(update).await;
    }
}

/// Create a [`ChannelConnector`] and its control handle.
pub fn channel_connector(exchange: ExchangeId, buffer: usize) -> (ChannelConnector, ChannelConnectorHandle) {
    let (tx, rx) = mpsc::channel(buffer);
    (ChannelConnector { exchange, rx }, ChannelConnectorHandle { tx })
}

#[async_trait]
impl Connector for ChannelConnector {
    fn exchange(&self) -> &ExchangeId {
        &self.exchange
    }

    async fn run(self: Box<Self>, mut ctx: ConnectorContext) {
        let mut this = *self;
        ctx.set_status(ConnectionStatus::Live);
        loop {
            tokio::select! {
                _ = ctx.shutdown_requested() => break,
                update = this.rx.recv() => match update {
                    Some(update) => {
                        ctx.counters.record_message();
                        ctx.publish(update);
                    }
                    None => break,
                },
            }
        }
        ctx.set_status(ConnectionStatus::Disconnected);
    }
}
