//! Connector port: the lifecycle contract the connection manager supervises.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::watch;

use crate::domain::{ConnectionStatus, ExchangeCounters, ExchangeId, Quote, QuoteUpdate};

/// Outcome of offering a quote to a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Accepted,
    /// Sequence not newer than the stored one.
    OutOfOrder { stored: u64, received: u64 },
    /// Merged quote would have `bid > ask`, or a non-positive price.
    Invalid,
}

/// Destination of decoded quotes.
pub trait QuoteSink: Send + Sync {
    fn update(&self, quote: Quote) -> UpdateOutcome;
}

/// Everything a running connector shares with the rest of the process.
#[derive(Clone)]
pub struct ConnectorContext {
    pub exchange: ExchangeId,
    pub counters: Arc<ExchangeCounters>,
    pub sink: Arc<dyn QuoteSink>,
    pub shutdown: watch::Receiver<bool>,
}

impl ConnectorContext {
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Resolves once shutdown has been requested (or the manager is gone).
    pub async fn shutdown_requested(&mut self) {
        while !*self.shutdown.borrow_and_update() {
            if self.shutdown.changed().await.is_err() {
                return;
            }
        }
    }

    pub fn set_status(&self, status: ConnectionStatus) {
        let previous = self.counters.status();
        if previous != status {
            tracing::info!(exchange = %self.exchange, from = %previous, to = %status, "Status change");
        }
        self.counters.set_status(status);
    }

    /// Sequence and publish one decoded update.
    pub fn publish(&self, update: QuoteUpdate) -> UpdateOutcome {
        let sequence = self.counters.next_sequence();
        let quote = update.into_quote(self.exchange.clone(), sequence, Utc::now());
        let outcome = self.sink.update(quote);
        if outcome != UpdateOutcome::Accepted {
            tracing::debug!(exchange = %self.exchange, ?outcome, "Quote not applied");
        }
        outcome
    }
}

/// One exchange's ingestion pipeline.
#[async_trait]
pub trait Connector: Send {
    fn exchange(&self) -> &ExchangeId;

    /// Drive the connection until shutdown is requested. Never returns early
    /// on transport trouble; that is handled internally with backoff.
    async fn run(self: Box<Self>, ctx: ConnectorContext);
}
