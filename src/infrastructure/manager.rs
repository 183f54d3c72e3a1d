//! Connection manager.
//!
//! Supervises one connector task per exchange. The statistics registry is
//! filled for every requested exchange before any task is spawned, so
//! [`ConnectionManager::statistics`] always reports the full set. A failing
//! exchange (bad configuration, panicking task, endless reconnects) never
//! touches another exchange's task or counters.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::domain::{ConnectionStatus, ExchangeCounters, ExchangeId, ExchangeStatistics};
use crate::error::{ConfigError, Result};
use crate::port::{Connector, ConnectorContext, QuoteSink};

/// Builds the connector for one exchange.
///
/// An `Err` disables that exchange only.
pub type ConnectorFactory =
    Arc<dyn Fn(&ExchangeId) -> Result<Box<dyn Connector>> + Send + Sync>;

/// A spawned connector.
struct Running {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Supervisor of all connector tasks.
pub struct ConnectionManager {
    factory: ConnectorFactory,
    sink: Arc<dyn QuoteSink>,
    shutdown_grace: Duration,
    counters: RwLock<BTreeMap<ExchangeId, Arc<ExchangeCounters>>>,
    running: Mutex<HashMap<ExchangeId, Running>>,
}

impl ConnectionManager {
    pub fn new(factory: ConnectorFactory, sink: Arc<dyn QuoteSink>, shutdown_grace: Duration) -> Self {
        Self {
            factory,
            sink,
            shutdown_grace,
            counters: RwLock::new(BTreeMap::new()),
            running: Mutex::new(HashMap::new()),
        }
    }

    /// Start one connector per exchange.
    ///
    /// Counters for every exchange exist before the first task runs.
    /// Exchanges that are already running are left alone.
    pub fn start(&self, exchanges: &[ExchangeId]) {
        {
            let mut counters = self.counters.write();
            for id in exchanges {
                counters
                    .entry(id.clone())
                    .or_insert_with(|| Arc::new(ExchangeCounters::new()));
            }
        }

        for id in exchanges {
            if self.is_running(id) {
                continue;
            }
            self.spawn(id);
        }
    }

    fn spawn(&self, id: &ExchangeId) {
        let Some(counters) = self.counters.read().get(id).cloned() else {
            return;
        };

        let connector = match (self.factory)(id) {
            Ok(connector) => connector,
            Err(e) => {
                counters.set_status(ConnectionStatus::FatalError);
                warn!(exchange = %id, error = %e, "Exchange disabled");
                return;
            }
        };

        let (shutdown, shutdown_rx) = watch::channel(false);
        let ctx = ConnectorContext {
            exchange: id.clone(),
            counters,
            sink: Arc::clone(&self.sink),
            shutdown: shutdown_rx,
        };
        let handle = tokio::spawn(connector.run(ctx));
        info!(exchange = %id, "Connector started");

        self.running
            .lock()
            .insert(id.clone(), Running { shutdown, handle });
    }

    /// Snapshot of every exchange passed to [`start`](Self::start).
    #[must_use]
    pub fn statistics(&self) -> BTreeMap<ExchangeId, ExchangeStatistics> {
        self.counters
            .read()
            .iter()
            .map(|(id, counters)| (id.clone(), counters.snapshot()))
            .collect()
    }

    /// Live counters of one exchange.
    #[must_use]
    pub fn counters(&self, id: &ExchangeId) -> Option<Arc<ExchangeCounters>> {
        self.counters.read().get(id).cloned()
    }

    #[must_use]
    pub fn is_running(&self, id: &ExchangeId) -> bool {
        self.running
            .lock()
            .get(id)
            .is_some_and(|running| !running.handle.is_finished())
    }

    /// Stop one exchange. Returns false if it was not running.
    ///
    /// The connector gets the shutdown grace period to close its transport;
    /// after that the task is aborted.
    pub async fn stop(&self, id: &ExchangeId) -> bool {
        let Some(running) = self.running.lock().remove(id) else {
            return false;
        };
        self.finish(id, running).await;
        true
    }

    /// Stop every exchange concurrently.
    pub async fn stop_all(&self) {
        let drained: Vec<(ExchangeId, Running)> = self.running.lock().drain().collect();
        join_all(
            drained
                .into_iter()
                .map(|(id, running)| async move { self.finish(&id, running).await }),
        )
        .await;
    }

    /// Stop and start one exchange, keeping its counters.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotConfigured`] if the exchange was never started.
    pub async fn restart(&self, id: &ExchangeId) -> Result<()> {
        if !self.counters.read().contains_key(id) {
            return Err(ConfigError::NotConfigured {
                exchange: id.to_string(),
            }
            .into());
        }
        self.stop(id).await;
        if let Some(counters) = self.counters(id) {
            counters.record_reconnect();
        }
        self.spawn(id);
        Ok(())
    }

    async fn finish(&self, id: &ExchangeId, running: Running) {
        let Running { shutdown, mut handle } = running;
        // A send error means the task already ended.
        let _ = shutdown.send(true);

        if tokio::time::timeout(self.shutdown_grace, &mut handle).await.is_err() {
            warn!(exchange = %id, "Connector ignored shutdown, aborting");
            handle.abort();
            if let Some(counters) = self.counters(id) {
                counters.set_status(ConnectionStatus::Disconnected);
            }
        }
        info!(exchange = %id, "Connector stopped");
    }
}
