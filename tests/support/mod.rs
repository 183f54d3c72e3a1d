#![allow(dead_code)]

pub mod frames;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use arbwatch::domain::{ExchangeCounters, ExchangeId};
use arbwatch::port::{ConnectorContext, QuoteSink};
use tokio::sync::watch;

/// Context for driving a connector directly, plus its shutdown switch.
pub fn context(exchange: &str, sink: Arc<dyn QuoteSink>) -> (ConnectorContext, watch::Sender<bool>) {
    let (tx, rx) = watch::channel(false);
    let ctx = ConnectorContext {
        exchange: ExchangeId::new(exchange),
        counters: Arc::new(ExchangeCounters::new()),
        sink,
        shutdown: rx,
    };
    (ctx, tx)
}

/// Poll `condition` every 5 ms until it holds or `within` elapses.
pub async fn wait_until<F>(within: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + within;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// Await `future`, failing the test if it takes longer than `within`.
pub async fn within<F: Future>(within: Duration, future: F) -> F::Output {
    tokio::time::timeout(within, future)
        .await
        .expect("timed out")
}
