//! Connection manager supervision tests.

mod support;

use std::sync::Arc;
use std::time::Duration;

use arbwatch::domain::{ConnectionStatus, ExchangeId};
use arbwatch::error::{ConfigError, Result};
use arbwatch::infrastructure::{ConnectionManager, ConnectorFactory};
use arbwatch::port::{Connector, ConnectorContext};
use arbwatch::testkit::connector::{MockConnector, NullSink};
use async_trait::async_trait;

use support::{wait_until, within};

const PATIENCE: Duration = Duration::from_secs(2);
const GRACE: Duration = Duration::from_millis(100);

/// Goes `Live` and then panics.
struct PanickingConnector {
    exchange: ExchangeId,
}

#[async_trait]
impl Connector for PanickingConnector {
    fn exchange(&self) -> &ExchangeId {
        &self.exchange
    }

    async fn run(self: Box<Self>, ctx: ConnectorContext) {
        ctx.set_status(ConnectionStatus::Live);
        tokio::time::sleep(Duration::from_millis(5)).await;
        panic!("connector bug");
    }
}

fn factory() -> ConnectorFactory {
    Arc::new(|id: &ExchangeId| -> Result<Box<dyn Connector>> {
        match id.as_str() {
            "broken" => Err(ConfigError::UnknownExchange(id.to_string()).into()),
            "stubborn" => Ok(Box::new(MockConnector::new(id.clone()).ignoring_shutdown())),
            "panicky" => Ok(Box::new(PanickingConnector {
                exchange: id.clone(),
            })),
            _ => Ok(Box::new(MockConnector::new(id.clone()))),
        }
    })
}

fn manager() -> ConnectionManager {
    ConnectionManager::new(factory(), Arc::new(NullSink), GRACE)
}

fn ids(names: &[&str]) -> Vec<ExchangeId> {
    names.iter().map(|n| ExchangeId::new(*n)).collect()
}

fn messages(manager: &ConnectionManager, id: &ExchangeId) -> u64 {
    manager.counters(id).map_or(0, |c| c.message_count())
}

#[tokio::test]
async fn test_statistics_cover_every_exchange_immediately() {
    let manager = manager();
    let ids = ids(&["binance", "bybit", "okx"]);
    manager.start(&ids);

    let stats = manager.statistics();
    assert_eq!(stats.len(), 3);
    for id in &ids {
        let s = &stats[id];
        assert_eq!(s.message_count, 0);
        assert_eq!(s.error_count, 0);
        assert_eq!(s.reconnect_count, 0);
        assert!(s.last_message_at.is_none());
    }

    manager.stop_all().await;
}

#[tokio::test]
async fn test_restart_leaves_other_exchanges_running() {
    let manager = manager();
    let ids = ids(&["binance", "bybit"]);
    let (a, b) = (&ids[0], &ids[1]);
    manager.start(&ids);

    assert!(wait_until(PATIENCE, || messages(&manager, b) > 0).await);
    manager.restart(a).await.unwrap();
    let before = messages(&manager, b);

    assert!(wait_until(PATIENCE, || messages(&manager, b) > before).await);
    let stats = manager.statistics();
    assert_eq!(stats[b].status, ConnectionStatus::Live);
    assert_eq!(stats[b].reconnect_count, 0);
    assert_eq!(stats[a].reconnect_count, 1);
    assert!(manager.is_running(a));
    assert!(wait_until(PATIENCE, || manager
        .counters(a)
        .is_some_and(|c| c.status() == ConnectionStatus::Live))
    .await);

    manager.stop_all().await;
    for (_, s) in manager.statistics() {
        assert_eq!(s.status, ConnectionStatus::Disconnected);
    }
}

#[tokio::test]
async fn test_stubborn_connector_is_aborted_after_grace() {
    let manager = manager();
    let ids = ids(&["stubborn", "binance"]);
    manager.start(&ids);
    assert!(wait_until(PATIENCE, || messages(&manager, &ids[0]) > 0).await);

    assert!(within(PATIENCE, manager.stop(&ids[0])).await);
    assert!(!manager.is_running(&ids[0]));
    assert_eq!(
        manager.counters(&ids[0]).unwrap().status(),
        ConnectionStatus::Disconnected
    );

    // The stubborn task no longer counts messages.
    let frozen = messages(&manager, &ids[0]);
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(messages(&manager, &ids[0]), frozen);
    assert!(manager.is_running(&ids[1]));

    manager.stop_all().await;
}

#[tokio::test]
async fn test_failures_stay_isolated() {
    let manager = manager();
    let ids = ids(&["broken", "panicky", "binance"]);
    manager.start(&ids);

    assert!(wait_until(PATIENCE, || !manager.is_running(&ids[1])).await);
    let before = messages(&manager, &ids[2]);
    assert!(wait_until(PATIENCE, || messages(&manager, &ids[2]) > before).await);

    let stats = manager.statistics();
    assert_eq!(stats[&ids[0]].status, ConnectionStatus::FatalError);
    assert_eq!(stats[&ids[2]].status, ConnectionStatus::Live);
    assert!(manager.is_running(&ids[2]));

    // A disabled exchange can be retried without touching the others.
    manager.restart(&ids[0]).await.unwrap();
    assert!(!manager.is_running(&ids[0]));
    assert!(manager.is_running(&ids[2]));

    manager.stop_all().await;
}

#[tokio::test]
async fn test_start_twice_keeps_one_task() {
    let manager = manager();
    let ids = ids(&["binance"]);
    manager.start(&ids);
    manager.start(&ids);

    assert!(wait_until(PATIENCE, || messages(&manager, &ids[0]) > 0).await);
    assert_eq!(manager.statistics().len(), 1);
    assert!(manager.stop(&ids[0]).await);
    assert!(!manager.stop(&ids[0]).await);
}
