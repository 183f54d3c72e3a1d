//! Reactive detection engine.
//!
//! Consumes the price cache's change notifications and runs the detectors
//! for each changed (exchange, symbol). Opportunities go out on a bounded
//! channel.
//!
//! Both queues are bounded. When the engine falls behind the cache, the
//! broadcast channel drops the oldest notifications and the engine logs how
//! many were lost. When the consumer falls behind the engine, new events
//! are dropped and counted.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

use super::cache::PriceCache;
use super::detector::{
    detect_cross_exchange, detect_triangular, discover_chains, FeeSchedule, Thresholds,
};
use crate::domain::{ArbitrageChain, ExchangeId, OpportunityEvent, QuoteKey, Symbol};
use crate::error::Result;
use crate::infrastructure::config::{DetectionConfig, Settings};

/// Engine throughput counters.
#[derive(Debug, Default)]
pub struct EngineCounters {
    notifications: AtomicU64,
    notifications_dropped: AtomicU64,
    emitted: AtomicU64,
    events_dropped: AtomicU64,
}

/// Point-in-time copy of [`EngineCounters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineStatistics {
    pub notifications: u64,
    pub notifications_dropped: u64,
    pub emitted: u64,
    pub events_dropped: u64,
}

impl EngineCounters {
    #[must_use]
    pub fn snapshot(&self) -> EngineStatistics {
        EngineStatistics {
            notifications: self.notifications.load(Ordering::Relaxed),
            notifications_dropped: self.notifications_dropped.load(Ordering::Relaxed),
            emitted: self.emitted.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Detection engine over a shared [`PriceCache`].
pub struct DetectionEngine {
    cache: Arc<PriceCache>,
    fees: FeeSchedule,
    thresholds: Thresholds,
    cross_exchange: bool,
    triangular: bool,
    chains: Vec<ArbitrageChain>,
    /// Chains touched by each (exchange, symbol), as indexes into `chains`.
    chain_index: HashMap<QuoteKey, Vec<usize>>,
    tx: mpsc::Sender<OpportunityEvent>,
    counters: Arc<EngineCounters>,
}

impl DetectionEngine {
    /// Create an engine and the receiver its opportunities arrive on.
    #[must_use]
    pub fn new(
        cache: Arc<PriceCache>,
        config: &DetectionConfig,
        fees: FeeSchedule,
        chains: Vec<ArbitrageChain>,
    ) -> (Self, mpsc::Receiver<OpportunityEvent>) {
        let (tx, rx) = mpsc::channel(config.opportunity_capacity.max(1));

        let mut chain_index: HashMap<QuoteKey, Vec<usize>> = HashMap::new();
        for (i, chain) in chains.iter().enumerate() {
            for leg in chain.legs() {
                let key = QuoteKey::new(chain.exchange().clone(), leg.symbol.clone());
                let entry = chain_index.entry(key).or_default();
                if !entry.contains(&i) {
                    entry.push(i);
                }
            }
        }

        let engine = Self {
            cache,
            fees,
            thresholds: Thresholds {
                min_profit_pct: config.min_profit_pct,
                max_quote_age_ms: i64::try_from(config.max_quote_age_ms).unwrap_or(i64::MAX),
                max_leg_skew_ms: i64::try_from(config.max_leg_skew_ms).unwrap_or(i64::MAX),
            },
            cross_exchange: config.cross_exchange,
            triangular: config.triangular,
            chains,
            chain_index,
            tx,
            counters: Arc::new(EngineCounters::default()),
        };
        (engine, rx)
    }

    /// Engine wired from settings: taker fees of every enabled exchange,
    /// configured chains, and discovered chains when `auto_discover` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured chain is invalid.
    pub fn from_settings(
        settings: &Settings,
        cache: Arc<PriceCache>,
    ) -> Result<(Self, mpsc::Receiver<OpportunityEvent>)> {
        let chains = chains_from_settings(settings)?;
        let fees = FeeSchedule::from(settings.taker_fees());
        Ok(Self::new(cache, &settings.detection, fees, chains))
    }

    #[must_use]
    pub fn chains(&self) -> &[ArbitrageChain] {
        &self.chains
    }

    #[must_use]
    pub fn counters(&self) -> Arc<EngineCounters> {
        Arc::clone(&self.counters)
    }

    /// Run every enabled detector for a change of `key` at `now`.
    #[must_use]
    pub fn evaluate(&self, key: &QuoteKey, now: DateTime<Utc>) -> Vec<OpportunityEvent> {
        let mut events = Vec::new();

        if self.cross_exchange {
            if let Some(changed) = self.cache.get(key) {
                let others = self.cache.quotes_for_symbol(&key.symbol);
                events.extend(
                    detect_cross_exchange(&changed, &others, &self.fees, &self.thresholds, now)
                        .into_iter()
                        .map(OpportunityEvent::CrossExchange),
                );
            }
        }

        if self.triangular {
            let fee = self.fees.fee(&key.exchange);
            for &i in self.chain_index.get(key).map(Vec::as_slice).unwrap_or_default() {
                let chain = &self.chains[i];
                let symbols: Vec<Symbol> = chain.legs().iter().map(|leg| leg.symbol.clone()).collect();
                let quotes = self.cache.quotes_on(chain.exchange(), &symbols);
                if let Some(opportunity) = detect_triangular(chain, &quotes, fee, &self.thresholds, now) {
                    events.push(OpportunityEvent::Triangular(opportunity));
                }
            }
        }

        events
    }

    /// Process notifications until shutdown or until the cache is gone.
    pub async fn run(
        self,
        mut notifications: broadcast::Receiver<QuoteKey>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(chains = self.chains.len(), "Detection engine started");

        loop {
            let received = tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut shutdown) => break,
                received = notifications.recv() => received,
            };

            match received {
                Ok(key) => {
                    self.counters.notifications.fetch_add(1, Ordering::Relaxed);
                    for event in self.evaluate(&key, Utc::now()) {
                        if !self.emit(event) {
                            info!("Opportunity receiver closed, stopping engine");
                            return;
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    self.counters
                        .notifications_dropped
                        .fetch_add(skipped, Ordering::Relaxed);
                    warn!(dropped = skipped, "Detection engine fell behind, oldest notifications dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }

        info!("Detection engine stopped");
    }

    /// Returns false once the receiver is gone.
    fn emit(&self, event: OpportunityEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => {
                self.counters.emitted.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(mpsc::error::TrySendError::Full(event)) => {
                let dropped = self.counters.events_dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(key = %event.key(), dropped, "Opportunity queue full, event dropped");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            // Sender dropped without signalling; keep running.
            std::future::pending::<()>().await;
        }
    }
}

/// Configured chains plus, with `auto_discover`, chains discovered from each
/// enabled exchange's symbols. Duplicates are removed.
///
/// # Errors
///
/// Returns an error if a configured chain is invalid.
pub fn chains_from_settings(settings: &Settings) -> Result<Vec<ArbitrageChain>> {
    let mut chains = settings.configured_chains()?;

    if settings.triangular.auto_discover {
        for id in settings.enabled_exchanges() {
            let symbols = exchange_symbols(settings, &id);
            for chain in discover_chains(
                &id,
                &symbols,
                &settings.triangular.anchors,
                &settings.triangular.intermediates,
            ) {
                if !chains.contains(&chain) {
                    chains.push(chain);
                }
            }
        }
    }

    debug!(chains = chains.len(), "Triangular chains resolved");
    Ok(chains)
}

fn exchange_symbols(settings: &Settings, id: &ExchangeId) -> Vec<Symbol> {
    settings
        .exchanges
        .get(id)
        .and_then(|ex| ex.symbols.clone())
        .unwrap_or_else(|| settings.symbols.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Leg, QuoteUpdate, Side};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn quote(exchange: &str, symbol: &str, bid: Decimal, ask: Decimal, seq: u64) -> crate::domain::Quote {
        QuoteUpdate::both(symbol.parse().unwrap(), bid, ask).into_quote(
            ExchangeId::new(exchange),
            seq,
            Utc::now(),
        )
    }

    fn config() -> DetectionConfig {
        DetectionConfig {
            min_profit_pct: dec!(0.1),
            opportunity_capacity: 2,
            ..DetectionConfig::default()
        }
    }

    #[test]
    fn test_cross_exchange_evaluation() {
        let cache = Arc::new(PriceCache::new());
        let fees = FeeSchedule::new(Decimal::ZERO)
            .with_fee(ExchangeId::new("binance"), dec!(0.00075))
            .with_fee(ExchangeId::new("okx"), dec!(0.0016));
        let (engine, _rx) = DetectionEngine::new(Arc::clone(&cache), &config(), fees, Vec::new());

        cache.update(quote("binance", "BTC/USDT", dec!(99.9), dec!(100), 1));
        cache.update(quote("okx", "BTC/USDT", dec!(100.5), dec!(100.6), 1));

        let key = QuoteKey::new(ExchangeId::new("okx"), "BTC/USDT".parse().unwrap());
        let events = engine.evaluate(&key, Utc::now());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].net_profit_pct(), dec!(0.2642));
    }

    #[test]
    fn test_triangular_runs_only_for_chain_symbols() {
        let cache = Arc::new(PriceCache::new());
        let chain = ArbitrageChain::new(
            ExchangeId::new("okx"),
            vec![
                Leg::new("AAA/BBB".parse().unwrap(), Side::Sell),
                Leg::new("BBB/CCC".parse().unwrap(), Side::Sell),
                Leg::new("CCC/AAA".parse().unwrap(), Side::Sell),
            ],
        )
        .unwrap();
        let (engine, _rx) =
            DetectionEngine::new(Arc::clone(&cache), &config(), FeeSchedule::default(), vec![chain]);

        cache.update(quote("okx", "AAA/BBB", dec!(1.01), dec!(1.02), 1));
        cache.update(quote("okx", "BBB/CCC", dec!(0.995), dec!(0.996), 2));
        cache.update(quote("okx", "CCC/AAA", dec!(1.002), dec!(1.003), 3));

        let leg_key = QuoteKey::new(ExchangeId::new("okx"), "BBB/CCC".parse().unwrap());
        let events = engine.evaluate(&leg_key, Utc::now());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].net_profit_pct(), dec!(0.69599));

        let elsewhere = QuoteKey::new(ExchangeId::new("binance"), "BBB/CCC".parse().unwrap());
        assert!(engine.evaluate(&elsewhere, Utc::now()).is_empty());
    }

    #[test]
    fn test_full_queue_drops_and_counts() {
        let cache = Arc::new(PriceCache::new());
        let (engine, _rx) =
            DetectionEngine::new(Arc::clone(&cache), &config(), FeeSchedule::default(), Vec::new());

        cache.update(quote("binance", "BTC/USDT", dec!(99.9), dec!(100), 1));
        cache.update(quote("okx", "BTC/USDT", dec!(100.5), dec!(100.6), 1));
        let key = QuoteKey::new(ExchangeId::new("okx"), "BTC/USDT".parse().unwrap());

        for _ in 0..3 {
            for event in engine.evaluate(&key, Utc::now()) {
                assert!(engine.emit(event));
            }
        }
        let stats = engine.counters().snapshot();
        assert_eq!(stats.emitted, 2);
        assert_eq!(stats.events_dropped, 1);
    }

    #[test]
    fn test_chains_from_settings_merges_discovered() {
        let settings = Settings::parse_toml(
            r#"
            symbols = ["BTC/USDT", "ETH/USDT", "ETH/BTC"]
            [exchanges.binance]
            [triangular]
            auto_discover = true
            [[triangular.chains]]
            exchange = "binance"
            legs = [
                { symbol = "BTC/USDT", side = "buy" },
                { symbol = "ETH/BTC", side = "buy" },
                { symbol = "ETH/USDT", side = "sell" },
            ]
            "#,
        )
        .unwrap();

        let chains = chains_from_settings(&settings).unwrap();
        assert_eq!(chains.len(), 2);
    }
}
