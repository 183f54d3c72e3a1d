//! Handler for the `run` command.

use std::sync::Arc;

use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::application::{DetectionEngine, EngineCounters, PriceCache};
use crate::cli::{Cli, RunArgs};
use crate::domain::{Asset, OpportunityEvent};
use crate::error::Result;
use crate::infrastructure::config::Settings;
use crate::infrastructure::{ConnectionManager, ExchangeConnectorFactory};
use crate::port::QuoteSink;

/// Execute the run command.
///
/// Runs until Ctrl-C, then stops every connector and the engine.
pub async fn execute(cli: &Cli, args: &RunArgs) -> Result<()> {
    let mut settings = Settings::load(&cli.config)?;
    if let Some(ref level) = cli.log_level {
        settings.logging.level = level.clone();
    }
    if args.json_logs {
        settings.logging.format = "json".to_string();
    }
    if let Some(min_profit) = args.min_profit {
        settings.detection.min_profit_pct = min_profit;
    }
    settings.logging.init();

    let settings = Arc::new(settings);
    let exchanges = settings.enabled_exchanges();
    info!(
        exchanges = exchanges.len(),
        symbols = settings.symbols.len(),
        min_profit_pct = %settings.detection.min_profit_pct,
        "arbwatch starting"
    );
    if exchanges.is_empty() {
        warn!("No exchanges enabled");
    }

    let (cache, notifications) =
        PriceCache::with_notifications(settings.detection.notification_capacity);
    let cache = Arc::new(cache);
    let (engine, mut opportunities) = DetectionEngine::from_settings(&settings, Arc::clone(&cache))?;
    let engine_counters = engine.counters();

    let factory = ExchangeConnectorFactory::with_network(Arc::clone(&settings))?.into_factory();
    let sink: Arc<dyn QuoteSink> = cache.clone();
    let manager = ConnectionManager::new(factory, sink, settings.timeouts.shutdown_grace());
    manager.start(&exchanges);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let engine_task = tokio::spawn(engine.run(notifications, shutdown_rx));

    let mut stats_tick = tokio::time::interval(settings.stats_interval());
    stats_tick.tick().await;
    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Shutdown signal received");
                break;
            }
            Some(event) = opportunities.recv() => log_opportunity(&event),
            _ = stats_tick.tick() => log_statistics(&manager, &engine_counters, &cache),
        }
    }

    let _ = shutdown_tx.send(true);
    manager.stop_all().await;
    if let Err(e) = engine_task.await {
        warn!(error = %e, "Detection engine task failed");
    }
    log_statistics(&manager, &engine_counters, &cache);
    info!("arbwatch stopped");
    Ok(())
}

fn log_opportunity(event: &OpportunityEvent) {
    match event {
        OpportunityEvent::CrossExchange(o) => info!(
            symbol = %o.symbol,
            buy_exchange = %o.buy_exchange,
            sell_exchange = %o.sell_exchange,
            buy_price = %o.buy_price,
            sell_price = %o.sell_price,
            gross_spread_pct = %o.gross_spread_pct.round_dp(4),
            net_profit_pct = %o.net_profit_pct.round_dp(4),
            "Cross-exchange opportunity"
        ),
        OpportunityEvent::Triangular(o) => {
            let path: Vec<&str> = o.chain.iter().map(Asset::as_str).collect();
            info!(
                exchange = %o.exchange,
                chain = %path.join("->"),
                net_profit_pct = %o.net_profit_pct.round_dp(4),
                "Triangular opportunity"
            );
        }
    }
}

fn log_statistics(manager: &ConnectionManager, engine: &EngineCounters, cache: &PriceCache) {
    for (exchange, stats) in manager.statistics() {
        info!(
            exchange = %exchange,
            status = %stats.status,
            messages = stats.message_count,
            errors = stats.error_count,
            reconnects = stats.reconnect_count,
            proxy_index = stats.proxy_index,
            "Exchange statistics"
        );
    }
    let engine = engine.snapshot();
    info!(
        quotes = cache.len(),
        notifications = engine.notifications,
        notifications_dropped = engine.notifications_dropped,
        opportunities = engine.emitted,
        opportunities_dropped = engine.events_dropped,
        "Detection statistics"
    );
}
