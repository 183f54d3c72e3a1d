//! Connector lifecycle tests over scripted transports.
//!
//! Every test drives a real connector with a real exchange adapter against
//! a `ScriptedDialer` / `ScriptedFetcher`, so no network is touched.

mod support;

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use arbwatch::adapter::ExchangeKind;
use arbwatch::domain::{ConnectionStatus, ExchangeCounters};
use arbwatch::infrastructure::config::{ExchangeConfig, HeartbeatConfig, ReconnectionConfig};
use arbwatch::infrastructure::transport::{RestConnector, WebSocketConnector};
use arbwatch::port::{Connector, Credentials, Frame, ProxyEndpoint, Route};
use arbwatch::testkit::config::{exchange, reconnection, tuning};
use arbwatch::testkit::connector::RecordingSink;
use arbwatch::testkit::domain::symbol;
use arbwatch::testkit::transport::{
    DialOutcome, FetchOutcome, ScriptStep, ScriptedDialer, ScriptedFetcher,
};
use flate2::write::GzEncoder;
use flate2::Compression;
use rust_decimal_macros::dec;
use url::Url;

use support::frames;
use support::{context, wait_until, within};

const PATIENCE: Duration = Duration::from_secs(2);

fn binance() -> ExchangeConfig {
    exchange(ExchangeKind::Binance, vec![symbol("BTC/USDT")])
}

fn websocket(
    config: ExchangeConfig,
    dialer: &Arc<ScriptedDialer>,
    fetcher: &Arc<ScriptedFetcher>,
    proxies: Vec<ProxyEndpoint>,
) -> Box<WebSocketConnector> {
    let adapter = config.kind.adapter(&config.symbols);
    Box::new(WebSocketConnector::new(
        config,
        adapter,
        dialer.clone(),
        fetcher.clone(),
        tuning(),
        proxies,
    ))
}

/// Status history as a list of target states.
fn path(counters: &ExchangeCounters) -> Vec<ConnectionStatus> {
    counters.transitions().into_iter().map(|t| t.to).collect()
}

fn contains_run(path: &[ConnectionStatus], run: &[ConnectionStatus]) -> bool {
    path.windows(run.len()).any(|w| w == run)
}

#[tokio::test]
async fn test_subscribes_and_publishes_quotes() {
    let dialer = Arc::new(ScriptedDialer::new().with_outcomes(vec![DialOutcome::Connect(vec![
        ScriptStep::text(frames::subscribe_ack()),
        ScriptStep::text(frames::book_ticker("BTCUSDT", "100.1", "100.2")),
        ScriptStep::Hold,
    ])]));
    let fetcher = Arc::new(ScriptedFetcher::new());
    let sink = Arc::new(RecordingSink::new());
    let (ctx, shutdown) = context("binance", sink.clone());
    let counters = ctx.counters.clone();

    let task = tokio::spawn(websocket(binance(), &dialer, &fetcher, vec![]).run(ctx));

    assert!(wait_until(PATIENCE, || sink.len() == 1).await);
    assert_eq!(counters.status(), ConnectionStatus::Live);

    let quote = &sink.quotes()[0];
    assert_eq!(quote.exchange.as_str(), "binance");
    assert_eq!(quote.symbol, symbol("BTC/USDT"));
    assert_eq!(quote.bid, Some(dec!(100.1)));
    assert_eq!(quote.ask, Some(dec!(100.2)));
    assert_eq!(quote.sequence, 1);

    match &dialer.sent()[0] {
        Frame::Text(text) => {
            assert!(text.contains("SUBSCRIBE"));
            assert!(text.contains("btcusdt@bookTicker"));
        }
        other => panic!("expected subscribe text, got {other:?}"),
    }

    shutdown.send(true).unwrap();
    within(PATIENCE, task).await.unwrap();

    let stats = counters.snapshot();
    assert_eq!(stats.status, ConnectionStatus::Disconnected);
    assert_eq!(stats.message_count, 2);
    assert_eq!(stats.error_count, 0);
    assert_eq!(stats.reconnect_count, 0);
    assert_eq!(dialer.dial_count(), 1);
    assert_eq!(dialer.closed_count(), 1);
    assert_eq!(
        path(&counters),
        vec![
            ConnectionStatus::Connecting,
            ConnectionStatus::Subscribing,
            ConnectionStatus::Live,
            ConnectionStatus::Disconnected,
        ]
    );
}

#[tokio::test]
async fn test_decode_error_ratio_forces_reconnect() {
    let dialer = Arc::new(ScriptedDialer::new().with_outcomes(vec![
        DialOutcome::Connect(vec![
            ScriptStep::text(frames::subscribe_ack()),
            ScriptStep::text(frames::garbage()),
            ScriptStep::text(frames::garbage()),
            ScriptStep::text(frames::garbage()),
            ScriptStep::Hold,
        ]),
        DialOutcome::Connect(vec![
            ScriptStep::text(frames::subscribe_ack()),
            ScriptStep::Hold,
        ]),
    ]));
    let fetcher = Arc::new(ScriptedFetcher::new());
    let (ctx, shutdown) = context("binance", Arc::new(RecordingSink::new()));
    let counters = ctx.counters.clone();

    let task = tokio::spawn(websocket(binance(), &dialer, &fetcher, vec![]).run(ctx));

    assert!(wait_until(PATIENCE, || dialer.dial_count() == 2
        && counters.status() == ConnectionStatus::Live)
    .await);

    let stats = counters.snapshot();
    assert_eq!(stats.error_count, 3);
    assert_eq!(stats.reconnect_count, 1);
    assert!(contains_run(
        &path(&counters),
        &[
            ConnectionStatus::Live,
            ConnectionStatus::Backoff,
            ConnectionStatus::Connecting,
        ]
    ));

    shutdown.send(true).unwrap();
    within(PATIENCE, task).await.unwrap();
}

#[tokio::test]
async fn test_handshake_rejection_rotates_to_proxy() {
    let dialer = Arc::new(ScriptedDialer::new().with_outcomes(vec![
        DialOutcome::Reject(403),
        DialOutcome::Connect(vec![
            ScriptStep::text(frames::subscribe_ack()),
            ScriptStep::text(frames::book_ticker("BTCUSDT", "100", "101")),
            ScriptStep::Hold,
        ]),
    ]));
    let fetcher = Arc::new(ScriptedFetcher::new());
    let sink = Arc::new(RecordingSink::new());
    let (ctx, shutdown) = context("binance", sink.clone());
    let counters = ctx.counters.clone();
    let proxy = ProxyEndpoint::new(Url::parse("http://127.0.0.1:3128").unwrap());

    let task = tokio::spawn(websocket(binance(), &dialer, &fetcher, vec![proxy]).run(ctx));

    assert!(wait_until(PATIENCE, || sink.len() == 1).await);

    let dialed = dialer.dialed();
    assert_eq!(dialed.len(), 2);
    assert_eq!(dialed[0].1, Route::Direct);
    assert!(matches!(dialed[1].1, Route::Proxy(_)));

    let stats = counters.snapshot();
    assert_eq!(stats.status, ConnectionStatus::Live);
    assert_eq!(stats.proxy_index, 1);
    assert_eq!(stats.reconnect_count, 0);

    shutdown.send(true).unwrap();
    within(PATIENCE, task).await.unwrap();
}

#[tokio::test]
async fn test_falls_back_to_rest_when_all_routes_fail() {
    let dialer = Arc::new(ScriptedDialer::new());
    let fetcher = Arc::new(ScriptedFetcher::new().then(FetchOutcome::Body(
        frames::rest_book_tickers(&[("BTCUSDT", "100", "100.5"), ("ETHUSDT", "5", "6")]),
    )));
    let sink = Arc::new(RecordingSink::new());
    let (ctx, shutdown) = context("binance", sink.clone());
    let counters = ctx.counters.clone();

    let mut config = binance();
    config.rest_fallback = true;
    let task = tokio::spawn(websocket(config, &dialer, &fetcher, vec![]).run(ctx));

    assert!(wait_until(PATIENCE, || !sink.is_empty()).await);
    assert!(path(&counters).contains(&ConnectionStatus::Live));

    let quote = &sink.quotes()[0];
    assert_eq!(quote.symbol, symbol("BTC/USDT"));
    assert_eq!(quote.bid, Some(dec!(100)));
    assert_eq!(quote.ask, Some(dec!(100.5)));
    assert!(fetcher.calls()[0].0.contains("bookTicker"));

    // The WebSocket is probed again once the fallback window closes.
    assert!(wait_until(PATIENCE, || dialer.dial_count() >= 2).await);

    shutdown.send(true).unwrap();
    within(PATIENCE, task).await.unwrap();
    assert_eq!(counters.status(), ConnectionStatus::Disconnected);
}

#[tokio::test]
async fn test_without_fallback_keeps_backing_off() {
    let dialer = Arc::new(ScriptedDialer::new());
    let fetcher = Arc::new(ScriptedFetcher::new());
    let (ctx, shutdown) = context("binance", Arc::new(RecordingSink::new()));
    let counters = ctx.counters.clone();

    let task = tokio::spawn(websocket(binance(), &dialer, &fetcher, vec![]).run(ctx));

    assert!(wait_until(PATIENCE, || dialer.dial_count() >= 3).await);
    assert!(fetcher.calls().is_empty());
    assert!(counters.snapshot().reconnect_count >= 2);
    assert!(path(&counters).contains(&ConnectionStatus::Backoff));
    assert!(!path(&counters).contains(&ConnectionStatus::Live));

    shutdown.send(true).unwrap();
    within(PATIENCE, task).await.unwrap();
    assert_eq!(counters.status(), ConnectionStatus::Disconnected);
}

#[tokio::test]
async fn test_missing_pong_forces_reconnect() {
    let dialer = Arc::new(ScriptedDialer::new().with_outcomes(vec![DialOutcome::Connect(vec![
        ScriptStep::text(frames::subscribe_ack()),
        ScriptStep::Hold,
    ])]));
    let fetcher = Arc::new(ScriptedFetcher::new());
    let (ctx, shutdown) = context("binance", Arc::new(RecordingSink::new()));
    let counters = ctx.counters.clone();

    let config = binance();
    let adapter = config.kind.adapter(&config.symbols);
    let mut tuning = tuning();
    tuning.heartbeat = HeartbeatConfig {
        ping_interval_ms: 20,
        pong_timeout_ms: 30,
        read_timeout_ms: 60_000,
    };
    let connector = Box::new(WebSocketConnector::new(
        config,
        adapter,
        dialer.clone(),
        fetcher.clone(),
        tuning,
        vec![],
    ));
    let task = tokio::spawn(connector.run(ctx));

    assert!(wait_until(PATIENCE, || dialer.dial_count() >= 2).await);
    assert!(dialer.sent().iter().any(|f| matches!(f, Frame::Ping(_))));
    assert!(contains_run(
        &path(&counters),
        &[ConnectionStatus::Live, ConnectionStatus::Backoff]
    ));

    shutdown.send(true).unwrap();
    within(PATIENCE, task).await.unwrap();
}

#[tokio::test]
async fn test_answers_transport_ping() {
    let dialer = Arc::new(ScriptedDialer::new().with_outcomes(vec![DialOutcome::Connect(vec![
        ScriptStep::text(frames::subscribe_ack()),
        ScriptStep::Frame(Frame::Ping(vec![7])),
        ScriptStep::Hold,
    ])]));
    let fetcher = Arc::new(ScriptedFetcher::new());
    let (ctx, shutdown) = context("binance", Arc::new(RecordingSink::new()));

    let task = tokio::spawn(websocket(binance(), &dialer, &fetcher, vec![]).run(ctx));

    assert!(wait_until(PATIENCE, || dialer
        .sent()
        .iter()
        .any(|f| *f == Frame::Pong(vec![7])))
    .await);

    shutdown.send(true).unwrap();
    within(PATIENCE, task).await.unwrap();
}

#[tokio::test]
async fn test_peer_close_reconnects() {
    let dialer = Arc::new(ScriptedDialer::new().with_outcomes(vec![
        DialOutcome::Connect(vec![
            ScriptStep::text(frames::subscribe_ack()),
            ScriptStep::Delay(Duration::from_millis(10)),
            ScriptStep::End,
        ]),
        DialOutcome::Connect(vec![
            ScriptStep::text(frames::subscribe_ack()),
            ScriptStep::text(frames::book_ticker("BTCUSDT", "99", "100")),
            ScriptStep::Hold,
        ]),
    ]));
    let fetcher = Arc::new(ScriptedFetcher::new());
    let sink = Arc::new(RecordingSink::new());
    let (ctx, shutdown) = context("binance", sink.clone());
    let counters = ctx.counters.clone();

    let task = tokio::spawn(websocket(binance(), &dialer, &fetcher, vec![]).run(ctx));

    assert!(wait_until(PATIENCE, || sink.len() == 1).await);
    assert_eq!(counters.snapshot().reconnect_count, 1);
    assert_eq!(dialer.closed_count(), 1);

    shutdown.send(true).unwrap();
    within(PATIENCE, task).await.unwrap();
    assert_eq!(dialer.closed_count(), 2);
}

fn okx_with_login() -> ExchangeConfig {
    let mut config = exchange(ExchangeKind::Okx, vec![symbol("BTC/USDT")]);
    config.credentials = Some(Credentials {
        api_key: "key".into(),
        api_secret: "secret".into(),
        passphrase: Some("phrase".into()),
    });
    config
}

#[tokio::test]
async fn test_login_precedes_subscription() {
    let dialer = Arc::new(ScriptedDialer::new().with_outcomes(vec![DialOutcome::Connect(vec![
        ScriptStep::text(r#"{"event":"login","code":"0","msg":"","connId":"a4d3ae55"}"#),
        ScriptStep::text(r#"{"event":"subscribe","arg":{"channel":"tickers","instId":"BTC-USDT"},"connId":"a4d3ae55"}"#),
        ScriptStep::Hold,
    ])]));
    let fetcher = Arc::new(ScriptedFetcher::new());
    let (ctx, shutdown) = context("okx", Arc::new(RecordingSink::new()));
    let counters = ctx.counters.clone();

    let task = tokio::spawn(websocket(okx_with_login(), &dialer, &fetcher, vec![]).run(ctx));

    assert!(wait_until(PATIENCE, || counters.status() == ConnectionStatus::Live).await);
    assert!(contains_run(
        &path(&counters),
        &[
            ConnectionStatus::Connecting,
            ConnectionStatus::Authenticating,
            ConnectionStatus::Subscribing,
            ConnectionStatus::Live,
        ]
    ));

    let sent = dialer.sent();
    assert!(matches!(&sent[0], Frame::Text(t) if t.contains(r#""op":"login""#)));
    assert!(matches!(&sent[1], Frame::Text(t) if t.contains(r#""op":"subscribe""#)));

    shutdown.send(true).unwrap();
    within(PATIENCE, task).await.unwrap();
}

#[tokio::test]
async fn test_rejected_login_backs_off_without_subscribing() {
    let dialer = Arc::new(ScriptedDialer::new().with_outcomes(vec![DialOutcome::Connect(vec![
        ScriptStep::text(r#"{"event":"error","code":"60009","msg":"Login failed."}"#),
        ScriptStep::Hold,
    ])]));
    let fetcher = Arc::new(ScriptedFetcher::new());
    let (ctx, shutdown) = context("okx", Arc::new(RecordingSink::new()));
    let counters = ctx.counters.clone();

    let task = tokio::spawn(websocket(okx_with_login(), &dialer, &fetcher, vec![]).run(ctx));

    assert!(wait_until(PATIENCE, || dialer.dial_count() >= 2).await);
    let history = path(&counters);
    assert!(contains_run(
        &history,
        &[ConnectionStatus::Authenticating, ConnectionStatus::Backoff]
    ));
    assert!(!history.contains(&ConnectionStatus::Subscribing));
    assert_eq!(counters.error_count(), 1);
    assert_eq!(dialer.sent().len(), 1);

    shutdown.send(true).unwrap();
    within(PATIENCE, task).await.unwrap();
}

#[tokio::test]
async fn test_rest_connector_recovers_from_failed_poll() {
    let config = exchange(ExchangeKind::Mexc, vec![symbol("BTC/USDT")]);
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .with_outcomes(vec![FetchOutcome::Fail("connection reset".into())])
            .then(FetchOutcome::Body(frames::rest_book_tickers(&[(
                "BTCUSDT", "64000", "64001",
            )]))),
    );
    let sink = Arc::new(RecordingSink::new());
    let (ctx, shutdown) = context("mexc", sink.clone());
    let counters = ctx.counters.clone();

    let adapter = config.kind.adapter(&config.symbols);
    let connector = Box::new(RestConnector::new(
        &config,
        adapter,
        fetcher.clone(),
        &[],
        reconnection(),
    ));
    let task = tokio::spawn(connector.run(ctx));

    assert!(wait_until(PATIENCE, || !sink.is_empty()).await);
    assert_eq!(counters.status(), ConnectionStatus::Live);

    let quote = &sink.quotes()[0];
    assert_eq!(quote.exchange.as_str(), "mexc");
    assert_eq!(quote.bid, Some(dec!(64000)));
    assert!(fetcher.calls().len() >= 2);

    shutdown.send(true).unwrap();
    within(PATIENCE, task).await.unwrap();
    assert_eq!(counters.status(), ConnectionStatus::Disconnected);
}

#[tokio::test]
async fn test_rejected_pair_does_not_block_the_others() {
    let config = exchange(
        ExchangeKind::Kraken,
        vec![symbol("DOGE/USDT"), symbol("BTC/USDT")],
    );
    let dialer = Arc::new(ScriptedDialer::new().with_outcomes(vec![DialOutcome::Connect(vec![
        ScriptStep::text(
            r#"{"event":"subscriptionStatus","pair":"XDG/USDT","status":"error","errorMessage":"Currency pair not supported XDG/USDT"}"#,
        ),
        ScriptStep::text(
            r#"{"channelID":340,"event":"subscriptionStatus","pair":"XBT/USDT","status":"subscribed","subscription":{"name":"ticker"}}"#,
        ),
        ScriptStep::text(
            r#"[340,{"a":["64012.10000",0,"0.1"],"b":["64011.90000",1,"1.0"]},"ticker","XBT/USDT"]"#,
        ),
        ScriptStep::Hold,
    ])]));
    let fetcher = Arc::new(ScriptedFetcher::new());
    let sink = Arc::new(RecordingSink::new());
    let (ctx, shutdown) = context("kraken", sink.clone());
    let counters = ctx.counters.clone();

    let task = tokio::spawn(websocket(config, &dialer, &fetcher, vec![]).run(ctx));

    assert!(wait_until(PATIENCE, || sink.len() == 1).await);
    assert_eq!(sink.quotes()[0].symbol, symbol("BTC/USDT"));
    assert_eq!(sink.quotes()[0].bid, Some(dec!(64011.9)));

    let stats = counters.snapshot();
    assert_eq!(stats.status, ConnectionStatus::Live);
    assert_eq!(stats.error_count, 1);
    assert_eq!(stats.reconnect_count, 0);
    assert_eq!(dialer.dial_count(), 1);

    shutdown.send(true).unwrap();
    within(PATIENCE, task).await.unwrap();
}

#[tokio::test]
async fn test_rejections_over_error_ratio_end_subscription() {
    let config = exchange(ExchangeKind::Kraken, vec![symbol("BTC/USDT")]);
    let rejection =
        r#"{"event":"subscriptionStatus","pair":"XBT/USDT","status":"error","errorMessage":"Subscription depth not supported"}"#;
    let dialer = Arc::new(ScriptedDialer::new().with_outcomes(vec![DialOutcome::Connect(vec![
        ScriptStep::text(rejection),
        ScriptStep::text(rejection),
        ScriptStep::text(rejection),
        ScriptStep::text(rejection),
        ScriptStep::Hold,
    ])]));
    let fetcher = Arc::new(ScriptedFetcher::new());
    let (ctx, shutdown) = context("kraken", Arc::new(RecordingSink::new()));
    let counters = ctx.counters.clone();

    let task = tokio::spawn(websocket(config, &dialer, &fetcher, vec![]).run(ctx));

    // Well inside the one-second subscribe deadline.
    assert!(wait_until(Duration::from_millis(500), || dialer.dial_count() >= 2).await);
    assert_eq!(counters.error_count(), 4);
    assert!(contains_run(
        &path(&counters),
        &[ConnectionStatus::Subscribing, ConnectionStatus::Backoff]
    ));
    assert!(!path(&counters).contains(&ConnectionStatus::Live));

    shutdown.send(true).unwrap();
    within(PATIENCE, task).await.unwrap();
}

#[tokio::test]
async fn test_breaker_allows_a_full_run_after_each_cooldown() {
    let dialer = Arc::new(ScriptedDialer::new());
    let fetcher = Arc::new(ScriptedFetcher::new());
    let (ctx, shutdown) = context("binance", Arc::new(RecordingSink::new()));
    let counters = ctx.counters.clone();

    let config = binance();
    let adapter = config.kind.adapter(&config.symbols);
    let mut tuning = tuning();
    tuning.reconnection = ReconnectionConfig {
        max_consecutive_failures: 2,
        circuit_breaker_cooldown_ms: 300,
        ..reconnection()
    };
    let connector = Box::new(WebSocketConnector::new(
        config,
        adapter,
        dialer.clone(),
        fetcher.clone(),
        tuning,
        vec![],
    ));
    let task = tokio::spawn(connector.run(ctx));

    // Two failures trip the breaker; nothing is dialed during the cooldown.
    assert!(wait_until(PATIENCE, || dialer.dial_count() == 2).await);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(dialer.dial_count(), 2);

    // Each cooldown is followed by another two attempts, not one.
    for cooldown in 1..=2 {
        let first = 2 * cooldown + 1;
        assert!(wait_until(PATIENCE, || dialer.dial_count() >= first).await);
        assert!(
            wait_until(Duration::from_millis(150), || dialer.dial_count() >= first + 1).await,
            "only one attempt after cooldown {cooldown}"
        );
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(dialer.dial_count(), first + 1);
    }
    assert_eq!(counters.status(), ConnectionStatus::Backoff);

    shutdown.send(true).unwrap();
    within(PATIENCE, task).await.unwrap();
}

fn gzip(text: &str) -> Frame {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(text.as_bytes()).unwrap();
    Frame::Binary(encoder.finish().unwrap())
}

#[tokio::test]
async fn test_compressed_feed_answers_ping_and_publishes() {
    let config = exchange(ExchangeKind::Huobi, vec![symbol("BTC/USDT")]);
    let dialer = Arc::new(ScriptedDialer::new().with_outcomes(vec![DialOutcome::Connect(vec![
        ScriptStep::Frame(gzip(r#"{"ping":1492420473027}"#)),
        ScriptStep::Frame(gzip(
            r#"{"id":"bbo_btcusdt","status":"ok","subbed":"market.btcusdt.bbo","ts":1492420473027}"#,
        )),
        ScriptStep::Frame(gzip(
            r#"{"ch":"market.btcusdt.bbo","ts":1,"tick":{"seqId":1,"ask":47119.5,"askSize":0.11,"bid":47119.49,"bidSize":0.8,"symbol":"btcusdt"}}"#,
        )),
        ScriptStep::Hold,
    ])]));
    let fetcher = Arc::new(ScriptedFetcher::new());
    let sink = Arc::new(RecordingSink::new());
    let (ctx, shutdown) = context("huobi", sink.clone());
    let counters = ctx.counters.clone();

    let task = tokio::spawn(websocket(config, &dialer, &fetcher, vec![]).run(ctx));

    assert!(wait_until(PATIENCE, || sink.len() == 1).await);
    let quote = &sink.quotes()[0];
    assert_eq!(quote.bid, Some(dec!(47119.49)));
    assert_eq!(quote.ask, Some(dec!(47119.5)));
    assert_eq!(counters.status(), ConnectionStatus::Live);
    assert_eq!(counters.error_count(), 0);

    let sent = dialer.sent();
    assert!(matches!(&sent[0], Frame::Text(t) if t.contains("market.btcusdt.bbo")));
    assert!(sent
        .iter()
        .any(|f| *f == Frame::Text(r#"{"pong":1492420473027}"#.to_string())));

    shutdown.send(true).unwrap();
    within(PATIENCE, task).await.unwrap();
}
