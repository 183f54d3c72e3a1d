//! WebSocket connector.
//!
//! Drives one exchange through `Connecting → Authenticating → Subscribing →
//! Live`, recovering from every transport failure with backoff:
//!
//! 1. **Connect**: direct first, then each proxy in the rotation. The cursor
//!    only moves when a route fails.
//! 2. **Authenticate** (optional): send the signed login and wait for the ack.
//! 3. **Subscribe**: send the subscription requests; the exchange's ack, or
//!    the first data frame where the exchange never acks, confirms `Live`.
//! 4. **Live**: decode frames, answer heartbeats, ping on an interval and
//!    watch for silence.
//!
//! When every route has failed and the exchange has a ticker endpoint, the
//! connector polls REST for `fallback_retry` before probing WebSocket again.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use super::backoff::Backoff;
use super::error_window::RollingErrorWindow;
use super::preview;
use super::proxy::ProxyRotation;
use super::rest::{PollEnd, RestPoller};
use crate::domain::{ConnectionStatus, ExchangeId};
use crate::error::{ConfigError, DecodeError, Error, Result};
use crate::infrastructure::config::{ConnectionTuning, ExchangeConfig};
use crate::port::{
    Connector, ConnectorContext, DecodedFrame, Dialer, Frame, FrameTransport, HttpFetcher,
    HttpMethod, PingMessage, ProtocolAdapter, ProxyEndpoint, Route,
};

/// Result of one pass over the route rotation.
enum Cycle {
    Connected(Box<dyn FrameTransport>),
    Exhausted { handshake: bool },
    Shutdown,
}

/// Why a connected session ended.
enum SessionEnd {
    Shutdown,
    Failed {
        error: Error,
        /// Time spent `Live`, if the session got that far.
        live_for: Option<Duration>,
    },
}

/// What one inbound frame amounted to.
enum Inbound {
    Decoded(DecodedFrame),
    /// Control traffic or a frame that failed to decode.
    Nothing,
    Rejected(DecodeError),
}

/// Result of waiting for the next frame.
enum Step {
    Inbound(Inbound),
    /// The caller's deadline passed first.
    Deadline,
    Shutdown,
}

enum Wait {
    Frame(Frame),
    Shutdown,
    Deadline,
    Closed(Option<Error>),
}

/// An open connection and its per-session bookkeeping.
struct Link<'a> {
    transport: &'a mut dyn FrameTransport,
    errors: &'a mut RollingErrorWindow,
    last_frame: Instant,
}

/// Connector for exchanges with a WebSocket feed.
pub struct WebSocketConnector {
    config: ExchangeConfig,
    adapter: Arc<dyn ProtocolAdapter>,
    dialer: Arc<dyn Dialer>,
    fetcher: Arc<dyn HttpFetcher>,
    tuning: ConnectionTuning,
    proxies: Vec<ProxyEndpoint>,
}

impl WebSocketConnector {
    pub fn new(
        config: ExchangeConfig,
        adapter: Arc<dyn ProtocolAdapter>,
        dialer: Arc<dyn Dialer>,
        fetcher: Arc<dyn HttpFetcher>,
        tuning: ConnectionTuning,
        proxies: Vec<ProxyEndpoint>,
    ) -> Self {
        Self {
            config,
            adapter,
            dialer,
            fetcher,
            tuning,
            proxies,
        }
    }

    fn exchange_id(&self) -> &ExchangeId {
        &self.config.id
    }

    fn rest_poller(&self) -> RestPoller {
        RestPoller::new(
            self.config.id.clone(),
            Arc::clone(&self.adapter),
            Arc::clone(&self.fetcher),
            self.config.rest_url.clone(),
            self.config.symbols.clone(),
            self.config.poll_interval,
            &self.proxies,
            self.config.prefer_proxy,
            self.tuning.reconnection.clone(),
        )
    }

    async fn drive(&self, ctx: &mut ConnectorContext) {
        let mut rotation = ProxyRotation::new(
            self.exchange_id(),
            &self.proxies,
            self.config.prefer_proxy,
            |p| self.dialer.supports_proxy(p),
        );
        let mut backoff = Backoff::new(self.tuning.reconnection.clone());
        let mut errors = RollingErrorWindow::new(&self.tuning.decode_errors);
        let mut fallback = if self.config.rest_fallback {
            Some(self.rest_poller()).filter(RestPoller::is_supported)
        } else {
            None
        };
        let mut first_attempt = true;

        loop {
            if ctx.is_shutdown() {
                return;
            }

            if let Some(remaining) = blocked_for(&mut backoff) {
                warn!(
                    exchange = %self.exchange_id(),
                    remaining_secs = remaining.as_secs(),
                    "Circuit breaker open, waiting for cooldown"
                );
                ctx.set_status(ConnectionStatus::Backoff);
                if !pause(ctx, remaining).await {
                    return;
                }
                // Re-check so the expired breaker closes and the backoff resets.
                continue;
            }

            if !first_attempt {
                ctx.counters.record_reconnect();
            }
            first_attempt = false;
            ctx.set_status(ConnectionStatus::Connecting);

            let delay = match self.connect_cycle(ctx, &mut rotation).await {
                Cycle::Shutdown => return,
                Cycle::Connected(transport) => {
                    errors.clear();
                    match self.session(ctx, transport, &mut errors).await {
                        SessionEnd::Shutdown => return,
                        SessionEnd::Failed { error, live_for } => {
                            warn!(exchange = %self.exchange_id(), error = %error, "Connection lost, will reconnect");
                            if live_for.is_some_and(|d| backoff.reset_if_stable(d)) {
                                debug!(exchange = %self.exchange_id(), "Connection was stable, backoff reset");
                            }
                            backoff.record_failure();
                            if error.is_handshake() {
                                backoff.handshake_delay()
                            } else {
                                backoff.next_delay()
                            }
                        }
                    }
                }
                Cycle::Exhausted { handshake } => {
                    if let Some(poller) = fallback.as_mut() {
                        warn!(
                            exchange = %self.exchange_id(),
                            retry_secs = self.config.fallback_retry.as_secs(),
                            "All routes failed, falling back to REST polling"
                        );
                        let until = Instant::now() + self.config.fallback_retry;
                        if poller.run(ctx, Some(until)).await == PollEnd::Shutdown {
                            return;
                        }
                        info!(exchange = %self.exchange_id(), "Probing WebSocket again");
                        rotation.rewind();
                        ctx.counters.set_proxy_index(rotation.index());
                        continue;
                    }
                    backoff.record_failure();
                    if handshake {
                        backoff.handshake_delay()
                    } else {
                        backoff.next_delay()
                    }
                }
            };

            ctx.set_status(ConnectionStatus::Backoff);
            info!(
                exchange = %self.exchange_id(),
                delay_ms = delay.as_millis() as u64,
                attempt = backoff.consecutive_failures() + 1,
                "Reconnecting after delay"
            );
            if !pause(ctx, delay).await {
                return;
            }
        }
    }

    /// Try every route once, starting from the current cursor.
    async fn connect_cycle(&self, ctx: &mut ConnectorContext, rotation: &mut ProxyRotation) -> Cycle {
        let mut handshake = false;

        for _ in 0..rotation.len() {
            let route = rotation.current().clone();
            let attempt = async {
                let endpoint = self.endpoint(&route).await?;
                debug!(exchange = %self.exchange_id(), route = %route, url = %endpoint, "Dialing");
                self.dialer.dial(&endpoint, &route).await
            };

            let result = tokio::select! {
                _ = ctx.shutdown_requested() => return Cycle::Shutdown,
                result = tokio::time::timeout(self.tuning.timeouts.connect(), attempt) => result,
            };

            match result {
                Ok(Ok(transport)) => {
                    info!(exchange = %self.exchange_id(), route = %route, "Connected");
                    return Cycle::Connected(transport);
                }
                Ok(Err(e)) => {
                    handshake |= e.is_handshake();
                    warn!(exchange = %self.exchange_id(), route = %route, error = %e, "Connect failed");
                }
                Err(_) => {
                    warn!(exchange = %self.exchange_id(), route = %route, "Connect timed out");
                }
            }

            rotation.advance();
            ctx.counters.set_proxy_index(rotation.index());
        }

        Cycle::Exhausted { handshake }
    }

    /// WebSocket URL for this attempt, running the bootstrap request if the
    /// exchange needs one.
    async fn endpoint(&self, route: &Route) -> Result<String> {
        let Some(request) = self.adapter.bootstrap() else {
            return self
                .config
                .ws_url
                .clone()
                .ok_or_else(|| ConfigError::MissingField { field: "ws_url" }.into());
        };

        let url = format!("{}{}", self.config.rest_url.trim_end_matches('/'), request.path);
        let body = match request.method {
            HttpMethod::Get => self.fetcher.get(&url, route).await?,
            HttpMethod::Post => self.fetcher.post(&url, route).await?,
        };
        Ok(self.adapter.endpoint_from_bootstrap(&body)?)
    }

    async fn session(
        &self,
        ctx: &mut ConnectorContext,
        mut transport: Box<dyn FrameTransport>,
        errors: &mut RollingErrorWindow,
    ) -> SessionEnd {
        let end = self.run_session(ctx, transport.as_mut(), errors).await;
        transport.close().await;
        end
    }

    async fn run_session(
        &self,
        ctx: &mut ConnectorContext,
        transport: &mut dyn FrameTransport,
        errors: &mut RollingErrorWindow,
    ) -> SessionEnd {
        let failed = |error: Error| SessionEnd::Failed {
            error,
            live_for: None,
        };
        let mut link = Link {
            transport,
            errors,
            last_frame: Instant::now(),
        };

        if let Some(credentials) = &self.config.credentials {
            ctx.set_status(ConnectionStatus::Authenticating);
            let login = match self.adapter.encode_auth(credentials, Utc::now()) {
                Ok(login) => login,
                Err(e) => return failed(e),
            };
            if let Some(login) = login {
                if let Err(e) = link.transport.send(Frame::Text(login)).await {
                    return failed(e);
                }
                let deadline = Instant::now() + self.tuning.timeouts.auth();
                loop {
                    match self.next_inbound(ctx, &mut link, deadline).await {
                        Ok(Step::Inbound(Inbound::Decoded(DecodedFrame::AuthAck))) => break,
                        Ok(Step::Inbound(Inbound::Decoded(DecodedFrame::Quotes(updates)))) => {
                            for update in updates {
                                ctx.publish(update);
                            }
                        }
                        Ok(Step::Inbound(Inbound::Rejected(e))) => return failed(e.into()),
                        Ok(Step::Inbound(_)) => {}
                        Ok(Step::Deadline) => return failed(Error::Timeout("login ack")),
                        Ok(Step::Shutdown) => return SessionEnd::Shutdown,
                        Err(e) => return failed(e),
                    }
                }
                info!(exchange = %self.exchange_id(), "Authenticated");
            }
        }

        ctx.set_status(ConnectionStatus::Subscribing);
        for request in self.adapter.encode_subscribe(&self.config.symbols) {
            if let Err(e) = link.transport.send(Frame::Text(request)).await {
                return failed(e);
            }
        }
        let acks = self.adapter.acks_subscriptions();
        let deadline = Instant::now() + self.tuning.timeouts.subscribe();
        loop {
            let step = match self.next_inbound(ctx, &mut link, deadline).await {
                Ok(step) => step,
                Err(e) => return failed(e),
            };
            match step {
                Step::Inbound(Inbound::Decoded(DecodedFrame::SubscribeAck)) if acks => break,
                Step::Inbound(Inbound::Decoded(DecodedFrame::Quotes(updates))) => {
                    let confirmed = !updates.is_empty();
                    for update in updates {
                        ctx.publish(update);
                    }
                    if confirmed {
                        break;
                    }
                }
                // One refused symbol must not keep the others from going live.
                Step::Inbound(Inbound::Rejected(e)) => {
                    debug!(exchange = %self.exchange_id(), error = %e, "Waiting for remaining subscriptions");
                }
                Step::Inbound(_) => {}
                Step::Deadline => return failed(Error::Timeout("subscription ack")),
                Step::Shutdown => return SessionEnd::Shutdown,
            }
            if link.errors.exceeded() {
                return failed(ratio_exceeded(link.errors));
            }
        }

        ctx.set_status(ConnectionStatus::Live);
        let live_since = Instant::now();
        match self.live(ctx, &mut link).await {
            Ok(()) => SessionEnd::Shutdown,
            Err(error) => SessionEnd::Failed {
                error,
                live_for: Some(live_since.elapsed()),
            },
        }
    }

    /// The live loop. Returns `Ok(())` on shutdown.
    async fn live(&self, ctx: &mut ConnectorContext, link: &mut Link<'_>) -> Result<()> {
        let heartbeat = &self.tuning.heartbeat;
        let mut next_ping = Instant::now() + heartbeat.ping_interval();
        let mut pong_deadline: Option<Instant> = None;

        loop {
            let deadline = match pong_deadline {
                Some(pong) => next_ping.min(pong),
                None => next_ping,
            };

            match self.next_inbound(ctx, link, deadline).await? {
                Step::Inbound(inbound) => {
                    if let Inbound::Decoded(decoded) = inbound {
                        match decoded {
                            DecodedFrame::Quotes(updates) => {
                                for update in updates {
                                    ctx.publish(update);
                                }
                            }
                            DecodedFrame::Heartbeat { .. } => pong_deadline = None,
                            DecodedFrame::SubscribeAck
                            | DecodedFrame::AuthAck
                            | DecodedFrame::Unrecognized => {}
                        }
                    }
                    if link.errors.exceeded() {
                        return Err(ratio_exceeded(link.errors));
                    }
                }
                Step::Shutdown => return Ok(()),
                Step::Deadline => {
                    let now = Instant::now();
                    if pong_deadline.is_some_and(|pong| now >= pong) {
                        return Err(Error::Timeout("pong"));
                    }
                    if now >= next_ping {
                        let ping = match self.adapter.encode_ping(Utc::now()) {
                            PingMessage::Frame => Frame::Ping(Vec::new()),
                            PingMessage::Text(text) => Frame::Text(text),
                        };
                        link.transport.send(ping).await?;
                        next_ping = now + heartbeat.ping_interval();
                        if pong_deadline.is_none() {
                            pong_deadline = Some(now + heartbeat.pong_timeout());
                        }
                    }
                }
            }
        }
    }

    /// Wait for one frame and account for it.
    ///
    /// Silence past the read timeout, a peer close or a transport error are
    /// returned as errors.
    async fn next_inbound(
        &self,
        ctx: &mut ConnectorContext,
        link: &mut Link<'_>,
        deadline: Instant,
    ) -> Result<Step> {
        let read_deadline = link.last_frame + self.tuning.heartbeat.read_timeout();
        let wait = tokio::select! {
            _ = ctx.shutdown_requested() => Wait::Shutdown,
            frame = link.transport.recv() => match frame {
                Some(Ok(frame)) => Wait::Frame(frame),
                Some(Err(e)) => Wait::Closed(Some(e)),
                None => Wait::Closed(None),
            },
            _ = sleep_until(deadline.min(read_deadline)) => Wait::Deadline,
        };

        let frame = match wait {
            Wait::Frame(frame) => frame,
            Wait::Shutdown => return Ok(Step::Shutdown),
            Wait::Closed(Some(e)) => return Err(e),
            Wait::Closed(None) => return Err(Error::Transport("stream ended".into())),
            Wait::Deadline if Instant::now() >= read_deadline => {
                return Err(Error::Timeout("inbound frame"));
            }
            Wait::Deadline => return Ok(Step::Deadline),
        };

        link.last_frame = Instant::now();
        ctx.counters.record_message();
        let (decoded, raw) = match frame {
            Frame::Text(text) => (self.adapter.decode_frame(&text), preview(&text).to_string()),
            Frame::Binary(bytes) => (
                self.adapter.decode_binary(&bytes),
                format!("<{} binary bytes>", bytes.len()),
            ),
            Frame::Ping(payload) => {
                link.transport.send(Frame::Pong(payload)).await?;
                return Ok(Step::Inbound(Inbound::Nothing));
            }
            Frame::Pong(_) => {
                return Ok(Step::Inbound(Inbound::Decoded(DecodedFrame::Heartbeat {
                    reply: None,
                })));
            }
            Frame::Close => return Err(Error::Transport("closed by peer".into())),
        };

        let now = std::time::Instant::now();
        let inbound = match decoded {
            Ok(frame) => {
                link.errors.record(true, now);
                if let DecodedFrame::Heartbeat { reply: Some(reply) } = &frame {
                    link.transport.send(Frame::Text(reply.clone())).await?;
                }
                Inbound::Decoded(frame)
            }
            Err(DecodeError::Rejected(reason)) => {
                ctx.counters.record_error();
                link.errors.record(false, now);
                warn!(exchange = %self.exchange_id(), reason = %reason, raw = %raw, "Exchange rejected request");
                Inbound::Rejected(DecodeError::Rejected(reason))
            }
            Err(e) => {
                ctx.counters.record_error();
                link.errors.record(false, now);
                warn!(exchange = %self.exchange_id(), error = %e, raw = %raw, "Failed to decode frame");
                Inbound::Nothing
            }
        };
        Ok(Step::Inbound(inbound))
    }
}

fn ratio_exceeded(errors: &RollingErrorWindow) -> Error {
    Error::Transport(format!(
        "decode error ratio {:.2} over threshold",
        errors.ratio()
    ))
}

/// Remaining cooldown if the circuit breaker is open.
fn blocked_for(backoff: &mut Backoff) -> Option<Duration> {
    if backoff.circuit_allows_connection() {
        None
    } else {
        backoff.circuit_remaining()
    }
}

/// Sleep unless shutdown arrives first. Returns false on shutdown.
async fn pause(ctx: &mut ConnectorContext, delay: Duration) -> bool {
    tokio::select! {
        _ = ctx.shutdown_requested() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    fn exchange(&self) -> &ExchangeId {
        &self.config.id
    }

    async fn run(self: Box<Self>, mut ctx: ConnectorContext) {
        info!(exchange = %self.config.id, symbols = self.config.symbols.len(), "Starting WebSocket connector");
        self.drive(&mut ctx).await;
        ctx.set_status(ConnectionStatus::Disconnected);
        info!(exchange = %self.config.id, "Connector stopped");
    }
}
