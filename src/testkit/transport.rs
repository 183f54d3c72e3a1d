//! Scripted network seams.
//!
//! - [`ScriptedDialer`] - Each `dial()` pops the next [`DialOutcome`]. A
//!   connected outcome carries the script its [`ScriptedTransport`] plays.
//! - [`ScriptedTransport`] - Plays [`ScriptStep`]s from `recv()` and records
//!   every frame the connector sends.
//! - [`ScriptedFetcher`] - Each `get()`/`post()` pops the next [`FetchOutcome`].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::port::{Dialer, Frame, FrameTransport, HttpFetcher, ProxyEndpoint, Route};

// ---------------------------------------------------------------------------
// ScriptedTransport
// ---------------------------------------------------------------------------

/// One step of a transport script.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Deliver a frame.
    Frame(Frame),
    /// Wait before the next step.
    Delay(Duration),
    /// Deliver a transport error.
    Error(String),
    /// Stay open and silent forever.
    Hold,
    /// Peer closes the stream.
    End,
}

impl ScriptStep {
    /// Shorthand for a text frame.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Frame(Frame::Text(text.into()))
    }
}

/// A connection that plays a fixed script.
///
/// `recv()` is cancel-safe: a `Delay` interrupted by the caller's `select!`
/// resumes with the same deadline on the next call.
pub struct ScriptedTransport {
    steps: VecDeque<ScriptStep>,
    wake_at: Option<Instant>,
    sent: Arc<Mutex<Vec<Frame>>>,
    closed: Arc<AtomicU32>,
}

impl ScriptedTransport {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self {
            steps: steps.into(),
            wake_at: None,
            sent: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Frames sent so far.
    pub fn sent(&self) -> Vec<Frame> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl FrameTransport for ScriptedTransport {
    async fn send(&mut self, frame: Frame) -> Result<()> {
        self.sent.lock().push(frame);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<Frame>> {
        loop {
            match self.steps.front().cloned() {
                None | Some(ScriptStep::End) => return None,
                Some(ScriptStep::Hold) => return std::future::pending().await,
                Some(ScriptStep::Delay(delay)) => {
                    let until = *self.wake_at.get_or_insert_with(|| Instant::now() + delay);
                    tokio::time::sleep_until(until).await;
                    self.wake_at = None;
                    self.steps.pop_front();
                }
                Some(ScriptStep::Frame(frame)) => {
                    self.steps.pop_front();
                    return Some(Ok(frame));
                }
                Some(ScriptStep::Error(reason)) => {
                    self.steps.pop_front();
                    return Some(Err(Error::Transport(reason)));
                }
            }
        }
    }

    async fn close(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// ScriptedDialer
// ---------------------------------------------------------------------------

/// What one `dial()` call does.
#[derive(Debug, Clone)]
pub enum DialOutcome {
    /// Connect and play the script.
    Connect(Vec<ScriptStep>),
    /// Plain transport failure.
    Fail(String),
    /// Upgrade refused with an HTTP status (403, 451, ...).
    Reject(u16),
}

impl DialOutcome {
    fn into_result(self, sent: &Arc<Mutex<Vec<Frame>>>, closed: &Arc<AtomicU32>) -> Result<Box<dyn FrameTransport>> {
        match self {
            Self::Connect(steps) => {
                let mut transport = ScriptedTransport::new(steps);
                transport.sent = Arc::clone(sent);
                transport.closed = Arc::clone(closed);
                Ok(Box::new(transport))
            }
            Self::Fail(reason) => Err(Error::Transport(reason)),
            Self::Reject(status) => Err(Error::Handshake {
                status,
                reason: "scripted rejection".to_string(),
            }),
        }
    }
}

/// A dialer that replays scripted outcomes.
///
/// Once the queue is empty every call uses the `then` outcome (a plain
/// failure unless set with [`ScriptedDialer::then`]).
pub struct ScriptedDialer {
    outcomes: Mutex<VecDeque<DialOutcome>>,
    then: Mutex<DialOutcome>,
    dials: Arc<AtomicU32>,
    routes: Arc<Mutex<Vec<(String, Route)>>>,
    sent: Arc<Mutex<Vec<Frame>>>,
    closed: Arc<AtomicU32>,
    proxy_support: Mutex<Option<String>>,
}

impl ScriptedDialer {
    pub fn new() -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::new()),
            then: Mutex::new(DialOutcome::Fail("no scripted connection left".to_string())),
            dials: Arc::new(AtomicU32::new(0)),
            routes: Arc::new(Mutex::new(Vec::new())),
            sent: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(AtomicU32::new(0)),
            proxy_support: Mutex::new(None),
        }
    }

    pub fn with_outcomes(self, outcomes: Vec<DialOutcome>) -> Self {
        *self.outcomes.lock() = outcomes.into();
        self
    }

    /// Outcome of every call after the scripted ones.
    pub fn then(self, outcome: DialOutcome) -> Self {
        *self.then.lock() = outcome;
        self
    }

    /// Refuse every proxy with `reason`.
    pub fn without_proxy_support(self, reason: &str) -> Self {
        *self.proxy_support.lock() = Some(reason.to_string());
        self
    }

    pub fn dial_count(&self) -> u32 {
        self.dials.load(Ordering::SeqCst)
    }

    /// `(url, route)` of every dial, in order.
    pub fn dialed(&self) -> Vec<(String, Route)> {
        self.routes.lock().clone()
    }

    /// Frames sent on every connection, in order.
    pub fn sent(&self) -> Vec<Frame> {
        self.sent.lock().clone()
    }

    /// Number of connections the connector closed.
    pub fn closed_count(&self) -> u32 {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Default for ScriptedDialer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Dialer for ScriptedDialer {
    async fn dial(&self, url: &str, route: &Route) -> Result<Box<dyn FrameTransport>> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        self.routes.lock().push((url.to_string(), route.clone()));
        let outcome = self
            .outcomes
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.then.lock().clone());
        outcome.into_result(&self.sent, &self.closed)
    }

    fn supports_proxy(&self, _proxy: &ProxyEndpoint) -> std::result::Result<(), String> {
        match self.proxy_support.lock().as_ref() {
            Some(reason) => Err(reason.clone()),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// ScriptedFetcher
// ---------------------------------------------------------------------------

/// What one HTTP call returns.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Body(String),
    Fail(String),
    Reject(u16),
}

/// An HTTP fetcher that replays scripted responses.
pub struct ScriptedFetcher {
    outcomes: Mutex<VecDeque<FetchOutcome>>,
    then: Mutex<FetchOutcome>,
    calls: Arc<Mutex<Vec<(String, Route)>>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::new()),
            then: Mutex::new(FetchOutcome::Fail("no scripted response left".to_string())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_outcomes(self, outcomes: Vec<FetchOutcome>) -> Self {
        *self.outcomes.lock() = outcomes.into();
        self
    }

    /// Response to every call after the scripted ones.
    pub fn then(self, outcome: FetchOutcome) -> Self {
        *self.then.lock() = outcome;
        self
    }

    /// `(url, route)` of every request, in order.
    pub fn calls(&self) -> Vec<(String, Route)> {
        self.calls.lock().clone()
    }

    fn next(&self, url: &str, route: &Route) -> Result<String> {
        self.calls.lock().push((url.to_string(), route.clone()));
        let outcome = self
            .outcomes
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.then.lock().clone());
        match outcome {
            FetchOutcome::Body(body) => Ok(body),
            FetchOutcome::Fail(reason) => Err(Error::Transport(reason)),
            FetchOutcome::Reject(status) => Err(Error::Handshake {
                status,
                reason: "scripted rejection".to_string(),
            }),
        }
    }
}

impl Default for ScriptedFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpFetcher for ScriptedFetcher {
    async fn get(&self, url: &str, route: &Route) -> Result<String> {
        self.next(url, route)
    }

    async fn post(&self, url: &str, route: &Route) -> Result<String> {
        self.next(url, route)
    }

    fn supports_proxy(&self, _proxy: &ProxyEndpoint) -> std::result::Result<(), String> {
        Ok(())
    }
}
