//! Connection status and per-exchange statistics snapshots.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;

/// Lifecycle state of one exchange connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Authenticating,
    Subscribing,
    Live,
    Backoff,
    /// Disabled by configuration; never retried.
    FatalError,
}

impl ConnectionStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Authenticating => "authenticating",
            Self::Subscribing => "subscribing",
            Self::Live => "live",
            Self::Backoff => "backoff",
            Self::FatalError => "fatal_error",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusTransition {
    pub from: ConnectionStatus,
    pub to: ConnectionStatus,
    pub at: DateTime<Utc>,
}

/// Point-in-time statistics for one exchange.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExchangeStatistics {
    pub status: ConnectionStatus,
    /// Every inbound frame, decodable or not.
    pub message_count: u64,
    /// Decode and protocol failures only.
    pub error_count: u64,
    pub reconnect_count: u64,
    /// Position in the route rotation. Route 0 is the direct connection
    /// unless the exchange prefers proxies.
    pub proxy_index: usize,
    pub last_message_at: Option<DateTime<Utc>>,
    /// Most recent transitions, oldest first.
    pub recent_transitions: Vec<StatusTransition>,
}

impl ExchangeStatistics {
    /// Returns true if the exchange is currently delivering data.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.status == ConnectionStatus::Live
    }
}

/// Number of transitions kept in [`ExchangeCounters`].
const TRANSITION_HISTORY: usize = 32;

/// Live counters for one exchange, shared between its connector and the
/// connection manager.
///
/// Counters are monotonic for the life of the process; restarts reuse the
/// same instance.
#[derive(Debug)]
pub struct ExchangeCounters {
    status: RwLock<ConnectionStatus>,
    messages: AtomicU64,
    errors: AtomicU64,
    reconnects: AtomicU64,
    sequence: AtomicU64,
    proxy_index: AtomicUsize,
    /// Epoch millis of the last inbound frame, 0 if none.
    last_message_ms: AtomicI64,
    transitions: Mutex<VecDeque<StatusTransition>>,
}

impl ExchangeCounters {
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: RwLock::new(ConnectionStatus::Disconnected),
            messages: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
            sequence: AtomicU64::new(0),
            proxy_index: AtomicUsize::new(0),
            last_message_ms: AtomicI64::new(0),
            transitions: Mutex::new(VecDeque::with_capacity(TRANSITION_HISTORY)),
        }
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        *self.status.read()
    }

    /// Move to `next`, recording the transition. No-op if already there.
    pub fn set_status(&self, next: ConnectionStatus) {
        let previous = {
            let mut status = self.status.write();
            let previous = *status;
            if previous == next {
                return;
            }
            *status = next;
            previous
        };

        let mut transitions = self.transitions.lock();
        if transitions.len() == TRANSITION_HISTORY {
            transitions.pop_front();
        }
        transitions.push_back(StatusTransition {
            from: previous,
            to: next,
            at: Utc::now(),
        });
    }

    pub fn record_message(&self) {
        self.messages.fetch_add(1, Ordering::Relaxed);
        self.last_message_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// Next quote sequence number; strictly increasing across reconnects.
    pub fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn set_proxy_index(&self, index: usize) {
        self.proxy_index.store(index, Ordering::Relaxed);
    }

    #[must_use]
    pub fn message_count(&self) -> u64 {
        self.messages.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn error_count(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn transitions(&self) -> Vec<StatusTransition> {
        self.transitions.lock().iter().cloned().collect()
    }

    #[must_use]
    pub fn snapshot(&self) -> ExchangeStatistics {
        let last_ms = self.last_message_ms.load(Ordering::Relaxed);
        ExchangeStatistics {
            status: self.status(),
            message_count: self.message_count(),
            error_count: self.error_count(),
            reconnect_count: self.reconnects.load(Ordering::Relaxed),
            proxy_index: self.proxy_index.load(Ordering::Relaxed),
            last_message_at: (last_ms > 0)
                .then(|| DateTime::from_timestamp_millis(last_ms))
                .flatten(),
            recent_transitions: self.transitions(),
        }
    }
}

impl Default for ExchangeCounters {
    fn default() -> Self {
        Self::new()
    }
}
