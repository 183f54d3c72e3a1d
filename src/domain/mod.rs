//! Exchange-agnostic domain types.
//!
//! - [`id`] - Exchange, asset and symbol identifiers
//! - [`quote`] - Top-of-book quotes and adapter updates
//! - [`chain`] - Triangular chains and their legs
//! - [`opportunity`] - Events emitted by the detectors
//! - [`stats`] - Connection status and statistics snapshots

pub mod chain;
pub mod id;
pub mod opportunity;
pub mod quote;
pub mod stats;

pub use chain::{ArbitrageChain, Leg, Side};
pub use id::{Asset, ExchangeId, Symbol};
pub use opportunity::{
    CrossExchangeOpportunity, OpportunityEvent, OpportunityKind, TriangularOpportunity,
};
pub use quote::{Quote, QuoteKey, QuoteUpdate};
pub use stats::{ConnectionStatus, ExchangeCounters, ExchangeStatistics, StatusTransition};
