//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`transport`] - Scripted [`Dialer`](crate::port::Dialer),
//!   [`FrameTransport`](crate::port::FrameTransport) and
//!   [`HttpFetcher`](crate::port::HttpFetcher): `ScriptedDialer`,
//!   `ScriptedTransport`, `ScriptedFetcher`.
//! - [`connector`] - Mock [`Connector`](crate::port::Connector)s and sinks
//!   for manager tests: `MockConnector`, `ChannelConnector`, `RecordingSink`.
//! - [`domain`] - Builders for symbols, quotes and chains.
//! - [`config`] - Fast connection tuning and exchange configs.

pub mod config;
pub mod connector;
pub mod domain;
pub mod transport;
