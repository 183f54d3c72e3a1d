//! Application configuration loading and validation.
//!
//! Provides the root [`Settings`] struct. Configuration is loaded from a TOML
//! file; exchange credentials come only from the environment
//! (`<EXCHANGE>_API_KEY`, `<EXCHANGE>_API_SECRET`, `<EXCHANGE>_API_PASSPHRASE`).
//!
//! # Example
//!
//! ```no_run
//! use arbwatch::infrastructure::config::Settings;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::load("config.toml")?;
//!     settings.logging.init();
//!     Ok(())
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;

use super::connection::{
    ConnectionTuning, DecodeErrorConfig, HeartbeatConfig, ReconnectionConfig, TimeoutConfig,
};
use super::detection::{DetectionConfig, TriangularConfig};
use super::exchange::{ExchangeConfig, ExchangeSettings, ProxyConfig};
use super::logging::LoggingConfig;
use crate::adapter::ExchangeKind;
use crate::domain::{ArbitrageChain, ExchangeId, Symbol};
use crate::error::{ConfigError, Result};

/// Root configuration, immutable once loaded.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Pairs subscribed on every exchange without its own `symbols`.
    #[serde(default)]
    pub symbols: Vec<Symbol>,

    /// Interval of the periodic statistics log line.
    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub detection: DetectionConfig,

    /// Backoff delays and circuit breaker behavior.
    #[serde(default)]
    pub reconnection: ReconnectionConfig,

    #[serde(default)]
    pub heartbeat: HeartbeatConfig,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    #[serde(default)]
    pub decode_errors: DecodeErrorConfig,

    #[serde(default)]
    pub proxy: ProxyConfig,

    /// Exchanges by name. Absent exchanges are not run.
    #[serde(default)]
    pub exchanges: BTreeMap<ExchangeId, ExchangeSettings>,

    #[serde(default)]
    pub triangular: TriangularConfig,
}

const fn default_stats_interval_secs() -> u64 {
    30
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            symbols: Vec::new(),
            stats_interval_secs: default_stats_interval_secs(),
            logging: LoggingConfig::default(),
            detection: DetectionConfig::default(),
            reconnection: ReconnectionConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            timeouts: TimeoutConfig::default(),
            decode_errors: DecodeErrorConfig::default(),
            proxy: ProxyConfig::default(),
            exchanges: BTreeMap::new(),
            triangular: TriangularConfig::default(),
        }
    }
}

impl Settings {
    /// Parse configuration from TOML content.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or a global invariant fails.
    /// Per-exchange problems are reported by [`Settings::exchange_config`].
    pub fn parse_toml(content: &str) -> Result<Self> {
        let settings: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The TOML content is malformed
    /// - Validation fails
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    /// Validate configuration values that affect every exchange.
    fn validate(&self) -> Result<()> {
        let has_symbols = !self.symbols.is_empty()
            || self
                .exchanges
                .values()
                .any(|ex| ex.symbols.as_ref().is_some_and(|s| !s.is_empty()));
        if !has_symbols {
            return Err(ConfigError::MissingField { field: "symbols" }.into());
        }

        if self.detection.min_profit_pct < Decimal::ZERO {
            return Err(ConfigError::InvalidValue {
                field: "min_profit_pct",
                reason: "must be 0 or greater".to_string(),
            }
            .into());
        }
        if self.detection.max_quote_age_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_quote_age_ms",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.detection.notification_capacity == 0 || self.detection.opportunity_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "detection",
                reason: "queue capacities must be greater than 0".to_string(),
            }
            .into());
        }

        if self.reconnection.initial_delay_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "initial_delay_ms",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.reconnection.max_delay_ms < self.reconnection.initial_delay_ms {
            return Err(ConfigError::InvalidValue {
                field: "max_delay_ms",
                reason: "must be >= initial_delay_ms".to_string(),
            }
            .into());
        }
        if self.reconnection.backoff_multiplier < 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "backoff_multiplier",
                reason: "must be >= 1.0".to_string(),
            }
            .into());
        }
        if !(0.0..=1.0).contains(&self.reconnection.jitter_ratio) {
            return Err(ConfigError::InvalidValue {
                field: "jitter_ratio",
                reason: "must be between 0 and 1".to_string(),
            }
            .into());
        }
        if self.reconnection.max_consecutive_failures == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_consecutive_failures",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.reconnection.circuit_breaker_cooldown_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "circuit_breaker_cooldown_ms",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        if self.heartbeat.ping_interval_ms == 0
            || self.heartbeat.pong_timeout_ms == 0
            || self.heartbeat.read_timeout_ms == 0
        {
            return Err(ConfigError::InvalidValue {
                field: "heartbeat",
                reason: "intervals must be greater than 0".to_string(),
            }
            .into());
        }
        if self.timeouts.connect_ms == 0 || self.timeouts.auth_ms == 0 || self.timeouts.subscribe_ms == 0
        {
            return Err(ConfigError::InvalidValue {
                field: "timeouts",
                reason: "timeouts must be greater than 0".to_string(),
            }
            .into());
        }

        let ratio = self.decode_errors.max_ratio;
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(ConfigError::InvalidValue {
                field: "max_ratio",
                reason: "must be in (0, 1]".to_string(),
            }
            .into());
        }
        if self.decode_errors.window_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "window_ms",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        self.proxy.endpoints()?;
        self.configured_chains()?;

        Ok(())
    }

    /// Names of exchanges with `enabled = true`, in name order.
    #[must_use]
    pub fn enabled_exchanges(&self) -> Vec<ExchangeId> {
        self.exchanges
            .iter()
            .filter(|(_, settings)| settings.enabled)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Resolve one exchange, reading credentials from the process environment.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] that disables this exchange only.
    pub fn exchange_config(&self, id: &ExchangeId) -> std::result::Result<ExchangeConfig, ConfigError> {
        self.exchange_config_with_env(id, |name| std::env::var(name).ok())
    }

    /// Resolve one exchange with a custom environment lookup.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] that disables this exchange only.
    pub fn exchange_config_with_env<F>(
        &self,
        id: &ExchangeId,
        env: F,
    ) -> std::result::Result<ExchangeConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let settings = self
            .exchanges
            .get(id)
            .ok_or_else(|| ConfigError::NotConfigured {
                exchange: id.to_string(),
            })?;
        ExchangeConfig::resolve(id, settings, &self.symbols, !self.proxy.urls.is_empty(), env)
    }

    /// Chains listed under `[[triangular.chains]]`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for a chain that does not close,
    /// has fewer than three legs, or could never be evaluated because its
    /// exchange is not enabled or does not subscribe to every leg.
    pub fn configured_chains(&self) -> std::result::Result<Vec<ArbitrageChain>, ConfigError> {
        self.triangular
            .chains
            .iter()
            .map(|chain| {
                let chain = ArbitrageChain::new(chain.exchange.clone(), chain.legs.clone())?;
                self.check_chain_feed(&chain)?;
                Ok(chain)
            })
            .collect()
    }

    fn check_chain_feed(&self, chain: &ArbitrageChain) -> std::result::Result<(), ConfigError> {
        let exchange = chain.exchange();
        let settings = self
            .exchanges
            .get(exchange)
            .filter(|settings| settings.enabled)
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "triangular.chains.exchange",
                reason: format!("{exchange} is not an enabled exchange"),
            })?;

        let subscribed = settings.symbols.as_deref().unwrap_or(self.symbols.as_slice());
        if let Some(leg) = chain.legs().iter().find(|leg| !subscribed.contains(&leg.symbol)) {
            return Err(ConfigError::InvalidValue {
                field: "triangular.chains.legs",
                reason: format!("{exchange} does not subscribe to {}", leg.symbol),
            });
        }
        Ok(())
    }

    /// Taker fee of every enabled, known exchange as a fraction (`0.001` = 0.1%).
    ///
    /// Unlike [`exchange_config`](Self::exchange_config) this never reads
    /// credentials, so an exchange disabled for a missing key still has a fee.
    #[must_use]
    pub fn taker_fees(&self) -> BTreeMap<ExchangeId, Decimal> {
        self.exchanges
            .iter()
            .filter(|(_, settings)| settings.enabled)
            .filter_map(|(id, settings)| {
                let kind = ExchangeKind::from_id(id).ok()?;
                let pct = settings
                    .taker_fee_pct
                    .unwrap_or_else(|| kind.default_taker_fee_pct());
                Some((id.clone(), pct / Decimal::ONE_HUNDRED))
            })
            .collect()
    }

    /// Reconnect, heartbeat, timeout and decode-error tuning for connectors.
    #[must_use]
    pub fn tuning(&self) -> ConnectionTuning {
        ConnectionTuning {
            reconnection: self.reconnection.clone(),
            heartbeat: self.heartbeat.clone(),
            timeouts: self.timeouts.clone(),
            decode_errors: self.decode_errors.clone(),
        }
    }

    #[must_use]
    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs.max(1))
    }
}
