//! Handler for the `check-config` command.

use crate::application::engine::chains_from_settings;
use crate::cli::Cli;
use crate::domain::ExchangeId;
use crate::error::{ConfigError, Result};
use crate::infrastructure::config::{ExchangeConfig, Settings};

/// Outcome of resolving one exchange.
#[derive(Debug)]
pub struct ExchangeCheck {
    pub exchange: ExchangeId,
    pub result: std::result::Result<ExchangeConfig, ConfigError>,
}

/// Resolve every enabled exchange with `env` as the environment.
pub fn check_exchanges<F>(settings: &Settings, env: F) -> Vec<ExchangeCheck>
where
    F: Fn(&str) -> Option<String>,
{
    settings
        .enabled_exchanges()
        .into_iter()
        .map(|exchange| {
            let result = settings.exchange_config_with_env(&exchange, &env);
            ExchangeCheck { exchange, result }
        })
        .collect()
}

/// Execute the check-config command.
///
/// # Errors
///
/// Returns an error if the file is invalid or any enabled exchange cannot run.
pub fn execute(cli: &Cli) -> Result<()> {
    let settings = Settings::load(&cli.config)?;
    let chains = chains_from_settings(&settings)?;

    println!("Configuration: {}", cli.config.display());
    println!("  symbols: {}", settings.symbols.len());
    println!("  triangular chains: {}", chains.len());
    println!("  proxies: {}", settings.proxy.urls.len());

    let checks = check_exchanges(&settings, |name| std::env::var(name).ok());
    let mut failed = 0;
    for check in &checks {
        match &check.result {
            Ok(config) => println!(
                "  {:<10} ok ({:?}, {} symbols, taker fee {}%)",
                check.exchange.as_str(),
                config.transport,
                config.symbols.len(),
                config.taker_fee * rust_decimal::Decimal::ONE_HUNDRED
            ),
            Err(e) => {
                failed += 1;
                println!("  {:<10} DISABLED: {e}", check.exchange.as_str());
            }
        }
    }

    if failed > 0 {
        return Err(ConfigError::Other(format!(
            "{failed} of {} enabled exchanges cannot run",
            checks.len()
        ))
        .into());
    }
    println!("Configuration OK");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reports_each_exchange() {
        let settings = Settings::parse_toml(
            r#"
            symbols = ["BTC/USDT"]
            [exchanges.binance]
            [exchanges.okx]
            authenticate = true
            [exchanges.phemex]
            "#,
        )
        .unwrap();

        let checks = check_exchanges(&settings, |_| None);
        assert_eq!(checks.len(), 3);

        let by_name = |name: &str| {
            checks
                .iter()
                .find(|c| c.exchange.as_str() == name)
                .unwrap()
        };
        assert!(by_name("binance").result.is_ok());
        assert!(matches!(
            by_name("okx").result,
            Err(ConfigError::MissingCredential { .. })
        ));
        assert!(matches!(
            by_name("phemex").result,
            Err(ConfigError::UnknownExchange(_))
        ));
    }
}
