//! Small parsing helpers shared by the adapters.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::Value;

use crate::domain::{QuoteUpdate, Symbol};
use crate::error::DecodeError;

/// Parse a price, treating an empty string or zero as "side absent".
///
/// Exchanges publish `""` or `"0"` when a book side is empty.
pub(crate) fn price(field: &'static str, raw: &str) -> Result<Option<Decimal>, DecodeError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let value = Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .map_err(|_| DecodeError::InvalidNumber {
            field,
            value: raw.to_string(),
        })?;
    if value.is_sign_negative() {
        return Err(DecodeError::InvalidNumber {
            field,
            value: raw.to_string(),
        });
    }
    Ok((!value.is_zero()).then_some(value))
}

/// Same as [`price`] for an optional field.
pub(crate) fn optional_price(
    field: &'static str,
    raw: Option<&str>,
) -> Result<Option<Decimal>, DecodeError> {
    raw.map_or(Ok(None), |raw| price(field, raw))
}

/// Read a string field from a JSON object.
pub(crate) fn str_field<'a>(value: &'a Value, field: &'static str) -> Result<&'a str, DecodeError> {
    value
        .get(field)
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingField(field))
}

/// Exchange error codes arrive as either strings or numbers.
pub(crate) fn code_is(value: &Value, expected: &str) -> bool {
    match value {
        Value::String(s) => s == expected,
        Value::Number(n) => n.to_string() == expected,
        _ => false,
    }
}

/// Human-readable text of an error payload.
pub(crate) fn message_of(value: &Value, fields: &[&str]) -> String {
    fields
        .iter()
        .find_map(|f| value.get(*f).and_then(Value::as_str).filter(|s| !s.is_empty()))
        .map_or_else(|| value.to_string(), str::to_string)
}

/// Build an update from two raw sides; `None` if neither side carries a price.
pub(crate) fn update(
    symbol: Symbol,
    bid: Option<Decimal>,
    ask: Option<Decimal>,
) -> Option<QuoteUpdate> {
    let update = QuoteUpdate { symbol, bid, ask };
    update.has_price().then_some(update)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_price_parsing() {
        assert_eq!(price("b", "25.35190000").unwrap(), Some(dec!(25.3519)));
        assert_eq!(price("b", "").unwrap(), None);
        assert_eq!(price("b", "0.000").unwrap(), None);
        assert_eq!(price("b", "1e-5").unwrap(), Some(dec!(0.00001)));
        assert!(price("b", "abc").is_err());
        assert!(price("b", "-1").is_err());
    }

    #[test]
    fn test_code_is() {
        assert!(code_is(&Value::from("0"), "0"));
        assert!(code_is(&Value::from(0), "0"));
        assert!(!code_is(&Value::from(30001), "0"));
    }
}
