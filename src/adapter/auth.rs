//! HMAC-SHA256 login signatures.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{ConfigError, Result};

type HmacSha256 = Hmac<Sha256>;

fn mac(secret: &str, message: &str) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ConfigError::Other(format!("HMAC key error: {e}")))?;
    mac.update(message.as_bytes());
    Ok(mac)
}

/// Base64-encoded HMAC-SHA256 of `message` (OKX, Bitget).
///
/// # Errors
///
/// Returns an error if the secret cannot key the MAC.
pub fn sign_base64(secret: &str, message: &str) -> Result<String> {
    Ok(BASE64.encode(mac(secret, message)?.finalize().into_bytes()))
}

/// Hex-encoded HMAC-SHA256 of `message` (Bybit).
///
/// # Errors
///
/// Returns an error if the secret cannot key the MAC.
pub fn sign_hex(secret: &str, message: &str) -> Result<String> {
    Ok(hex::encode(mac(secret, message)?.finalize().into_bytes()))
}
