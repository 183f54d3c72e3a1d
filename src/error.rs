use thiserror::Error;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),

    #[error("unknown exchange '{0}'")]
    UnknownExchange(String),

    #[error("exchange {exchange} requires credential {variable}")]
    MissingCredential {
        exchange: String,
        variable: String,
    },

    #[error("exchange {exchange} prefers a proxy but no proxies are configured")]
    NoProxies { exchange: String },

    #[error("exchange {exchange} is not configured")]
    NotConfigured { exchange: String },

    #[error("{0}")]
    Other(String),
}

/// Failure to turn an exchange frame into canonical messages.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing field '{0}'")]
    MissingField(&'static str),

    #[error("invalid number in '{field}': {value}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("unknown symbol '{0}'")]
    UnknownSymbol(String),

    #[error("exchange rejected request: {0}")]
    Rejected(String),

    #[error("unsupported frame: {0}")]
    Unsupported(&'static str),

    #[error("failed to decompress frame: {0}")]
    Decompress(#[source] std::io::Error),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("handshake rejected (status {status}): {reason}")]
    Handshake { status: u16, reason: String },

    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True for rejections that retrying the same route will not fix
    /// (geoblocks, forbidden handshakes, refused logins).
    #[must_use]
    pub fn is_handshake(&self) -> bool {
        match self {
            Error::Handshake { .. } => true,
            Error::Decode(DecodeError::Rejected(_)) => true,
            Error::WebSocket(err) => matches!(
                err.as_ref(),
                tokio_tungstenite::tungstenite::Error::Http(resp)
                    if is_blocking_status(resp.status().as_u16())
            ),
            _ => false,
        }
    }
}

/// HTTP statuses exchanges answer with when a region or client is refused.
#[must_use]
pub fn is_blocking_status(status: u16) -> bool {
    matches!(status, 401 | 403 | 407 | 451)
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        if let tokio_tungstenite::tungstenite::Error::Http(resp) = &err {
            let status = resp.status().as_u16();
            if is_blocking_status(status) {
                return Error::Handshake {
                    status,
                    reason: resp
                        .status()
                        .canonical_reason()
                        .unwrap_or("rejected")
                        .to_string(),
                };
            }
        }
        Error::WebSocket(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocking_statuses() {
        assert!(is_blocking_status(403));
        assert!(is_blocking_status(451));
        assert!(!is_blocking_status(500));
        assert!(!is_blocking_status(200));
    }

    #[test]
    fn test_handshake_classification() {
        let err = Error::Handshake {
            status: 451,
            reason: "Unavailable For Legal Reasons".into(),
        };
        assert!(err.is_handshake());
        assert!(Error::Decode(DecodeError::Rejected("bad key".into())).is_handshake());
        assert!(!Error::Transport("reset".into()).is_handshake());
        assert!(!Error::Timeout("connect").is_handshake());
    }
}
