use thiserror::Error;

use crate::DataImportSource;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("oauth app details are not available for {0}")]
    Configuration(DataImportSource),

    #[error("invalid configuration value {name}={value}")]
    InvalidConfigValue { name: String, value: String },

    #[error("http status {status}: {message}")]
    Exchange { status: u16, message: String },

    #[error("token response for {provider} could not be mapped to an access token")]
    Normalization { provider: DataImportSource },

    #[error("http error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid header: {name}={value}")]
    InvalidHeader { name: String, value: String },

    #[error("invalid response: {message}")]
    InvalidResponse { message: String, body: String },

    #[error("no stored {0} token")]
    MissingToken(DataImportSource),

    #[error("stored {0} token has no refresh token")]
    MissingRefreshToken(DataImportSource),

    #[error("{provider} does not support {operation}")]
    Unsupported {
        provider: DataImportSource,
        operation: &'static str,
    },

    #[error("storage error: {0}")]
    Storage(#[source] BoxError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TokenError {
    pub fn storage(err: impl Into<BoxError>) -> Self {
        Self::Storage(err.into())
    }

    /// Whether repeating the same request could succeed. Authorization codes
    /// are single-use, so this only applies to refreshes and fresh codes.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Exchange { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::TokenError;
    use crate::DataImportSource;

    #[test]
    fn server_errors_are_retryable() {
        let err = TokenError::Exchange {
            status: 503,
            message: "unavailable".to_string(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn client_and_mapping_errors_are_not_retryable() {
        let err = TokenError::Exchange {
            status: 401,
            message: "invalid_grant".to_string(),
        };
        assert!(!err.is_retryable());
        assert!(!TokenError::Normalization {
            provider: DataImportSource::Strava
        }
        .is_retryable());
        assert!(!TokenError::Configuration(DataImportSource::Github).is_retryable());
    }

    #[test]
    fn storage_errors_keep_their_source() {
        let err = TokenError::storage("disk full");
        assert_eq!(err.to_string(), "storage error: disk full");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn exchange_error_message_includes_status() {
        let err = TokenError::Exchange {
            status: 401,
            message: "invalid_grant".to_string(),
        };
        assert_eq!(err.to_string(), "http status 401: invalid_grant");
    }
}
