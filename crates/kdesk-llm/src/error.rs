//! Error types for the LLM crate.

use std::time::Duration;

use thiserror::Error;

/// Result type alias using the LLM error type.
pub type Result<T> = std::result::Result<T, LlmError>;

/// Error type for model and embedding calls.
///
/// Nothing in this crate retries; callers decide what a failure means for
/// the turn in progress.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Backend/API error from the provider.
    #[error("Backend error: {0}")]
    Backend(String),

    /// Network/connectivity error.
    #[error("Network error: {0}")]
    Network(String),

    /// Configuration error (missing key, bad base URL, etc.).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid request parameters.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded: {message}")]
    RateLimit {
        message: String,
        retry_after: Option<Duration>,
    },

    /// Authentication failed.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LlmError {
    /// Create a rate limit error from a message and optional `Retry-After` header.
    pub fn rate_limit(message: impl Into<String>, retry_after_header: Option<&str>) -> Self {
        Self::RateLimit {
            message: message.into(),
            retry_after: retry_after_header
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs),
        }
    }

    /// Map an HTTP error status and provider message to an error variant.
    pub fn from_status(status: u16, message: impl Into<String>, retry_after: Option<&str>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => LlmError::Auth(message),
            400 | 404 | 422 => LlmError::InvalidRequest(message),
            429 => LlmError::rate_limit(message, retry_after),
            _ => LlmError::Backend(format!("HTTP {status}: {message}")),
        }
    }

    /// Get the retry-after duration if this is a rate limit error.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimit { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Returns true if a later attempt might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::RateLimit { .. })
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Network(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            LlmError::Network(format!("Connection failed: {}", err))
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_transient() {
        assert!(LlmError::Network("timeout".to_string()).is_transient());
        assert!(LlmError::rate_limit("slow down", None).is_transient());
        assert!(!LlmError::Config("bad config".to_string()).is_transient());
        assert!(!LlmError::Auth("unauthorized".to_string()).is_transient());
        assert!(!LlmError::Backend("server error".to_string()).is_transient());
    }

    #[test]
    fn test_rate_limit_retry_after() {
        let err = LlmError::rate_limit("slow down", Some(" 7 "));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));

        let err = LlmError::rate_limit("slow down", Some("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(err.retry_after(), None);
    }

    #[test]
    fn test_from_status() {
        assert!(matches!(
            LlmError::from_status(401, "bad key", None),
            LlmError::Auth(_)
        ));
        assert!(matches!(
            LlmError::from_status(404, "no such model", None),
            LlmError::InvalidRequest(_)
        ));
        assert!(matches!(
            LlmError::from_status(429, "limit", Some("2")),
            LlmError::RateLimit { .. }
        ));
        let err = LlmError::from_status(502, "bad gateway", None);
        assert_eq!(err.to_string(), "Backend error: HTTP 502: bad gateway");
    }

    #[test]
    fn test_error_display() {
        let err = LlmError::Config("missing api key".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing api key");
    }
}
