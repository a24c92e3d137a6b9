//! Configuration error types.

use crate::credentials::CredentialIssue;

/// Result type alias for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read a config file.
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    /// Failed to parse TOML.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Failed to serialize config.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// An environment override could not be parsed.
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// One or more session credentials are absent or empty.
    #[error("Invalid configuration")]
    MissingCredentials { fields: Vec<&'static str> },

    /// Session credentials are present but malformed.
    #[error("Invalid configuration")]
    InvalidCredentials { issues: Vec<CredentialIssue> },
}

impl ConfigError {
    /// Remediation hint shown to the user for credential problems.
    pub const CREDENTIALS_HINT: &'static str =
        "Please check your configuration. Make sure API Key, Base URL, and Model are all set.";

    /// Whether this error concerns the per-request credential envelope.
    pub fn is_credentials(&self) -> bool {
        matches!(
            self,
            ConfigError::MissingCredentials { .. } | ConfigError::InvalidCredentials { .. }
        )
    }
}
