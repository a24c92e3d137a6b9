//! Per-request upstream credentials.
//!
//! The browser stores the upstream base URL, API key and model name in
//! cookies. Every chat request must carry all three; they are checked here
//! before any model call is attempted.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ConfigError, Result};

/// Cookie holding the upstream API key.
pub const API_KEY_COOKIE: &str = "apiKey";
/// Cookie holding the upstream base URL.
pub const BASE_URL_COOKIE: &str = "baseURL";
/// Cookie holding the model identifier.
pub const MODEL_COOKIE: &str = "model";

/// Minimum model identifier length accepted when credentials are saved.
const MIN_SAVED_MODEL_LEN: usize = 5;

/// A single problem found while validating credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialIssue {
    /// Wire name of the offending field (`baseURL`, `apiKey`, `model`).
    pub field: &'static str,
    /// Human-readable description.
    pub message: String,
}

impl CredentialIssue {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Upstream model credentials for one session.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCredentials {
    #[serde(rename = "baseURL")]
    pub base_url: String,
    #[serde(rename = "apiKey")]
    pub api_key: String,
    pub model: String,
}

impl fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .finish()
    }
}

impl SessionCredentials {
    /// Create credentials without validation.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// Assemble credentials from optional raw values (e.g. cookies).
    ///
    /// Fails with [`ConfigError::MissingCredentials`] naming every field that
    /// is absent or empty, then with [`ConfigError::InvalidCredentials`] if
    /// the present values are malformed.
    pub fn from_parts(
        base_url: Option<&str>,
        api_key: Option<&str>,
        model: Option<&str>,
    ) -> Result<Self> {
        let mut missing = Vec::new();
        if base_url.is_none_or(str::is_empty) {
            missing.push(BASE_URL_COOKIE);
        }
        if api_key.is_none_or(str::is_empty) {
            missing.push(API_KEY_COOKIE);
        }
        if model.is_none_or(str::is_empty) {
            missing.push(MODEL_COOKIE);
        }
        if !missing.is_empty() {
            return Err(ConfigError::MissingCredentials { fields: missing });
        }

        let creds = Self::new(
            base_url.unwrap_or_default(),
            api_key.unwrap_or_default(),
            model.unwrap_or_default(),
        );
        creds.validate()?;
        Ok(creds)
    }

    /// Check non-emptiness of all fields and well-formedness of the base URL.
    pub fn validate(&self) -> Result<()> {
        let issues = self.issues();
        if issues.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::InvalidCredentials { issues })
        }
    }

    /// Validation applied when credentials are saved: the regular checks
    /// plus a minimum model identifier length.
    pub fn validate_for_save(&self) -> Result<()> {
        let mut issues = self.issues();
        if self.model.chars().count() < MIN_SAVED_MODEL_LEN {
            issues.retain(|i| i.field != MODEL_COOKIE);
            issues.push(CredentialIssue::new(
                MODEL_COOKIE,
                format!("Too small: expected string to have >={MIN_SAVED_MODEL_LEN} characters"),
            ));
        }
        if issues.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::InvalidCredentials { issues })
        }
    }

    /// Parsed base URL. Only meaningful after [`validate`](Self::validate).
    pub fn parsed_base_url(&self) -> Option<Url> {
        Url::parse(&self.base_url).ok()
    }

    fn issues(&self) -> Vec<CredentialIssue> {
        let mut issues = Vec::new();

        match Url::parse(&self.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {}
            Ok(url) => issues.push(CredentialIssue::new(
                BASE_URL_COOKIE,
                format!("Invalid URL: unsupported scheme '{}'", url.scheme()),
            )),
            Err(e) => issues.push(CredentialIssue::new(
                BASE_URL_COOKIE,
                format!("Invalid URL: {e}"),
            )),
        }

        if self.api_key.trim().is_empty() {
            issues.push(CredentialIssue::new(API_KEY_COOKIE, "API key must not be empty"));
        }
        if self.model.trim().is_empty() {
            issues.push(CredentialIssue::new(MODEL_COOKIE, "Model must not be empty"));
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_parts_all_present() {
        let creds = SessionCredentials::from_parts(
            Some("https://api.openai.com/v1"),
            Some("sk-test"),
            Some("gpt-4o-mini"),
        )
        .unwrap();
        assert_eq!(creds.model, "gpt-4o-mini");
        assert_eq!(
            creds.parsed_base_url().unwrap().host_str(),
            Some("api.openai.com")
        );
    }

    #[test]
    fn test_from_parts_reports_every_missing_field() {
        let err = SessionCredentials::from_parts(None, Some(""), Some("gpt-4o")).unwrap_err();
        match err {
            ConfigError::MissingCredentials { fields } => {
                assert_eq!(fields, vec![BASE_URL_COOKIE, API_KEY_COOKIE]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_from_parts_rejects_malformed_url() {
        let err = SessionCredentials::from_parts(Some("not a url"), Some("k"), Some("gpt-4o"))
            .unwrap_err();
        match err {
            ConfigError::InvalidCredentials { issues } => {
                assert_eq!(issues.len(), 1);
                assert_eq!(issues[0].field, BASE_URL_COOKIE);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_non_http_scheme_rejected() {
        let creds = SessionCredentials::new("ftp://example.com", "k", "gpt-4o");
        assert!(creds.validate().is_err());
    }

    #[test]
    fn test_blank_key_rejected() {
        let creds = SessionCredentials::new("http://localhost:11434/v1", "   ", "llama3");
        let err = creds.validate().unwrap_err();
        match err {
            ConfigError::InvalidCredentials { issues } => {
                assert_eq!(issues[0].field, API_KEY_COOKIE);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_validate_for_save_requires_longer_model() {
        let creds = SessionCredentials::new("https://api.openai.com/v1", "sk", "o1");
        assert!(creds.validate().is_ok());
        let err = creds.validate_for_save().unwrap_err();
        match err {
            ConfigError::InvalidCredentials { issues } => {
                assert_eq!(issues.len(), 1);
                assert_eq!(issues[0].field, MODEL_COOKIE);
                assert!(issues[0].message.contains(">=5"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_debug_redacts_key() {
        let creds = SessionCredentials::new("https://x.test", "sk-secret", "gpt-4o");
        let debug = format!("{creds:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_deserialize_wire_names() {
        let creds: SessionCredentials = serde_json::from_str(
            r#"{"baseURL":"https://x.test/v1","apiKey":"k","model":"gpt-4o"}"#,
        )
        .unwrap();
        assert_eq!(creds.base_url, "https://x.test/v1");
        assert_eq!(creds.api_key, "k");
    }
}
