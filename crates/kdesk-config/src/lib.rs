//! Configuration system for the kdesk support assistant.
//!
//! Two kinds of configuration live here:
//! - Process configuration loaded from `kdesk.toml` with environment
//!   overrides (`[server]`, `[retrieval]`, `[embedding]`, `[session]`, `[demo]`).
//! - The per-request credential envelope ([`SessionCredentials`]) that the
//!   browser supplies through cookies: upstream base URL, API key and model.

pub mod credentials;
pub mod discovery;
pub mod error;
pub mod types;

pub use credentials::{
    API_KEY_COOKIE, BASE_URL_COOKIE, CredentialIssue, MODEL_COOKIE, SessionCredentials,
};
pub use discovery::{
    LoadedConfig, PROJECT_CONFIG_FILE, apply_env_overrides, load_config, load_config_file,
};
pub use error::{ConfigError, Result};
pub use types::*;
