//! Config file discovery and environment overrides.
//!
//! Resolution order (later overrides earlier):
//! 1. `./kdesk.toml`, or an explicit path
//! 2. Environment variables (`QDRANT_URL`, `OPENAI_API_KEY`, ...)
//! 3. CLI arguments (handled externally)

use std::path::{Path, PathBuf};

use crate::{ConfigError, KdeskConfig, Result};

/// Default config filename for project-local config.
pub const PROJECT_CONFIG_FILE: &str = "kdesk.toml";

/// Result of config discovery and loading.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The merged configuration.
    pub config: KdeskConfig,
    /// File the config was read from, if any.
    pub source: Option<PathBuf>,
}

/// Load configuration and apply environment overrides.
///
/// An explicit `path` must exist. Without one, `./kdesk.toml` is used when
/// present and defaults otherwise.
pub fn load_config(path: Option<&Path>) -> Result<LoadedConfig> {
    let (mut config, source) = match path {
        Some(p) => (load_config_file(p)?, Some(p.to_path_buf())),
        None => {
            let local = PathBuf::from(PROJECT_CONFIG_FILE);
            if local.exists() {
                (load_config_file(&local)?, Some(local))
            } else {
                tracing::debug!("no {PROJECT_CONFIG_FILE} found, using defaults");
                (KdeskConfig::default(), None)
            }
        }
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;

    Ok(LoadedConfig { config, source })
}

/// Load config from a specific file path (no discovery, no env overrides).
pub fn load_config_file(path: &Path) -> Result<KdeskConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    KdeskConfig::from_toml(&contents)
}

/// Apply environment overrides using `lookup` to read variables.
///
/// Empty values are ignored so that `FOO=` in a `.env` file does not wipe a
/// file-provided setting.
pub fn apply_env_overrides<F>(config: &mut KdeskConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("QDRANT_URL") {
        config.retrieval.qdrant_url = v;
    }
    if let Some(v) = get("QDRANT_API_KEY") {
        config.retrieval.qdrant_api_key = Some(v);
    }
    if let Some(v) = get("OPENAI_BASE_URL") {
        config.embedding.base_url = v;
    }
    if let Some(v) = get("OPENAI_API_KEY") {
        config.embedding.api_key = Some(v);
    }
    if let Some(v) = get("TAVILY_API_KEY") {
        config.session.web_search = Some(v);
    }
    if let Some(v) = get("KDESK_BIND") {
        config.server.bind = v;
    }
    if let Some(v) = get("KDESK_PORT") {
        config.server.port = v.parse().map_err(|e| ConfigError::InvalidValue {
            key: "KDESK_PORT".to_string(),
            message: format!("{e}"),
        })?;
    }

    Ok(())
}
