//! CLI command handlers.

pub mod config;
pub mod start;

use std::path::PathBuf;

use anyhow::{Context as _, Result};

use kdesk_config::LoadedConfig;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Explicit config file, if one was given.
    pub config_path: Option<PathBuf>,
}

impl Context {
    /// Load the config file (or defaults) with environment overrides applied.
    pub fn load_config(&self) -> Result<LoadedConfig> {
        kdesk_config::load_config(self.config_path.as_deref())
            .context("failed to load configuration")
    }
}
