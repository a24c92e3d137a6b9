//! Config command - configuration management.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Args, Subcommand};

use kdesk_config::{KdeskConfig, PROJECT_CONFIG_FILE};

use super::Context;

const REDACTED: &str = "[REDACTED]";

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration (file + environment), secrets redacted
    Show,

    /// Write a config file with default values
    Init {
        /// Where to write it (default: ./kdesk.toml)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show which config file is loaded
    Path,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Init { path, force } => cmd_init(path, force),
        ConfigCommand::Path => cmd_path(ctx),
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;
    match &loaded.source {
        Some(path) => println!("# Loaded from {}\n", path.display()),
        None => println!("# No config file loaded (using defaults)\n"),
    }
    print!("{}", redacted(loaded.config).to_toml()?);
    Ok(())
}

fn cmd_init(path: Option<PathBuf>, force: bool) -> Result<()> {
    let path = path.unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));
    if path.exists() && !force {
        println!("Config file already exists: {}", path.display());
        println!("Use --force to overwrite it.");
        return Ok(());
    }
    write_defaults(&path)?;
    println!("Created {}", path.display());
    Ok(())
}

fn cmd_path(ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;
    match loaded.source {
        Some(path) => println!("{}", path.display()),
        None => eprintln!("No config file found (using defaults)"),
    }
    Ok(())
}

fn write_defaults(path: &Path) -> Result<()> {
    let body = KdeskConfig::default().to_toml()?;
    std::fs::write(path, format!("# kdesk configuration\n\n{body}"))?;
    Ok(())
}

/// Replace every secret that is set with a placeholder.
fn redacted(mut config: KdeskConfig) -> KdeskConfig {
    let hide = |secret: &mut Option<String>| {
        if secret.is_some() {
            *secret = Some(REDACTED.to_string());
        }
    };
    hide(&mut config.embedding.api_key);
    hide(&mut config.retrieval.qdrant_api_key);
    hide(&mut config.session.web_search);
    config
}
