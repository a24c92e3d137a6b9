//! kdesk - KDEI Taipei support desk assistant
//!
//! Main entry point for the kdesk CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{config, start};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// kdesk - KDEI Taipei support desk assistant
#[derive(Parser)]
#[command(name = "kdesk")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file (default: ./kdesk.toml)
    #[arg(long, global = true, env = "KDESK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Also write JSON logs, rotated daily, to this directory
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Start(start::StartArgs),

    /// Configuration management
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging
// ─────────────────────────────────────────────────────────────────────────────

const INFO_FILTER: &str = "kdesk=info,kdesk_agent=info,kdesk_llm=info,kdesk_retrieval=info,kdesk_protocol=info,kdesk_server=info,tower_http=info,warn";
const DEBUG_FILTER: &str = "kdesk=debug,kdesk_agent=debug,kdesk_llm=debug,kdesk_retrieval=debug,kdesk_protocol=debug,kdesk_server=debug,kdesk_config=debug,tower_http=debug,info";
const FILE_FILTER: &str = "kdesk=trace,kdesk_agent=trace,kdesk_llm=trace,kdesk_retrieval=trace,kdesk_protocol=trace,kdesk_server=trace,kdesk_config=trace,info";

/// `RUST_LOG` wins; otherwise `--verbose` or a non-empty `VERBOSE` selects debug.
fn console_filter(verbose: bool) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let debug = verbose || std::env::var("VERBOSE").is_ok_and(|v| !v.trim().is_empty());
    EnvFilter::new(if debug { DEBUG_FILTER } else { INFO_FILTER })
}

/// Console (human-readable) plus an optional rotating JSON file.
///
/// The returned guard flushes the file writer and must outlive the program.
fn init_logging(verbose: bool, log_dir: Option<&PathBuf>) -> Option<WorkerGuard> {
    use tracing_subscriber::prelude::*;

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "kdesk.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(EnvFilter::new(FILE_FILTER));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(console_filter(verbose)),
        )
        .with(file_layer)
        .init();

    guard
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _guard = init_logging(cli.verbose, cli.log_dir.as_ref());

    let ctx = commands::Context {
        config_path: cli.config,
    };

    match cli.command {
        Commands::Start(args) => start::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}
