//! Shiny - administration CLI for the session store.
//!
//! Main entry point for the `shiny` binary.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

mod commands;

use commands::{config, sessions};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Shiny - inspect and maintain the session store
#[derive(Parser)]
#[command(name = "shiny")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Load configuration from this file only (skips discovery)
    #[arg(long, global = true, env = "SHINY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Session database path (overrides [store] path)
    #[arg(long, global = true, env = "SHINY_DB")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the resolved configuration
    Config(config::ConfigArgs),

    /// Inspect and maintain stored sessions
    Sessions(sessions::SessionsArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => {
            let config = shiny_config::load_config_file(path)
                .with_context(|| format!("loading {}", path.display()))?;
            shiny_config::LoadedConfig {
                config,
                sources: vec![shiny_config::ConfigSource {
                    path: path.clone(),
                    loaded: true,
                }],
                warnings: Vec::new(),
            }
        }
        None => shiny_config::load_config(None)?,
    };

    // Console (human-readable, stderr) + optional rolling JSON file
    let filter = if cli.verbose {
        "shiny=debug,shiny_session=debug,shiny_store=debug,shiny_config=debug,warn"
    } else {
        "shiny=info,warn"
    };

    let (file_layer, _guard) = match loaded.config.log_dir() {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(&dir, "shiny.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(EnvFilter::new(
                    "shiny=trace,shiny_session=trace,shiny_store=trace,shiny_config=trace,info",
                ));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(
                    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
                ),
        )
        .with(file_layer)
        .init();

    for warning in &loaded.warnings {
        warn!("{}", warning);
    }

    let ctx = commands::Context {
        config: loaded.config,
        sources: loaded
            .sources
            .into_iter()
            .filter(|s| s.loaded)
            .map(|s| s.path)
            .collect(),
        db: cli.db,
        json_output: cli.json,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Config(args) => config::run(args, &ctx),
        Commands::Sessions(args) => sessions::run(args, &ctx),
    }
}
