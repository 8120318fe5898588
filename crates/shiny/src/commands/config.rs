//! Config command - configuration inspection.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};
use console::{Style, style};
use serde_json::json;
use shiny_config::{CacheSection, ShinyConfig};
use shiny_session::Capacity;

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the resolved configuration
    Show,

    /// Show which config files are loaded
    Which,

    /// Initialize a config file with defaults
    Init {
        /// Create project-local config (./shiny.toml) instead of user config
        #[arg(long)]
        local: bool,
    },
}

/// Run the config command.
pub fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Which => cmd_which(ctx),
        ConfigCommand::Init { local } => cmd_init(local),
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let config = &ctx.config;
    let cache = config.cache();
    let store_path = config.store.as_ref().and_then(|s| s.path.clone());

    if ctx.json_output {
        let effective = json!({
            "cache": cache,
            "store": { "path": store_path },
            "logging": { "dir": config.log_dir() },
            "sources": ctx.sources,
        });
        println!("{}", serde_json::to_string_pretty(&effective)?);
        return Ok(());
    }

    let dim = Style::new().dim();

    println!("{}", style("Shiny Configuration").bold());
    println!("{}", dim.apply_to("─".repeat(50)));
    println!("  cache capacity   {}", Capacity::from(cache.capacity));
    println!("  cache expiry     {}s", cache.expiry_secs);
    println!(
        "  store path       {}",
        display_or(store_path, "(platform default)")
    );
    println!(
        "  log directory    {}",
        display_or(config.log_dir(), "(console only)")
    );

    if ctx.verbose {
        println!();
        println!("{}", dim.apply_to(config.to_toml()?));
    }

    Ok(())
}

fn cmd_which(ctx: &Context) -> Result<()> {
    if ctx.sources.is_empty() {
        println!("No config files loaded (using defaults).");
        println!("Run 'shiny config init' to create one.");
    } else {
        println!("Config files (later overrides earlier):\n");
        for source in &ctx.sources {
            println!("  {}", source.display());
        }
    }
    Ok(())
}

fn cmd_init(local: bool) -> Result<()> {
    let path = if local {
        PathBuf::from("shiny.toml")
    } else {
        shiny_config::xdg_config_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
    };

    if path.exists() {
        println!("Config file already exists: {}", path.display());
        return Ok(());
    }

    let config = ShinyConfig {
        cache: Some(CacheSection::default()),
        ..ShinyConfig::default()
    };
    shiny_config::save_config(&config, &path)?;

    println!("Created {}", path.display());
    Ok(())
}

fn display_or(path: Option<PathBuf>, fallback: &str) -> String {
    path.map(|p| p.display().to_string())
        .unwrap_or_else(|| fallback.to_string())
}
