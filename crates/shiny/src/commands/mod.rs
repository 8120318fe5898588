//! CLI command handlers.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use shiny_config::ShinyConfig;
use shiny_session::{CacheConfig, SessionCache};
use shiny_store::SqliteBackend;

pub mod config;
pub mod sessions;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Merged configuration.
    pub config: ShinyConfig,
    /// Config files that were loaded, lowest precedence first.
    pub sources: Vec<PathBuf>,
    /// Database path from the command line.
    pub db: Option<PathBuf>,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Open the durable session store.
    pub fn open_store(&self) -> Result<Arc<SqliteBackend>> {
        let store = match &self.db {
            Some(path) => SqliteBackend::open(path)
                .with_context(|| format!("opening session store {}", path.display()))?,
            None => SqliteBackend::from_store_config(&self.config)
                .context("opening configured session store")?,
        };
        Ok(Arc::new(store))
    }

    /// Build a session cache over the given store.
    pub fn cache(&self, store: &Arc<SqliteBackend>) -> SessionCache<SqliteBackend> {
        SessionCache::with_shared_backend(
            CacheConfig::from_provider(&self.config),
            Arc::clone(store),
        )
    }
}
