//! Configuration system for the Shiny session store.
//!
//! Provides TOML-based configuration with:
//! - `[cache]` capacity and expiry for the in-memory session cache
//! - `[store]` location of the durable session database
//! - `[logging]` log file directory
//! - Config file layering (user config dir + project-local overrides)

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    ConfigSource, LoadedConfig, load_config, load_config_file, load_config_with_options,
    save_config, xdg_config_dir, xdg_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
