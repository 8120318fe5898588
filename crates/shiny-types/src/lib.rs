//! Shared types for the Shiny session store.

pub mod config;

pub use config::{
    CacheConfigProvider, ConfigProvider, HasCacheConfig, HasStoreConfig, defaults as config_defaults,
};
