//! Configuration Module
//!
//! Loads and validates configuration from TOML files.

pub mod loader;

pub use loader::{
    custody_secret, load_config, CacheSection, Config, ConfigError, ExecutionMode,
    ExecutionSection, LoggingSection, MarketDataSection, SignalProviderKind, SignalsSection,
    SolanaSection, StorageBackend, StorageSection,
};
