//! Configuration Loader
//!
//! Loads and validates configuration from TOML files matching config.toml structure.
//! Every section is optional and falls back to its defaults. Secrets never live in
//! the file; they are read from the environment (`.env` is loaded by the binary).

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::application::{
    ExecutorSettings, MarketDataTtls, OrchestratorSettings, RetryPolicy, SignalSettings,
};

/// Main configuration structure matching config.toml
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub market_data: MarketDataSection,
    pub cache: CacheSection,
    pub signals: SignalsSection,
    pub execution: ExecutionSection,
    pub solana: SolanaSection,
    pub storage: StorageSection,
    pub logging: LoggingSection,
}

/// Market data sources, tried in the order listed here
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MarketDataSection {
    pub coingecko_enabled: bool,
    pub coingecko_api_url: String,
    /// Demo key; `COINGECKO_API_KEY` is used when empty
    pub coingecko_api_key: Option<String>,
    /// Jupiter price API as a secondary price source
    pub jupiter_price_enabled: bool,
    pub request_timeout_secs: u64,
}

impl Default for MarketDataSection {
    fn default() -> Self {
        Self {
            coingecko_enabled: true,
            coingecko_api_url: "https://api.coingecko.com/api/v3".to_string(),
            coingecko_api_key: None,
            jupiter_price_enabled: true,
            request_timeout_secs: 10,
        }
    }
}

impl MarketDataSection {
    /// Get API key with environment variable fallback
    pub fn get_coingecko_api_key(&self) -> Option<String> {
        non_empty(self.coingecko_api_key.as_deref()).or_else(|| env_non_empty("COINGECKO_API_KEY"))
    }
}

/// Cache capacity and lifetimes per data class
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    pub max_entries: usize,
    pub price_ttl_secs: u64,
    /// Market overview and price history
    pub market_ttl_secs: u64,
    pub token_info_ttl_secs: u64,
    pub trending_ttl_secs: u64,
    /// User strategy and position lists
    pub strategy_ttl_secs: u64,
    pub trade_history_ttl_secs: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            price_ttl_secs: 60,
            market_ttl_secs: 300,
            token_info_ttl_secs: 1800,
            trending_ttl_secs: 600,
            strategy_ttl_secs: 300,
            trade_history_ttl_secs: 60,
        }
    }
}

/// Which completion backend produces AI signals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalProviderKind {
    /// Technical signals only
    None,
    Anthropic,
    Groq,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SignalsSection {
    pub provider: SignalProviderKind,
    /// Model name; provider default when unset
    pub model: Option<String>,
    pub history_days: u32,
    pub ttl_minutes: i64,
    /// Total completion attempts per signal
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for SignalsSection {
    fn default() -> Self {
        Self {
            provider: SignalProviderKind::None,
            model: None,
            history_days: 30,
            ttl_minutes: 60,
            max_attempts: 2,
            base_backoff_ms: 500,
            max_backoff_ms: 4000,
            timeout_secs: 30,
            temperature: 0.3,
            max_tokens: 1024,
        }
    }
}

pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-haiku-latest";
pub const DEFAULT_GROQ_MODEL: &str = "llama-3.3-70b-versatile";

impl SignalsSection {
    pub fn model_name(&self) -> String {
        match (&self.model, self.provider) {
            (Some(model), _) if !model.is_empty() => model.clone(),
            (_, SignalProviderKind::Groq) => DEFAULT_GROQ_MODEL.to_string(),
            _ => DEFAULT_ANTHROPIC_MODEL.to_string(),
        }
    }

    /// API key of the selected provider, from the environment
    pub fn get_api_key(&self) -> Option<String> {
        match self.provider {
            SignalProviderKind::None => None,
            SignalProviderKind::Anthropic => env_non_empty("ANTHROPIC_API_KEY"),
            SignalProviderKind::Groq => env_non_empty("GROQ_API_KEY"),
        }
    }
}

/// Trade execution backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    Disabled,
    Paper,
    Live,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutionSection {
    pub mode: ExecutionMode,
    /// Upper bound applied to every requested slippage
    pub max_slippage_bps: u16,
    /// Slippage requested for strategy trades
    pub default_slippage_bps: u16,
    /// Multiplicative noise window for simulated market orders
    pub simulation_noise: f64,
    pub jupiter_api_url: String,
    /// `JUPITER_API_KEY` is used when empty
    pub jupiter_api_key: Option<String>,
    pub priority_fee_lamports: u64,
    pub max_retries: u32,
    /// Starting balances of every paper account, by token symbol
    pub paper_balances: HashMap<String, f64>,
}

impl Default for ExecutionSection {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Paper,
            max_slippage_bps: 300,
            default_slippage_bps: 100,
            simulation_noise: 0.002,
            jupiter_api_url: "https://api.jup.ag/swap/v1".to_string(),
            jupiter_api_key: None,
            priority_fee_lamports: 10_000,
            max_retries: 3,
            paper_balances: HashMap::from([("USDC".to_string(), 10_000.0), ("SOL".to_string(), 10.0)]),
        }
    }
}

impl ExecutionSection {
    /// Get API key with environment variable fallback
    pub fn get_jupiter_api_key(&self) -> Option<String> {
        non_empty(self.jupiter_api_key.as_deref()).or_else(|| env_non_empty("JUPITER_API_KEY"))
    }
}

/// Solana RPC configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SolanaSection {
    /// RPC endpoint (use private RPC for production)
    pub rpc_url: String,
}

impl Default for SolanaSection {
    fn default() -> Self {
        Self {
            rpc_url: "https://api.mainnet-beta.solana.com".to_string(),
        }
    }
}

impl SolanaSection {
    /// Get RPC URL with environment variable override
    /// Checks SOLANA_RPC_URL env var first, falls back to config value
    pub fn get_rpc_url(&self) -> String {
        std::env::var("SOLANA_RPC_URL").unwrap_or_else(|_| self.rpc_url.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub backend: StorageBackend,
    /// JSON store location; `~` and `$VARS` are expanded
    pub path: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Json,
            path: "~/.tradedesk/tradedesk.json".to_string(),
        }
    }
}

impl StorageSection {
    pub fn resolved_path(&self) -> Result<PathBuf, ConfigError> {
        let expanded = shellexpand::full(&self.path)
            .map_err(|e| ConfigError::ValidationError(format!("storage path: {}", e)))?;
        Ok(PathBuf::from(expanded.as_ref()))
    }
}

/// Logging configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Server secret used to key the custody cipher
pub fn custody_secret() -> Option<String> {
    env_non_empty("CUSTODY_SECRET")
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.market_data.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "request_timeout_secs must be > 0".to_string(),
            ));
        }
        if self.market_data.coingecko_enabled && self.market_data.coingecko_api_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "coingecko_api_url cannot be empty".to_string(),
            ));
        }

        if self.cache.max_entries == 0 {
            return Err(ConfigError::ValidationError(
                "cache max_entries must be > 0".to_string(),
            ));
        }

        if self.signals.history_days < 26 {
            return Err(ConfigError::ValidationError(format!(
                "history_days must be >= 26 to cover every indicator, got {}",
                self.signals.history_days
            )));
        }
        if self.signals.ttl_minutes <= 0 {
            return Err(ConfigError::ValidationError(format!(
                "ttl_minutes must be > 0, got {}",
                self.signals.ttl_minutes
            )));
        }
        if self.signals.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "max_attempts must be >= 1".to_string(),
            ));
        }

        if self.execution.max_slippage_bps > 10_000 {
            return Err(ConfigError::ValidationError(format!(
                "max_slippage_bps must be <= 10000, got {}",
                self.execution.max_slippage_bps
            )));
        }
        if self.execution.default_slippage_bps > self.execution.max_slippage_bps {
            return Err(ConfigError::ValidationError(format!(
                "default_slippage_bps ({}) exceeds max_slippage_bps ({})",
                self.execution.default_slippage_bps, self.execution.max_slippage_bps
            )));
        }
        if !(0.0..1.0).contains(&self.execution.simulation_noise) {
            return Err(ConfigError::ValidationError(format!(
                "simulation_noise must be in [0, 1), got {}",
                self.execution.simulation_noise
            )));
        }
        if let Some((token, amount)) = self
            .execution
            .paper_balances
            .iter()
            .find(|(_, amount)| !amount.is_finite() || **amount < 0.0)
        {
            return Err(ConfigError::ValidationError(format!(
                "paper balance for {} must be >= 0, got {}",
                token, amount
            )));
        }
        if self.execution.mode == ExecutionMode::Live {
            if self.execution.jupiter_api_url.is_empty() {
                return Err(ConfigError::ValidationError(
                    "jupiter_api_url cannot be empty in live mode".to_string(),
                ));
            }
            if self.solana.rpc_url.is_empty() {
                return Err(ConfigError::ValidationError(
                    "rpc_url cannot be empty in live mode".to_string(),
                ));
            }
        }

        if self.storage.backend == StorageBackend::Json && self.storage.path.is_empty() {
            return Err(ConfigError::ValidationError(
                "storage path cannot be empty".to_string(),
            ));
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "unknown log level: {}",
                self.logging.level
            )));
        }

        Ok(())
    }
}

impl From<&CacheSection> for MarketDataTtls {
    fn from(cache: &CacheSection) -> Self {
        MarketDataTtls {
            price: Duration::from_secs(cache.price_ttl_secs),
            market: Duration::from_secs(cache.market_ttl_secs),
            token_info: Duration::from_secs(cache.token_info_ttl_secs),
            trending: Duration::from_secs(cache.trending_ttl_secs),
        }
    }
}

impl From<&SignalsSection> for SignalSettings {
    fn from(signals: &SignalsSection) -> Self {
        SignalSettings {
            history_days: signals.history_days,
            ttl_minutes: signals.ttl_minutes,
        }
    }
}

impl From<&SignalsSection> for RetryPolicy {
    fn from(signals: &SignalsSection) -> Self {
        RetryPolicy {
            max_attempts: signals.max_attempts,
            base_backoff: Duration::from_millis(signals.base_backoff_ms),
            max_backoff: Duration::from_millis(signals.max_backoff_ms),
            ..RetryPolicy::default()
        }
    }
}

impl From<&Config> for ExecutorSettings {
    fn from(config: &Config) -> Self {
        ExecutorSettings {
            max_slippage_bps: config.execution.max_slippage_bps,
            history_cache_ttl: Duration::from_secs(config.cache.trade_history_ttl_secs),
        }
    }
}

impl From<&Config> for OrchestratorSettings {
    fn from(config: &Config) -> Self {
        OrchestratorSettings {
            slippage_bps: config.execution.default_slippage_bps,
            cache_ttl: Duration::from_secs(config.cache.strategy_ttl_secs),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty()).map(str::to_string)
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
