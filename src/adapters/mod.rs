//! Adapters Layer - External System Implementations
//!
//! This module contains implementations of the port traits:
//! - Store: in-memory and JSON-file persistence
//! - Cache: in-process TTL cache
//! - Market Data: CoinGecko, Jupiter price API, synthetic fallback
//! - LLM: Anthropic and OpenAI-compatible completion clients
//! - Jupiter: live swap aggregator
//! - Solana: RPC client, delegated wallets, on-chain balances
//! - Paper: simulated balances
//! - CLI: Command-line interface handlers

pub mod cache;
pub mod cli;
pub mod jupiter;
pub mod llm;
pub mod market_data;
pub mod paper;
pub mod solana;
pub mod store;

pub use cache::InMemoryCache;
pub use cli::CliApp;
pub use jupiter::{JupiterClient, JupiterConfig};
pub use llm::{LlmClient, LlmProvider};
pub use market_data::{CoinGeckoConfig, CoinGeckoSource, JupiterPriceClient, SyntheticMarket};
pub use paper::PaperLedger;
pub use solana::{DelegatedWallet, SolanaBalanceOracle, SolanaClient};
pub use store::{InMemoryStore, JsonFileStore};
