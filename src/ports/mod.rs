//! Ports Layer - Trait definitions for external dependencies
//!
//! This module defines the interfaces (ports) that adapters must implement.
//! Following hexagonal architecture, these traits abstract:
//! - Ranked market data sources (prices, token info, trending, history)
//! - AI text-completion providers
//! - The durable store (authorities, trade history, strategies, positions)
//! - The shared TTL cache
//! - On-chain balances and swap settlement

pub mod market_data;
pub mod completion;
pub mod store;
pub mod cache;
pub mod settlement;
#[cfg(test)]
pub mod mocks;

// Re-export main traits and types
pub use market_data::{MarketDataSource, SourceError};
pub use completion::{CompletionError, CompletionProvider};
pub use store::{Store, StoreError, StoreResult};
pub use cache::Cache;
pub use settlement::{BalanceOracle, SettlementError, SwapAggregator, SwapFill};
