//! TradeDesk - Strategy execution and signal engine
//!
//! Market data with ranked fallback, AI or RSI trading signals, delegated
//! key custody, simulated or live Jupiter swaps and a strategy/position
//! lifecycle with confidence-weighted sizing.
//!
//! # Modules
//!
//! - `domain`: Core types and rules (tokens, signals, trades, strategies, positions, authority)
//! - `ports`: Trait abstractions (MarketDataSource, CompletionProvider, Store, Cache, settlement)
//! - `strategy`: Technical indicators, prompt and AI response grammar, RSI fallback
//! - `adapters`: External implementations (CoinGecko, Jupiter, Solana, LLM, stores, CLI)
//! - `config`: Configuration loading and validation
//! - `application`: The services and their wiring points

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod strategy;
