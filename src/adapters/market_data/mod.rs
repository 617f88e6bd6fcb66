//! Market Data Adapters
//!
//! Ranked price sources and the synthetic fallback:
//! - `CoinGeckoSource`: CoinGecko REST API, serves every operation
//! - `JupiterPriceClient`: Jupiter price API, prices by mint only
//! - `SyntheticMarket`: deterministic values seeded by token id

mod coingecko;
mod jupiter_price;
mod synthetic;

pub use coingecko::{CoinGeckoConfig, CoinGeckoSource};
pub use jupiter_price::JupiterPriceClient;
pub use synthetic::SyntheticMarket;
