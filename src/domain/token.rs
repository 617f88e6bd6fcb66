//! Token registry and market data types
//!
//! The registry is the supported-token table shared by the market data
//! sources (id translation), the trade executor (supported-token check) and
//! the simulated backend (reference exchange rates).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A token the engine knows how to price and trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportedToken {
    /// Ticker symbol (canonical key, uppercase)
    pub symbol: &'static str,
    /// Display name
    pub name: &'static str,
    /// SPL mint address
    pub mint: &'static str,
    /// Mint decimals
    pub decimals: u8,
    /// CoinGecko coin id
    pub coingecko_id: &'static str,
    /// Reference USD price used by the simulated backend and the synthetic generator
    pub reference_price_usd: f64,
}

impl SupportedToken {
    /// Convert a UI amount to base units (lamports for SOL)
    pub fn to_base_units(&self, amount: f64) -> u64 {
        (amount * 10f64.powi(self.decimals as i32)).floor() as u64
    }

    /// Convert base units back to a UI amount
    pub fn from_base_units(&self, amount: u64) -> f64 {
        amount as f64 / 10f64.powi(self.decimals as i32)
    }
}

/// SOL native mint
pub const SOL_MINT: &str = "So11111111111111111111111111111111111111112";
/// USDC mint
pub const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

const SUPPORTED_TOKENS: &[SupportedToken] = &[
    SupportedToken {
        symbol: "SOL",
        name: "Solana",
        mint: SOL_MINT,
        decimals: 9,
        coingecko_id: "solana",
        reference_price_usd: 150.0,
    },
    SupportedToken {
        symbol: "USDC",
        name: "USD Coin",
        mint: USDC_MINT,
        decimals: 6,
        coingecko_id: "usd-coin",
        reference_price_usd: 1.0,
    },
    SupportedToken {
        symbol: "USDT",
        name: "Tether",
        mint: "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB",
        decimals: 6,
        coingecko_id: "tether",
        reference_price_usd: 1.0,
    },
    SupportedToken {
        symbol: "ETH",
        name: "Ether (Wormhole)",
        mint: "7vfCXTUXx5WJV5JADk17DUJ4ksgau7utNKj4b963voxs",
        decimals: 8,
        coingecko_id: "ethereum",
        reference_price_usd: 3000.0,
    },
    SupportedToken {
        symbol: "BONK",
        name: "Bonk",
        mint: "DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263",
        decimals: 5,
        coingecko_id: "bonk",
        reference_price_usd: 0.00002,
    },
    SupportedToken {
        symbol: "JUP",
        name: "Jupiter",
        mint: "JUPyiwrYJFskUPiHa7hkeR8VUtAeFoSYbKedZNsDvCN",
        decimals: 6,
        coingecko_id: "jupiter-exchange-solana",
        reference_price_usd: 0.8,
    },
    SupportedToken {
        symbol: "RAY",
        name: "Raydium",
        mint: "4k3Dyjzvzp8eMZWUXbBCjEvwSkkk59S5iCNLY3QrkX6R",
        decimals: 6,
        coingecko_id: "raydium",
        reference_price_usd: 2.0,
    },
    SupportedToken {
        symbol: "WIF",
        name: "dogwifhat",
        mint: "EKpQGSJtjMFqKZ9KQanSqYXRcF8fBopzLHYxdM65zcjm",
        decimals: 6,
        coingecko_id: "dogwifcoin",
        reference_price_usd: 1.5,
    },
];

/// Lookup table over the supported tokens
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenRegistry;

impl TokenRegistry {
    /// All supported tokens
    pub fn all() -> &'static [SupportedToken] {
        SUPPORTED_TOKENS
    }

    /// Resolve by symbol, mint address or CoinGecko id (case-insensitive for symbol/id)
    pub fn resolve(token: &str) -> Option<&'static SupportedToken> {
        let token = token.trim();
        SUPPORTED_TOKENS.iter().find(|t| {
            t.symbol.eq_ignore_ascii_case(token)
                || t.mint == token
                || t.coingecko_id.eq_ignore_ascii_case(token)
        })
    }

    /// Canonical cache/store key for a token: registry symbol when known,
    /// otherwise the trimmed, uppercased input
    pub fn canonical_key(token: &str) -> String {
        Self::resolve(token)
            .map(|t| t.symbol.to_string())
            .unwrap_or_else(|| token.trim().to_uppercase())
    }

    /// Mock exchange rate: units of `output` received per unit of `input`
    pub fn base_rate(input: &SupportedToken, output: &SupportedToken) -> f64 {
        input.reference_price_usd / output.reference_price_usd
    }
}

/// Current price snapshot of a token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPrice {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub current_price: f64,
    pub price_change_percentage_24h: f64,
    pub market_cap: f64,
    pub total_volume: f64,
    pub last_updated: DateTime<Utc>,
}

impl TokenPrice {
    /// A price is usable only when finite and strictly positive
    pub fn is_valid(&self) -> bool {
        self.current_price.is_finite() && self.current_price > 0.0
    }
}

/// Descriptive token information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub current_price: f64,
    pub market_cap: f64,
    pub total_volume: f64,
    pub price_change_percentage_24h: f64,
    pub circulating_supply: f64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

/// Global market figures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketOverview {
    pub total_market_cap_usd: f64,
    pub total_volume_usd: f64,
    pub market_cap_change_percentage_24h: f64,
    pub btc_dominance: f64,
    pub active_cryptocurrencies: u64,
}

/// Entry of the trending list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingToken {
    pub id: String,
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub market_cap_rank: Option<u32>,
    pub score: u32,
}

/// One sample of a price history series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_by_symbol_mint_and_id() {
        assert_eq!(TokenRegistry::resolve("sol").unwrap().symbol, "SOL");
        assert_eq!(TokenRegistry::resolve(USDC_MINT).unwrap().symbol, "USDC");
        assert_eq!(TokenRegistry::resolve("jupiter-exchange-solana").unwrap().symbol, "JUP");
        assert!(TokenRegistry::resolve("DOGE").is_none());
    }

    #[test]
    fn test_canonical_key() {
        assert_eq!(TokenRegistry::canonical_key("solana"), "SOL");
        assert_eq!(TokenRegistry::canonical_key(" pepe "), "PEPE");
    }

    #[test]
    fn test_base_rate() {
        let usdc = TokenRegistry::resolve("USDC").unwrap();
        let sol = TokenRegistry::resolve("SOL").unwrap();
        assert!((TokenRegistry::base_rate(usdc, sol) - 1.0 / 150.0).abs() < 1e-12);
        assert!((TokenRegistry::base_rate(sol, usdc) - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_base_units_conversion() {
        let sol = TokenRegistry::resolve("SOL").unwrap();
        assert_eq!(sol.to_base_units(1.5), 1_500_000_000);
        assert_eq!(sol.from_base_units(250_000_000), 0.25);
    }

    #[test]
    fn test_price_validity() {
        let mut price = TokenPrice {
            id: "solana".into(),
            symbol: "SOL".into(),
            name: "Solana".into(),
            current_price: 150.0,
            price_change_percentage_24h: 0.0,
            market_cap: 0.0,
            total_volume: 0.0,
            last_updated: Utc::now(),
        };
        assert!(price.is_valid());
        price.current_price = f64::NAN;
        assert!(!price.is_valid());
        price.current_price = 0.0;
        assert!(!price.is_valid());
    }
}
