//! Deterministic synthetic market
//!
//! Last-resort values when every ranked source fails. Each value is derived
//! from an RNG seeded by the canonical token id, so repeated calls agree.

use chrono::{Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::token::{
    MarketOverview, PricePoint, TokenInfo, TokenPrice, TokenRegistry, TrendingToken,
};

/// Largest deviation from the reference price, as a fraction
const PRICE_SPREAD: f64 = 0.05;
/// Daily return band of the synthetic random walk
const DAILY_MOVE: f64 = 0.03;

#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticMarket;

impl SyntheticMarket {
    pub fn new() -> Self {
        Self
    }

    /// FNV-1a over the canonical key
    fn seed(key: &str, salt: u64) -> u64 {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325 ^ salt;
        for byte in key.bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
        hash
    }

    fn rng(token: &str, salt: u64) -> StdRng {
        StdRng::seed_from_u64(Self::seed(&TokenRegistry::canonical_key(token), salt))
    }

    /// Finite, strictly positive price for any token id
    pub fn price_usd(&self, token: &str) -> f64 {
        let mut rng = Self::rng(token, 0);
        let base = match TokenRegistry::resolve(token) {
            Some(t) => t.reference_price_usd,
            None => 10f64.powf(rng.gen_range(-2.0..2.0)),
        };
        base * (1.0 + rng.gen_range(-PRICE_SPREAD..PRICE_SPREAD))
    }

    pub fn price(&self, token: &str) -> TokenPrice {
        let key = TokenRegistry::canonical_key(token);
        let mut rng = Self::rng(token, 1);
        let current_price = self.price_usd(token);
        let (id, name) = TokenRegistry::resolve(token)
            .map(|t| (t.coingecko_id.to_string(), t.name.to_string()))
            .unwrap_or_else(|| (key.to_lowercase(), key.clone()));

        TokenPrice {
            id,
            symbol: key,
            name,
            current_price,
            price_change_percentage_24h: rng.gen_range(-5.0..5.0),
            market_cap: current_price * rng.gen_range(1.0e7..1.0e9),
            total_volume: current_price * rng.gen_range(1.0e5..1.0e7),
            last_updated: Utc::now(),
        }
    }

    pub fn token_info(&self, token: &str) -> TokenInfo {
        let price = self.price(token);
        let mut rng = Self::rng(token, 2);
        TokenInfo {
            circulating_supply: price.market_cap / price.current_price,
            id: price.id,
            symbol: price.symbol,
            name: price.name,
            current_price: price.current_price,
            market_cap: price.market_cap,
            total_volume: price.total_volume * rng.gen_range(0.9..1.1),
            price_change_percentage_24h: price.price_change_percentage_24h,
            description: None,
            image: None,
        }
    }

    pub fn market_overview(&self) -> MarketOverview {
        let mut rng = Self::rng("market", 3);
        MarketOverview {
            total_market_cap_usd: rng.gen_range(2.0e12..3.0e12),
            total_volume_usd: rng.gen_range(5.0e10..1.5e11),
            market_cap_change_percentage_24h: rng.gen_range(-3.0..3.0),
            btc_dominance: rng.gen_range(45.0..60.0),
            active_cryptocurrencies: 10_000,
        }
    }

    /// Supported tokens in registry order
    pub fn trending(&self) -> Vec<TrendingToken> {
        TokenRegistry::all()
            .iter()
            .enumerate()
            .map(|(i, t)| TrendingToken {
                id: t.coingecko_id.to_string(),
                symbol: t.symbol.to_string(),
                name: t.name.to_string(),
                market_cap_rank: None,
                score: i as u32,
            })
            .collect()
    }

    /// Daily random walk of `days + 1` samples ending at `price_usd(token)`
    pub fn history(&self, token: &str, days: u32) -> Vec<PricePoint> {
        let mut rng = Self::rng(token, 4 + days as u64);
        let samples = days as usize + 1;

        let mut prices = Vec::with_capacity(samples);
        let mut price = self.price_usd(token);
        prices.push(price);
        for _ in 1..samples {
            price /= 1.0 + rng.gen_range(-DAILY_MOVE..DAILY_MOVE);
            prices.push(price);
        }
        prices.reverse();

        let start = Utc::now() - Duration::days(days as i64);
        prices
            .into_iter()
            .enumerate()
            .map(|(i, price)| PricePoint {
                timestamp: start + Duration::days(i as i64),
                price,
            })
            .collect()
    }
}
