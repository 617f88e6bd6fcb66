//! Recording fakes for the ports, shared by the unit tests

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};

use super::completion::{CompletionError, CompletionProvider};
use super::market_data::{MarketDataSource, SourceError};
use super::settlement::{BalanceOracle, SettlementError};
use crate::domain::token::{
    MarketOverview, PricePoint, SupportedToken, TokenInfo, TokenPrice, TokenRegistry, TrendingToken,
};

/// Market data source with configurable prices that records every call
#[derive(Debug, Default, Clone)]
pub struct FakeMarketData {
    name: String,
    prices: Arc<Mutex<HashMap<String, f64>>>,
    histories: Arc<Mutex<HashMap<String, Vec<f64>>>>,
    failing: Arc<Mutex<bool>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeMarketData {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Builder method to set the price of a token
    pub fn with_price(self, token: &str, price: f64) -> Self {
        self.set_price(token, price);
        self
    }

    /// Builder method to set a daily close series for a token, oldest first
    pub fn with_history(self, token: &str, closes: Vec<f64>) -> Self {
        self.histories
            .lock()
            .unwrap()
            .insert(TokenRegistry::canonical_key(token), closes);
        self
    }

    pub fn set_price(&self, token: &str, price: f64) {
        self.prices
            .lock()
            .unwrap()
            .insert(TokenRegistry::canonical_key(token), price);
    }

    /// Make every call fail with an HTTP error
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    /// Get all recorded calls as `method:token`
    pub fn get_calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.split(':').next() == Some(method))
            .count()
    }

    fn record(&self, method: &str, token: &str) -> Result<(), SourceError> {
        self.calls.lock().unwrap().push(format!("{}:{}", method, token));
        if *self.failing.lock().unwrap() {
            return Err(SourceError::Http(format!("{} unavailable", self.name)));
        }
        Ok(())
    }

    fn lookup(&self, token: &str) -> Result<TokenPrice, SourceError> {
        let key = TokenRegistry::canonical_key(token);
        let price = self
            .prices
            .lock()
            .unwrap()
            .get(&key)
            .copied()
            .ok_or_else(|| SourceError::NoData(key.clone()))?;
        Ok(TokenPrice {
            id: key.to_lowercase(),
            symbol: key.clone(),
            name: key,
            current_price: price,
            price_change_percentage_24h: 0.0,
            market_cap: 0.0,
            total_volume: 0.0,
            last_updated: Utc::now(),
        })
    }
}

#[async_trait]
impl MarketDataSource for FakeMarketData {
    fn name(&self) -> &str {
        &self.name
    }

    async fn price(&self, token_id: &str) -> Result<TokenPrice, SourceError> {
        self.record("price", token_id)?;
        self.lookup(token_id)
    }

    async fn token_info(&self, token_id: &str) -> Result<TokenInfo, SourceError> {
        self.record("token_info", token_id)?;
        let price = self.lookup(token_id)?;
        Ok(TokenInfo {
            id: price.id,
            symbol: price.symbol,
            name: price.name,
            current_price: price.current_price,
            market_cap: 0.0,
            total_volume: 0.0,
            price_change_percentage_24h: 0.0,
            circulating_supply: 0.0,
            description: None,
            image: None,
        })
    }

    async fn market_overview(&self) -> Result<MarketOverview, SourceError> {
        self.record("market_overview", "-")?;
        Ok(MarketOverview {
            total_market_cap_usd: 2.5e12,
            total_volume_usd: 9.0e10,
            market_cap_change_percentage_24h: 1.0,
            btc_dominance: 52.0,
            active_cryptocurrencies: 10_000,
        })
    }

    async fn trending(&self) -> Result<Vec<TrendingToken>, SourceError> {
        self.record("trending", "-")?;
        Ok(vec![TrendingToken {
            id: "solana".into(),
            symbol: "SOL".into(),
            name: "Solana".into(),
            market_cap_rank: Some(5),
            score: 0,
        }])
    }

    async fn bulk_prices(&self, token_ids: &[String]) -> Result<Vec<TokenPrice>, SourceError> {
        self.record("bulk_prices", &token_ids.join(","))?;
        Ok(token_ids.iter().filter_map(|id| self.lookup(id).ok()).collect())
    }

    async fn history(&self, token_id: &str, days: u32) -> Result<Vec<PricePoint>, SourceError> {
        self.record("history", token_id)?;
        let key = TokenRegistry::canonical_key(token_id);
        let closes = self
            .histories
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .ok_or_else(|| SourceError::NoData(key))?;
        let start = Utc::now() - Duration::days(days as i64);
        Ok(closes
            .into_iter()
            .enumerate()
            .map(|(i, price)| PricePoint {
                timestamp: start + Duration::days(i as i64),
                price,
            })
            .collect())
    }
}

/// Completion provider replaying scripted responses in order.
/// Once the script is exhausted every call fails.
#[derive(Debug, Default, Clone)]
pub struct ScriptedCompletion {
    script: Arc<Mutex<VecDeque<Result<String, CompletionError>>>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to queue a response
    pub fn then(self, response: Result<String, CompletionError>) -> Self {
        self.script.lock().unwrap().push_back(response);
        self
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    /// Get all recorded prompts
    pub fn get_prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedCompletion {
    async fn complete(&self, _system: &str, prompt: &str) -> Result<String, CompletionError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(CompletionError::Network("script exhausted".into())))
    }
}

/// Balance oracle with fixed per-user balances
#[derive(Debug, Default, Clone)]
pub struct FixedBalances {
    balances: Arc<Mutex<HashMap<(String, String), f64>>>,
}

impl FixedBalances {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set a user's balance of a token symbol
    pub fn with_balance(self, user_id: &str, symbol: &str, amount: f64) -> Self {
        self.balances
            .lock()
            .unwrap()
            .insert((user_id.to_string(), symbol.to_uppercase()), amount);
        self
    }
}

#[async_trait]
impl BalanceOracle for FixedBalances {
    async fn balance(
        &self,
        user_id: &str,
        _owner: Option<&str>,
        token: &SupportedToken,
    ) -> Result<f64, SettlementError> {
        Ok(self
            .balances
            .lock()
            .unwrap()
            .get(&(user_id.to_string(), token.symbol.to_string()))
            .copied()
            .unwrap_or(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fake_market_data_records_calls() {
        let fake = FakeMarketData::new("fake").with_price("SOL", 150.0);
        assert_eq!(fake.price("solana").await.unwrap().current_price, 150.0);
        assert!(matches!(fake.price("BONK").await, Err(SourceError::NoData(_))));

        fake.set_failing(true);
        assert!(matches!(fake.price("SOL").await, Err(SourceError::Http(_))));
        assert_eq!(fake.call_count("price"), 3);
    }

    #[tokio::test]
    async fn test_scripted_completion_replays_in_order() {
        let provider = ScriptedCompletion::new()
            .then(Ok("first".into()))
            .then(Err(CompletionError::RateLimited("slow down".into())));
        assert_eq!(provider.complete("s", "p1").await.unwrap(), "first");
        assert!(provider.complete("s", "p2").await.is_err());
        assert!(provider.complete("s", "p3").await.is_err());
        assert_eq!(provider.get_prompts(), vec!["p1", "p2", "p3"]);
    }
}
