//! Market Data Service
//!
//! Cache-aside over ranked sources with a synthetic floor. Lookups never
//! fail: every source error is logged and the next source is tried, and
//! when all of them fail the deterministic synthetic market answers.
//! Synthetic answers are not cached, so a recovered source is picked up on
//! the next call.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::adapters::market_data::SyntheticMarket;
use crate::domain::token::{
    MarketOverview, PricePoint, TokenInfo, TokenPrice, TokenRegistry, TrendingToken,
};
use crate::ports::cache::{keys, Cache};
use crate::ports::market_data::{MarketDataSource, SourceError};

/// Cache lifetimes per data class
#[derive(Debug, Clone, PartialEq)]
pub struct MarketDataTtls {
    pub price: Duration,
    /// Market overview and price history
    pub market: Duration,
    pub token_info: Duration,
    pub trending: Duration,
}

impl Default for MarketDataTtls {
    fn default() -> Self {
        Self {
            price: Duration::from_secs(60),
            market: Duration::from_secs(300),
            token_info: Duration::from_secs(1800),
            trending: Duration::from_secs(600),
        }
    }
}

#[derive(Clone)]
pub struct MarketDataService {
    sources: Vec<Arc<dyn MarketDataSource>>,
    cache: Arc<dyn Cache>,
    synthetic: SyntheticMarket,
    ttls: MarketDataTtls,
}

impl MarketDataService {
    /// `sources` are tried in the given order
    pub fn new(sources: Vec<Arc<dyn MarketDataSource>>, cache: Arc<dyn Cache>, ttls: MarketDataTtls) -> Self {
        Self {
            sources,
            cache,
            synthetic: SyntheticMarket::new(),
            ttls,
        }
    }

    /// First successful answer in rank order
    async fn first_success<T, F, Fut>(&self, what: &str, op: F) -> Option<T>
    where
        F: Fn(Arc<dyn MarketDataSource>) -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        for source in &self.sources {
            match op(Arc::clone(source)).await {
                Ok(value) => return Some(value),
                Err(SourceError::Unsupported(_)) => {
                    tracing::debug!(source = source.name(), "{} not supported", what);
                }
                Err(e) => {
                    tracing::warn!(source = source.name(), "{} failed: {}", what, e);
                }
            }
        }
        None
    }

    /// Full price record for one token
    pub async fn get_price_data(&self, token: &str) -> TokenPrice {
        let key = keys::price(&TokenRegistry::canonical_key(token));
        if let Some(cached) = self.cache.get_typed::<TokenPrice>(&key).await {
            return cached;
        }

        let id = token.to_string();
        let fetched = self
            .first_success("price", |source| {
                let id = id.clone();
                async move {
                    let price = source.price(&id).await?;
                    if price.is_valid() {
                        Ok(price)
                    } else {
                        Err(SourceError::Parse(format!("invalid price {}", price.current_price)))
                    }
                }
            })
            .await;

        match fetched {
            Some(price) => {
                self.cache.set_typed(&key, &price, self.ttls.price).await;
                price
            }
            None => {
                tracing::warn!(token, "All price sources failed, using synthetic price");
                self.synthetic.price(token)
            }
        }
    }

    /// USD price, always finite and strictly positive
    pub async fn get_token_price(&self, token: &str) -> f64 {
        let price = self.get_price_data(token).await.current_price;
        if price.is_finite() && price > 0.0 {
            price
        } else {
            self.synthetic.price_usd(token)
        }
    }

    pub async fn get_token_info(&self, token: &str) -> TokenInfo {
        let key = keys::token_info(&TokenRegistry::canonical_key(token));
        if let Some(cached) = self.cache.get_typed::<TokenInfo>(&key).await {
            return cached;
        }

        let id = token.to_string();
        let fetched = self
            .first_success("token info", |source| {
                let id = id.clone();
                async move { source.token_info(&id).await }
            })
            .await;

        match fetched {
            Some(info) => {
                self.cache.set_typed(&key, &info, self.ttls.token_info).await;
                info
            }
            None => self.synthetic.token_info(token),
        }
    }

    pub async fn get_market_overview(&self) -> MarketOverview {
        let key = keys::market_overview();
        if let Some(cached) = self.cache.get_typed::<MarketOverview>(&key).await {
            return cached;
        }

        match self.first_success("market overview", |source| async move { source.market_overview().await }).await {
            Some(overview) => {
                self.cache.set_typed(&key, &overview, self.ttls.market).await;
                overview
            }
            None => self.synthetic.market_overview(),
        }
    }

    pub async fn get_trending_tokens(&self) -> Vec<TrendingToken> {
        let key = keys::trending();
        if let Some(cached) = self.cache.get_typed::<Vec<TrendingToken>>(&key).await {
            return cached;
        }

        match self.first_success("trending", |source| async move { source.trending().await }).await {
            Some(trending) => {
                self.cache.set_typed(&key, &trending, self.ttls.trending).await;
                trending
            }
            None => self.synthetic.trending(),
        }
    }

    /// Prices for several tokens, one entry per distinct token in input
    /// order. Cached ids are served from cache; misses go out in one bulk
    /// request per source.
    pub async fn get_token_prices(&self, tokens: &[String]) -> Vec<TokenPrice> {
        let mut order: Vec<(String, String)> = Vec::new();
        let mut seen = HashSet::new();
        for token in tokens {
            let key = TokenRegistry::canonical_key(token);
            if seen.insert(key.clone()) {
                order.push((key, token.clone()));
            }
        }

        let mut found: HashMap<String, TokenPrice> = HashMap::new();
        for (key, _) in &order {
            if let Some(cached) = self.cache.get_typed::<TokenPrice>(&keys::price(key)).await {
                found.insert(key.clone(), cached);
            }
        }

        for source in &self.sources {
            let misses: Vec<&(String, String)> = order.iter().filter(|(k, _)| !found.contains_key(k)).collect();
            if misses.is_empty() {
                break;
            }
            let ids: Vec<String> = misses.iter().map(|(_, id)| id.clone()).collect();
            let miss_keys: HashSet<String> = misses.iter().map(|(k, _)| k.clone()).collect();

            match source.bulk_prices(&ids).await {
                Ok(prices) => {
                    for price in prices.into_iter().filter(|p| p.is_valid()) {
                        let key = [&price.symbol, &price.id]
                            .into_iter()
                            .map(|s| TokenRegistry::canonical_key(s))
                            .find(|k| miss_keys.contains(k) && !found.contains_key(k));
                        if let Some(key) = key {
                            self.cache.set_typed(&keys::price(&key), &price, self.ttls.price).await;
                            found.insert(key, price);
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(source = source.name(), "bulk price failed: {}", e);
                }
            }
        }

        order
            .into_iter()
            .map(|(key, id)| {
                found.remove(&key).unwrap_or_else(|| {
                    tracing::warn!(token = %id, "No source priced token, using synthetic price");
                    self.synthetic.price(&id)
                })
            })
            .collect()
    }

    /// Daily prices covering the last `days` days, oldest first
    pub async fn get_token_price_history(&self, token: &str, days: u32) -> Vec<PricePoint> {
        let key = keys::history(&TokenRegistry::canonical_key(token), days);
        if let Some(cached) = self.cache.get_typed::<Vec<PricePoint>>(&key).await {
            return cached;
        }

        let id = token.to_string();
        let fetched = self
            .first_success("price history", |source| {
                let id = id.clone();
                async move {
                    let points = source.history(&id, days).await?;
                    if points.is_empty() || points.iter().any(|p| !(p.price.is_finite() && p.price > 0.0)) {
                        Err(SourceError::Parse("invalid price history".into()))
                    } else {
                        Ok(points)
                    }
                }
            })
            .await;

        match fetched {
            Some(points) => {
                self.cache.set_typed(&key, &points, self.ttls.market).await;
                points
            }
            None => {
                tracing::warn!(token, "All history sources failed, using synthetic history");
                self.synthetic.history(token, days)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::cache::InMemoryCache;
    use crate::ports::mocks::FakeMarketData;

    fn service(sources: Vec<FakeMarketData>) -> MarketDataService {
        let sources = sources
            .into_iter()
            .map(|s| Arc::new(s) as Arc<dyn MarketDataSource>)
            .collect();
        MarketDataService::new(sources, Arc::new(InMemoryCache::new()), MarketDataTtls::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_price_cached_within_ttl() {
        let source = FakeMarketData::new("primary").with_price("SOL", 150.0);
        let svc = service(vec![source.clone()]);

        assert_eq!(svc.get_token_price("SOL").await, 150.0);
        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(svc.get_token_price("SOL").await, 150.0);
        assert_eq!(source.call_count("price"), 1);

        tokio::time::advance(Duration::from_secs(31)).await;
        source.set_price("SOL", 160.0);
        assert_eq!(svc.get_token_price("SOL").await, 160.0);
        assert_eq!(source.call_count("price"), 2);
    }

    #[tokio::test]
    async fn test_falls_through_to_next_source() {
        let primary = FakeMarketData::new("primary").with_price("SOL", 150.0);
        primary.set_failing(true);
        let secondary = FakeMarketData::new("secondary").with_price("SOL", 151.0);
        let svc = service(vec![primary.clone(), secondary.clone()]);

        assert_eq!(svc.get_token_price("SOL").await, 151.0);
        assert_eq!(primary.call_count("price"), 1);
        assert_eq!(secondary.call_count("price"), 1);
    }

    #[tokio::test]
    async fn test_invalid_price_skipped() {
        let primary = FakeMarketData::new("primary").with_price("SOL", 0.0);
        let secondary = FakeMarketData::new("secondary").with_price("SOL", 149.0);
        let svc = service(vec![primary, secondary]);
        assert_eq!(svc.get_token_price("SOL").await, 149.0);
    }

    #[tokio::test]
    async fn test_synthetic_when_all_down_and_not_cached() {
        let source = FakeMarketData::new("primary").with_price("SOL", 150.0);
        source.set_failing(true);
        let svc = service(vec![source.clone()]);

        let price = svc.get_token_price("SOL").await;
        assert!(price.is_finite() && price > 0.0);
        assert_eq!(price, svc.get_token_price("SOL").await);
        assert_eq!(source.call_count("price"), 2);

        source.set_failing(false);
        assert_eq!(svc.get_token_price("SOL").await, 150.0);
    }

    #[tokio::test]
    async fn test_no_sources_still_prices() {
        let svc = service(vec![]);
        let price = svc.get_token_price("NOT-A-TOKEN").await;
        assert!(price.is_finite() && price > 0.0);
        assert!(!svc.get_trending_tokens().await.is_empty());
        assert_eq!(svc.get_token_price_history("SOL", 30).await.len(), 31);
    }

    #[tokio::test]
    async fn test_bulk_fetches_only_misses() {
        let source = FakeMarketData::new("primary")
            .with_price("SOL", 150.0)
            .with_price("USDC", 1.0);
        let svc = service(vec![source.clone()]);

        assert_eq!(svc.get_token_price("SOL").await, 150.0);
        let prices = svc
            .get_token_prices(&["SOL".to_string(), "usdc".to_string(), "BONK".to_string(), "sol".to_string()])
            .await;

        assert_eq!(prices.len(), 3);
        assert_eq!(prices[0].current_price, 150.0);
        assert_eq!(prices[1].current_price, 1.0);
        assert!(prices[2].current_price > 0.0);
        assert_eq!(source.get_calls().last().unwrap(), "bulk_prices:usdc,BONK");

        // USDC is now cached individually
        svc.get_token_price("USDC").await;
        assert_eq!(source.call_count("price"), 1);
    }

    #[tokio::test]
    async fn test_history_cached_per_days() {
        let closes: Vec<f64> = (0..31).map(|i| 100.0 + i as f64).collect();
        let source = FakeMarketData::new("primary").with_history("SOL", closes);
        let svc = service(vec![source.clone()]);

        assert_eq!(svc.get_token_price_history("SOL", 30).await.len(), 31);
        svc.get_token_price_history("solana", 30).await;
        assert_eq!(source.call_count("history"), 1);
    }
}
