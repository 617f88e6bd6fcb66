//! CoinGecko REST source
//!
//! Primary market data source: the only one that serves token info, the
//! global overview, trending searches and history.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::domain::token::{
    MarketOverview, PricePoint, TokenInfo, TokenPrice, TokenRegistry, TrendingToken,
};
use crate::ports::market_data::{MarketDataSource, SourceError};

pub const COINGECKO_API: &str = "https://api.coingecko.com/api/v3";

#[derive(Debug, Clone)]
pub struct CoinGeckoConfig {
    pub api_base_url: String,
    /// Demo API key for higher rate limits
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for CoinGeckoConfig {
    fn default() -> Self {
        Self {
            api_base_url: COINGECKO_API.to_string(),
            api_key: None,
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoinGeckoSource {
    config: CoinGeckoConfig,
    http: Client,
}

impl CoinGeckoSource {
    pub fn new(config: CoinGeckoConfig) -> Result<Self, SourceError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SourceError::Http(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { config, http })
    }

    /// CoinGecko id for a symbol, mint or id
    fn coin_id(token: &str) -> String {
        TokenRegistry::resolve(token)
            .map(|t| t.coingecko_id.to_string())
            .unwrap_or_else(|| token.trim().to_lowercase())
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, SourceError> {
        let url = format!("{}{}", self.config.api_base_url, path);
        let mut req = self.http.get(&url).query(query);
        if let Some(ref key) = self.config.api_key {
            req = req.header("x-cg-demo-api-key", key);
        }

        let response = req.send().await?;
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(SourceError::RateLimited("coingecko".into()));
        }
        if status == StatusCode::NOT_FOUND {
            return Err(SourceError::NoData(path.to_string()));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SourceError::Http(format!("coingecko {}: {}", status, text)));
        }
        response
            .json()
            .await
            .map_err(|e| SourceError::Parse(e.to_string()))
    }

    async fn markets(&self, ids: &[String]) -> Result<Vec<MarketRow>, SourceError> {
        self.get_json(
            "/coins/markets",
            &[
                ("vs_currency", "usd".to_string()),
                ("ids", ids.join(",")),
                ("price_change_percentage", "24h".to_string()),
            ],
        )
        .await
    }
}

#[derive(Debug, Deserialize)]
struct MarketRow {
    id: String,
    name: String,
    current_price: Option<f64>,
    market_cap: Option<f64>,
    total_volume: Option<f64>,
    price_change_percentage_24h: Option<f64>,
    last_updated: Option<DateTime<Utc>>,
}

impl MarketRow {
    fn into_price(self) -> Result<TokenPrice, SourceError> {
        let price = TokenPrice {
            symbol: TokenRegistry::canonical_key(&self.id),
            id: self.id,
            name: self.name,
            current_price: self.current_price.unwrap_or(0.0),
            price_change_percentage_24h: self.price_change_percentage_24h.unwrap_or(0.0),
            market_cap: self.market_cap.unwrap_or(0.0),
            total_volume: self.total_volume.unwrap_or(0.0),
            last_updated: self.last_updated.unwrap_or_else(Utc::now),
        };
        if price.is_valid() {
            Ok(price)
        } else {
            Err(SourceError::Parse(format!("invalid price for {}", price.id)))
        }
    }
}

#[derive(Debug, Deserialize)]
struct CoinDetail {
    id: String,
    symbol: String,
    name: String,
    #[serde(default)]
    description: HashMap<String, String>,
    #[serde(default)]
    image: HashMap<String, String>,
    market_data: CoinMarketData,
}

#[derive(Debug, Deserialize)]
struct CoinMarketData {
    #[serde(default)]
    current_price: HashMap<String, f64>,
    #[serde(default)]
    market_cap: HashMap<String, f64>,
    #[serde(default)]
    total_volume: HashMap<String, f64>,
    price_change_percentage_24h: Option<f64>,
    circulating_supply: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct GlobalResponse {
    data: GlobalData,
}

#[derive(Debug, Deserialize)]
struct GlobalData {
    active_cryptocurrencies: u64,
    total_market_cap: HashMap<String, f64>,
    total_volume: HashMap<String, f64>,
    market_cap_percentage: HashMap<String, f64>,
    market_cap_change_percentage_24h_usd: f64,
}

#[derive(Debug, Deserialize)]
struct TrendingResponse {
    coins: Vec<TrendingEntry>,
}

#[derive(Debug, Deserialize)]
struct TrendingEntry {
    item: TrendingItem,
}

#[derive(Debug, Deserialize)]
struct TrendingItem {
    id: String,
    symbol: String,
    name: String,
    market_cap_rank: Option<u32>,
    #[serde(default)]
    score: u32,
}

#[derive(Debug, Deserialize)]
struct MarketChart {
    /// `[unix_ms, price]` pairs
    prices: Vec<(f64, f64)>,
}

#[async_trait]
impl MarketDataSource for CoinGeckoSource {
    fn name(&self) -> &str {
        "coingecko"
    }

    async fn price(&self, token_id: &str) -> Result<TokenPrice, SourceError> {
        let id = Self::coin_id(token_id);
        self.markets(&[id.clone()])
            .await?
            .into_iter()
            .next()
            .ok_or(SourceError::NoData(id))?
            .into_price()
    }

    async fn token_info(&self, token_id: &str) -> Result<TokenInfo, SourceError> {
        let id = Self::coin_id(token_id);
        let detail: CoinDetail = self
            .get_json(
                &format!("/coins/{}", id),
                &[
                    ("localization", "false".to_string()),
                    ("tickers", "false".to_string()),
                    ("community_data", "false".to_string()),
                    ("developer_data", "false".to_string()),
                ],
            )
            .await?;

        let market = detail.market_data;
        let current_price = market.current_price.get("usd").copied().unwrap_or(0.0);
        if !(current_price.is_finite() && current_price > 0.0) {
            return Err(SourceError::Parse(format!("invalid price for {}", id)));
        }

        Ok(TokenInfo {
            id: detail.id,
            symbol: detail.symbol.to_uppercase(),
            name: detail.name,
            current_price,
            market_cap: market.market_cap.get("usd").copied().unwrap_or(0.0),
            total_volume: market.total_volume.get("usd").copied().unwrap_or(0.0),
            price_change_percentage_24h: market.price_change_percentage_24h.unwrap_or(0.0),
            circulating_supply: market.circulating_supply.unwrap_or(0.0),
            description: detail.description.get("en").filter(|d| !d.is_empty()).cloned(),
            image: detail.image.get("large").cloned(),
        })
    }

    async fn market_overview(&self) -> Result<MarketOverview, SourceError> {
        let global: GlobalResponse = self.get_json("/global", &[]).await?;
        let data = global.data;
        Ok(MarketOverview {
            total_market_cap_usd: data.total_market_cap.get("usd").copied().unwrap_or(0.0),
            total_volume_usd: data.total_volume.get("usd").copied().unwrap_or(0.0),
            market_cap_change_percentage_24h: data.market_cap_change_percentage_24h_usd,
            btc_dominance: data.market_cap_percentage.get("btc").copied().unwrap_or(0.0),
            active_cryptocurrencies: data.active_cryptocurrencies,
        })
    }

    async fn trending(&self) -> Result<Vec<TrendingToken>, SourceError> {
        let trending: TrendingResponse = self.get_json("/search/trending", &[]).await?;
        if trending.coins.is_empty() {
            return Err(SourceError::NoData("trending".into()));
        }
        Ok(trending
            .coins
            .into_iter()
            .map(|entry| TrendingToken {
                id: entry.item.id,
                symbol: entry.item.symbol.to_uppercase(),
                name: entry.item.name,
                market_cap_rank: entry.item.market_cap_rank,
                score: entry.item.score,
            })
            .collect())
    }

    async fn bulk_prices(&self, token_ids: &[String]) -> Result<Vec<TokenPrice>, SourceError> {
        let ids: Vec<String> = token_ids.iter().map(|t| Self::coin_id(t)).collect();
        let rows = self.markets(&ids).await?;
        Ok(rows.into_iter().filter_map(|row| row.into_price().ok()).collect())
    }

    async fn history(&self, token_id: &str, days: u32) -> Result<Vec<PricePoint>, SourceError> {
        let id = Self::coin_id(token_id);
        let chart: MarketChart = self
            .get_json(
                &format!("/coins/{}/market_chart", id),
                &[
                    ("vs_currency", "usd".to_string()),
                    ("days", days.to_string()),
                    ("interval", "daily".to_string()),
                ],
            )
            .await?;

        let points: Vec<PricePoint> = chart
            .prices
            .into_iter()
            .filter(|(_, price)| price.is_finite() && *price > 0.0)
            .filter_map(|(ms, price)| {
                Utc.timestamp_millis_opt(ms as i64)
                    .single()
                    .map(|timestamp| PricePoint { timestamp, price })
            })
            .collect();

        if points.is_empty() {
            return Err(SourceError::NoData(id));
        }
        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coin_id_translation() {
        assert_eq!(CoinGeckoSource::coin_id("SOL"), "solana");
        assert_eq!(CoinGeckoSource::coin_id("wif"), "dogwifcoin");
        assert_eq!(CoinGeckoSource::coin_id("Pepe"), "pepe");
    }

    #[test]
    fn test_market_row_parsing() {
        let json = r#"[{"id":"solana","symbol":"sol","name":"Solana","current_price":151.2,
            "market_cap":7.0e10,"total_volume":2.0e9,"price_change_percentage_24h":-1.5,
            "last_updated":"2024-05-01T12:00:00.000Z"}]"#;
        let rows: Vec<MarketRow> = serde_json::from_str(json).unwrap();
        let price = rows.into_iter().next().unwrap().into_price().unwrap();
        assert_eq!(price.symbol, "SOL");
        assert_eq!(price.current_price, 151.2);
        assert_eq!(price.price_change_percentage_24h, -1.5);
    }

    #[test]
    fn test_null_price_rejected() {
        let json = r#"[{"id":"solana","symbol":"sol","name":"Solana","current_price":null,
            "market_cap":null,"total_volume":null,"price_change_percentage_24h":null,
            "last_updated":null}]"#;
        let rows: Vec<MarketRow> = serde_json::from_str(json).unwrap();
        assert!(rows.into_iter().next().unwrap().into_price().is_err());
    }

    #[test]
    fn test_trending_parsing() {
        let json = r#"{"coins":[{"item":{"id":"bonk","symbol":"bonk","name":"Bonk","market_cap_rank":60,"score":0}}]}"#;
        let parsed: TrendingResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.coins[0].item.market_cap_rank, Some(60));
    }

    #[test]
    fn test_source_creation() {
        assert!(CoinGeckoSource::new(CoinGeckoConfig::default()).is_ok());
    }
}
