use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::domain::token::{
    MarketOverview, PricePoint, TokenInfo, TokenPrice, TokenRegistry, TrendingToken,
};
use crate::ports::market_data::{MarketDataSource, SourceError};

const JUPITER_PRICE_API: &str = "https://api.jup.ag/price/v2";

/// Jupiter price API, secondary source. Serves USD prices by mint only.
#[derive(Debug, Clone)]
pub struct JupiterPriceClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl JupiterPriceClient {
    pub fn new(api_key: Option<String>) -> Result<Self, SourceError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| SourceError::Http(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base_url: JUPITER_PRICE_API.to_string(),
            api_key,
        })
    }

    /// Mint for a registry token; unknown ids are assumed to be mints already
    fn mint_for(token: &str) -> String {
        TokenRegistry::resolve(token)
            .map(|t| t.mint.to_string())
            .unwrap_or_else(|| token.trim().to_string())
    }

    async fn fetch(&self, mints: &[String]) -> Result<HashMap<String, Option<PriceData>>, SourceError> {
        let mut req = self.http.get(&self.base_url).query(&[("ids", mints.join(","))]);
        if let Some(ref key) = self.api_key {
            req = req.header("x-api-key", key);
        }

        let response = req.send().await?;
        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(SourceError::RateLimited("jupiter".into()));
        }
        if !response.status().is_success() {
            return Err(SourceError::Http(format!("jupiter price {}", response.status())));
        }

        let body: PriceResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(e.to_string()))?;
        Ok(body.data)
    }

    fn to_token_price(mint: &str, data: &PriceData) -> Result<TokenPrice, SourceError> {
        let current_price: f64 = data
            .price
            .parse()
            .map_err(|_| SourceError::Parse(format!("bad price '{}' for {}", data.price, mint)))?;

        let (symbol, name) = TokenRegistry::resolve(mint)
            .map(|t| (t.symbol.to_string(), t.name.to_string()))
            .unwrap_or_else(|| (mint.to_string(), mint.to_string()));

        let price = TokenPrice {
            id: mint.to_string(),
            symbol,
            name,
            current_price,
            price_change_percentage_24h: 0.0,
            market_cap: 0.0,
            total_volume: 0.0,
            last_updated: Utc::now(),
        };
        if price.is_valid() {
            Ok(price)
        } else {
            Err(SourceError::Parse(format!("invalid price for {}", mint)))
        }
    }
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    data: HashMap<String, Option<PriceData>>,
}

#[derive(Debug, Deserialize)]
struct PriceData {
    /// Decimal string, e.g. "151.23"
    price: String,
}

#[async_trait]
impl MarketDataSource for JupiterPriceClient {
    fn name(&self) -> &str {
        "jupiter"
    }

    async fn price(&self, token_id: &str) -> Result<TokenPrice, SourceError> {
        let mint = Self::mint_for(token_id);
        let data = self.fetch(&[mint.clone()]).await?;
        match data.get(&mint) {
            Some(Some(entry)) => Self::to_token_price(&mint, entry),
            _ => Err(SourceError::NoData(mint)),
        }
    }

    async fn token_info(&self, _token_id: &str) -> Result<TokenInfo, SourceError> {
        Err(SourceError::Unsupported("jupiter has no token info".into()))
    }

    async fn market_overview(&self) -> Result<MarketOverview, SourceError> {
        Err(SourceError::Unsupported("jupiter has no market overview".into()))
    }

    async fn trending(&self) -> Result<Vec<TrendingToken>, SourceError> {
        Err(SourceError::Unsupported("jupiter has no trending list".into()))
    }

    async fn bulk_prices(&self, token_ids: &[String]) -> Result<Vec<TokenPrice>, SourceError> {
        let mints: Vec<String> = token_ids.iter().map(|t| Self::mint_for(t)).collect();
        let data = self.fetch(&mints).await?;
        Ok(mints
            .iter()
            .filter_map(|mint| match data.get(mint) {
                Some(Some(entry)) => Self::to_token_price(mint, entry).ok(),
                _ => None,
            })
            .collect())
    }

    async fn history(&self, _token_id: &str, _days: u32) -> Result<Vec<PricePoint>, SourceError> {
        Err(SourceError::Unsupported("jupiter has no price history".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::token::SOL_MINT;

    #[test]
    fn test_mint_translation() {
        assert_eq!(JupiterPriceClient::mint_for("sol"), SOL_MINT);
        assert_eq!(JupiterPriceClient::mint_for("SomeMint111"), "SomeMint111");
    }

    #[test]
    fn test_price_response_parsing() {
        let json = format!(
            r#"{{"data":{{"{}":{{"id":"{}","type":"derivedPrice","price":"151.23"}},"missing":null}},"timeTaken":0.003}}"#,
            SOL_MINT, SOL_MINT
        );
        let body: PriceResponse = serde_json::from_str(&json).unwrap();
        let entry = body.data.get(SOL_MINT).unwrap().as_ref().unwrap();
        let price = JupiterPriceClient::to_token_price(SOL_MINT, entry).unwrap();
        assert_eq!(price.symbol, "SOL");
        assert_eq!(price.current_price, 151.23);
        assert!(body.data.get("missing").unwrap().is_none());
    }

    #[test]
    fn test_garbage_price_rejected() {
        let entry = PriceData { price: "NaN".into() };
        assert!(JupiterPriceClient::to_token_price(SOL_MINT, &entry).is_err());
        let zero = PriceData { price: "0".into() };
        assert!(JupiterPriceClient::to_token_price(SOL_MINT, &zero).is_err());
    }

    #[tokio::test]
    async fn test_unsupported_operations() {
        let client = JupiterPriceClient::new(None).unwrap();
        assert!(matches!(client.trending().await, Err(SourceError::Unsupported(_))));
        assert!(matches!(client.history("SOL", 30).await, Err(SourceError::Unsupported(_))));
    }
}
