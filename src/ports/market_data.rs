use async_trait::async_trait;
use thiserror::Error;

use crate::domain::token::{MarketOverview, PricePoint, TokenInfo, TokenPrice, TrendingToken};

/// Failure of a single market data source. Always absorbed by the
/// next-ranked source or the synthetic generator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Data parsing error: {0}")]
    Parse(String),

    #[error("No data for {0}")]
    NoData(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        if e.status() == Some(reqwest::StatusCode::TOO_MANY_REQUESTS) {
            SourceError::RateLimited(e.to_string())
        } else if e.is_decode() {
            SourceError::Parse(e.to_string())
        } else {
            SourceError::Http(e.to_string())
        }
    }
}

/// One ranked provider of market data.
///
/// Token ids may be symbols, mints or provider ids; each source translates
/// them through the token registry.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Source name used in logs
    fn name(&self) -> &str;

    async fn price(&self, token_id: &str) -> Result<TokenPrice, SourceError>;

    async fn token_info(&self, token_id: &str) -> Result<TokenInfo, SourceError>;

    async fn market_overview(&self) -> Result<MarketOverview, SourceError>;

    async fn trending(&self) -> Result<Vec<TrendingToken>, SourceError>;

    /// Prices for several ids in one request. Ids the source cannot price are
    /// simply absent from the result.
    async fn bulk_prices(&self, token_ids: &[String]) -> Result<Vec<TokenPrice>, SourceError>;

    /// Daily samples covering the last `days` days, oldest first
    async fn history(&self, token_id: &str, days: u32) -> Result<Vec<PricePoint>, SourceError>;
}
