//! Best-effort portfolio valuation

use std::sync::Arc;

use super::authority_manager::TradingAuthorityManager;
use super::market_data_service::MarketDataService;
use crate::domain::portfolio::{Holding, PortfolioValuation};
use crate::domain::token::{SupportedToken, TokenRegistry};
use crate::ports::settlement::BalanceOracle;

#[derive(Clone)]
pub struct PortfolioValuator {
    balances: Arc<dyn BalanceOracle>,
    market_data: MarketDataService,
    authorities: TradingAuthorityManager,
}

impl PortfolioValuator {
    pub fn new(
        balances: Arc<dyn BalanceOracle>,
        market_data: MarketDataService,
        authorities: TradingAuthorityManager,
    ) -> Self {
        Self {
            balances,
            market_data,
            authorities,
        }
    }

    /// Value the user's holdings of `tokens`. Unsupported tokens are skipped
    /// and failed balance reads count as zero.
    pub async fn value_portfolio(&self, user_id: &str, tokens: &[String]) -> PortfolioValuation {
        let owner = match self.authorities.get_authority(user_id).await {
            Ok(info) => info.map(|i| i.public_key),
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Authority lookup failed, valuing without owner");
                None
            }
        };

        let mut supported: Vec<&'static SupportedToken> = Vec::new();
        for token in tokens {
            match TokenRegistry::resolve(token) {
                Some(t) => {
                    if !supported.iter().any(|s| s.symbol == t.symbol) {
                        supported.push(t);
                    }
                }
                None => tracing::warn!(token = %token, "Skipping unsupported token"),
            }
        }

        let symbols: Vec<String> = supported.iter().map(|t| t.symbol.to_string()).collect();
        let prices = self.market_data.get_token_prices(&symbols).await;

        let mut valuation = PortfolioValuation::new(user_id);
        for (token, price) in supported.into_iter().zip(prices) {
            let quantity = match self.balances.balance(user_id, owner.as_deref(), token).await {
                Ok(q) => q,
                Err(e) => {
                    tracing::warn!(user_id, token = token.symbol, error = %e, "Balance read failed, counting zero");
                    0.0
                }
            };
            valuation.add_holding(Holding::new(token.symbol.to_string(), quantity, price.current_price));
        }
        valuation
    }
}
