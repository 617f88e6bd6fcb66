//! On-chain balance oracle

use async_trait::async_trait;

use super::rpc::SolanaClient;
use crate::domain::token::{SupportedToken, SOL_MINT};
use crate::ports::settlement::{BalanceOracle, SettlementError};

/// Reads balances of the user's delegated authority from the chain
#[derive(Clone)]
pub struct SolanaBalanceOracle {
    client: SolanaClient,
}

impl SolanaBalanceOracle {
    pub fn new(client: SolanaClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BalanceOracle for SolanaBalanceOracle {
    async fn balance(
        &self,
        user_id: &str,
        owner: Option<&str>,
        token: &SupportedToken,
    ) -> Result<f64, SettlementError> {
        let Some(owner) = owner else {
            tracing::debug!(user_id, "No delegated authority, balance is zero");
            return Ok(0.0);
        };

        let result = if token.mint == SOL_MINT {
            self.client.get_sol_balance(owner).await
        } else {
            self.client.get_token_balance(owner, token.mint).await
        };
        result.map_err(|e| SettlementError::Balance(e.to_string()))
    }
}
