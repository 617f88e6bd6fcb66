//! Simulated balances for paper trading
//!
//! Every user starts with the configured balances; fills reported by the
//! trade executor move funds between tokens.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::token::{SupportedToken, TokenRegistry};
use crate::domain::trade::TradeResult;
use crate::ports::settlement::{BalanceOracle, SettlementError};

#[derive(Debug)]
pub struct PaperLedger {
    starting: HashMap<String, f64>,
    accounts: RwLock<HashMap<String, HashMap<String, f64>>>,
}

impl PaperLedger {
    /// `starting` maps token symbols to the balance every new user receives
    pub fn new(starting: HashMap<String, f64>) -> Self {
        let starting = starting
            .into_iter()
            .map(|(token, amount)| (TokenRegistry::canonical_key(&token), amount.max(0.0)))
            .collect();
        Self {
            starting,
            accounts: RwLock::new(HashMap::new()),
        }
    }

    /// Current balances of a user, creating the account on first touch
    pub async fn balances(&self, user_id: &str) -> HashMap<String, f64> {
        let mut accounts = self.accounts.write().await;
        accounts
            .entry(user_id.to_string())
            .or_insert_with(|| self.starting.clone())
            .clone()
    }
}

#[async_trait]
impl BalanceOracle for PaperLedger {
    async fn balance(
        &self,
        user_id: &str,
        _owner: Option<&str>,
        token: &SupportedToken,
    ) -> Result<f64, SettlementError> {
        Ok(self
            .balances(user_id)
            .await
            .get(token.symbol)
            .copied()
            .unwrap_or(0.0))
    }

    async fn record_fill(&self, user_id: &str, result: &TradeResult) {
        if !result.success {
            return;
        }
        let input = TokenRegistry::canonical_key(&result.input_token);
        let output = TokenRegistry::canonical_key(&result.output_token);

        let mut accounts = self.accounts.write().await;
        let account = accounts
            .entry(user_id.to_string())
            .or_insert_with(|| self.starting.clone());

        let debit = account.entry(input.clone()).or_insert(0.0);
        *debit = (*debit - result.input_amount).max(0.0);
        *account.entry(output.clone()).or_insert(0.0) += result.output_amount;

        tracing::debug!(
            user_id,
            "Paper fill: -{} {} / +{} {}",
            result.input_amount,
            input,
            result.output_amount,
            output
        );
    }
}
