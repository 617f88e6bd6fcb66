//! Balance oracle and swap settlement ports

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::authority::AuthoritySigner;
use crate::domain::token::SupportedToken;
use crate::domain::trade::TradeResult;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SettlementError {
    #[error("Balance lookup failed: {0}")]
    Balance(String),
    #[error("Quote failed: {0}")]
    Quote(String),
    #[error("Transaction signing failed: {0}")]
    Signing(String),
    #[error("Transaction submission failed: {0}")]
    Submission(String),
    #[error("Slippage tolerance exceeded")]
    SlippageExceeded,
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

/// Reports what a user holds
#[async_trait]
pub trait BalanceOracle: Send + Sync {
    /// UI-unit balance of `token`. `owner` is the user's delegated public
    /// key when one exists.
    async fn balance(
        &self,
        user_id: &str,
        owner: Option<&str>,
        token: &SupportedToken,
    ) -> Result<f64, SettlementError>;

    /// Called after every successful fill. On-chain oracles ignore it.
    async fn record_fill(&self, _user_id: &str, _result: &TradeResult) {}
}

/// Fill reported by a swap aggregator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapFill {
    pub signature: String,
    pub input_amount: f64,
    pub output_amount: f64,
    /// Quoted output before slippage
    pub expected_output: f64,
}

impl SwapFill {
    pub fn realized_slippage(&self) -> f64 {
        if self.expected_output > 0.0 {
            ((self.expected_output - self.output_amount) / self.expected_output).max(0.0)
        } else {
            0.0
        }
    }
}

/// Live swap routing, signing with the user's delegated authority
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SwapAggregator: Send + Sync {
    async fn swap(
        &self,
        signer: &AuthoritySigner,
        input: &SupportedToken,
        output: &SupportedToken,
        amount: f64,
        slippage_bps: u16,
    ) -> Result<SwapFill, SettlementError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_realized_slippage() {
        let fill = SwapFill {
            signature: "sig".into(),
            input_amount: 100.0,
            output_amount: 0.99,
            expected_output: 1.0,
        };
        assert!((fill.realized_slippage() - 0.01).abs() < 1e-12);

        let better = SwapFill { output_amount: 1.01, ..fill };
        assert_eq!(better.realized_slippage(), 0.0);
    }
}
