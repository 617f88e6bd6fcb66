use solana_client::rpc_client::RpcClient;
use solana_client::rpc_request::TokenAccountsFilter;
use solana_sdk::{
    commitment_config::CommitmentConfig, native_token::LAMPORTS_PER_SOL, pubkey::Pubkey,
    transaction::VersionedTransaction,
};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SolanaClientError {
    #[error("RPC request failed: {0}")]
    RpcError(String),
    #[error("Transaction failed: {0}")]
    TransactionError(String),
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),
}

/// Wrapper around Solana RPC client with async-compatible methods
#[derive(Clone)]
pub struct SolanaClient {
    client: Arc<RpcClient>,
}

impl SolanaClient {
    pub fn new(rpc_url: String) -> Self {
        let client = Arc::new(RpcClient::new_with_commitment(rpc_url, CommitmentConfig::confirmed()));
        Self { client }
    }

    fn parse_pubkey(key: &str) -> Result<Pubkey, SolanaClientError> {
        Pubkey::from_str(key).map_err(|e| SolanaClientError::InvalidPublicKey(e.to_string()))
    }

    /// SOL balance in SOL
    pub async fn get_sol_balance(&self, owner: &str) -> Result<f64, SolanaClientError> {
        let pubkey = Self::parse_pubkey(owner)?;

        // Spawn blocking to make sync RPC call async-compatible
        let client = Arc::clone(&self.client);
        let lamports = tokio::task::spawn_blocking(move || {
            client
                .get_balance(&pubkey)
                .map_err(|e| SolanaClientError::RpcError(e.to_string()))
        })
        .await
        .map_err(|e| SolanaClientError::RpcError(format!("Task join error: {}", e)))??;

        Ok(lamports as f64 / LAMPORTS_PER_SOL as f64)
    }

    /// UI-unit balance of an SPL mint summed over every token account of `owner`
    pub async fn get_token_balance(&self, owner: &str, mint: &str) -> Result<f64, SolanaClientError> {
        let owner = Self::parse_pubkey(owner)?;
        let mint = Self::parse_pubkey(mint)?;

        let client = Arc::clone(&self.client);
        let accounts = tokio::task::spawn_blocking(move || {
            client
                .get_token_accounts_by_owner(&owner, TokenAccountsFilter::Mint(mint))
                .map_err(|e| SolanaClientError::RpcError(e.to_string()))
        })
        .await
        .map_err(|e| SolanaClientError::RpcError(format!("Task join error: {}", e)))??;

        let mut total = 0.0;
        for keyed in accounts {
            let data = serde_json::to_value(&keyed.account.data)
                .map_err(|e| SolanaClientError::RpcError(format!("Parse error: {}", e)))?;
            total += parsed_ui_amount(&data).ok_or_else(|| {
                SolanaClientError::RpcError(format!("Unparsed token account {}", keyed.pubkey))
            })?;
        }
        Ok(total)
    }

    /// Send a signed transaction and wait for confirmation
    pub async fn send_and_confirm(
        &self,
        transaction: VersionedTransaction,
    ) -> Result<String, SolanaClientError> {
        let client = Arc::clone(&self.client);
        tokio::task::spawn_blocking(move || {
            client
                .send_and_confirm_transaction(&transaction)
                .map(|sig| sig.to_string())
                .map_err(|e| SolanaClientError::TransactionError(e.to_string()))
        })
        .await
        .map_err(|e| SolanaClientError::RpcError(format!("Task join error: {}", e)))?
    }
}

/// `uiAmountString` of a jsonParsed SPL token account
fn parsed_ui_amount(data: &serde_json::Value) -> Option<f64> {
    let amount = data.pointer("/parsed/info/tokenAmount")?;
    amount
        .get("uiAmountString")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok())
        .or_else(|| amount.get("uiAmount").and_then(|v| v.as_f64()))
}
