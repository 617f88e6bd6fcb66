//! Jupiter API Client
//!
//! Live swap aggregator: quote, build, sign with the delegated authority,
//! submit and confirm.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use solana_sdk::signature::Signer;
use solana_sdk::transaction::VersionedTransaction;
use std::time::Duration;

use super::quote::{QuoteRequest, QuoteResponse};
use super::swap::{SwapRequest, SwapResponse};
use crate::adapters::solana::SolanaClient;
use crate::domain::authority::AuthoritySigner;
use crate::domain::token::{SupportedToken, SOL_MINT};
use crate::ports::settlement::{SettlementError, SwapAggregator, SwapFill};

/// Jupiter API client configuration
#[derive(Debug, Clone)]
pub struct JupiterConfig {
    pub api_base_url: String,
    /// Optional API key for higher rate limits
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub max_retries: u32,
    pub priority_fee_lamports: u64,
}

impl Default for JupiterConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.jup.ag/swap/v1".to_string(),
            api_key: None,
            timeout: Duration::from_secs(30),
            max_retries: 3,
            priority_fee_lamports: 10_000,
        }
    }
}

/// Jupiter DEX aggregator client
#[derive(Clone)]
pub struct JupiterClient {
    config: JupiterConfig,
    http: Client,
    solana: SolanaClient,
}

impl JupiterClient {
    pub fn new(config: JupiterConfig, solana: SolanaClient) -> Result<Self, SettlementError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SettlementError::Quote(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http,
            solana,
        })
    }

    /// Get a quote for a token swap
    pub async fn get_quote(&self, request: &QuoteRequest) -> Result<QuoteResponse, SettlementError> {
        let url = format!("{}/quote", self.config.api_base_url);

        let mut req = self.http.get(&url).query(&[
            ("inputMint", request.input_mint.clone()),
            ("outputMint", request.output_mint.clone()),
            ("amount", request.amount.to_string()),
            ("slippageBps", request.slippage_bps.to_string()),
        ]);
        if let Some(ref api_key) = self.config.api_key {
            req = req.header("x-api-key", api_key);
        }

        let response = self
            .execute_with_retry(|| async {
                req.try_clone()
                    .ok_or_else(|| SettlementError::Quote("Failed to clone request".into()))?
                    .send()
                    .await
                    .map_err(|e| SettlementError::Quote(e.to_string()))
            })
            .await?;

        self.handle_response(response, SettlementError::Quote).await
    }

    /// Build the unsigned swap transaction
    pub async fn get_swap_transaction(
        &self,
        request: &SwapRequest,
    ) -> Result<SwapResponse, SettlementError> {
        let url = format!("{}/swap", self.config.api_base_url);

        let mut req = self.http.post(&url).json(request);
        if let Some(ref api_key) = self.config.api_key {
            req = req.header("x-api-key", api_key);
        }

        let response = self
            .execute_with_retry(|| async {
                req.try_clone()
                    .ok_or_else(|| SettlementError::Quote("Failed to clone request".into()))?
                    .send()
                    .await
                    .map_err(|e| SettlementError::Quote(e.to_string()))
            })
            .await?;

        self.handle_response(response, SettlementError::Quote).await
    }

    /// Execute request with retry logic and rate limit handling
    async fn execute_with_retry<F, Fut>(&self, request_fn: F) -> Result<reqwest::Response, SettlementError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<reqwest::Response, SettlementError>>,
    {
        let mut last_error = None;

        for attempt in 0..self.config.max_retries {
            match request_fn().await {
                Ok(response) => {
                    if response.status() == StatusCode::TOO_MANY_REQUESTS {
                        let backoff = Duration::from_secs(2u64.pow(attempt + 1));
                        tracing::warn!(
                            "Rate limited (429), backing off for {:?} (attempt {}/{})",
                            backoff,
                            attempt + 1,
                            self.config.max_retries
                        );
                        last_error = Some(SettlementError::Quote("Rate limit exceeded".into()));
                        tokio::time::sleep(backoff).await;
                        continue;
                    }

                    if response.status().is_server_error() {
                        last_error = Some(SettlementError::Quote(format!(
                            "Server error: {}",
                            response.status()
                        )));
                        tokio::time::sleep(Duration::from_millis(500 * (attempt as u64 + 1))).await;
                        continue;
                    }

                    return Ok(response);
                }
                Err(e) => {
                    last_error = Some(e);
                    tokio::time::sleep(Duration::from_millis(500 * (attempt as u64 + 1))).await;
                }
            }
        }

        Err(last_error.unwrap_or_else(|| SettlementError::Quote("Max retries exceeded".into())))
    }

    /// Handle API response and deserialize
    async fn handle_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
        wrap: fn(String) -> SettlementError,
    ) -> Result<T, SettlementError> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();

            if error_text.contains("SlippageToleranceExceeded") || error_text.contains("6001") {
                return Err(SettlementError::SlippageExceeded);
            }

            return Err(wrap(format!("API error {}: {}", status, error_text)));
        }

        response
            .json()
            .await
            .map_err(|e| wrap(format!("Failed to parse response: {}", e)))
    }

    async fn output_balance(&self, owner: &str, token: &SupportedToken) -> Option<f64> {
        let result = if token.mint == SOL_MINT {
            self.solana.get_sol_balance(owner).await
        } else {
            self.solana.get_token_balance(owner, token.mint).await
        };
        match result {
            Ok(balance) => Some(balance),
            Err(e) => {
                tracing::warn!("Could not read {} balance: {}", token.symbol, e);
                None
            }
        }
    }
}

#[async_trait]
impl SwapAggregator for JupiterClient {
    async fn swap(
        &self,
        signer: &AuthoritySigner,
        input: &SupportedToken,
        output: &SupportedToken,
        amount: f64,
        slippage_bps: u16,
    ) -> Result<SwapFill, SettlementError> {
        let owner = signer.pubkey().to_string();

        let quote_request = QuoteRequest::new(
            input.mint.to_string(),
            output.mint.to_string(),
            input.to_base_units(amount),
            slippage_bps,
        );
        let quote = self.get_quote(&quote_request).await?;
        let expected_output = output.from_base_units(quote.output_amount());
        if expected_output <= 0.0 {
            return Err(SettlementError::Quote("no route".into()));
        }

        // Capture pre-trade balance to measure the real fill
        let pre_balance = self.output_balance(&owner, output).await;

        let quote_json = serde_json::to_value(&quote)
            .map_err(|e| SettlementError::Quote(e.to_string()))?;
        let swap_request = SwapRequest::new(owner.clone(), quote_json)
            .with_priority_fee(self.config.priority_fee_lamports);
        let swap_response = self.get_swap_transaction(&swap_request).await?;

        let unsigned = swap_response.transaction().map_err(SettlementError::Signing)?;
        let signed = VersionedTransaction::try_new(unsigned.message, &[signer])
            .map_err(|e| SettlementError::Signing(e.to_string()))?;

        tracing::info!(
            "Submitting swap: {} {} -> {} (impact: {:.4}%)",
            amount,
            input.symbol,
            output.symbol,
            quote.price_impact()
        );

        let signature = self
            .solana
            .send_and_confirm(signed)
            .await
            .map_err(|e| SettlementError::Submission(e.to_string()))?;

        let post_balance = self.output_balance(&owner, output).await;
        let output_amount = match (pre_balance, post_balance) {
            (Some(pre), Some(post)) if post > pre => post - pre,
            _ => expected_output,
        };

        Ok(SwapFill {
            signature,
            input_amount: input.from_base_units(quote.input_amount()),
            output_amount,
            expected_output,
        })
    }
}
