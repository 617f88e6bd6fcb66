//! Trade Executor
//!
//! Validates a swap request, runs it on the configured backend and records
//! every executed attempt. Precondition failures are typed errors with no
//! side effects; execution failures come back as an unsuccessful
//! [`TradeResult`].

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::authority_manager::{CustodyError, TradingAuthorityManager};
use crate::domain::authority::PermissionLevel;
use crate::domain::token::{SupportedToken, TokenRegistry};
use crate::domain::trade::{OrderType, TradeRecord, TradeResult};
use crate::ports::cache::{keys, Cache};
use crate::ports::settlement::{BalanceOracle, SettlementError, SwapAggregator};
use crate::ports::store::Store;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TradeError {
    #[error("Invalid trade request: {0}")]
    Validation(String),

    #[error("Trading is disabled")]
    TradingDisabled,

    #[error("Unsupported token: {0}")]
    UnsupportedToken(String),

    #[error("Insufficient {token} balance: have {available}, need {required}")]
    InsufficientBalance {
        token: String,
        available: f64,
        required: f64,
    },

    #[error("Balance unavailable: {0}")]
    BalanceUnavailable(String),

    #[error(transparent)]
    Custody(#[from] CustodyError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationParams {
    /// Width of the multiplicative noise window applied to market orders
    pub noise: f64,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self { noise: 0.002 }
    }
}

/// Where fills come from, fixed at construction
#[derive(Clone)]
pub enum ExecutionBackend {
    Disabled,
    Simulated(SimulationParams),
    Live(Arc<dyn SwapAggregator>),
}

impl ExecutionBackend {
    pub fn name(&self) -> &'static str {
        match self {
            ExecutionBackend::Disabled => "disabled",
            ExecutionBackend::Simulated(_) => "simulated",
            ExecutionBackend::Live(_) => "live",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutorSettings {
    pub max_slippage_bps: u16,
    pub history_cache_ttl: Duration,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            max_slippage_bps: 300,
            history_cache_ttl: Duration::from_secs(60),
        }
    }
}

/// Number of recent records kept in the history cache entry
const HISTORY_CACHE_DEPTH: usize = 100;

#[derive(Clone)]
pub struct TradeExecutor {
    backend: ExecutionBackend,
    authorities: TradingAuthorityManager,
    balances: Arc<dyn BalanceOracle>,
    store: Arc<dyn Store>,
    cache: Arc<dyn Cache>,
    settings: ExecutorSettings,
}

impl TradeExecutor {
    pub fn new(
        backend: ExecutionBackend,
        authorities: TradingAuthorityManager,
        balances: Arc<dyn BalanceOracle>,
        store: Arc<dyn Store>,
        cache: Arc<dyn Cache>,
        settings: ExecutorSettings,
    ) -> Self {
        Self {
            backend,
            authorities,
            balances,
            store,
            cache,
            settings,
        }
    }

    pub fn backend(&self) -> &ExecutionBackend {
        &self.backend
    }

    pub async fn execute_trade_for_user(
        &self,
        user_id: &str,
        input_token: &str,
        output_token: &str,
        amount: f64,
        slippage_bps: u16,
        order_type: OrderType,
    ) -> Result<TradeResult, TradeError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(TradeError::Validation(format!(
                "amount must be positive, got {}",
                amount
            )));
        }
        if matches!(self.backend, ExecutionBackend::Disabled) {
            return Err(TradeError::TradingDisabled);
        }

        let input = TokenRegistry::resolve(input_token)
            .ok_or_else(|| TradeError::UnsupportedToken(input_token.to_string()))?;
        let output = TokenRegistry::resolve(output_token)
            .ok_or_else(|| TradeError::UnsupportedToken(output_token.to_string()))?;
        if input.symbol == output.symbol {
            return Err(TradeError::Validation(format!(
                "input and output are both {}",
                input.symbol
            )));
        }

        let owner = self
            .authorities
            .get_authority(user_id)
            .await?
            .map(|info| info.public_key);
        let available = self
            .balances
            .balance(user_id, owner.as_deref(), input)
            .await
            .map_err(|e| TradeError::BalanceUnavailable(e.to_string()))?;
        if available < amount {
            return Err(TradeError::InsufficientBalance {
                token: input.symbol.to_string(),
                available,
                required: amount,
            });
        }

        let slippage_bps = slippage_bps.min(self.settings.max_slippage_bps);
        let result = match &self.backend {
            ExecutionBackend::Disabled => return Err(TradeError::TradingDisabled),
            ExecutionBackend::Simulated(params) => {
                simulate_fill(params, input, output, amount, slippage_bps, order_type)
            }
            ExecutionBackend::Live(aggregator) => {
                self.live_fill(aggregator.as_ref(), user_id, input, output, amount, slippage_bps, order_type)
                    .await?
            }
        };

        if result.success {
            tracing::info!(
                user_id,
                backend = self.backend.name(),
                input = %result.input_token,
                output = %result.output_token,
                amount = result.input_amount,
                received = result.output_amount,
                slippage = result.slippage,
                "Trade filled"
            );
            self.balances.record_fill(user_id, &result).await;
        } else {
            tracing::warn!(
                user_id,
                backend = self.backend.name(),
                error = result.error.as_deref().unwrap_or("unknown"),
                "Trade failed"
            );
        }

        self.record(user_id, &result).await;
        Ok(result)
    }

    /// Most recent first
    pub async fn get_trade_history(&self, user_id: &str, limit: usize) -> Vec<TradeRecord> {
        let key = keys::trades(user_id);
        if limit <= HISTORY_CACHE_DEPTH {
            if let Some(cached) = self.cache.get_typed::<Vec<TradeRecord>>(&key).await {
                return cached.into_iter().take(limit).collect();
            }
        }

        let depth = limit.max(HISTORY_CACHE_DEPTH);
        match self.store.list_trades(user_id, depth).await {
            Ok(records) => {
                let recent: Vec<TradeRecord> =
                    records.iter().take(HISTORY_CACHE_DEPTH).cloned().collect();
                self.cache
                    .set_typed(&key, &recent, self.settings.history_cache_ttl)
                    .await;
                records.into_iter().take(limit).collect()
            }
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Trade history unavailable");
                Vec::new()
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn live_fill(
        &self,
        aggregator: &dyn SwapAggregator,
        user_id: &str,
        input: &SupportedToken,
        output: &SupportedToken,
        amount: f64,
        slippage_bps: u16,
        order_type: OrderType,
    ) -> Result<TradeResult, TradeError> {
        self.authorities
            .ensure_authority(user_id, PermissionLevel::Limited)
            .await?;
        let signer = self.authorities.signer_for(user_id).await?;

        let result = match aggregator.swap(&signer, input, output, amount, slippage_bps).await {
            Ok(fill) => TradeResult::filled(
                input.symbol,
                output.symbol,
                fill.input_amount,
                fill.output_amount,
                fill.realized_slippage(),
                order_type,
                fill.signature,
            ),
            Err(e) => TradeResult::failed(input.symbol, output.symbol, amount, order_type, e.to_string()),
        };
        Ok(result)
    }

    async fn record(&self, user_id: &str, result: &TradeResult) {
        if let Err(e) = self
            .store
            .append_trade(TradeRecord::new(user_id, result.clone()))
            .await
        {
            tracing::error!(user_id, error = %e, "Failed to persist trade record");
        }
        self.cache.delete(&keys::trades(user_id)).await;
    }
}

/// Fill at the reference rate, minus the slippage allowance and, for market
/// orders, a random haircut inside the noise window
fn simulate_fill(
    params: &SimulationParams,
    input: &SupportedToken,
    output: &SupportedToken,
    amount: f64,
    slippage_bps: u16,
    order_type: OrderType,
) -> TradeResult {
    let ideal = amount * TokenRegistry::base_rate(input, output);
    if !ideal.is_finite() || ideal <= 0.0 {
        return TradeResult::failed(
            input.symbol,
            output.symbol,
            amount,
            order_type,
            SettlementError::Quote("no reference rate".into()).to_string(),
        );
    }

    let mut actual = ideal * (1.0 - slippage_bps as f64 / 10_000.0);
    if order_type == OrderType::Market && params.noise > 0.0 {
        let noise = params.noise.min(1.0);
        actual *= rand::thread_rng().gen_range(1.0 - noise..=1.0);
    }
    let slippage = (ideal - actual) / ideal;

    TradeResult::filled(
        input.symbol,
        output.symbol,
        amount,
        actual,
        slippage,
        order_type,
        synthetic_signature(),
    )
}

/// Base58 string shaped like a Solana transaction signature
fn synthetic_signature() -> String {
    let mut bytes = [0u8; 64];
    rand::thread_rng().fill(&mut bytes[..]);
    bs58::encode(bytes).into_string()
}
