//! Strategy Orchestrator
//!
//! Templates, user strategies and the position lifecycle. Trade sizing is
//! `amount * confidence_multiplier(signal.confidence, effective_risk)`.
//! Positions move `open -> closed` or `open -> cancelled` exactly once;
//! only the mark price and unrealized fields change while open.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::authority_manager::{CustodyError, TradingAuthorityManager};
use super::market_data_service::MarketDataService;
use super::trade_executor::{TradeError, TradeExecutor};
use crate::domain::authority::PermissionLevel;
use crate::domain::position::{PositionError, PositionStatus, StrategyPosition};
use crate::domain::signal::AISignal;
use crate::domain::strategy::{
    confidence_multiplier, RiskLevel, StrategyChange, StrategyStatus, TradingStrategy, UserStrategy,
};
use crate::domain::token::TokenRegistry;
use crate::domain::trade::{OrderType, TradeResult};
use crate::ports::cache::{keys, Cache};
use crate::ports::store::{Store, StoreError};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StrategyError {
    #[error("Invalid strategy request: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Custody(#[from] CustodyError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Trade(#[from] TradeError),
}

impl From<PositionError> for StrategyError {
    fn from(e: PositionError) -> Self {
        StrategyError::Validation(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorSettings {
    /// Slippage requested for strategy trades
    pub slippage_bps: u16,
    pub cache_ttl: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            slippage_bps: 100,
            cache_ttl: Duration::from_secs(300),
        }
    }
}

/// Trade executed on behalf of a strategy. `position` is set when the fill
/// opened one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyTrade {
    pub trade: TradeResult,
    pub sizing_multiplier: f64,
    pub position: Option<StrategyPosition>,
}

/// Outcome of a close request. On a failed reverse trade the position is
/// returned unchanged and still open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionClose {
    pub trade: TradeResult,
    pub position: StrategyPosition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdKind {
    TargetProfit,
    StopLoss,
}

/// Open position whose unrealized return is beyond a template threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdAlert {
    pub position_id: String,
    pub token: String,
    pub kind: ThresholdKind,
    pub unrealized_pnl_percentage: f64,
    pub threshold_percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionRefresh {
    pub updated: Vec<StrategyPosition>,
    pub alerts: Vec<ThresholdAlert>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyStats {
    pub total_positions: usize,
    pub open_positions: usize,
    pub closed_positions: usize,
    pub cancelled_positions: usize,
    /// Closed positions with a positive realized result
    pub profitable_trades: usize,
    /// Opening and closing fills that settled
    pub successful_trades: usize,
    /// Realized on closed plus unrealized on open positions
    pub total_pnl: f64,
    /// `total_pnl` against the deposit baseline
    pub pnl_percentage: f64,
    pub total_deposited: f64,
}

#[derive(Clone)]
pub struct StrategyOrchestrator {
    templates: Arc<Vec<TradingStrategy>>,
    store: Arc<dyn Store>,
    cache: Arc<dyn Cache>,
    market_data: MarketDataService,
    authorities: TradingAuthorityManager,
    executor: TradeExecutor,
    settings: OrchestratorSettings,
}

impl StrategyOrchestrator {
    pub fn new(
        templates: Vec<TradingStrategy>,
        store: Arc<dyn Store>,
        cache: Arc<dyn Cache>,
        market_data: MarketDataService,
        authorities: TradingAuthorityManager,
        executor: TradeExecutor,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            templates: Arc::new(templates),
            store,
            cache,
            market_data,
            authorities,
            executor,
            settings,
        }
    }

    pub fn list_templates(&self) -> &[TradingStrategy] {
        &self.templates
    }

    pub fn get_template(&self, template_id: &str) -> Option<&TradingStrategy> {
        self.templates.iter().find(|t| t.id == template_id)
    }

    fn template(&self, template_id: &str) -> Result<&TradingStrategy, StrategyError> {
        self.get_template(template_id)
            .ok_or_else(|| StrategyError::NotFound(format!("strategy template {}", template_id)))
    }

    pub async fn create_user_strategy(
        &self,
        user_id: &str,
        template_id: &str,
        risk_override: Option<RiskLevel>,
    ) -> Result<UserStrategy, StrategyError> {
        if user_id.trim().is_empty() {
            return Err(StrategyError::Validation("user id must not be empty".into()));
        }
        let template = self.template(template_id)?;
        let strategy = UserStrategy::new(user_id, template_id, risk_override);

        let level = match strategy.effective_risk(template) {
            RiskLevel::High => PermissionLevel::Full,
            RiskLevel::Low | RiskLevel::Medium => PermissionLevel::Limited,
        };
        self.authorities.ensure_authority(user_id, level).await?;

        self.store.insert_user_strategy(strategy.clone()).await?;
        self.cache.delete(&keys::user_strategies(user_id)).await;

        tracing::info!(
            user_id,
            user_strategy_id = %strategy.id,
            template = template_id,
            risk = %strategy.effective_risk(template),
            "User strategy created"
        );
        Ok(strategy)
    }

    /// Oldest first
    pub async fn get_user_strategies(&self, user_id: &str) -> Result<Vec<UserStrategy>, StrategyError> {
        let key = keys::user_strategies(user_id);
        if let Some(cached) = self.cache.get_typed::<Vec<UserStrategy>>(&key).await {
            return Ok(cached);
        }
        let strategies = self.store.list_user_strategies(user_id).await?;
        self.cache.set_typed(&key, &strategies, self.settings.cache_ttl).await;
        Ok(strategies)
    }

    pub async fn get_user_strategy(&self, user_strategy_id: &str) -> Result<UserStrategy, StrategyError> {
        self.store
            .get_user_strategy(user_strategy_id)
            .await?
            .ok_or_else(|| StrategyError::NotFound(format!("user strategy {}", user_strategy_id)))
    }

    /// Strategy owned by `user_id`. Other users' strategies read as missing.
    async fn owned_strategy(&self, user_id: &str, user_strategy_id: &str) -> Result<UserStrategy, StrategyError> {
        let strategy = self.get_user_strategy(user_strategy_id).await?;
        if strategy.user_id != user_id {
            return Err(StrategyError::NotFound(format!("user strategy {}", user_strategy_id)));
        }
        Ok(strategy)
    }

    /// Pause or resume
    pub async fn set_strategy_status(
        &self,
        user_id: &str,
        user_strategy_id: &str,
        status: StrategyStatus,
    ) -> Result<UserStrategy, StrategyError> {
        let strategy = self.owned_strategy(user_id, user_strategy_id).await?;
        if strategy.status == status {
            return Ok(strategy);
        }
        let strategy = self.change_strategy(&strategy, StrategyChange::Status(status)).await?;
        tracing::info!(user_id, user_strategy_id, status = ?status, "Strategy status changed");
        Ok(strategy)
    }

    pub async fn execute_strategy_trade(
        &self,
        user_id: &str,
        user_strategy_id: &str,
        input_token: &str,
        output_token: &str,
        amount: f64,
        signal: &AISignal,
    ) -> Result<StrategyTrade, StrategyError> {
        let strategy = self.owned_strategy(user_id, user_strategy_id).await?;
        if !strategy.is_active() {
            return Err(StrategyError::Validation("strategy is not active".into()));
        }
        let template = self.template(&strategy.strategy_id)?;
        let output_key = TokenRegistry::canonical_key(output_token);
        if !template.allows_token(&output_key) {
            return Err(StrategyError::Validation(format!(
                "{} is not traded by the {} strategy",
                output_key, template.id
            )));
        }

        let multiplier = confidence_multiplier(signal.confidence, strategy.effective_risk(template));
        let sized = amount * multiplier;
        tracing::debug!(
            user_strategy_id,
            amount,
            confidence = signal.confidence,
            multiplier,
            sized,
            "Sized strategy trade"
        );

        let trade = self
            .executor
            .execute_trade_for_user(
                user_id,
                input_token,
                output_token,
                sized,
                self.settings.slippage_bps,
                OrderType::Market,
            )
            .await?;

        if !trade.success {
            return Ok(StrategyTrade {
                trade,
                sizing_multiplier: multiplier,
                position: None,
            });
        }

        let entry_price = self.market_data.get_token_price(output_token).await;
        let position = StrategyPosition::open(
            &strategy.id,
            &trade.input_token,
            &trade.output_token,
            trade.input_amount,
            trade.output_amount,
            entry_price,
            trade.tx_signature.clone(),
        )?;
        self.store.insert_position(position.clone()).await?;
        self.cache.delete(&keys::positions(&strategy.id)).await;

        let deposit = StrategyChange::Deposit {
            amount: trade.input_amount,
            at: Utc::now(),
        };
        self.change_strategy(&strategy, deposit).await?;

        tracing::info!(
            user_id,
            user_strategy_id,
            position_id = %position.id,
            token = %position.output_token,
            entry_price,
            "Position opened"
        );
        Ok(StrategyTrade {
            trade,
            sizing_multiplier: multiplier,
            position: Some(position),
        })
    }

    pub async fn close_position(&self, user_id: &str, position_id: &str) -> Result<PositionClose, StrategyError> {
        let (strategy, mut position) = self.owned_position(user_id, position_id).await?;
        if !position.is_open() {
            return Err(PositionError::NotOpen.into());
        }

        let trade = self
            .executor
            .execute_trade_for_user(
                user_id,
                &position.output_token,
                &position.input_token,
                position.output_amount,
                self.settings.slippage_bps,
                OrderType::Market,
            )
            .await?;

        if !trade.success {
            tracing::warn!(position_id, "Reverse trade failed, position stays open");
            return Ok(PositionClose { trade, position });
        }

        let exit_price = self.market_data.get_token_price(&position.output_token).await;
        let realized = position.close(exit_price, trade.output_amount, trade.tx_signature.clone())?;
        self.finish_position(&position).await?;
        self.change_strategy(&strategy, StrategyChange::RealizedPnl(realized)).await?;

        tracing::info!(user_id, position_id, realized_pnl = realized, exit_price, "Position closed");
        Ok(PositionClose { trade, position })
    }

    /// Administrative `open -> cancelled` without a trade
    pub async fn cancel_position(&self, user_id: &str, position_id: &str) -> Result<StrategyPosition, StrategyError> {
        let (strategy, mut position) = self.owned_position(user_id, position_id).await?;
        position.cancel()?;
        self.finish_position(&position).await?;
        tracing::info!(user_id, position_id, strategy = %strategy.id, "Position cancelled");
        Ok(position)
    }

    /// Mark every open position to market and report threshold breaches.
    /// Positions closed or cancelled while the price was fetched are skipped.
    pub async fn update_positions(&self, user_strategy_id: &str) -> Result<PositionRefresh, StrategyError> {
        let strategy = self.get_user_strategy(user_strategy_id).await?;
        let template = self.template(&strategy.strategy_id)?;

        let mut refresh = PositionRefresh::default();
        for listed in self.store.list_positions(user_strategy_id).await? {
            if !listed.is_open() {
                continue;
            }
            let price = self.market_data.get_token_price(&listed.output_token).await;

            let mut position = match self.store.get_position(&listed.id).await? {
                Some(current) if current.is_open() => current,
                _ => {
                    tracing::debug!(position_id = %listed.id, "Position settled during refresh");
                    continue;
                }
            };
            if let Err(e) = position.mark_to_market(price) {
                tracing::warn!(position_id = %position.id, error = %e, "Skipping mark to market");
                continue;
            }
            match self.store.update_position(position.clone()).await {
                Ok(()) => {}
                Err(StoreError::Conflict(_)) => {
                    tracing::debug!(position_id = %position.id, "Position settled during refresh");
                    continue;
                }
                Err(e) => return Err(e.into()),
            }

            if let Some(alert) = threshold_alert(&position, template) {
                tracing::info!(
                    position_id = %position.id,
                    kind = ?alert.kind,
                    pnl_pct = alert.unrealized_pnl_percentage,
                    "Position beyond threshold"
                );
                refresh.alerts.push(alert);
            }
            refresh.updated.push(position);
        }

        self.cache.delete(&keys::positions(user_strategy_id)).await;
        Ok(refresh)
    }

    /// Oldest first
    pub async fn get_positions(&self, user_strategy_id: &str) -> Result<Vec<StrategyPosition>, StrategyError> {
        let key = keys::positions(user_strategy_id);
        if let Some(cached) = self.cache.get_typed::<Vec<StrategyPosition>>(&key).await {
            return Ok(cached);
        }
        let positions = self.store.list_positions(user_strategy_id).await?;
        self.cache.set_typed(&key, &positions, self.settings.cache_ttl).await;
        Ok(positions)
    }

    pub async fn get_strategy_stats(&self, user_strategy_id: &str) -> Result<StrategyStats, StrategyError> {
        let strategy = self.get_user_strategy(user_strategy_id).await?;
        let positions = self.get_positions(user_strategy_id).await?;
        Ok(compute_stats(&strategy, &positions))
    }

    async fn owned_position(
        &self,
        user_id: &str,
        position_id: &str,
    ) -> Result<(UserStrategy, StrategyPosition), StrategyError> {
        let position = self
            .store
            .get_position(position_id)
            .await?
            .ok_or_else(|| StrategyError::NotFound(format!("position {}", position_id)))?;
        let strategy = self
            .owned_strategy(user_id, &position.user_strategy_id)
            .await
            .map_err(|e| match e {
                StrategyError::NotFound(_) => StrategyError::NotFound(format!("position {}", position_id)),
                other => other,
            })?;
        Ok((strategy, position))
    }

    async fn change_strategy(
        &self,
        strategy: &UserStrategy,
        change: StrategyChange,
    ) -> Result<UserStrategy, StrategyError> {
        let updated = self.store.apply_strategy_change(&strategy.id, change).await?;
        self.cache.delete(&keys::user_strategies(&strategy.user_id)).await;
        Ok(updated)
    }

    /// Persist a closed or cancelled position. Losing a race against another
    /// settlement reads as the position no longer being open.
    async fn finish_position(&self, position: &StrategyPosition) -> Result<(), StrategyError> {
        let written = self.store.update_position(position.clone()).await;
        self.cache.delete(&keys::positions(&position.user_strategy_id)).await;
        match written {
            Ok(()) => Ok(()),
            Err(StoreError::Conflict(_)) => Err(PositionError::NotOpen.into()),
            Err(e) => Err(e.into()),
        }
    }
}

fn threshold_alert(position: &StrategyPosition, template: &TradingStrategy) -> Option<ThresholdAlert> {
    let pct = position.unrealized_pnl_percentage;
    let (kind, threshold) = if pct >= template.target_profit_percentage {
        (ThresholdKind::TargetProfit, template.target_profit_percentage)
    } else if pct <= -template.stop_loss_percentage {
        (ThresholdKind::StopLoss, template.stop_loss_percentage)
    } else {
        return None;
    };
    Some(ThresholdAlert {
        position_id: position.id.clone(),
        token: position.output_token.clone(),
        kind,
        unrealized_pnl_percentage: pct,
        threshold_percentage: threshold,
    })
}

fn compute_stats(strategy: &UserStrategy, positions: &[StrategyPosition]) -> StrategyStats {
    let mut stats = StrategyStats {
        total_positions: positions.len(),
        total_deposited: strategy.total_deposited,
        ..StrategyStats::default()
    };

    for position in positions {
        match position.status {
            PositionStatus::Open => {
                stats.open_positions += 1;
                stats.successful_trades += 1;
            }
            PositionStatus::Closed => {
                stats.closed_positions += 1;
                stats.successful_trades += 2;
                if position.realized_pnl.unwrap_or(0.0) > 0.0 {
                    stats.profitable_trades += 1;
                }
            }
            PositionStatus::Cancelled => {
                stats.cancelled_positions += 1;
                stats.successful_trades += 1;
            }
        }
        stats.total_pnl += position.total_pnl();
    }

    if strategy.total_deposited > 0.0 {
        stats.pnl_percentage = stats.total_pnl / strategy.total_deposited * 100.0;
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::cache::InMemoryCache;
    use crate::adapters::paper::PaperLedger;
    use crate::adapters::store::InMemoryStore;
    use crate::application::custody_cipher::CustodyCipher;
    use crate::application::market_data_service::MarketDataTtls;
    use crate::application::trade_executor::{ExecutionBackend, ExecutorSettings, SimulationParams};
    use crate::domain::token::{MarketOverview, PricePoint, TokenInfo, TokenPrice, TrendingToken};
    use crate::ports::market_data::{MarketDataSource, SourceError};
    use crate::ports::mocks::FakeMarketData;
    use crate::ports::settlement::{MockSwapAggregator, SettlementError, SwapFill};
    use approx::assert_relative_eq;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// Source that parks the next `price` call once armed, until released
    #[derive(Clone)]
    struct GatedSource {
        inner: FakeMarketData,
        armed: Arc<AtomicBool>,
        entered: Arc<Notify>,
        release: Arc<Notify>,
    }

    impl GatedSource {
        fn new(inner: FakeMarketData) -> Self {
            Self {
                inner,
                armed: Arc::new(AtomicBool::new(false)),
                entered: Arc::new(Notify::new()),
                release: Arc::new(Notify::new()),
            }
        }

        fn arm(&self) {
            self.armed.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl MarketDataSource for GatedSource {
        fn name(&self) -> &str {
            "gated"
        }

        async fn price(&self, token_id: &str) -> Result<TokenPrice, SourceError> {
            if self.armed.swap(false, Ordering::SeqCst) {
                self.entered.notify_one();
                self.release.notified().await;
            }
            self.inner.price(token_id).await
        }

        async fn token_info(&self, token_id: &str) -> Result<TokenInfo, SourceError> {
            self.inner.token_info(token_id).await
        }

        async fn market_overview(&self) -> Result<MarketOverview, SourceError> {
            self.inner.market_overview().await
        }

        async fn trending(&self) -> Result<Vec<TrendingToken>, SourceError> {
            self.inner.trending().await
        }

        async fn bulk_prices(&self, token_ids: &[String]) -> Result<Vec<TokenPrice>, SourceError> {
            self.inner.bulk_prices(token_ids).await
        }

        async fn history(&self, token_id: &str, days: u32) -> Result<Vec<PricePoint>, SourceError> {
            self.inner.history(token_id, days).await
        }
    }

    struct Harness {
        orchestrator: StrategyOrchestrator,
        market: FakeMarketData,
        authorities: TradingAuthorityManager,
        cache: Arc<InMemoryCache>,
        store: Arc<InMemoryStore>,
    }

    fn harness(backend: ExecutionBackend) -> Harness {
        harness_with_source(backend, |fake| Arc::new(fake) as Arc<dyn MarketDataSource>)
    }

    fn harness_with_source(
        backend: ExecutionBackend,
        wrap: impl FnOnce(FakeMarketData) -> Arc<dyn MarketDataSource>,
    ) -> Harness {
        let store = Arc::new(InMemoryStore::new());
        let cache = Arc::new(InMemoryCache::new());
        let market = FakeMarketData::new("fake")
            .with_price("SOL", 150.0)
            .with_price("USDC", 1.0)
            .with_price("BONK", 0.00002);
        let market_data = MarketDataService::new(vec![wrap(market.clone())], cache.clone(), MarketDataTtls::default());
        let authorities = TradingAuthorityManager::new(
            store.clone(),
            cache.clone(),
            CustodyCipher::new("orchestrator-test-secret-0123456789ab").unwrap(),
        );
        let ledger = Arc::new(PaperLedger::new(HashMap::from([("USDC".to_string(), 10_000.0)])));
        let executor = TradeExecutor::new(
            backend,
            authorities.clone(),
            ledger,
            store.clone(),
            cache.clone(),
            ExecutorSettings::default(),
        );
        let orchestrator = StrategyOrchestrator::new(
            TradingStrategy::builtin_templates(),
            store.clone(),
            cache.clone(),
            market_data,
            authorities.clone(),
            executor,
            OrchestratorSettings::default(),
        );
        Harness {
            orchestrator,
            market,
            authorities,
            cache,
            store,
        }
    }

    fn gated() -> (Harness, GatedSource) {
        let mut gate = None;
        let h = harness_with_source(ExecutionBackend::Simulated(SimulationParams { noise: 0.0 }), |fake| {
            let source = GatedSource::new(fake);
            gate = Some(source.clone());
            Arc::new(source) as Arc<dyn MarketDataSource>
        });
        (h, gate.unwrap())
    }

    /// Live backend whose first swap fills and every later swap fails
    fn fills_once() -> ExecutionBackend {
        let calls = AtomicUsize::new(0);
        let mut aggregator = MockSwapAggregator::new();
        aggregator.expect_swap().returning(move |_, _, _, amount, _| {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(SwapFill {
                    signature: "open-sig".into(),
                    input_amount: amount,
                    output_amount: 0.42,
                    expected_output: 0.42,
                })
            } else {
                Err(SettlementError::SlippageExceeded)
            }
        });
        ExecutionBackend::Live(Arc::new(aggregator))
    }

    fn simulated() -> Harness {
        harness(ExecutionBackend::Simulated(SimulationParams { noise: 0.0 }))
    }

    fn signal(confidence: f64) -> AISignal {
        let mut signal = AISignal::neutral("SOL", "test");
        signal.confidence = confidence;
        signal
    }

    #[tokio::test]
    async fn test_create_and_list_user_strategy() {
        let h = simulated();
        let created = h
            .orchestrator
            .create_user_strategy("u1", "conservative", None)
            .await
            .unwrap();

        let strategies = h.orchestrator.get_user_strategies("u1").await.unwrap();
        assert_eq!(strategies.len(), 1);
        assert_eq!(strategies[0].id, created.id);
        assert_eq!(strategies[0].strategy_id, "conservative");
        assert_eq!(strategies[0].status, StrategyStatus::Active);

        let info = h.authorities.get_authority("u1").await.unwrap().unwrap();
        assert_eq!(info.permission_level, PermissionLevel::Limited);
    }

    #[tokio::test]
    async fn test_high_risk_gets_full_authority() {
        let h = simulated();
        h.orchestrator
            .create_user_strategy("u1", "aggressive", None)
            .await
            .unwrap();
        let info = h.authorities.get_authority("u1").await.unwrap().unwrap();
        assert_eq!(info.permission_level, PermissionLevel::Full);
    }

    #[tokio::test]
    async fn test_unknown_template() {
        let h = simulated();
        let err = h
            .orchestrator
            .create_user_strategy("u1", "yolo", None)
            .await
            .unwrap_err();
        assert!(matches!(err, StrategyError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_sized_trade_opens_position() {
        let h = simulated();
        let strategy = h
            .orchestrator
            .create_user_strategy("u1", "conservative", None)
            .await
            .unwrap();

        let outcome = h
            .orchestrator
            .execute_strategy_trade("u1", &strategy.id, "USDC", "SOL", 100.0, &signal(80.0))
            .await
            .unwrap();
        assert_relative_eq!(outcome.sizing_multiplier, 0.63, epsilon = 1e-12);

        let position = outcome.position.unwrap();
        assert_relative_eq!(position.input_amount, 63.0, epsilon = 1e-9);
        assert_eq!(position.status, PositionStatus::Open);
        assert_relative_eq!(position.entry_price, 150.0);

        let updated = h.orchestrator.get_user_strategy(&strategy.id).await.unwrap();
        assert!(updated.last_run_at.is_some());
        assert_relative_eq!(updated.total_deposited, 63.0, epsilon = 1e-9);
        assert_eq!(h.orchestrator.get_positions(&strategy.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_trade_preconditions() {
        let h = simulated();
        let strategy = h
            .orchestrator
            .create_user_strategy("u1", "conservative", None)
            .await
            .unwrap();

        let err = h
            .orchestrator
            .execute_strategy_trade("u1", &strategy.id, "USDC", "BONK", 100.0, &signal(80.0))
            .await
            .unwrap_err();
        assert!(matches!(err, StrategyError::Validation(_)));

        let err = h
            .orchestrator
            .execute_strategy_trade("u2", &strategy.id, "USDC", "SOL", 100.0, &signal(80.0))
            .await
            .unwrap_err();
        assert!(matches!(err, StrategyError::NotFound(_)));

        h.orchestrator
            .set_strategy_status("u1", &strategy.id, StrategyStatus::Paused)
            .await
            .unwrap();
        let err = h
            .orchestrator
            .execute_strategy_trade("u1", &strategy.id, "USDC", "SOL", 100.0, &signal(80.0))
            .await
            .unwrap_err();
        assert_eq!(err, StrategyError::Validation("strategy is not active".into()));
        assert!(h.orchestrator.get_positions(&strategy.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_close_position_once() {
        let h = simulated();
        let strategy = h
            .orchestrator
            .create_user_strategy("u1", "conservative", None)
            .await
            .unwrap();
        let position = h
            .orchestrator
            .execute_strategy_trade("u1", &strategy.id, "USDC", "SOL", 100.0, &signal(80.0))
            .await
            .unwrap()
            .position
            .unwrap();

        let closed = h.orchestrator.close_position("u1", &position.id).await.unwrap();
        assert!(closed.trade.success);
        assert_eq!(closed.position.status, PositionStatus::Closed);
        let realized = closed.position.realized_pnl.unwrap();
        assert_relative_eq!(realized, closed.trade.output_amount - position.input_amount, epsilon = 1e-9);
        assert!(closed.position.exit_price.is_some());

        let err = h.orchestrator.close_position("u1", &position.id).await.unwrap_err();
        assert_eq!(err, StrategyError::Validation("position is not open".into()));

        let updated = h.orchestrator.get_user_strategy(&strategy.id).await.unwrap();
        assert_relative_eq!(updated.performance_pnl, realized, epsilon = 1e-9);

        let stats = h.orchestrator.get_strategy_stats(&strategy.id).await.unwrap();
        assert_eq!(stats.total_positions, 1);
        assert_eq!(stats.closed_positions, 1);
        assert_eq!(stats.successful_trades, 2);
        assert_relative_eq!(stats.total_pnl, realized, epsilon = 1e-9);
    }

    #[tokio::test]
    async fn test_cancel_position() {
        let h = simulated();
        let strategy = h
            .orchestrator
            .create_user_strategy("u1", "conservative", None)
            .await
            .unwrap();
        let position = h
            .orchestrator
            .execute_strategy_trade("u1", &strategy.id, "USDC", "SOL", 100.0, &signal(50.0))
            .await
            .unwrap()
            .position
            .unwrap();

        let cancelled = h.orchestrator.cancel_position("u1", &position.id).await.unwrap();
        assert_eq!(cancelled.status, PositionStatus::Cancelled);
        assert!(h.orchestrator.cancel_position("u1", &position.id).await.is_err());
        assert!(h.orchestrator.close_position("u1", &position.id).await.is_err());
        assert!(matches!(
            h.orchestrator.cancel_position("u2", &position.id).await,
            Err(StrategyError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_positions_reports_thresholds() {
        let h = simulated();
        let strategy = h
            .orchestrator
            .create_user_strategy("u1", "conservative", None)
            .await
            .unwrap();
        let position = h
            .orchestrator
            .execute_strategy_trade("u1", &strategy.id, "USDC", "SOL", 100.0, &signal(100.0))
            .await
            .unwrap()
            .position
            .unwrap();

        // past the 60s price TTL
        h.cache.delete(&keys::price("SOL")).await;
        h.market.set_price("SOL", 165.0);

        let refresh = h.orchestrator.update_positions(&strategy.id).await.unwrap();
        assert_eq!(refresh.updated.len(), 1);
        let updated = &refresh.updated[0];
        assert_relative_eq!(updated.unrealized_pnl_percentage, 10.0, epsilon = 1e-9);
        assert_relative_eq!(updated.unrealized_pnl, 15.0 * position.output_amount, epsilon = 1e-9);
        assert_eq!(refresh.alerts.len(), 1);
        assert_eq!(refresh.alerts[0].kind, ThresholdKind::TargetProfit);

        let stored = h.orchestrator.get_positions(&strategy.id).await.unwrap();
        assert_eq!(stored[0].current_price, Some(165.0));

        h.cache.delete(&keys::price("SOL")).await;
        h.market.set_price("SOL", 140.0);
        let refresh = h.orchestrator.update_positions(&strategy.id).await.unwrap();
        assert_eq!(refresh.alerts[0].kind, ThresholdKind::StopLoss);
    }

    #[tokio::test]
    async fn test_disabled_trading_surfaces_error() {
        let h = harness(ExecutionBackend::Disabled);
        let strategy = h
            .orchestrator
            .create_user_strategy("u1", "balanced", None)
            .await
            .unwrap();
        let err = h
            .orchestrator
            .execute_strategy_trade("u1", &strategy.id, "USDC", "SOL", 100.0, &signal(80.0))
            .await
            .unwrap_err();
        assert_eq!(err, StrategyError::Trade(TradeError::TradingDisabled));
    }

    #[tokio::test]
    async fn test_close_during_refresh_stays_closed() {
        let (h, gate) = gated();
        let strategy = h
            .orchestrator
            .create_user_strategy("u1", "conservative", None)
            .await
            .unwrap();
        let position = h
            .orchestrator
            .execute_strategy_trade("u1", &strategy.id, "USDC", "SOL", 100.0, &signal(80.0))
            .await
            .unwrap()
            .position
            .unwrap();

        h.cache.delete(&keys::price("SOL")).await;
        gate.arm();
        let refresher = h.orchestrator.clone();
        let strategy_id = strategy.id.clone();
        let refresh = tokio::spawn(async move { refresher.update_positions(&strategy_id).await });
        gate.entered.notified().await;

        let closed = h.orchestrator.close_position("u1", &position.id).await.unwrap();
        assert_eq!(closed.position.status, PositionStatus::Closed);
        let realized = closed.position.realized_pnl.unwrap();

        gate.release.notify_one();
        let refresh = refresh.await.unwrap().unwrap();
        assert!(refresh.updated.is_empty());
        assert!(refresh.alerts.is_empty());

        let stored = h.store.get_position(&position.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PositionStatus::Closed);
        assert!(stored.exit_price.is_some());

        let err = h.orchestrator.close_position("u1", &position.id).await.unwrap_err();
        assert_eq!(err, StrategyError::Validation("position is not open".into()));
        let updated = h.orchestrator.get_user_strategy(&strategy.id).await.unwrap();
        assert_relative_eq!(updated.performance_pnl, realized, epsilon = 1e-9);
    }

    #[tokio::test]
    async fn test_pause_during_trade_is_kept() {
        let (h, gate) = gated();
        let strategy = h
            .orchestrator
            .create_user_strategy("u1", "conservative", None)
            .await
            .unwrap();

        // parks on the entry price fetch, after the fill
        gate.arm();
        let trader = h.orchestrator.clone();
        let strategy_id = strategy.id.clone();
        let trade = tokio::spawn(async move {
            trader
                .execute_strategy_trade("u1", &strategy_id, "USDC", "SOL", 100.0, &signal(80.0))
                .await
        });
        gate.entered.notified().await;

        h.orchestrator
            .set_strategy_status("u1", &strategy.id, StrategyStatus::Paused)
            .await
            .unwrap();
        gate.release.notify_one();
        let outcome = trade.await.unwrap().unwrap();
        assert!(outcome.position.is_some());

        let stored = h.orchestrator.get_user_strategy(&strategy.id).await.unwrap();
        assert_eq!(stored.status, StrategyStatus::Paused);
        assert!(stored.last_run_at.is_some());
        assert_relative_eq!(stored.total_deposited, 63.0, epsilon = 1e-9);
    }

    #[tokio::test]
    async fn test_failed_trade_opens_nothing() {
        let mut aggregator = MockSwapAggregator::new();
        aggregator
            .expect_swap()
            .returning(|_, _, _, _, _| Err(SettlementError::SlippageExceeded));
        let h = harness(ExecutionBackend::Live(Arc::new(aggregator)));
        let strategy = h
            .orchestrator
            .create_user_strategy("u1", "conservative", None)
            .await
            .unwrap();

        let outcome = h
            .orchestrator
            .execute_strategy_trade("u1", &strategy.id, "USDC", "SOL", 100.0, &signal(80.0))
            .await
            .unwrap();
        assert!(!outcome.trade.success);
        assert!(outcome.position.is_none());
        assert!(h.store.list_positions(&strategy.id).await.unwrap().is_empty());

        let stored = h.orchestrator.get_user_strategy(&strategy.id).await.unwrap();
        assert!(stored.last_run_at.is_none());
        assert_eq!(stored.total_deposited, 0.0);
    }

    #[tokio::test]
    async fn test_failed_reverse_trade_keeps_position_open() {
        let h = harness(fills_once());
        let strategy = h
            .orchestrator
            .create_user_strategy("u1", "conservative", None)
            .await
            .unwrap();
        let position = h
            .orchestrator
            .execute_strategy_trade("u1", &strategy.id, "USDC", "SOL", 100.0, &signal(80.0))
            .await
            .unwrap()
            .position
            .unwrap();
        assert_eq!(position.tx_id_open.as_deref(), Some("open-sig"));

        let attempt = h.orchestrator.close_position("u1", &position.id).await.unwrap();
        assert!(!attempt.trade.success);
        assert_eq!(attempt.position.status, PositionStatus::Open);

        let stored = h.store.get_position(&position.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PositionStatus::Open);
        assert!(stored.exit_price.is_none());
        let updated = h.orchestrator.get_user_strategy(&strategy.id).await.unwrap();
        assert_eq!(updated.performance_pnl, 0.0);
        assert_relative_eq!(updated.total_deposited, 63.0, epsilon = 1e-9);
    }

    #[test]
    fn test_stats_ignore_cancelled_pnl() {
        let strategy = UserStrategy {
            total_deposited: 200.0,
            ..UserStrategy::new("u1", "balanced", None)
        };
        let mut winner = StrategyPosition::open(&strategy.id, "USDC", "SOL", 100.0, 1.0, 100.0, None).unwrap();
        winner.close(110.0, 110.0, None).unwrap();
        let mut cancelled = StrategyPosition::open(&strategy.id, "USDC", "SOL", 100.0, 1.0, 100.0, None).unwrap();
        cancelled.mark_to_market(150.0).unwrap();
        cancelled.cancel().unwrap();

        let stats = compute_stats(&strategy, &[winner, cancelled]);
        assert_eq!(stats.profitable_trades, 1);
        assert_eq!(stats.cancelled_positions, 1);
        assert_relative_eq!(stats.total_pnl, 10.0, epsilon = 1e-9);
        assert_relative_eq!(stats.pnl_percentage, 5.0, epsilon = 1e-9);
    }
}
