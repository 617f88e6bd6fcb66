pub mod authority_manager;
pub mod custody_cipher;
pub mod market_data_service;
pub mod portfolio;
pub mod retry;
pub mod signal_generator;
pub mod strategy_orchestrator;
pub mod trade_executor;

pub use authority_manager::{CustodyError, TradingAuthorityManager};
pub use custody_cipher::CustodyCipher;
pub use market_data_service::{MarketDataService, MarketDataTtls};
pub use portfolio::PortfolioValuator;
pub use retry::RetryPolicy;
pub use signal_generator::{SignalGenerator, SignalSettings};
pub use strategy_orchestrator::{
    OrchestratorSettings, PositionClose, PositionRefresh, StrategyError, StrategyOrchestrator,
    StrategyStats, StrategyTrade, ThresholdAlert, ThresholdKind,
};
pub use trade_executor::{
    ExecutionBackend, ExecutorSettings, SimulationParams, TradeError, TradeExecutor,
};
