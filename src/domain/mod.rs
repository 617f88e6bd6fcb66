//! Domain Layer - Core types and rules of the strategy engine
//!
//! Pure data and invariants with no I/O. Everything external goes through
//! the ports layer.

pub mod authority;
pub mod portfolio;
pub mod position;
pub mod signal;
pub mod strategy;
pub mod token;
pub mod trade;

pub use authority::{AuthorityInfo, AuthoritySigner, PermissionLevel, TradingAuthority};
pub use portfolio::{Holding, PortfolioValuation};
pub use position::{PositionError, PositionStatus, StrategyPosition};
pub use signal::{AISignal, Direction, Sentiment, SignalAction, SignalSource, TechnicalIndicator, Timeframe};
pub use strategy::{
    confidence_multiplier, RiskLevel, StrategyChange, StrategyStatus, TradingStrategy, UserStrategy,
};
pub use token::{
    MarketOverview, PricePoint, SupportedToken, TokenInfo, TokenPrice, TokenRegistry, TrendingToken,
};
pub use trade::{OrderType, TradeRecord, TradeResult};
