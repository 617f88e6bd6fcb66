use async_trait::async_trait;
use thiserror::Error;

use crate::domain::authority::TradingAuthority;
use crate::domain::position::StrategyPosition;
use crate::domain::strategy::{StrategyChange, UserStrategy};
use crate::domain::trade::TradeRecord;

/// Common result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Duplicate insert, or a write over a record that moved on
    #[error("Write conflict: {0}")]
    Conflict(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage I/O error: {0}")]
    Io(String),
}

/// Durable source of truth for everything the engine persists.
///
/// Implementations must be safe to call concurrently; each call is atomic
/// with respect to the record it touches.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_authority(&self, user_id: &str) -> StoreResult<Option<TradingAuthority>>;

    /// Insert-if-absent. Fails with `Conflict` when the user already has one.
    async fn insert_authority(&self, authority: TradingAuthority) -> StoreResult<()>;

    /// Returns whether a record was removed
    async fn delete_authority(&self, user_id: &str) -> StoreResult<bool>;

    async fn append_trade(&self, record: TradeRecord) -> StoreResult<()>;

    /// Most recent first
    async fn list_trades(&self, user_id: &str, limit: usize) -> StoreResult<Vec<TradeRecord>>;

    async fn insert_user_strategy(&self, strategy: UserStrategy) -> StoreResult<()>;

    /// Apply `change` atomically and return the stored result.
    /// Fails with `NotFound` for unknown ids.
    async fn apply_strategy_change(&self, id: &str, change: StrategyChange) -> StoreResult<UserStrategy>;

    async fn get_user_strategy(&self, id: &str) -> StoreResult<Option<UserStrategy>>;

    /// Oldest first
    async fn list_user_strategies(&self, user_id: &str) -> StoreResult<Vec<UserStrategy>>;

    async fn insert_position(&self, position: StrategyPosition) -> StoreResult<()>;

    /// Fails with `NotFound` for unknown ids and with `Conflict` when the
    /// stored position is no longer open. Closed and cancelled are final.
    async fn update_position(&self, position: StrategyPosition) -> StoreResult<()>;

    async fn get_position(&self, id: &str) -> StoreResult<Option<StrategyPosition>>;

    /// Oldest first
    async fn list_positions(&self, user_strategy_id: &str) -> StoreResult<Vec<StrategyPosition>>;
}
