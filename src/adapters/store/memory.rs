use async_trait::async_trait;
use tokio::sync::RwLock;

use super::StoreState;
use crate::domain::authority::TradingAuthority;
use crate::domain::position::StrategyPosition;
use crate::domain::strategy::{StrategyChange, UserStrategy};
use crate::domain::trade::TradeRecord;
use crate::ports::store::{Store, StoreResult};

/// Process-local store, used for paper trading and tests
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn get_authority(&self, user_id: &str) -> StoreResult<Option<TradingAuthority>> {
        Ok(self.state.read().await.get_authority(user_id))
    }

    async fn insert_authority(&self, authority: TradingAuthority) -> StoreResult<()> {
        self.state.write().await.insert_authority(authority)
    }

    async fn delete_authority(&self, user_id: &str) -> StoreResult<bool> {
        Ok(self.state.write().await.delete_authority(user_id))
    }

    async fn append_trade(&self, record: TradeRecord) -> StoreResult<()> {
        self.state.write().await.append_trade(record);
        Ok(())
    }

    async fn list_trades(&self, user_id: &str, limit: usize) -> StoreResult<Vec<TradeRecord>> {
        Ok(self.state.read().await.list_trades(user_id, limit))
    }

    async fn insert_user_strategy(&self, strategy: UserStrategy) -> StoreResult<()> {
        self.state.write().await.insert_user_strategy(strategy)
    }

    async fn apply_strategy_change(&self, id: &str, change: StrategyChange) -> StoreResult<UserStrategy> {
        self.state.write().await.apply_strategy_change(id, change)
    }

    async fn get_user_strategy(&self, id: &str) -> StoreResult<Option<UserStrategy>> {
        Ok(self.state.read().await.get_user_strategy(id))
    }

    async fn list_user_strategies(&self, user_id: &str) -> StoreResult<Vec<UserStrategy>> {
        Ok(self.state.read().await.list_user_strategies(user_id))
    }

    async fn insert_position(&self, position: StrategyPosition) -> StoreResult<()> {
        self.state.write().await.insert_position(position)
    }

    async fn update_position(&self, position: StrategyPosition) -> StoreResult<()> {
        self.state.write().await.update_position(position)
    }

    async fn get_position(&self, id: &str) -> StoreResult<Option<StrategyPosition>> {
        Ok(self.state.read().await.get_position(id))
    }

    async fn list_positions(&self, user_strategy_id: &str) -> StoreResult<Vec<StrategyPosition>> {
        Ok(self.state.read().await.list_positions(user_strategy_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::authority::PermissionLevel;
    use crate::domain::position::PositionStatus;
    use crate::domain::strategy::StrategyStatus;
    use crate::domain::trade::{OrderType, TradeResult};
    use crate::ports::store::StoreError;
    use chrono::Utc;

    fn authority(user_id: &str) -> TradingAuthority {
        TradingAuthority {
            user_id: user_id.into(),
            public_key: "So11111111111111111111111111111111111111112".into(),
            encrypted_secret: "a:b".into(),
            permission_level: PermissionLevel::Limited,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_authority_insert_if_absent() {
        let store = InMemoryStore::new();
        store.insert_authority(authority("u1")).await.unwrap();
        assert!(matches!(
            store.insert_authority(authority("u1")).await,
            Err(StoreError::Conflict(_))
        ));
        assert!(store.delete_authority("u1").await.unwrap());
        assert!(!store.delete_authority("u1").await.unwrap());
        assert!(store.get_authority("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_trades_most_recent_first() {
        let store = InMemoryStore::new();
        for amount in [1.0, 2.0, 3.0] {
            let result = TradeResult::failed("USDC", "SOL", amount, OrderType::Market, "x");
            store.append_trade(TradeRecord::new("u1", result)).await.unwrap();
        }
        let other = TradeResult::failed("USDC", "SOL", 9.0, OrderType::Market, "x");
        store.append_trade(TradeRecord::new("u2", other)).await.unwrap();

        let trades = store.list_trades("u1", 2).await.unwrap();
        let amounts: Vec<f64> = trades.iter().map(|t| t.result.input_amount).collect();
        assert_eq!(amounts, vec![3.0, 2.0]);
    }

    #[tokio::test]
    async fn test_change_unknown_strategy_fails() {
        let store = InMemoryStore::new();
        let strategy = UserStrategy::new("u1", "balanced", None);
        let pause = StrategyChange::Status(StrategyStatus::Paused);
        assert!(matches!(
            store.apply_strategy_change(&strategy.id, pause).await,
            Err(StoreError::NotFound(_))
        ));
        store.insert_user_strategy(strategy.clone()).await.unwrap();
        assert_eq!(store.list_user_strategies("u1").await.unwrap().len(), 1);
        assert!(store.list_user_strategies("u2").await.unwrap().is_empty());

        let paused = store.apply_strategy_change(&strategy.id, pause).await.unwrap();
        assert_eq!(paused.status, StrategyStatus::Paused);
    }

    #[tokio::test]
    async fn test_strategy_changes_compose() {
        let store = InMemoryStore::new();
        let strategy = UserStrategy::new("u1", "balanced", None);
        store.insert_user_strategy(strategy.clone()).await.unwrap();

        let deposit = StrategyChange::Deposit { amount: 50.0, at: Utc::now() };
        store.apply_strategy_change(&strategy.id, deposit).await.unwrap();
        store
            .apply_strategy_change(&strategy.id, StrategyChange::Status(StrategyStatus::Paused))
            .await
            .unwrap();
        store
            .apply_strategy_change(&strategy.id, StrategyChange::RealizedPnl(5.0))
            .await
            .unwrap();

        let stored = store.get_user_strategy(&strategy.id).await.unwrap().unwrap();
        assert_eq!(stored.status, StrategyStatus::Paused);
        assert_eq!(stored.total_deposited, 50.0);
        assert_eq!(stored.performance_pnl, 5.0);
    }

    #[tokio::test]
    async fn test_terminal_position_is_not_overwritten() {
        let store = InMemoryStore::new();
        let open = StrategyPosition::open("s1", "USDC", "SOL", 100.0, 0.5, 200.0, None).unwrap();
        store.insert_position(open.clone()).await.unwrap();

        let mut marked = open.clone();
        marked.mark_to_market(210.0).unwrap();
        store.update_position(marked.clone()).await.unwrap();

        let mut closed = open.clone();
        closed.close(220.0, 110.0, None).unwrap();
        store.update_position(closed).await.unwrap();

        // a stale open copy arriving after the close
        assert!(matches!(
            store.update_position(marked).await,
            Err(StoreError::Conflict(_))
        ));
        let stored = store.get_position(&open.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PositionStatus::Closed);
        assert_eq!(stored.exit_price, Some(220.0));
    }
}
