//! JSON snapshot store
//!
//! Every mutation rewrites the whole snapshot through a temp file and a
//! rename, so a crash leaves either the old or the new snapshot on disk.

use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::StoreState;
use crate::domain::authority::TradingAuthority;
use crate::domain::position::StrategyPosition;
use crate::domain::strategy::{StrategyChange, UserStrategy};
use crate::domain::trade::TradeRecord;
use crate::ports::store::{Store, StoreError, StoreResult};

/// Default snapshot file name inside the data directory
pub const DEFAULT_STORE_FILE: &str = "tradedesk.json";

#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    state: Mutex<StoreState>,
}

impl JsonFileStore {
    /// Open the snapshot at `path`, starting empty when it does not exist
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let state = Self::load(&path)?;
        tracing::info!("Store opened: {}", path.display());
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(path: &Path) -> StoreResult<StoreState> {
        if !path.exists() {
            return Ok(StoreState::default());
        }
        let content = fs::read_to_string(path).map_err(|e| StoreError::Io(e.to_string()))?;
        if content.trim().is_empty() {
            return Ok(StoreState::default());
        }
        serde_json::from_str(&content).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn persist(&self, state: &StoreState) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
        }
        let content = serde_json::to_string_pretty(state)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content).map_err(|e| StoreError::Io(e.to_string()))?;
        fs::rename(&tmp, &self.path).map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(())
    }

    /// Apply a mutation and persist it. The in-memory state only changes when
    /// the snapshot was written.
    async fn mutate<T>(
        &self,
        op: impl FnOnce(&mut StoreState) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut guard = self.state.lock().await;
        let mut next = guard.clone();
        let out = op(&mut next)?;
        self.persist(&next)?;
        *guard = next;
        Ok(out)
    }
}

#[async_trait]
impl Store for JsonFileStore {
    async fn get_authority(&self, user_id: &str) -> StoreResult<Option<TradingAuthority>> {
        Ok(self.state.lock().await.get_authority(user_id))
    }

    async fn insert_authority(&self, authority: TradingAuthority) -> StoreResult<()> {
        self.mutate(|s| s.insert_authority(authority)).await
    }

    async fn delete_authority(&self, user_id: &str) -> StoreResult<bool> {
        self.mutate(|s| Ok(s.delete_authority(user_id))).await
    }

    async fn append_trade(&self, record: TradeRecord) -> StoreResult<()> {
        self.mutate(|s| {
            s.append_trade(record);
            Ok(())
        })
        .await
    }

    async fn list_trades(&self, user_id: &str, limit: usize) -> StoreResult<Vec<TradeRecord>> {
        Ok(self.state.lock().await.list_trades(user_id, limit))
    }

    async fn insert_user_strategy(&self, strategy: UserStrategy) -> StoreResult<()> {
        self.mutate(|s| s.insert_user_strategy(strategy)).await
    }

    async fn apply_strategy_change(&self, id: &str, change: StrategyChange) -> StoreResult<UserStrategy> {
        self.mutate(|s| s.apply_strategy_change(id, change)).await
    }

    async fn get_user_strategy(&self, id: &str) -> StoreResult<Option<UserStrategy>> {
        Ok(self.state.lock().await.get_user_strategy(id))
    }

    async fn list_user_strategies(&self, user_id: &str) -> StoreResult<Vec<UserStrategy>> {
        Ok(self.state.lock().await.list_user_strategies(user_id))
    }

    async fn insert_position(&self, position: StrategyPosition) -> StoreResult<()> {
        self.mutate(|s| s.insert_position(position)).await
    }

    async fn update_position(&self, position: StrategyPosition) -> StoreResult<()> {
        self.mutate(|s| s.update_position(position)).await
    }

    async fn get_position(&self, id: &str) -> StoreResult<Option<StrategyPosition>> {
        Ok(self.state.lock().await.get_position(id))
    }

    async fn list_positions(&self, user_strategy_id: &str) -> StoreResult<Vec<StrategyPosition>> {
        Ok(self.state.lock().await.list_positions(user_strategy_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_snapshot_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data").join(DEFAULT_STORE_FILE);

        let strategy = UserStrategy::new("u1", "conservative", None);
        let position =
            StrategyPosition::open(&strategy.id, "USDC", "SOL", 63.0, 0.42, 150.0, None).unwrap();
        {
            let store = JsonFileStore::open(&path).unwrap();
            store.insert_user_strategy(strategy.clone()).await.unwrap();
            store.insert_position(position.clone()).await.unwrap();
        }

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.get_user_strategy(&strategy.id).await.unwrap(), Some(strategy.clone()));
        assert_eq!(reopened.list_positions(&strategy.id).await.unwrap(), vec![position]);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_failed_mutation_leaves_state_unchanged() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("s.json")).unwrap();
        let strategy = UserStrategy::new("u1", "balanced", None);
        store.insert_user_strategy(strategy.clone()).await.unwrap();
        assert!(store.insert_user_strategy(strategy).await.is_err());
        assert_eq!(store.list_user_strategies("u1").await.unwrap().len(), 1);
    }

    #[test]
    fn test_corrupted_snapshot_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("s.json");
        fs::write(&path, "{ invalid json }").unwrap();
        assert!(matches!(JsonFileStore::open(&path), Err(StoreError::Serialization(_))));
    }
}
