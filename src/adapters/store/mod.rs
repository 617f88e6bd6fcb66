//! Store adapters
//!
//! Both backends share `StoreState`, the in-memory tables and their
//! uniqueness rules. `JsonFileStore` snapshots the tables after every
//! mutation.

mod json_file;
mod memory;

pub use json_file::JsonFileStore;
pub use memory::InMemoryStore;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::authority::TradingAuthority;
use crate::domain::position::StrategyPosition;
use crate::domain::strategy::{StrategyChange, UserStrategy};
use crate::domain::trade::TradeRecord;
use crate::ports::store::{StoreError, StoreResult};

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub(crate) struct StoreState {
    #[serde(default)]
    authorities: HashMap<String, TradingAuthority>,
    /// Append-only, oldest first
    #[serde(default)]
    trades: Vec<TradeRecord>,
    #[serde(default)]
    user_strategies: HashMap<String, UserStrategy>,
    #[serde(default)]
    positions: HashMap<String, StrategyPosition>,
}

impl StoreState {
    fn get_authority(&self, user_id: &str) -> Option<TradingAuthority> {
        self.authorities.get(user_id).cloned()
    }

    fn insert_authority(&mut self, authority: TradingAuthority) -> StoreResult<()> {
        if self.authorities.contains_key(&authority.user_id) {
            return Err(StoreError::Conflict(format!(
                "authority for user {}",
                authority.user_id
            )));
        }
        self.authorities.insert(authority.user_id.clone(), authority);
        Ok(())
    }

    fn delete_authority(&mut self, user_id: &str) -> bool {
        self.authorities.remove(user_id).is_some()
    }

    fn append_trade(&mut self, record: TradeRecord) {
        self.trades.push(record);
    }

    fn list_trades(&self, user_id: &str, limit: usize) -> Vec<TradeRecord> {
        self.trades
            .iter()
            .rev()
            .filter(|r| r.user_id == user_id)
            .take(limit)
            .cloned()
            .collect()
    }

    fn insert_user_strategy(&mut self, strategy: UserStrategy) -> StoreResult<()> {
        if self.user_strategies.contains_key(&strategy.id) {
            return Err(StoreError::Conflict(format!("user strategy {}", strategy.id)));
        }
        self.user_strategies.insert(strategy.id.clone(), strategy);
        Ok(())
    }

    fn apply_strategy_change(&mut self, id: &str, change: StrategyChange) -> StoreResult<UserStrategy> {
        let slot = self
            .user_strategies
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("user strategy {}", id)))?;
        change.apply(slot);
        Ok(slot.clone())
    }

    fn get_user_strategy(&self, id: &str) -> Option<UserStrategy> {
        self.user_strategies.get(id).cloned()
    }

    fn list_user_strategies(&self, user_id: &str) -> Vec<UserStrategy> {
        let mut list: Vec<UserStrategy> = self
            .user_strategies
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        list
    }

    fn insert_position(&mut self, position: StrategyPosition) -> StoreResult<()> {
        if self.positions.contains_key(&position.id) {
            return Err(StoreError::Conflict(format!("position {}", position.id)));
        }
        self.positions.insert(position.id.clone(), position);
        Ok(())
    }

    fn update_position(&mut self, position: StrategyPosition) -> StoreResult<()> {
        let slot = self
            .positions
            .get_mut(&position.id)
            .ok_or_else(|| StoreError::NotFound(format!("position {}", position.id)))?;
        if !slot.is_open() {
            return Err(StoreError::Conflict(format!(
                "position {} is already {:?}",
                position.id, slot.status
            )));
        }
        *slot = position;
        Ok(())
    }

    fn get_position(&self, id: &str) -> Option<StrategyPosition> {
        self.positions.get(id).cloned()
    }

    fn list_positions(&self, user_strategy_id: &str) -> Vec<StrategyPosition> {
        let mut list: Vec<StrategyPosition> = self
            .positions
            .values()
            .filter(|p| p.user_strategy_id == user_strategy_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| a.opened_at.cmp(&b.opened_at).then_with(|| a.id.cmp(&b.id)));
        list
    }
}
