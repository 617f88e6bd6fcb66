//! Shared TTL cache port
//!
//! The cache is advisory: misses, evictions and backend failures only cost a
//! trip to the source of truth, so the interface is infallible.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

#[async_trait]
pub trait Cache: Send + Sync {
    /// Value stored under `key` if present and not expired
    async fn get(&self, key: &str) -> Option<serde_json::Value>;

    async fn set(&self, key: &str, value: serde_json::Value, ttl: Duration);

    async fn delete(&self, key: &str);
}

impl<'a> dyn Cache + 'a {
    /// Typed read; entries that no longer deserialize count as misses
    pub async fn get_typed<T: DeserializeOwned + Send>(&self, key: &str) -> Option<T> {
        let value = self.get(key).await?;
        match serde_json::from_value(value) {
            Ok(typed) => Some(typed),
            Err(e) => {
                tracing::warn!(key, error = %e, "Discarding undecodable cache entry");
                self.delete(key).await;
                None
            }
        }
    }

    /// Typed write; values that fail to serialize are skipped
    pub async fn set_typed<T: Serialize + Sync>(&self, key: &str, value: &T, ttl: Duration) {
        match serde_json::to_value(value) {
            Ok(json) => self.set(key, json, ttl).await,
            Err(e) => tracing::warn!(key, error = %e, "Skipping cache write"),
        }
    }
}

/// Cache key builders, one namespace per data class
pub mod keys {
    pub fn price(token: &str) -> String {
        format!("price:{}", token)
    }

    pub fn token_info(token: &str) -> String {
        format!("token_info:{}", token)
    }

    pub fn market_overview() -> String {
        "market:overview".to_string()
    }

    pub fn trending() -> String {
        "market:trending".to_string()
    }

    pub fn history(token: &str, days: u32) -> String {
        format!("history:{}:{}", token, days)
    }

    pub fn signal(token: &str) -> String {
        format!("signal:{}", token)
    }

    pub fn authority(user_id: &str) -> String {
        format!("authority:{}", user_id)
    }

    pub fn trades(user_id: &str) -> String {
        format!("trades:{}", user_id)
    }

    pub fn user_strategies(user_id: &str) -> String {
        format!("user_strategies:{}", user_id)
    }

    pub fn positions(user_strategy_id: &str) -> String {
        format!("positions:{}", user_strategy_id)
    }
}
