use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order type requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    #[default]
    Market,
    Limit,
}

/// Outcome of an executed trade attempt. Produced for failures too.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeResult {
    pub success: bool,
    #[serde(default)]
    pub tx_signature: Option<String>,
    pub input_token: String,
    pub output_token: String,
    pub input_amount: f64,
    pub output_amount: f64,
    /// Realized slippage as a fraction of the ideal output
    pub slippage: f64,
    pub order_type: OrderType,
    pub executed_at: DateTime<Utc>,
    #[serde(default)]
    pub error: Option<String>,
}

impl TradeResult {
    /// Successful fill
    pub fn filled(
        input_token: &str,
        output_token: &str,
        input_amount: f64,
        output_amount: f64,
        slippage: f64,
        order_type: OrderType,
        tx_signature: String,
    ) -> Self {
        Self {
            success: true,
            tx_signature: Some(tx_signature),
            input_token: input_token.to_string(),
            output_token: output_token.to_string(),
            input_amount,
            output_amount,
            slippage,
            order_type,
            executed_at: Utc::now(),
            error: None,
        }
    }

    /// Failed attempt; nothing was received
    pub fn failed(
        input_token: &str,
        output_token: &str,
        input_amount: f64,
        order_type: OrderType,
        error: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            tx_signature: None,
            input_token: input_token.to_string(),
            output_token: output_token.to_string(),
            input_amount,
            output_amount: 0.0,
            slippage: 0.0,
            order_type,
            executed_at: Utc::now(),
            error: Some(error.into()),
        }
    }

    /// Effective execution price (output units per input unit)
    pub fn execution_rate(&self) -> Option<f64> {
        if self.success && self.input_amount > 0.0 {
            Some(self.output_amount / self.input_amount)
        } else {
            None
        }
    }
}

impl fmt::Display for TradeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.success {
            write!(
                f,
                "Filled: {} {} -> {} {} (slippage {:.3}%)",
                self.input_amount,
                self.input_token,
                self.output_amount,
                self.output_token,
                self.slippage * 100.0
            )
        } else {
            write!(
                f,
                "Failed: {} {} -> {}: {}",
                self.input_amount,
                self.input_token,
                self.output_token,
                self.error.as_deref().unwrap_or("unknown error")
            )
        }
    }
}

/// Durable trade-history row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: String,
    pub user_id: String,
    pub result: TradeResult,
}

impl TradeRecord {
    pub fn new(user_id: &str, result: TradeResult) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            result,
        }
    }
}
