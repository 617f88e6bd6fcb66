use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionStatus {
    Open,
    Closed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StrategyPosition {
    pub id: String,
    pub user_strategy_id: String,
    pub input_token: String,
    pub output_token: String,
    pub input_amount: f64,
    pub output_amount: f64,
    pub entry_price: f64,
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default)]
    pub exit_price: Option<f64>,
    pub status: PositionStatus,
    pub unrealized_pnl: f64,
    pub unrealized_pnl_percentage: f64,
    #[serde(default)]
    pub realized_pnl: Option<f64>,
    #[serde(default)]
    pub realized_pnl_percentage: Option<f64>,
    pub opened_at: DateTime<Utc>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tx_id_open: Option<String>,
    #[serde(default)]
    pub tx_id_close: Option<String>,
}

#[derive(Debug, Error, PartialEq)]
pub enum PositionError {
    #[error("position is not open")]
    NotOpen,
    #[error("Invalid amount: {0}")]
    InvalidAmount(f64),
    #[error("Invalid price: {0}")]
    InvalidPrice(f64),
}

impl StrategyPosition {
    pub fn open(
        user_strategy_id: &str,
        input_token: &str,
        output_token: &str,
        input_amount: f64,
        output_amount: f64,
        entry_price: f64,
        tx_id_open: Option<String>,
    ) -> Result<Self, PositionError> {
        if !(input_amount > 0.0) {
            return Err(PositionError::InvalidAmount(input_amount));
        }
        if !(output_amount > 0.0) {
            return Err(PositionError::InvalidAmount(output_amount));
        }
        if !(entry_price > 0.0) || !entry_price.is_finite() {
            return Err(PositionError::InvalidPrice(entry_price));
        }

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_strategy_id: user_strategy_id.to_string(),
            input_token: input_token.to_string(),
            output_token: output_token.to_string(),
            input_amount,
            output_amount,
            entry_price,
            current_price: Some(entry_price),
            exit_price: None,
            status: PositionStatus::Open,
            unrealized_pnl: 0.0,
            unrealized_pnl_percentage: 0.0,
            realized_pnl: None,
            realized_pnl_percentage: None,
            opened_at: Utc::now(),
            closed_at: None,
            tx_id_open,
            tx_id_close: None,
        })
    }

    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }

    /// Refresh the mark price and unrealized PnL. Only legal while open.
    pub fn mark_to_market(&mut self, current_price: f64) -> Result<(), PositionError> {
        if !self.is_open() {
            return Err(PositionError::NotOpen);
        }
        if !(current_price > 0.0) || !current_price.is_finite() {
            return Err(PositionError::InvalidPrice(current_price));
        }
        self.current_price = Some(current_price);
        self.unrealized_pnl = (current_price - self.entry_price) * self.output_amount;
        self.unrealized_pnl_percentage = (current_price - self.entry_price) / self.entry_price * 100.0;
        Ok(())
    }

    /// Terminal `open -> closed` transition
    pub fn close(
        &mut self,
        exit_price: f64,
        proceeds: f64,
        tx_id_close: Option<String>,
    ) -> Result<f64, PositionError> {
        if !self.is_open() {
            return Err(PositionError::NotOpen);
        }
        let realized = proceeds - self.input_amount;
        self.status = PositionStatus::Closed;
        self.exit_price = Some(exit_price);
        self.current_price = Some(exit_price);
        self.realized_pnl = Some(realized);
        self.realized_pnl_percentage = Some(realized / self.input_amount * 100.0);
        self.unrealized_pnl = 0.0;
        self.unrealized_pnl_percentage = 0.0;
        self.closed_at = Some(Utc::now());
        self.tx_id_close = tx_id_close;
        Ok(realized)
    }

    /// Terminal administrative `open -> cancelled` transition
    pub fn cancel(&mut self) -> Result<(), PositionError> {
        if !self.is_open() {
            return Err(PositionError::NotOpen);
        }
        self.status = PositionStatus::Cancelled;
        self.closed_at = Some(Utc::now());
        Ok(())
    }

    /// PnL counted in strategy stats: realized when closed, unrealized when open
    pub fn total_pnl(&self) -> f64 {
        match self.status {
            PositionStatus::Open => self.unrealized_pnl,
            PositionStatus::Closed => self.realized_pnl.unwrap_or(0.0),
            PositionStatus::Cancelled => 0.0,
        }
    }
}
