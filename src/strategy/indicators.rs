//! Technical indicators over a close-price series

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum IndicatorError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Insufficient data for calculation: requires {0} elements, got {1}")]
    InsufficientData(usize, usize),

    #[error("Indicator calculation failed: {0}")]
    CalculationError(String),
}

pub const RSI_PERIOD: usize = 14;
pub const SMA_SHORT: usize = 7;
pub const SMA_LONG: usize = 25;
pub const EMA_FAST: usize = 12;
pub const EMA_SLOW: usize = 26;

/// Simple moving average of the last `period` values
pub fn sma(prices: &[f64], period: usize) -> Result<f64, IndicatorError> {
    if period == 0 {
        return Err(IndicatorError::InvalidParameter("SMA period must be > 0".into()));
    }
    if prices.len() < period {
        return Err(IndicatorError::InsufficientData(period, prices.len()));
    }
    Ok(prices[prices.len() - period..].iter().mean())
}

/// Exponential moving average seeded with the SMA of the first `period` values
pub fn ema(prices: &[f64], period: usize) -> Result<f64, IndicatorError> {
    if period == 0 {
        return Err(IndicatorError::InvalidParameter("EMA period must be > 0".into()));
    }
    if prices.len() < period {
        return Err(IndicatorError::InsufficientData(period, prices.len()));
    }
    let k = 2.0 / (period as f64 + 1.0);
    let seed = prices[..period].iter().mean();
    Ok(prices[period..].iter().fold(seed, |acc, p| p * k + acc * (1.0 - k)))
}

/// Wilder RSI. Needs `period + 1` prices.
pub fn rsi(prices: &[f64], period: usize) -> Result<f64, IndicatorError> {
    if period == 0 {
        return Err(IndicatorError::InvalidParameter("RSI period must be > 0".into()));
    }
    if prices.len() < period + 1 {
        return Err(IndicatorError::InsufficientData(period + 1, prices.len()));
    }

    let changes: Vec<f64> = prices.windows(2).map(|w| w[1] - w[0]).collect();
    let (seed, rest) = changes.split_at(period);

    let mut avg_gain = seed.iter().map(|c| c.max(0.0)).sum::<f64>() / period as f64;
    let mut avg_loss = seed.iter().map(|c| (-c).max(0.0)).sum::<f64>() / period as f64;

    for change in rest {
        avg_gain = (avg_gain * (period as f64 - 1.0) + change.max(0.0)) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + (-change).max(0.0)) / period as f64;
    }

    if avg_loss == 0.0 {
        return Ok(if avg_gain == 0.0 { 50.0 } else { 100.0 });
    }
    let rs = avg_gain / avg_loss;
    Ok(100.0 - 100.0 / (1.0 + rs))
}

/// Standard deviation of period returns, in percent
pub fn volatility_pct(prices: &[f64]) -> Result<f64, IndicatorError> {
    if prices.len() < 3 {
        return Err(IndicatorError::InsufficientData(3, prices.len()));
    }
    let returns: Vec<f64> = prices
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect();
    Ok(returns.iter().std_dev() * 100.0)
}

/// Indicator values computed for one token at signal time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalSnapshot {
    pub current_price: f64,
    pub sma_short: f64,
    pub sma_long: f64,
    pub ema_fast: f64,
    pub ema_slow: f64,
    pub rsi: f64,
    pub price_change_pct: f64,
    pub volatility_pct: f64,
}

impl TechnicalSnapshot {
    /// Minimum number of samples needed for every indicator
    pub const MIN_SAMPLES: usize = EMA_SLOW;

    pub fn compute(prices: &[f64]) -> Result<Self, IndicatorError> {
        if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return Err(IndicatorError::CalculationError(
                "price series contains non-positive values".into(),
            ));
        }
        let current_price = *prices
            .last()
            .ok_or(IndicatorError::InsufficientData(Self::MIN_SAMPLES, 0))?;
        let first = prices[0];

        Ok(Self {
            current_price,
            sma_short: sma(prices, SMA_SHORT)?,
            sma_long: sma(prices, SMA_LONG)?,
            ema_fast: ema(prices, EMA_FAST)?,
            ema_slow: ema(prices, EMA_SLOW)?,
            rsi: rsi(prices, RSI_PERIOD)?,
            price_change_pct: (current_price - first) / first * 100.0,
            volatility_pct: volatility_pct(prices)?,
        })
    }

    /// Short average above long average
    pub fn is_uptrend(&self) -> bool {
        self.sma_short > self.sma_long
    }

    pub fn macd(&self) -> f64 {
        self.ema_fast - self.ema_slow
    }
}
