//! Deterministic RSI fallback rule
//!
//! RSI > 70 sells, RSI < 30 buys, anything in between holds.
//! Confidence is `round(|RSI - 50| * 2)`.

use chrono::{Duration, Utc};

use super::indicators::TechnicalSnapshot;
use crate::domain::signal::{
    AISignal, Direction, SignalAction, SignalSource, Sentiment, TechnicalIndicator, Timeframe,
};

pub const OVERBOUGHT: f64 = 70.0;
pub const OVERSOLD: f64 = 30.0;

/// Action, direction and confidence for an RSI reading
pub fn classify_rsi(rsi: f64) -> (SignalAction, Direction, f64) {
    let confidence = ((rsi - 50.0).abs() * 2.0).round().clamp(0.0, 100.0);
    if rsi > OVERBOUGHT {
        (SignalAction::Sell, Direction::Bearish, confidence)
    } else if rsi < OVERSOLD {
        (SignalAction::Buy, Direction::Bullish, confidence)
    } else {
        (SignalAction::Hold, Direction::Neutral, confidence)
    }
}

/// Technical-only signal built from a snapshot
pub fn technical_signal(token: &str, snapshot: &TechnicalSnapshot, ttl_minutes: i64) -> AISignal {
    let (action, direction, confidence) = classify_rsi(snapshot.rsi);
    let timeframe = Timeframe::Short;

    let rsi_state = if snapshot.rsi > OVERBOUGHT {
        "overbought"
    } else if snapshot.rsi < OVERSOLD {
        "oversold"
    } else {
        "in the neutral band"
    };

    let trend_signal = if snapshot.is_uptrend() {
        Direction::Bullish
    } else {
        Direction::Bearish
    };
    let macd_signal = if snapshot.macd() >= 0.0 {
        Direction::Bullish
    } else {
        Direction::Bearish
    };

    let indicators = vec![
        TechnicalIndicator {
            name: "RSI (14)".to_string(),
            value: format!("{:.2}", snapshot.rsi),
            signal: direction,
            timeframe,
        },
        TechnicalIndicator {
            name: "SMA 7/25".to_string(),
            value: format!("{:.6} / {:.6}", snapshot.sma_short, snapshot.sma_long),
            signal: trend_signal,
            timeframe,
        },
        TechnicalIndicator {
            name: "MACD (12/26)".to_string(),
            value: format!("{:.6}", snapshot.macd()),
            signal: macd_signal,
            timeframe,
        },
    ];

    let now = Utc::now();
    AISignal {
        token: token.to_string(),
        action,
        confidence,
        direction,
        timeframe,
        reasoning: format!(
            "Technical fallback: RSI {:.1} is {}; 30d change {:+.2}%.",
            snapshot.rsi, rsi_state, snapshot.price_change_pct
        ),
        indicators,
        sentiment: Sentiment::default(),
        source: SignalSource::Technical,
        timestamp: now,
        expires_at: now + Duration::minutes(ttl_minutes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rsi_75_sells_with_confidence_50() {
        assert_eq!(classify_rsi(75.0), (SignalAction::Sell, Direction::Bearish, 50.0));
    }

    #[test]
    fn test_rsi_bands() {
        assert_eq!(classify_rsi(20.0), (SignalAction::Buy, Direction::Bullish, 60.0));
        assert_eq!(classify_rsi(50.0), (SignalAction::Hold, Direction::Neutral, 0.0));
        assert_eq!(classify_rsi(70.0), (SignalAction::Hold, Direction::Neutral, 40.0));
        assert_eq!(classify_rsi(30.0), (SignalAction::Hold, Direction::Neutral, 40.0));
        assert_eq!(classify_rsi(100.0).2, 100.0);
    }

    #[test]
    fn test_technical_signal() {
        let prices: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let snapshot = TechnicalSnapshot::compute(&prices).unwrap();
        let signal = technical_signal("SOL", &snapshot, 60);

        assert_eq!(signal.action, SignalAction::Sell);
        assert_eq!(signal.source, SignalSource::Technical);
        assert_eq!(signal.confidence, 100.0);
        assert_eq!(signal.indicators.len(), 3);
        assert_eq!((signal.expires_at - signal.timestamp).num_minutes(), 60);
    }
}
