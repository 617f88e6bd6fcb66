use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Recommended trade action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalAction {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for SignalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalAction::Buy => write!(f, "buy"),
            SignalAction::Sell => write!(f, "sell"),
            SignalAction::Hold => write!(f, "hold"),
        }
    }
}

/// Market direction implied by a signal or indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Bullish,
    Bearish,
    Neutral,
}

impl Direction {
    /// Keyword classification used for free-text indicator lines.
    /// Bullish keywords win over bearish ones when both appear.
    pub fn from_keywords(text: &str) -> Self {
        let lower = text.to_lowercase();
        if ["bull", "buy", "positive"].iter().any(|k| lower.contains(k)) {
            Direction::Bullish
        } else if ["bear", "sell", "negative"].iter().any(|k| lower.contains(k)) {
            Direction::Bearish
        } else {
            Direction::Neutral
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Bullish => write!(f, "bullish"),
            Direction::Bearish => write!(f, "bearish"),
            Direction::Neutral => write!(f, "neutral"),
        }
    }
}

/// Holding horizon of a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    Short,
    Medium,
    Long,
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timeframe::Short => write!(f, "short"),
            Timeframe::Medium => write!(f, "medium"),
            Timeframe::Long => write!(f, "long"),
        }
    }
}

/// Where a signal came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalSource {
    /// Parsed from an AI completion
    Ai,
    /// Deterministic RSI rule
    Technical,
    /// Neutral placeholder after an unrecoverable error
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalIndicator {
    pub name: String,
    pub value: String,
    pub signal: Direction,
    pub timeframe: Timeframe,
}

/// Sentiment scores, each in [0, 100]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub social: f64,
    pub news: f64,
    pub overall: f64,
}

impl Sentiment {
    pub fn new(social: f64, news: f64) -> Self {
        let social = clamp_score(social);
        let news = clamp_score(news);
        Self {
            social,
            news,
            overall: (social + news) / 2.0,
        }
    }
}

impl Default for Sentiment {
    fn default() -> Self {
        Self::new(50.0, 50.0)
    }
}

/// Clamp a 0-100 score; NaN maps to the neutral midpoint
pub fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        50.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

/// Trading signal for one token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AISignal {
    pub token: String,
    pub action: SignalAction,
    pub confidence: f64,
    pub direction: Direction,
    pub timeframe: Timeframe,
    pub reasoning: String,
    pub indicators: Vec<TechnicalIndicator>,
    pub sentiment: Sentiment,
    pub source: SignalSource,
    pub timestamp: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AISignal {
    /// Normal lifetime of a generated signal
    pub const DEFAULT_TTL_MINUTES: i64 = 60;
    /// Lifetime of the neutral signal returned after an unrecoverable error
    pub const NEUTRAL_TTL_MINUTES: i64 = 30;

    /// Neutral hold signal with the short expiry
    pub fn neutral(token: &str, reason: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            token: token.to_string(),
            action: SignalAction::Hold,
            confidence: 0.0,
            direction: Direction::Neutral,
            timeframe: Timeframe::Medium,
            reasoning: reason.into(),
            indicators: Vec::new(),
            sentiment: Sentiment::default(),
            source: SignalSource::Neutral,
            timestamp: now,
            expires_at: now + Duration::minutes(Self::NEUTRAL_TTL_MINUTES),
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Remaining lifetime, zero once expired
    pub fn remaining_ttl(&self) -> std::time::Duration {
        (self.expires_at - Utc::now())
            .to_std()
            .unwrap_or(std::time::Duration::ZERO)
    }
}
