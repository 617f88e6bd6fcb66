//! Strategy templates, user strategies and risk sizing

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Sizing multiplier applied on top of the confidence factor
    pub fn multiplier(&self) -> f64 {
        match self {
            RiskLevel::Low => 0.7,
            RiskLevel::Medium => 1.0,
            RiskLevel::High => 1.3,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Medium => write!(f, "medium"),
            RiskLevel::High => write!(f, "high"),
        }
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            other => Err(format!("unknown risk level: {}", other)),
        }
    }
}

/// `(0.5 + confidence/100 * 0.5) * risk_multiplier`, confidence clamped to [0, 100].
///
/// Monotonically increasing in confidence; bounded by [0.35, 1.3].
pub fn confidence_multiplier(confidence: f64, risk: RiskLevel) -> f64 {
    let confidence = crate::domain::signal::clamp_score(confidence);
    (0.5 + (confidence / 100.0) * 0.5) * risk.multiplier()
}

/// Immutable strategy template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingStrategy {
    pub id: String,
    pub name: String,
    pub description: String,
    pub risk_level: RiskLevel,
    pub tokens: Vec<String>,
    pub max_position_percentage: f64,
    pub target_profit_percentage: f64,
    pub stop_loss_percentage: f64,
}

impl TradingStrategy {
    pub fn allows_token(&self, token: &str) -> bool {
        self.tokens.iter().any(|t| t.eq_ignore_ascii_case(token))
    }

    /// Built-in templates loaded at process start
    pub fn builtin_templates() -> Vec<TradingStrategy> {
        vec![
            TradingStrategy {
                id: "conservative".to_string(),
                name: "Conservative".to_string(),
                description: "Blue-chip exposure with tight stops".to_string(),
                risk_level: RiskLevel::Low,
                tokens: vec!["SOL".into(), "USDC".into(), "USDT".into(), "ETH".into()],
                max_position_percentage: 10.0,
                target_profit_percentage: 5.0,
                stop_loss_percentage: 3.0,
            },
            TradingStrategy {
                id: "balanced".to_string(),
                name: "Balanced".to_string(),
                description: "Large caps plus Solana ecosystem leaders".to_string(),
                risk_level: RiskLevel::Medium,
                tokens: vec![
                    "SOL".into(),
                    "USDC".into(),
                    "ETH".into(),
                    "JUP".into(),
                    "RAY".into(),
                ],
                max_position_percentage: 20.0,
                target_profit_percentage: 15.0,
                stop_loss_percentage: 8.0,
            },
            TradingStrategy {
                id: "aggressive".to_string(),
                name: "Aggressive".to_string(),
                description: "Momentum trading on volatile ecosystem and meme tokens".to_string(),
                risk_level: RiskLevel::High,
                tokens: vec![
                    "SOL".into(),
                    "USDC".into(),
                    "JUP".into(),
                    "RAY".into(),
                    "BONK".into(),
                    "WIF".into(),
                ],
                max_position_percentage: 35.0,
                target_profit_percentage: 40.0,
                stop_loss_percentage: 15.0,
            },
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyStatus {
    Active,
    Paused,
}

/// A user's subscription to a template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStrategy {
    pub id: String,
    pub user_id: String,
    pub strategy_id: String,
    pub status: StrategyStatus,
    #[serde(default)]
    pub risk_override: Option<RiskLevel>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_run_at: Option<DateTime<Utc>>,
    pub performance_pnl: f64,
    pub performance_percentage: f64,
    /// Sum of sized input amounts of every opened position
    #[serde(default)]
    pub total_deposited: f64,
}

impl UserStrategy {
    pub fn new(user_id: &str, strategy_id: &str, risk_override: Option<RiskLevel>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            strategy_id: strategy_id.to_string(),
            status: StrategyStatus::Active,
            risk_override,
            created_at: Utc::now(),
            last_run_at: None,
            performance_pnl: 0.0,
            performance_percentage: 0.0,
            total_deposited: 0.0,
        }
    }

    pub fn effective_risk(&self, template: &TradingStrategy) -> RiskLevel {
        self.risk_override.unwrap_or(template.risk_level)
    }

    pub fn is_active(&self) -> bool {
        self.status == StrategyStatus::Active
    }

    /// Record a realized result and recompute the percentage against the deposit baseline
    pub fn apply_realized_pnl(&mut self, pnl: f64) {
        self.performance_pnl += pnl;
        self.performance_percentage = if self.total_deposited > 0.0 {
            self.performance_pnl / self.total_deposited * 100.0
        } else {
            0.0
        };
    }
}

/// Field-level change to a `UserStrategy`, applied by the store under its
/// own lock so concurrent changes to other fields are kept
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StrategyChange {
    Status(StrategyStatus),
    /// A fill opened a position worth `amount` of the input token
    Deposit { amount: f64, at: DateTime<Utc> },
    RealizedPnl(f64),
}

impl StrategyChange {
    pub fn apply(self, strategy: &mut UserStrategy) {
        match self {
            StrategyChange::Status(status) => strategy.status = status,
            StrategyChange::Deposit { amount, at } => {
                strategy.total_deposited += amount;
                strategy.last_run_at = Some(at);
            }
            StrategyChange::RealizedPnl(pnl) => strategy.apply_realized_pnl(pnl),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_strategy_changes_touch_only_their_fields() {
        let mut strategy = UserStrategy::new("u1", "balanced", None);
        StrategyChange::Deposit { amount: 200.0, at: Utc::now() }.apply(&mut strategy);
        StrategyChange::Status(StrategyStatus::Paused).apply(&mut strategy);
        StrategyChange::RealizedPnl(20.0).apply(&mut strategy);

        assert_eq!(strategy.status, StrategyStatus::Paused);
        assert!(strategy.last_run_at.is_some());
        assert_relative_eq!(strategy.total_deposited, 200.0);
        assert_relative_eq!(strategy.performance_pnl, 20.0);
        assert_relative_eq!(strategy.performance_percentage, 10.0);
    }

    #[test]
    fn test_multiplier_scenario_low_risk() {
        assert_relative_eq!(confidence_multiplier(80.0, RiskLevel::Low), 0.63, epsilon = 1e-12);
    }

    #[test]
    fn test_multiplier_bounds_and_monotonic() {
        for risk in [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High] {
            let mut previous = f64::MIN;
            for c in 0..=100 {
                let m = confidence_multiplier(c as f64, risk);
                assert!(m >= 0.35 - 1e-12 && m <= 1.3 + 1e-12);
                assert!(m >= previous);
                previous = m;
            }
        }
        assert_relative_eq!(confidence_multiplier(0.0, RiskLevel::Low), 0.35, epsilon = 1e-12);
        assert_relative_eq!(confidence_multiplier(100.0, RiskLevel::High), 1.3, epsilon = 1e-12);
    }

    #[test]
    fn test_multiplier_clamps_confidence() {
        assert_eq!(
            confidence_multiplier(250.0, RiskLevel::Medium),
            confidence_multiplier(100.0, RiskLevel::Medium)
        );
        assert_eq!(
            confidence_multiplier(-10.0, RiskLevel::Medium),
            confidence_multiplier(0.0, RiskLevel::Medium)
        );
    }

    #[test]
    fn test_templates() {
        let templates = TradingStrategy::builtin_templates();
        let conservative = templates.iter().find(|t| t.id == "conservative").unwrap();
        assert_eq!(conservative.risk_level, RiskLevel::Low);
        assert!(conservative.allows_token("sol"));
        assert!(!conservative.allows_token("BONK"));
    }

    #[test]
    fn test_effective_risk_and_pnl() {
        let template = &TradingStrategy::builtin_templates()[0];
        let mut strategy = UserStrategy::new("u1", &template.id, Some(RiskLevel::High));
        assert_eq!(strategy.effective_risk(template), RiskLevel::High);
        assert!(strategy.is_active());

        strategy.total_deposited = 200.0;
        strategy.apply_realized_pnl(10.0);
        assert_relative_eq!(strategy.performance_percentage, 5.0);
    }

    #[test]
    fn test_risk_level_parse() {
        assert_eq!("HIGH".parse::<RiskLevel>().unwrap(), RiskLevel::High);
        assert!("extreme".parse::<RiskLevel>().is_err());
    }
}
