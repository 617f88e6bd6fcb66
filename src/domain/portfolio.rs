use serde::{Deserialize, Serialize};

/// A token balance valued at the current market price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub symbol: String,
    pub quantity: f64,
    pub price_usd: f64,
}

impl Holding {
    pub fn new(symbol: String, quantity: f64, price_usd: f64) -> Self {
        Holding {
            symbol,
            quantity,
            price_usd,
        }
    }

    pub fn value_usd(&self) -> f64 {
        self.quantity * self.price_usd
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioValuation {
    pub user_id: String,
    pub holdings: Vec<Holding>,
}

impl PortfolioValuation {
    pub fn new(user_id: &str) -> Self {
        PortfolioValuation {
            user_id: user_id.to_string(),
            holdings: Vec::new(),
        }
    }

    pub fn add_holding(&mut self, holding: Holding) {
        self.holdings.push(holding);
    }

    pub fn total_value_usd(&self) -> f64 {
        self.holdings.iter().map(|h| h.value_usd()).sum()
    }

    /// Share of the portfolio held in `symbol`, in percent
    pub fn allocation_pct(&self, symbol: &str) -> f64 {
        let total = self.total_value_usd();
        if total <= 0.0 {
            return 0.0;
        }
        self.holdings
            .iter()
            .filter(|h| h.symbol == symbol)
            .map(|h| h.value_usd())
            .sum::<f64>()
            / total
            * 100.0
    }
}
