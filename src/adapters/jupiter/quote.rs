//! Jupiter Quote Types
//!
//! Request and response structures for the Jupiter quote API.

use serde::{Deserialize, Serialize};

/// Request parameters for getting a swap quote
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub input_mint: String,
    pub output_mint: String,
    /// Amount in base units of the input mint
    pub amount: u64,
    /// Slippage tolerance in basis points (1 = 0.01%)
    pub slippage_bps: u16,
}

impl QuoteRequest {
    pub fn new(input_mint: String, output_mint: String, amount: u64, slippage_bps: u16) -> Self {
        Self {
            input_mint,
            output_mint,
            amount,
            slippage_bps,
        }
    }
}

/// Response from Jupiter quote API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    pub input_mint: String,
    pub output_mint: String,
    pub in_amount: String,
    pub out_amount: String,
    /// Minimum output after slippage
    pub other_amount_threshold: String,
    pub slippage_bps: u16,
    #[serde(default)]
    pub price_impact_pct: String,
    /// Route and any fields added by the API; passed back verbatim to /swap
    #[serde(flatten)]
    pub extra: std::collections::HashMap<String, serde_json::Value>,
}

impl QuoteResponse {
    pub fn input_amount(&self) -> u64 {
        self.in_amount.parse().unwrap_or(0)
    }

    pub fn output_amount(&self) -> u64 {
        self.out_amount.parse().unwrap_or(0)
    }

    pub fn min_output_amount(&self) -> u64 {
        self.other_amount_threshold.parse().unwrap_or(0)
    }

    pub fn price_impact(&self) -> f64 {
        self.price_impact_pct.parse().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_response_parsing() {
        let json = r#"{
            "inputMint": "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
            "outputMint": "So11111111111111111111111111111111111111112",
            "inAmount": "63000000",
            "outAmount": "420000000",
            "otherAmountThreshold": "417900000",
            "swapMode": "ExactIn",
            "slippageBps": 50,
            "priceImpactPct": "0.01",
            "routePlan": [{"swapInfo": {"label": "Raydium"}, "percent": 100}]
        }"#;

        let quote: QuoteResponse = serde_json::from_str(json).unwrap();
        assert_eq!(quote.input_amount(), 63_000_000);
        assert_eq!(quote.output_amount(), 420_000_000);
        assert_eq!(quote.min_output_amount(), 417_900_000);
        assert!((quote.price_impact() - 0.01).abs() < 1e-9);

        // Unknown fields survive the round trip to /swap
        let value = serde_json::to_value(&quote).unwrap();
        assert!(value.get("routePlan").is_some());
        assert_eq!(value["swapMode"], "ExactIn");
    }
}
