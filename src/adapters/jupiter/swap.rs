//! Jupiter Swap Types

use base64::Engine;
use serde::{Deserialize, Serialize};
use solana_sdk::transaction::VersionedTransaction;

/// Request parameters for building a swap transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRequest {
    /// Delegated authority public key that signs and pays
    pub user_public_key: String,
    /// The full quote response from /quote
    pub quote_response: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prioritization_fee_lamports: Option<u64>,
    pub dynamic_compute_unit_limit: bool,
    pub wrap_and_unwrap_sol: bool,
}

impl SwapRequest {
    pub fn new(user_public_key: String, quote_response: serde_json::Value) -> Self {
        Self {
            user_public_key,
            quote_response,
            prioritization_fee_lamports: None,
            dynamic_compute_unit_limit: true,
            wrap_and_unwrap_sol: true,
        }
    }

    pub fn with_priority_fee(mut self, lamports: u64) -> Self {
        self.prioritization_fee_lamports = Some(lamports);
        self
    }
}

/// Response from Jupiter swap API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapResponse {
    /// Base64 encoded unsigned versioned transaction
    pub swap_transaction: String,
    pub last_valid_block_height: u64,
    #[serde(default)]
    pub prioritization_fee_lamports: u64,
}

impl SwapResponse {
    /// Decode the unsigned transaction
    pub fn transaction(&self) -> Result<VersionedTransaction, String> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&self.swap_transaction)
            .map_err(|e| format!("invalid base64 transaction: {}", e))?;
        bincode::deserialize(&bytes).map_err(|e| format!("invalid transaction bytes: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::hash::Hash;
    use solana_sdk::message::{Message, VersionedMessage};
    use solana_sdk::pubkey::Pubkey;
    use solana_sdk::signature::Signature;

    #[test]
    fn test_swap_request_serialization() {
        let request = SwapRequest::new("pubkey".into(), serde_json::json!({"inAmount": "1"}))
            .with_priority_fee(5000);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["userPublicKey"], "pubkey");
        assert_eq!(json["prioritizationFeeLamports"], 5000);
        assert_eq!(json["wrapAndUnwrapSol"], true);
    }

    #[test]
    fn test_transaction_decoding() {
        let payer = Pubkey::new_unique();
        let message = Message::new_with_blockhash(&[], Some(&payer), &Hash::default());
        let tx = VersionedTransaction {
            signatures: vec![Signature::default()],
            message: VersionedMessage::Legacy(message),
        };
        let encoded = base64::engine::general_purpose::STANDARD.encode(bincode::serialize(&tx).unwrap());

        let response = SwapResponse {
            swap_transaction: encoded,
            last_valid_block_height: 100,
            prioritization_fee_lamports: 0,
        };
        let decoded = response.transaction().unwrap();
        assert_eq!(decoded.message.static_account_keys()[0], payer);

        let garbage = SwapResponse {
            swap_transaction: "!!!".into(),
            ..response
        };
        assert!(garbage.transaction().is_err());
    }
}
