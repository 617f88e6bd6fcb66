use solana_sdk::signature::{Keypair, Signer};
use thiserror::Error;
use zeroize::Zeroizing;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("Invalid keypair bytes: {0}")]
    InvalidKeypair(String),
}

/// Delegated ed25519 keypairs held by the custody module
pub struct DelegatedWallet;

impl DelegatedWallet {
    /// Fresh random keypair
    pub fn generate() -> Keypair {
        Keypair::new()
    }

    /// 64-byte secret+public encoding, wiped on drop
    pub fn secret_bytes(keypair: &Keypair) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(keypair.to_bytes().to_vec())
    }

    /// Rebuild a keypair and check it matches the recorded public key
    pub fn restore(bytes: &[u8], expected_public_key: &str) -> Result<Keypair, WalletError> {
        let keypair =
            Keypair::try_from(bytes).map_err(|e| WalletError::InvalidKeypair(e.to_string()))?;
        if keypair.pubkey().to_string() != expected_public_key {
            return Err(WalletError::InvalidKeypair("public key mismatch".into()));
        }
        Ok(keypair)
    }
}
