use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer, SignerError};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    Limited,
    Full,
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionLevel::Limited => write!(f, "limited"),
            PermissionLevel::Full => write!(f, "full"),
        }
    }
}

/// Delegated signing authority of one user.
///
/// `encrypted_secret` is `base64(nonce):base64(ciphertext)`; the plaintext
/// never leaves the custody module.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingAuthority {
    pub user_id: String,
    pub public_key: String,
    pub encrypted_secret: String,
    pub permission_level: PermissionLevel,
    pub created_at: DateTime<Utc>,
}

impl TradingAuthority {
    /// Public key decodes to a 32-byte ed25519 key
    pub fn has_valid_public_key(&self) -> bool {
        bs58::decode(&self.public_key)
            .into_vec()
            .map(|bytes| bytes.len() == 32)
            .unwrap_or(false)
    }
}

// Ciphertext is kept out of logs.
impl fmt::Debug for TradingAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TradingAuthority")
            .field("user_id", &self.user_id)
            .field("public_key", &self.public_key)
            .field("permission_level", &self.permission_level)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Public view of an authority returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorityInfo {
    pub user_id: String,
    pub public_key: String,
    pub permission_level: PermissionLevel,
    pub created_at: DateTime<Utc>,
}

impl From<&TradingAuthority> for AuthorityInfo {
    fn from(authority: &TradingAuthority) -> Self {
        Self {
            user_id: authority.user_id.clone(),
            public_key: authority.public_key.clone(),
            permission_level: authority.permission_level,
            created_at: authority.created_at,
        }
    }
}

/// Decrypted delegated keypair, scoped to a single signing operation.
///
/// Only the custody module can build one; it never serializes or prints the
/// secret half.
pub struct AuthoritySigner {
    user_id: String,
    keypair: Keypair,
}

impl AuthoritySigner {
    pub(crate) fn new(user_id: &str, keypair: Keypair) -> Self {
        Self {
            user_id: user_id.to_string(),
            keypair,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

impl Signer for AuthoritySigner {
    fn try_pubkey(&self) -> Result<Pubkey, SignerError> {
        self.keypair.try_pubkey()
    }

    fn try_sign_message(&self, message: &[u8]) -> Result<Signature, SignerError> {
        self.keypair.try_sign_message(message)
    }

    fn is_interactive(&self) -> bool {
        false
    }
}

impl fmt::Debug for AuthoritySigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthoritySigner")
            .field("user_id", &self.user_id)
            .field("pubkey", &self.keypair.pubkey())
            .finish_non_exhaustive()
    }
}
