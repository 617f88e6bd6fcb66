//! Trading Authority Manager
//!
//! Custody of one delegated signing keypair per user. The secret is
//! generated here, encrypted before it reaches the store and decrypted only
//! into a short-lived [`AuthoritySigner`]. The cache holds the public view
//! under `authority:{user}` and never the ciphertext.

use chrono::Utc;
use solana_sdk::signature::Signer;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::custody_cipher::CustodyCipher;
use crate::adapters::solana::DelegatedWallet;
use crate::domain::authority::{AuthorityInfo, AuthoritySigner, PermissionLevel, TradingAuthority};
use crate::ports::cache::{keys, Cache};
use crate::ports::store::{Store, StoreError};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CustodyError {
    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("Persistence failed: {0}")]
    Persistence(String),

    #[error("User {0} already has a trading authority")]
    AlreadyExists(String),

    #[error("No trading authority for user {0}")]
    NotFound(String),

    #[error("Invalid custody secret: {0}")]
    InvalidSecret(String),
}

impl From<StoreError> for CustodyError {
    fn from(e: StoreError) -> Self {
        CustodyError::Persistence(e.to_string())
    }
}

/// How long the public view stays cached
pub const AUTHORITY_CACHE_TTL: Duration = Duration::from_secs(3600);

#[derive(Clone)]
pub struct TradingAuthorityManager {
    store: Arc<dyn Store>,
    cache: Arc<dyn Cache>,
    cipher: Arc<CustodyCipher>,
}

impl TradingAuthorityManager {
    pub fn new(store: Arc<dyn Store>, cache: Arc<dyn Cache>, cipher: CustodyCipher) -> Self {
        Self {
            store,
            cache,
            cipher: Arc::new(cipher),
        }
    }

    pub async fn has_delegated_authority(&self, user_id: &str) -> Result<bool, CustodyError> {
        Ok(self.get_authority(user_id).await?.is_some())
    }

    /// Public view of the user's authority; warms the cache on a store hit
    pub async fn get_authority(&self, user_id: &str) -> Result<Option<AuthorityInfo>, CustodyError> {
        let key = keys::authority(user_id);
        if let Some(info) = self.cache.get_typed::<AuthorityInfo>(&key).await {
            return Ok(Some(info));
        }

        let Some(authority) = self.store.get_authority(user_id).await? else {
            return Ok(None);
        };
        let info = AuthorityInfo::from(&authority);
        self.cache.set_typed(&key, &info, AUTHORITY_CACHE_TTL).await;
        Ok(Some(info))
    }

    /// Generate and persist a new delegated keypair. Returns its public key.
    pub async fn create_delegated_authority(
        &self,
        user_id: &str,
        permission_level: PermissionLevel,
    ) -> Result<String, CustodyError> {
        let keypair = DelegatedWallet::generate();
        let public_key = keypair.pubkey().to_string();
        let encrypted_secret = {
            let secret = DelegatedWallet::secret_bytes(&keypair);
            self.cipher.encrypt(user_id, &secret)?
        };

        let authority = TradingAuthority {
            user_id: user_id.to_string(),
            public_key: public_key.clone(),
            encrypted_secret,
            permission_level,
            created_at: Utc::now(),
        };
        let info = AuthorityInfo::from(&authority);

        match self.store.insert_authority(authority).await {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => {
                return Err(CustodyError::AlreadyExists(user_id.to_string()))
            }
            Err(e) => return Err(e.into()),
        }

        self.cache
            .set_typed(&keys::authority(user_id), &info, AUTHORITY_CACHE_TTL)
            .await;
        tracing::info!(user_id, public_key = %public_key, level = %permission_level, "Delegated authority created");
        Ok(public_key)
    }

    /// Existing authority, or a new one at `permission_level`.
    /// A concurrent creation for the same user resolves to the winner's record.
    pub async fn ensure_authority(
        &self,
        user_id: &str,
        permission_level: PermissionLevel,
    ) -> Result<AuthorityInfo, CustodyError> {
        if let Some(info) = self.get_authority(user_id).await? {
            return Ok(info);
        }
        match self.create_delegated_authority(user_id, permission_level).await {
            Ok(_) | Err(CustodyError::AlreadyExists(_)) => self
                .get_authority(user_id)
                .await?
                .ok_or_else(|| CustodyError::NotFound(user_id.to_string())),
            Err(e) => Err(e),
        }
    }

    /// Returns whether an authority was removed
    pub async fn revoke_authority(&self, user_id: &str) -> Result<bool, CustodyError> {
        let removed = self.store.delete_authority(user_id).await?;
        self.cache.delete(&keys::authority(user_id)).await;
        if removed {
            tracing::info!(user_id, "Delegated authority revoked");
        }
        Ok(removed)
    }

    /// Decrypt the user's keypair for one signing operation
    pub async fn signer_for(&self, user_id: &str) -> Result<AuthoritySigner, CustodyError> {
        let authority = self
            .store
            .get_authority(user_id)
            .await?
            .ok_or_else(|| CustodyError::NotFound(user_id.to_string()))?;

        let secret = self.cipher.decrypt(user_id, &authority.encrypted_secret)?;
        let keypair = DelegatedWallet::restore(&secret, &authority.public_key)
            .map_err(|e| CustodyError::Decryption(e.to_string()))?;
        Ok(AuthoritySigner::new(user_id, keypair))
    }
}
