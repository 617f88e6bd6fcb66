//! Authenticated encryption of delegated key material
//!
//! ChaCha20-Poly1305 keyed by SHA-256 of the server secret and a domain tag.
//! Each record uses a fresh random 12-byte nonce and binds the user id as
//! associated data, so a ciphertext cannot be replayed under another user.
//! Encoded form: `base64(nonce):base64(ciphertext)`.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use super::authority_manager::CustodyError;

/// Shortest accepted server secret, in bytes
pub const MIN_SECRET_LEN: usize = 32;

const KEY_DOMAIN: &[u8] = b"tradedesk/custody/v1";
const NONCE_LEN: usize = 12;

pub struct CustodyCipher {
    key: Zeroizing<[u8; 32]>,
}

impl CustodyCipher {
    pub fn new(server_secret: &str) -> Result<Self, CustodyError> {
        if server_secret.len() < MIN_SECRET_LEN {
            return Err(CustodyError::InvalidSecret(format!(
                "custody secret must be at least {} bytes",
                MIN_SECRET_LEN
            )));
        }

        let mut hasher = Sha256::new();
        hasher.update(server_secret.as_bytes());
        hasher.update(KEY_DOMAIN);
        let mut key = Zeroizing::new([0u8; 32]);
        key.copy_from_slice(&hasher.finalize());
        Ok(Self { key })
    }

    fn aead(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(Key::from_slice(self.key.as_ref()))
    }

    pub fn encrypt(&self, user_id: &str, plaintext: &[u8]) -> Result<String, CustodyError> {
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = self
            .aead()
            .encrypt(
                &nonce,
                Payload {
                    msg: plaintext,
                    aad: user_id.as_bytes(),
                },
            )
            .map_err(|_| CustodyError::Encryption("aead encrypt".into()))?;

        Ok(format!("{}:{}", B64.encode(nonce), B64.encode(ciphertext)))
    }

    pub fn decrypt(&self, user_id: &str, encoded: &str) -> Result<Zeroizing<Vec<u8>>, CustodyError> {
        let (nonce_b64, ct_b64) = encoded
            .split_once(':')
            .ok_or_else(|| CustodyError::Decryption("malformed ciphertext".into()))?;
        let nonce = B64
            .decode(nonce_b64)
            .map_err(|_| CustodyError::Decryption("malformed nonce".into()))?;
        if nonce.len() != NONCE_LEN {
            return Err(CustodyError::Decryption("bad nonce length".into()));
        }
        let ciphertext = B64
            .decode(ct_b64)
            .map_err(|_| CustodyError::Decryption("malformed ciphertext".into()))?;

        self.aead()
            .decrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: &ciphertext,
                    aad: user_id.as_bytes(),
                },
            )
            .map(Zeroizing::new)
            .map_err(|_| CustodyError::Decryption("authentication failed".into()))
    }
}

impl std::fmt::Debug for CustodyCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CustodyCipher")
    }
}
