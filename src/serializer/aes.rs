//! AES-256-GCM encryption stage using `aes-gcm`

use std::fmt;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use anyhow::{Result, anyhow, bail};

use crate::traits::TransformStage;

/// AES-256-GCM key size in bytes
pub const KEY_SIZE: usize = 32;

/// AES-GCM nonce size in bytes
const NONCE_SIZE: usize = 12;

/// Authenticated encryption of cached payloads
///
/// Output layout is `nonce || ciphertext`, with a fresh random nonce per
/// write. Tampered or truncated payloads fail to decode.
#[derive(Clone)]
pub struct AesGcmStage {
    cipher: Aes256Gcm,
}

impl AesGcmStage {
    /// # Errors
    ///
    /// Returns an error if `key` is not 32 bytes long.
    pub fn new(key: &[u8]) -> Result<Self> {
        if key.len() != KEY_SIZE {
            bail!(
                "invalid AES-256-GCM key size: expected {KEY_SIZE} bytes, got {}",
                key.len()
            );
        }
        let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| anyhow!("invalid key: {e}"))?;
        Ok(Self { cipher })
    }

    /// Generate a random key suitable for [`AesGcmStage::new`].
    pub fn generate_key() -> Vec<u8> {
        Aes256Gcm::generate_key(&mut OsRng).to_vec()
    }
}

impl fmt::Debug for AesGcmStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AesGcmStage").finish_non_exhaustive()
    }
}

impl TransformStage for AesGcmStage {
    fn encode(&self, bytes: Vec<u8>) -> Result<Vec<u8>> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, bytes.as_slice())
            .map_err(|e| anyhow!("encryption failed: {e}"))?;

        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn decode(&self, bytes: Vec<u8>) -> Result<Vec<u8>> {
        if bytes.len() < NONCE_SIZE {
            bail!("encrypted payload too short ({} bytes)", bytes.len());
        }
        let (nonce, ciphertext) = bytes.split_at(NONCE_SIZE);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| anyhow!("decryption failed: {e}"))
    }

    fn name(&self) -> &'static str {
        "aes-256-gcm"
    }
}
