//! One-time content encryption
//!
//! AES-256-GCM. Key size: 32 bytes. IV: 12 bytes (random). Tag: 16 bytes,
//! appended to the ciphertext.
//!
//! A [`ContentKey`] is generated fresh for every message and the IV is
//! drawn inside [`ContentKey::encrypt`] on each call — callers can never
//! supply an IV, so key/IV reuse is impossible by construction. The IV and
//! ciphertext travel as separate envelope fields.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use zeroize::{Zeroizing, ZeroizeOnDrop};

use crate::error::CryptoError;

/// AES-GCM IV length in bytes.
pub const IV_LEN: usize = 12;

/// A 256-bit symmetric key used for exactly one envelope.
/// Zeroized on drop.
#[derive(ZeroizeOnDrop)]
pub struct ContentKey([u8; 32]);

impl ContentKey {
    /// Draw a fresh key from the OS entropy source.
    pub fn generate() -> Self {
        let key = Aes256Gcm::generate_key(&mut OsRng);
        Self(key.into())
    }

    /// Rebuild a key from raw bytes (after unwrap). Must be exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKey(format!("content key must be 32 bytes, got {}", bytes.len())))?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Encrypt `plaintext`, returning `(iv, ciphertext + tag)`.
    /// A fresh random IV is generated on every call.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<(Vec<u8>, Vec<u8>), CryptoError> {
        let cipher = Aes256Gcm::new_from_slice(&self.0).map_err(|_| CryptoError::Encrypt)?;
        let iv = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&iv, plaintext)
            .map_err(|_| CryptoError::Encrypt)?;
        Ok((iv.to_vec(), ciphertext))
    }

    /// Decrypt `(iv, ciphertext + tag)`. Fails closed on a truncated IV,
    /// a bad tag, or any ciphertext corruption.
    pub fn decrypt(&self, iv: &[u8], ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        if iv.len() != IV_LEN {
            return Err(CryptoError::Decrypt);
        }
        let cipher = Aes256Gcm::new_from_slice(&self.0).map_err(|_| CryptoError::Decrypt)?;
        let plaintext = cipher
            .decrypt(Nonce::from_slice(iv), ciphertext)
            .map_err(|_| CryptoError::Decrypt)?;
        Ok(Zeroizing::new(plaintext))
    }
}
