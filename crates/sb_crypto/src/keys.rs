//! Long-term per-user keypair
//!
//! Each user owns exactly one RSA-2048 keypair for the lifetime of the
//! account. The public half travels as SPKI DER (base64 on the wire) and is
//! cached freely by peers; the private half is exported as PKCS#8 DER and
//! never leaves the local custody store.
//!
//! Wrap/unwrap is RSA-OAEP with SHA-256 applied to a 32-byte content key,
//! never to message content itself. A failed unwrap is the primary signal
//! that a message is unreadable for the caller.
//!
//! There is no rotation protocol: a keypair generated at enrolment is the
//! only one the account will ever have. Compromise of the private key
//! exposes all past traffic.

use base64::{engine::general_purpose::STANDARD, Engine};
use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::aead::ContentKey;
use crate::error::CryptoError;

/// RSA modulus size in bits.
const KEY_BITS: usize = 2048;

// ── Public key ───────────────────────────────────────────────────────────────

/// A peer's (or our own) RSA public key. Freely shareable.
#[derive(Debug, Clone, PartialEq)]
pub struct PublicKey(RsaPublicKey);

impl PublicKey {
    /// Parse from SPKI DER bytes. Structure is validated before the key is
    /// handed to any crypto operation.
    pub fn from_der(der: &[u8]) -> Result<Self, CryptoError> {
        if der.is_empty() {
            return Err(CryptoError::KeyImport("empty public key".into()));
        }
        RsaPublicKey::from_public_key_der(der)
            .map(Self)
            .map_err(|e| CryptoError::KeyImport(e.to_string()))
    }

    /// Parse from the base64 text form used on the wire.
    /// Whitespace is stripped first; anything else malformed is rejected.
    pub fn from_b64(b64: &str) -> Result<Self, CryptoError> {
        let cleaned: String = b64.split_whitespace().collect();
        if cleaned.is_empty() {
            return Err(CryptoError::KeyImport("empty public key".into()));
        }
        let der = STANDARD
            .decode(cleaned.as_bytes())
            .map_err(|e| CryptoError::KeyImport(format!("bad base64: {e}")))?;
        Self::from_der(&der)
    }

    /// SPKI DER encoding.
    pub fn to_der(&self) -> Result<Vec<u8>, CryptoError> {
        Ok(self
            .0
            .to_public_key_der()
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?
            .as_bytes()
            .to_vec())
    }

    /// Base64 wire form of the SPKI DER encoding.
    pub fn to_b64(&self) -> Result<String, CryptoError> {
        Ok(STANDARD.encode(self.to_der()?))
    }

    /// Encrypt a one-time content key under this public key (RSA-OAEP/SHA-256).
    pub fn wrap(&self, key: &ContentKey) -> Result<Vec<u8>, CryptoError> {
        self.0
            .encrypt(&mut OsRng, Oaep::new::<Sha256>(), key.as_bytes())
            .map_err(|_| CryptoError::Encrypt)
    }

    /// Human-readable fingerprint: SHA-256 of the SPKI DER, truncated to
    /// 20 bytes, hex-encoded in groups of 4 for manual comparison.
    pub fn fingerprint(&self) -> Result<String, CryptoError> {
        let digest = Sha256::digest(self.to_der()?);
        let hex = hex::encode(&digest[..20]);
        Ok(hex
            .as_bytes()
            .chunks(4)
            .map(|c| std::str::from_utf8(c).unwrap_or_default())
            .collect::<Vec<_>>()
            .join(" "))
    }
}

// ── Private key ──────────────────────────────────────────────────────────────

/// The locally-held RSA private key. Never serialised except through
/// [`PrivateKey::to_pkcs8_der`] on its way into the custody store.
#[derive(Clone)]
pub struct PrivateKey(RsaPrivateKey);

impl PrivateKey {
    /// Parse from PKCS#8 DER bytes (the custody store format).
    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self, CryptoError> {
        if der.is_empty() {
            return Err(CryptoError::KeyImport("empty private key".into()));
        }
        RsaPrivateKey::from_pkcs8_der(der)
            .map(Self)
            .map_err(|e| CryptoError::KeyImport(e.to_string()))
    }

    /// Parse from base64 text (used when a key is restored from a backup blob).
    pub fn from_b64(b64: &str) -> Result<Self, CryptoError> {
        let cleaned: String = b64.split_whitespace().collect();
        if cleaned.is_empty() {
            return Err(CryptoError::KeyImport("empty private key".into()));
        }
        let der = STANDARD
            .decode(cleaned.as_bytes())
            .map_err(|e| CryptoError::KeyImport(format!("bad base64: {e}")))?;
        Self::from_pkcs8_der(&der)
    }

    /// PKCS#8 DER encoding, zeroized when the buffer drops.
    pub fn to_pkcs8_der(&self) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        Ok(Zeroizing::new(
            self.0
                .to_pkcs8_der()
                .map_err(|e| CryptoError::InvalidKey(e.to_string()))?
                .as_bytes()
                .to_vec(),
        ))
    }

    /// The matching public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(RsaPublicKey::from(&self.0))
    }

    /// Decrypt a wrapped content key. Fails closed on any corruption or
    /// key mismatch; the plaintext key is validated to be exactly 32 bytes.
    pub fn unwrap(&self, wrapped: &[u8]) -> Result<ContentKey, CryptoError> {
        let plaintext = Zeroizing::new(
            self.0
                .decrypt(Oaep::new::<Sha256>(), wrapped)
                .map_err(|_| CryptoError::Unwrap)?,
        );
        ContentKey::from_bytes(&plaintext).map_err(|_| CryptoError::Unwrap)
    }
}

// ── Keypair ──────────────────────────────────────────────────────────────────

/// A freshly generated identity keypair.
pub struct KeyPair {
    pub public: PublicKey,
    pub private: PrivateKey,
}

impl KeyPair {
    /// Generate a new RSA-2048 keypair from the OS entropy source.
    pub fn generate() -> Result<Self, CryptoError> {
        let private = RsaPrivateKey::new(&mut OsRng, KEY_BITS)
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
        let public = PublicKey(RsaPublicKey::from(&private));
        Ok(Self {
            public,
            private: PrivateKey(private),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_key_der_roundtrip() {
        let pair = KeyPair::generate().unwrap();
        let der = pair.public.to_der().unwrap();
        let restored = PublicKey::from_der(&der).unwrap();
        assert_eq!(pair.public, restored);
    }

    #[test]
    fn public_key_b64_roundtrip_tolerates_whitespace() {
        let pair = KeyPair::generate().unwrap();
        let b64 = pair.public.to_b64().unwrap();
        let with_breaks = format!("{}\n  {}", &b64[..10], &b64[10..]);
        let restored = PublicKey::from_b64(&with_breaks).unwrap();
        assert_eq!(pair.public, restored);
    }

    #[test]
    fn private_key_pkcs8_roundtrip() {
        let pair = KeyPair::generate().unwrap();
        let der = pair.private.to_pkcs8_der().unwrap();
        let restored = PrivateKey::from_pkcs8_der(&der).unwrap();
        assert_eq!(pair.public, restored.public_key());
    }

    #[test]
    fn import_rejects_garbage() {
        assert!(matches!(
            PublicKey::from_b64("not!!valid@@base64"),
            Err(CryptoError::KeyImport(_))
        ));
        assert!(matches!(
            PublicKey::from_b64(""),
            Err(CryptoError::KeyImport(_))
        ));
        // Valid base64, invalid DER
        assert!(matches!(
            PublicKey::from_b64("AAAA"),
            Err(CryptoError::KeyImport(_))
        ));
        assert!(matches!(
            PrivateKey::from_pkcs8_der(&[0x30, 0x01]),
            Err(CryptoError::KeyImport(_))
        ));
    }

    #[test]
    fn import_rejects_truncated_der() {
        let pair = KeyPair::generate().unwrap();
        let der = pair.public.to_der().unwrap();
        assert!(matches!(
            PublicKey::from_der(&der[..der.len() / 2]),
            Err(CryptoError::KeyImport(_))
        ));
    }

    #[test]
    fn wrap_unwrap_roundtrip() {
        let pair = KeyPair::generate().unwrap();
        let key = ContentKey::generate();
        let wrapped = pair.public.wrap(&key).unwrap();
        let unwrapped = pair.private.unwrap(&wrapped).unwrap();
        assert_eq!(key.as_bytes(), unwrapped.as_bytes());
    }

    #[test]
    fn unwrap_with_wrong_key_fails() {
        let alice = KeyPair::generate().unwrap();
        let bob = KeyPair::generate().unwrap();
        let key = ContentKey::generate();
        let wrapped = alice.public.wrap(&key).unwrap();
        assert!(matches!(bob.private.unwrap(&wrapped), Err(CryptoError::Unwrap)));
    }

    #[test]
    fn unwrap_of_tampered_ciphertext_fails() {
        let pair = KeyPair::generate().unwrap();
        let key = ContentKey::generate();
        let mut wrapped = pair.public.wrap(&key).unwrap();
        wrapped[0] ^= 0x01;
        assert!(matches!(pair.private.unwrap(&wrapped), Err(CryptoError::Unwrap)));
    }

    #[test]
    fn fingerprint_is_stable_and_grouped() {
        let pair = KeyPair::generate().unwrap();
        let fp1 = pair.public.fingerprint().unwrap();
        let fp2 = pair.public.fingerprint().unwrap();
        assert_eq!(fp1, fp2);
        assert_eq!(fp1.split(' ').count(), 10);
    }
}
