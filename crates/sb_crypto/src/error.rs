use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Key import failed: {0}")]
    KeyImport(String),

    #[error("Key unwrap failed (ciphertext corrupt or wrong private key)")]
    Unwrap,

    #[error("Encryption failed")]
    Encrypt,

    #[error("Content decryption failed (authentication tag mismatch or truncated IV)")]
    Decrypt,

    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),
}
