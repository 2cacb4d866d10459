//! sb_crypto — Sealbox cryptographic primitives
//!
//! # Design principles
//! - NO custom crypto; all primitives come from audited Rust crates.
//! - Secret material (private keys, content keys) is zeroized on drop.
//! - Public APIs return opaque newtypes to prevent accidental misuse:
//!   a [`aead::ContentKey`] generates its own IV on every encrypt call,
//!   so a key/IV pair can never be reused by a caller.
//!
//! # Module layout
//! - `keys`  — long-term RSA-2048 keypair per user: generate, SPKI/PKCS#8
//!             export and import, OAEP wrap/unwrap of content keys
//! - `aead`  — one-time AES-256-GCM content encryption
//! - `error` — unified error type

pub mod aead;
pub mod error;
pub mod keys;

pub use aead::ContentKey;
pub use error::CryptoError;
pub use keys::{KeyPair, PrivateKey, PublicKey};
