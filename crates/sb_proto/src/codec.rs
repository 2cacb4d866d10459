//! Seal/open — the hybrid envelope codec.
//!
//! `seal` generates a one-time AES-256-GCM content key, encrypts the
//! plaintext under it (with a fresh IV drawn in the same call), then wraps
//! the key twice: once under the receiver's RSA public key and once under
//! the sender's, so both participants can later read the message from the
//! same stored record.
//!
//! `open` is the inverse: the caller's [`Role`] selects which wrapped-key
//! field to unwrap. Every failure — malformed base64, failed unwrap, GCM
//! tag mismatch, truncated IV — surfaces as a recoverable per-message
//! error. A conversation fetch never aborts because one envelope is bad.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

use sb_crypto::{ContentKey, CryptoError, PrivateKey, PublicKey};

use crate::envelope::Envelope;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// A binary field was empty or not valid base64. Rejected before the
    /// bytes reach any crypto primitive.
    #[error("envelope field '{0}' is empty or malformed base64")]
    MalformedField(&'static str),

    #[error("sealing failed: {0}")]
    Sealing(#[source] CryptoError),

    /// The per-message, recoverable failure class: the message shell is
    /// still renderable, only the content is unreadable.
    #[error("message could not be decrypted: {0}")]
    Decryption(#[source] CryptoError),
}

/// Whether the reader of an envelope authored it or received it.
/// Selects which wrapped-key field `open` will unwrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Sender,
    Receiver,
}

impl Role {
    /// Derive the reader's role by comparing the envelope's sender to self.
    pub fn of(envelope: &Envelope, self_id: &str) -> Role {
        if envelope.sender_id == self_id {
            Role::Sender
        } else {
            Role::Receiver
        }
    }
}

/// The crypto fields produced by one `seal` call, base64-encoded for the
/// wire. The caller combines these with sender/receiver ids into an
/// [`crate::envelope::EnvelopeDraft`].
#[derive(Debug, Clone)]
pub struct SealedFields {
    pub ciphertext: String,
    pub iv: String,
    pub key_for_sender: String,
    pub key_for_receiver: String,
}

/// Encrypt `plaintext` for both participants.
///
/// The content key and IV are both generated inside this call; neither can
/// be supplied (or reused) by a caller.
pub fn seal(
    plaintext: &str,
    sender_pub: &PublicKey,
    receiver_pub: &PublicKey,
) -> Result<SealedFields, CodecError> {
    let key = ContentKey::generate();
    let (iv, ciphertext) = key
        .encrypt(plaintext.as_bytes())
        .map_err(CodecError::Sealing)?;
    let key_for_receiver = receiver_pub.wrap(&key).map_err(CodecError::Sealing)?;
    let key_for_sender = sender_pub.wrap(&key).map_err(CodecError::Sealing)?;

    Ok(SealedFields {
        ciphertext: STANDARD.encode(ciphertext),
        iv: STANDARD.encode(iv),
        key_for_sender: STANDARD.encode(key_for_sender),
        key_for_receiver: STANDARD.encode(key_for_receiver),
    })
}

/// Decrypt an envelope for the given role.
pub fn open(
    envelope: &Envelope,
    private_key: &PrivateKey,
    role: Role,
) -> Result<String, CodecError> {
    let wrapped_b64 = match role {
        Role::Sender => &envelope.key_for_sender,
        Role::Receiver => &envelope.key_for_receiver,
    };
    let wrapped = decode_field(
        match role {
            Role::Sender => "key_for_sender",
            Role::Receiver => "key_for_receiver",
        },
        wrapped_b64,
    )?;
    let iv = decode_field("iv", &envelope.iv)?;
    let ciphertext = decode_field("ciphertext", &envelope.ciphertext)?;

    let key = private_key.unwrap(&wrapped).map_err(CodecError::Decryption)?;
    let plaintext = key.decrypt(&iv, &ciphertext).map_err(CodecError::Decryption)?;

    String::from_utf8(plaintext.to_vec())
        .map_err(|_| CodecError::Decryption(CryptoError::Decrypt))
}

/// Base64-decode one envelope field, rejecting empty or malformed input
/// before it reaches the crypto layer.
fn decode_field(name: &'static str, b64: &str) -> Result<Vec<u8>, CodecError> {
    if b64.is_empty() {
        return Err(CodecError::MalformedField(name));
    }
    STANDARD
        .decode(b64.as_bytes())
        .map_err(|_| CodecError::MalformedField(name))
}
