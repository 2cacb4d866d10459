//! Encrypted message envelope — what the relay server sees.
//!
//! The server is a dumb relay: it stores and routes envelopes but can read
//! none of the content. It sees:
//!   - sender_id / receiver_id (needed for routing)
//!   - ciphertext + iv          (opaque)
//!   - both wrapped keys        (opaque — decryptable only by the endpoints)
//!   - attachment               (opaque, optional)
//!   - created_at               (assigned by the server on submit)
//!
//! An envelope is immutable once created. The only thing that ever changes
//! is the server-side `read` flag; content fields are never touched.
//!
//! Invariant: `key_for_sender` and `key_for_receiver` wrap the SAME
//! 32-byte content key — one under each participant's public key, so the
//! sender can re-read their own sent history. The two fields are kept
//! strictly separate; the reader's role decides which one to unwrap.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Client-composed envelope fields, submitted to the relay.
/// The relay assigns `id` and `created_at` and returns a full [`Envelope`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeDraft {
    pub sender_id: String,
    pub receiver_id: String,
    /// AES-256-GCM ciphertext (ct + tag), base64.
    pub ciphertext: String,
    /// 12-byte GCM IV, base64.
    pub iv: String,
    /// Content key wrapped under the sender's RSA public key, base64.
    pub key_for_sender: String,
    /// The same content key wrapped under the receiver's public key, base64.
    pub key_for_receiver: String,
    /// Opaque attachment payload, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<String>,
}

/// A stored envelope as returned by the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Server-assigned id, used for ack/dedup. No semantic meaning.
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub ciphertext: String,
    pub iv: String,
    pub key_for_sender: String,
    pub key_for_receiver: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<String>,
    /// Assigned by the server when the envelope is stored.
    pub created_at: DateTime<Utc>,
    /// Receiver-side read marker. Never affects content.
    #[serde(default)]
    pub read: bool,
}

impl Envelope {
    /// Materialise a stored envelope from a submitted draft.
    /// Used by relay implementations when assigning id and timestamp.
    pub fn from_draft(draft: EnvelopeDraft, id: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            sender_id: draft.sender_id,
            receiver_id: draft.receiver_id,
            ciphertext: draft.ciphertext,
            iv: draft.iv,
            key_for_sender: draft.key_for_sender,
            key_for_receiver: draft.key_for_receiver,
            attachment: draft.attachment,
            created_at,
            read: false,
        }
    }

    /// True if this envelope belongs to the conversation between `a` and `b`.
    pub fn is_between(&self, a: &str, b: &str) -> bool {
        (self.sender_id == a && self.receiver_id == b)
            || (self.sender_id == b && self.receiver_id == a)
    }
}
