//! API request/response types shared between the client and the directory,
//! relay, and invite services. These map directly to JSON bodies on the wire.

use serde::{Deserialize, Serialize};

use crate::envelope::Envelope;
use crate::invite::InviteDecision;

// ── Directory ────────────────────────────────────────────────────────────────

/// Answer to a public-key lookup. `public_key` is base64 SPKI DER.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicKeyDocument {
    pub user_id: String,
    pub public_key: String,
}

// ── Relay ────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct FetchHistoryResponse {
    /// Ascending by `created_at`.
    pub envelopes: Vec<Envelope>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MarkReadRequest {
    pub envelope_id: String,
}

// ── Invites ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct SendInviteRequest {
    pub receiver_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RespondInviteRequest {
    pub sender_id: String,
    pub decision: InviteDecision,
}
