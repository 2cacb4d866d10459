//! Collaborator traits — the black-box services a session talks to.
//!
//! The hosting application decides how these reach a server (HTTP,
//! sockets, in-process). The session only sees the traits plus a tokio
//! mpsc channel of [`ChannelEvent`]s; switching peers simply stops
//! consuming events for the old one, and dropping a session drops its
//! receiver.

use async_trait::async_trait;

use sb_proto::api::PublicKeyDocument;
use sb_proto::envelope::{Envelope, EnvelopeDraft};
use sb_proto::invite::{InviteDecision, InviteRecord, InviteStatusView};

use crate::invite::InviteError;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("User or public key not found: {0}")]
    NotFound(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

/// Resolves a user id to their current public key (base64 SPKI DER).
#[async_trait]
pub trait Directory: Send + Sync {
    async fn get_public_key(&self, user_id: &str) -> Result<PublicKeyDocument, TransportError>;
}

/// Stores and routes opaque envelopes. The relay assigns envelope ids and
/// timestamps; content is never inspectable.
#[async_trait]
pub trait Relay: Send + Sync {
    /// Persist a composed envelope and deliver it to the receiver's live
    /// channel if one is connected. Returns the stored envelope with its
    /// server-assigned id and timestamp.
    async fn submit(&self, draft: EnvelopeDraft) -> Result<Envelope, TransportError>;

    /// All envelopes between `requester` and `peer`, ascending by creation
    /// time.
    async fn fetch_history(&self, requester: &str, peer: &str)
        -> Result<Vec<Envelope>, TransportError>;

    /// Mark an envelope read by its receiver. Never touches content.
    async fn mark_read(&self, requester: &str, envelope_id: &str) -> Result<(), TransportError>;
}

/// Carries invite handshake actions to wherever the ledger lives.
#[async_trait]
pub trait InviteTransport: Send + Sync {
    async fn send_invite(&self, sender_id: &str, receiver_id: &str)
        -> Result<InviteRecord, InviteError>;

    async fn invite_status(&self, a: &str, b: &str) -> Result<InviteStatusView, InviteError>;

    async fn respond(
        &self,
        receiver_id: &str,
        sender_id: &str,
        decision: InviteDecision,
    ) -> Result<InviteRecord, InviteError>;
}

/// Live push events delivered to a connected user.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// A new envelope addressed to (or authored by) the connected user.
    NewMessage(Envelope),
    /// `peer_id` accepted an invite this user sent — message exchange is
    /// unlocked without a manual refresh.
    InviteAccepted { peer_id: String },
}
