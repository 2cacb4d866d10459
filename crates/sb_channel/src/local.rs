//! In-process reference backend.
//!
//! Implements all three collaborator traits against in-memory state: a
//! public-key table, the invite ledger, and an envelope log with per-user
//! live channels. This is what the integration tests (and any
//! single-process deployment) run both ends of a conversation against —
//! it performs the exact server-side duties the client traits assume:
//! assigning envelope ids/timestamps on submit, routing `NewMessage` to
//! the receiver only, and pushing `InviteAccepted` to the original
//! initiator when the receiver accepts.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use sb_proto::api::PublicKeyDocument;
use sb_proto::envelope::{Envelope, EnvelopeDraft};
use sb_proto::invite::{InviteDecision, InviteRecord, InviteState, InviteStatusView};

use crate::invite::{InviteError, InviteLedger};
use crate::transport::{ChannelEvent, Directory, InviteTransport, Relay, TransportError};

const EVENT_BUFFER: usize = 64;

#[derive(Default)]
struct Inner {
    keys: HashMap<String, String>,
    invites: InviteLedger,
    envelopes: Vec<Envelope>,
    listeners: HashMap<String, mpsc::Sender<ChannelEvent>>,
}

/// Shared in-memory directory + relay + invite service.
#[derive(Default)]
pub struct LocalNetwork {
    inner: Mutex<Inner>,
}

impl LocalNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a user's public key (base64 SPKI DER), as registration
    /// would on a real directory.
    pub async fn register_user(&self, user_id: &str, public_key_b64: &str) {
        let mut inner = self.inner.lock().await;
        inner
            .keys
            .insert(user_id.to_string(), public_key_b64.to_string());
    }

    /// Attach a live event channel for `user_id`. Replaces any previous
    /// connection; dropping the receiver disconnects.
    pub async fn connect(&self, user_id: &str) -> mpsc::Receiver<ChannelEvent> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let mut inner = self.inner.lock().await;
        inner.listeners.insert(user_id.to_string(), tx);
        rx
    }
}

impl Inner {
    /// Push is lossy on a full or closed channel — live delivery is an
    /// optimisation, the next history fetch reconciles.
    fn notify(&self, user_id: &str, event: ChannelEvent) {
        if let Some(tx) = self.listeners.get(user_id) {
            if tx.try_send(event).is_err() {
                tracing::warn!(
                    target: "sb_channel",
                    event = "live_event_dropped",
                    user_id = %user_id
                );
            }
        }
    }
}

#[async_trait]
impl Directory for LocalNetwork {
    async fn get_public_key(&self, user_id: &str) -> Result<PublicKeyDocument, TransportError> {
        let inner = self.inner.lock().await;
        inner
            .keys
            .get(user_id)
            .map(|key| PublicKeyDocument {
                user_id: user_id.to_string(),
                public_key: key.clone(),
            })
            .ok_or_else(|| TransportError::NotFound(user_id.to_string()))
    }
}

#[async_trait]
impl Relay for LocalNetwork {
    async fn submit(&self, draft: EnvelopeDraft) -> Result<Envelope, TransportError> {
        let envelope = Envelope::from_draft(draft, Uuid::new_v4().to_string(), Utc::now());
        let mut inner = self.inner.lock().await;
        inner.envelopes.push(envelope.clone());
        // The sender appends its own echo locally; only the receiver gets
        // a live push.
        inner.notify(
            &envelope.receiver_id,
            ChannelEvent::NewMessage(envelope.clone()),
        );
        Ok(envelope)
    }

    async fn fetch_history(
        &self,
        requester: &str,
        peer: &str,
    ) -> Result<Vec<Envelope>, TransportError> {
        let inner = self.inner.lock().await;
        let mut history: Vec<Envelope> = inner
            .envelopes
            .iter()
            .filter(|e| e.is_between(requester, peer))
            .cloned()
            .collect();
        history.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(history)
    }

    async fn mark_read(&self, requester: &str, envelope_id: &str) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().await;
        match inner
            .envelopes
            .iter_mut()
            .find(|e| e.id == envelope_id && e.receiver_id == requester)
        {
            Some(envelope) => {
                envelope.read = true;
                Ok(())
            }
            None => Err(TransportError::NotFound(envelope_id.to_string())),
        }
    }
}

#[async_trait]
impl InviteTransport for LocalNetwork {
    async fn send_invite(
        &self,
        sender_id: &str,
        receiver_id: &str,
    ) -> Result<InviteRecord, InviteError> {
        let mut inner = self.inner.lock().await;
        inner.invites.send(sender_id, receiver_id)
    }

    async fn invite_status(&self, a: &str, b: &str) -> Result<InviteStatusView, InviteError> {
        let inner = self.inner.lock().await;
        Ok(inner.invites.status(a, b))
    }

    async fn respond(
        &self,
        receiver_id: &str,
        sender_id: &str,
        decision: InviteDecision,
    ) -> Result<InviteRecord, InviteError> {
        let mut inner = self.inner.lock().await;
        let record = inner.invites.respond(receiver_id, sender_id, decision)?;
        if record.state == InviteState::Accepted {
            // Unlock the initiator's end without a manual refresh.
            inner.notify(
                &record.sender_id,
                ChannelEvent::InviteAccepted {
                    peer_id: record.receiver_id.clone(),
                },
            );
        }
        Ok(record)
    }
}
