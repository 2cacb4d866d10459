//! Per-peer channel session.
//!
//! Owns everything mutable about one open conversation: the active peer,
//! its invite status, and the decrypted transcript. Single-owner
//! cooperative model — no locking, because only the session's owner drives
//! it and every crypto/storage/network boundary is an await point.
//! Cancelling a peer switch is dropping the in-flight `select_peer` future;
//! nothing is installed until the fetch completes, and the live-event dedup
//! check runs immediately before every append.
//!
//! The private key is loaded once at session start and read-only after.
//! When custody has no key (or the backend is down) the session still
//! works as a ciphertext viewer: envelopes keep their metadata and render
//! as an unreadable placeholder, and nothing crashes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use sb_crypto::{PrivateKey, PublicKey};
use sb_proto::codec::{self, Role};
use sb_proto::envelope::{Envelope, EnvelopeDraft};
use sb_proto::invite::{InviteDecision, InviteRecord, InviteState, InviteStatusView};
use sb_store::CustodyStore;

use crate::error::ChannelError;
use crate::transport::{ChannelEvent, Directory, InviteTransport, Relay};

/// One decrypted (or undecryptable) message in the transcript.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub envelope_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub outgoing: bool,
    pub created_at: DateTime<Utc>,
    pub read: bool,
    /// Opaque attachment payload, passed through as received.
    pub attachment: Option<String>,
    pub body: MessageBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    Text(String),
    /// The message shell is still shown; only the content was lost to a
    /// failed unwrap/decrypt or a missing private key.
    Unreadable,
}

struct ActivePeer {
    peer_id: String,
    status: InviteStatusView,
    transcript: Vec<ChatMessage>,
}

/// Orchestrates handshake, codec, delivery and live reconciliation for one
/// (self, peer) conversation at a time.
pub struct ChannelSession<D, R, I> {
    self_id: String,
    directory: Arc<D>,
    relay: Arc<R>,
    invites: Arc<I>,
    custody: CustodyStore,
    private_key: Option<PrivateKey>,
    events: mpsc::Receiver<ChannelEvent>,
    active: Option<ActivePeer>,
}

impl<D, R, I> ChannelSession<D, R, I>
where
    D: Directory,
    R: Relay,
    I: InviteTransport,
{
    /// Build a session for `self_id`. The private key is loaded from
    /// custody here, exactly once; an absent key or an unavailable backend
    /// degrades to ciphertext-only display instead of failing.
    pub async fn start(
        self_id: impl Into<String>,
        directory: Arc<D>,
        relay: Arc<R>,
        invites: Arc<I>,
        custody: CustodyStore,
        events: mpsc::Receiver<ChannelEvent>,
    ) -> Self {
        let self_id = self_id.into();
        let private_key = match custody.load_private_key(&self_id).await {
            Ok(Some(der)) => match PrivateKey::from_pkcs8_der(&der) {
                Ok(key) => Some(key),
                Err(e) => {
                    tracing::warn!(
                        target: "sb_channel",
                        event = "private_key_corrupt",
                        user_id = %self_id,
                        error = %e
                    );
                    None
                }
            },
            Ok(None) => {
                tracing::warn!(
                    target: "sb_channel",
                    event = "private_key_absent",
                    user_id = %self_id
                );
                None
            }
            Err(e) => {
                tracing::warn!(
                    target: "sb_channel",
                    event = "custody_unavailable",
                    user_id = %self_id,
                    error = %e
                );
                None
            }
        };

        Self {
            self_id,
            directory,
            relay,
            invites,
            custody,
            private_key,
            events,
            active: None,
        }
    }

    /// Whether this session can decrypt at all. False means every message
    /// renders as [`MessageBody::Unreadable`] until a key is restored.
    pub fn can_decrypt(&self) -> bool {
        self.private_key.is_some()
    }

    pub fn self_id(&self) -> &str {
        &self.self_id
    }

    pub fn active_peer(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.peer_id.as_str())
    }

    /// Invite state of the active conversation (`None` state when no peer
    /// is selected).
    pub fn invite_state(&self) -> InviteState {
        self.active
            .as_ref()
            .map(|a| a.status.state)
            .unwrap_or(InviteState::None)
    }

    /// The decrypted transcript for the active peer, ascending by creation
    /// time. Empty until the handshake is accepted.
    pub fn transcript(&self) -> &[ChatMessage] {
        self.active
            .as_ref()
            .map(|a| a.transcript.as_slice())
            .unwrap_or(&[])
    }

    /// Make `peer_id` the active conversation. Queries the invite status
    /// first; message history is fetched only when the pair is accepted —
    /// otherwise the caller gets the status back and may only offer invite
    /// actions. Replaces any previous active peer wholesale, so results of
    /// an abandoned fetch can never leak into the new transcript.
    pub async fn select_peer(&mut self, peer_id: &str) -> Result<InviteStatusView, ChannelError> {
        self.active = None;

        let status = self.invites.invite_status(&self.self_id, peer_id).await?;
        let transcript = if status.state == InviteState::Accepted {
            self.fetch_transcript(peer_id).await?
        } else {
            Vec::new()
        };

        tracing::info!(
            target: "sb_channel",
            event = "peer_selected",
            user_id = %self.self_id,
            peer_id = %peer_id,
            state = ?status.state,
            messages = transcript.len()
        );

        self.active = Some(ActivePeer {
            peer_id: peer_id.to_string(),
            status: status.clone(),
            transcript,
        });
        Ok(status)
    }

    /// Invite the active peer. Idempotent while pending.
    pub async fn send_invite(&mut self) -> Result<InviteRecord, ChannelError> {
        let peer_id = self.require_peer()?.to_string();
        let record = self.invites.send_invite(&self.self_id, &peer_id).await?;
        if let Some(active) = &mut self.active {
            active.status = InviteStatusView::from(&record);
        }
        Ok(record)
    }

    /// Answer the active peer's pending invite. On accept, history becomes
    /// available immediately.
    pub async fn respond_invite(
        &mut self,
        decision: InviteDecision,
    ) -> Result<InviteRecord, ChannelError> {
        let peer_id = self.require_peer()?.to_string();
        let record = self
            .invites
            .respond(&self.self_id, &peer_id, decision)
            .await?;

        let transcript = if record.state == InviteState::Accepted {
            self.fetch_transcript(&peer_id).await?
        } else {
            Vec::new()
        };
        if let Some(active) = &mut self.active {
            if active.peer_id == peer_id {
                active.status = InviteStatusView::from(&record);
                active.transcript = transcript;
            }
        }
        Ok(record)
    }

    /// Seal and send `text` to the active peer. Both public keys come from
    /// the directory; the relay assigns id and timestamp. The local echo is
    /// produced by immediately opening the sender-wrapped copy of the
    /// returned envelope — sending never depends on the live-event path.
    /// A relay failure propagates; the composed envelope is never silently
    /// dropped.
    pub async fn send(
        &mut self,
        text: &str,
        attachment: Option<String>,
    ) -> Result<ChatMessage, ChannelError> {
        let peer_id = self.require_peer()?.to_string();
        if self.invite_state() != InviteState::Accepted {
            return Err(ChannelError::NotAccepted(peer_id));
        }

        let sender_doc = self.directory.get_public_key(&self.self_id).await?;
        let receiver_doc = self.directory.get_public_key(&peer_id).await?;
        let sender_pub = PublicKey::from_b64(&sender_doc.public_key)?;
        let receiver_pub = PublicKey::from_b64(&receiver_doc.public_key)?;

        let fields = codec::seal(text, &sender_pub, &receiver_pub)?;
        let draft = EnvelopeDraft {
            sender_id: self.self_id.clone(),
            receiver_id: peer_id.clone(),
            ciphertext: fields.ciphertext,
            iv: fields.iv,
            key_for_sender: fields.key_for_sender,
            key_for_receiver: fields.key_for_receiver,
            attachment,
        };

        let envelope = self.relay.submit(draft).await?;
        tracing::info!(
            target: "sb_channel",
            event = "message_sent",
            user_id = %self.self_id,
            peer_id = %peer_id,
            envelope_id = %envelope.id
        );

        let message = self.decrypt_envelope(&envelope);
        self.append_if_new(message.clone());
        Ok(message)
    }

    /// Await the next live event and apply it. Returns `false` once the
    /// event channel is closed.
    pub async fn pump(&mut self) -> Result<bool, ChannelError> {
        match self.events.recv().await {
            Some(event) => {
                self.apply_event(event).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Apply one live event. Envelopes for anyone but the active peer are
    /// dropped; duplicates (already appended via the send echo, or a relay
    /// redelivery) are detected by envelope id immediately before append.
    pub async fn apply_event(&mut self, event: ChannelEvent) -> Result<(), ChannelError> {
        match event {
            ChannelEvent::NewMessage(envelope) => self.apply_new_message(envelope).await,
            ChannelEvent::InviteAccepted { peer_id } => self.apply_invite_accepted(&peer_id).await,
        }
    }

    /// Tear down the session, releasing the custody store handle.
    pub async fn shutdown(self) {
        self.custody.close().await;
    }

    // ── Internals ────────────────────────────────────────────────────────────

    async fn apply_new_message(&mut self, envelope: Envelope) -> Result<(), ChannelError> {
        let Some(peer_id) = self.active_peer().map(str::to_string) else {
            return Ok(());
        };
        if !envelope.is_between(&self.self_id, &peer_id) {
            tracing::debug!(
                target: "sb_channel",
                event = "event_for_inactive_peer_dropped",
                envelope_id = %envelope.id
            );
            return Ok(());
        }
        if self.contains(&envelope.id) {
            tracing::debug!(
                target: "sb_channel",
                event = "duplicate_envelope_dropped",
                envelope_id = %envelope.id
            );
            return Ok(());
        }

        let incoming = envelope.sender_id != self.self_id;
        let message = self.decrypt_envelope(&envelope);
        self.append_if_new(message);

        if incoming {
            // Read receipt is best-effort; never fail the append over it.
            if let Err(e) = self.relay.mark_read(&self.self_id, &envelope.id).await {
                tracing::warn!(
                    target: "sb_channel",
                    event = "mark_read_failed",
                    envelope_id = %envelope.id,
                    error = %e
                );
            }
        }
        Ok(())
    }

    async fn apply_invite_accepted(&mut self, peer_id: &str) -> Result<(), ChannelError> {
        if self.active_peer() != Some(peer_id) {
            return Ok(());
        }
        // Re-query rather than trusting the event payload.
        let status = self.invites.invite_status(&self.self_id, peer_id).await?;
        let transcript = if status.state == InviteState::Accepted {
            self.fetch_transcript(peer_id).await?
        } else {
            Vec::new()
        };
        if let Some(active) = &mut self.active {
            if active.peer_id == peer_id {
                tracing::info!(
                    target: "sb_channel",
                    event = "invite_accepted_live",
                    user_id = %self.self_id,
                    peer_id = %peer_id
                );
                active.status = status;
                active.transcript = transcript;
            }
        }
        Ok(())
    }

    /// Fetch and decrypt the full history with `peer_id`. Each envelope is
    /// opened independently — one bad message becomes a placeholder and the
    /// rest of the fetch continues. The result is re-sorted by creation
    /// time regardless of relay ordering.
    async fn fetch_transcript(&self, peer_id: &str) -> Result<Vec<ChatMessage>, ChannelError> {
        let envelopes = self.relay.fetch_history(&self.self_id, peer_id).await?;
        let mut messages: Vec<ChatMessage> = envelopes
            .iter()
            .map(|envelope| self.decrypt_envelope(envelope))
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(messages)
    }

    /// Decrypt one envelope into a transcript entry. Failure is contained:
    /// the shell (ids, timestamp, read flag, attachment) is always kept.
    fn decrypt_envelope(&self, envelope: &Envelope) -> ChatMessage {
        let role = Role::of(envelope, &self.self_id);
        let body = match &self.private_key {
            None => MessageBody::Unreadable,
            Some(key) => match codec::open(envelope, key, role) {
                Ok(text) => MessageBody::Text(text),
                Err(e) => {
                    tracing::warn!(
                        target: "sb_channel",
                        event = "decrypt_failed",
                        envelope_id = %envelope.id,
                        role = ?role,
                        error = %e
                    );
                    MessageBody::Unreadable
                }
            },
        };

        ChatMessage {
            envelope_id: envelope.id.clone(),
            sender_id: envelope.sender_id.clone(),
            receiver_id: envelope.receiver_id.clone(),
            outgoing: role == Role::Sender,
            created_at: envelope.created_at,
            read: envelope.read,
            attachment: envelope.attachment.clone(),
            body,
        }
    }

    fn contains(&self, envelope_id: &str) -> bool {
        self.active
            .as_ref()
            .map(|a| a.transcript.iter().any(|m| m.envelope_id == envelope_id))
            .unwrap_or(false)
    }

    fn append_if_new(&mut self, message: ChatMessage) {
        if self.contains(&message.envelope_id) {
            return;
        }
        if let Some(active) = &mut self.active {
            active.transcript.push(message);
        }
    }

    fn require_peer(&self) -> Result<&str, ChannelError> {
        self.active
            .as_ref()
            .map(|a| a.peer_id.as_str())
            .ok_or(ChannelError::NoActivePeer)
    }
}
