//! The invite handshake state machine.
//!
//! One record per unordered user pair — sending from either direction
//! refers to the same record. Lifecycle:
//!
//! ```text
//! none ──send──▶ pending ──respond──▶ accepted | rejected
//! ```
//!
//! `accepted` and `rejected` are terminal. A rejected pair cannot
//! re-invite; records are never deleted, so a later `send` against a
//! decided pair is a no-op that returns the historical record.

use std::collections::HashMap;

use chrono::Utc;
use thiserror::Error;

use sb_proto::invite::{InviteDecision, InviteRecord, InviteState, InviteStatusView};

#[derive(Debug, Error)]
pub enum InviteError {
    #[error("You can't invite yourself")]
    SelfInvite,

    #[error("No pending invite from {sender} to {receiver}")]
    NotFound { sender: String, receiver: String },

    #[error("Invite transport unavailable: {0}")]
    Transport(String),
}

/// Canonical unordered pair key — `{A,B}` and `{B,A}` collide by design.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PairKey(String, String);

impl PairKey {
    fn new(a: &str, b: &str) -> Self {
        if a <= b {
            Self(a.to_string(), b.to_string())
        } else {
            Self(b.to_string(), a.to_string())
        }
    }
}

/// Authoritative invite state for all pairs this process knows about.
/// Pure state machine: notification of the accepted party is the caller's
/// concern (see [`crate::local::LocalNetwork`]).
#[derive(Debug, Default)]
pub struct InviteLedger {
    records: HashMap<PairKey, InviteRecord>,
}

impl InviteLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or re-affirm an invite. Idempotent while pending: calling
    /// again updates `updated_at` and returns the existing record, never a
    /// duplicate. Against a decided pair, returns the terminal record
    /// unchanged so the caller can detect "already decided".
    pub fn send(&mut self, sender_id: &str, receiver_id: &str) -> Result<InviteRecord, InviteError> {
        if sender_id == receiver_id {
            return Err(InviteError::SelfInvite);
        }
        let now = Utc::now();
        let record = self
            .records
            .entry(PairKey::new(sender_id, receiver_id))
            .and_modify(|r| {
                if r.state == InviteState::Pending {
                    r.updated_at = now;
                }
            })
            .or_insert_with(|| InviteRecord {
                sender_id: sender_id.to_string(),
                receiver_id: receiver_id.to_string(),
                state: InviteState::Pending,
                created_at: now,
                updated_at: now,
            });
        Ok(record.clone())
    }

    /// Direction-agnostic pair lookup. `none` when no record exists.
    pub fn status(&self, a: &str, b: &str) -> InviteStatusView {
        self.records
            .get(&PairKey::new(a, b))
            .map(InviteStatusView::from)
            .unwrap_or_else(InviteStatusView::none)
    }

    /// Decide a pending invite. Only the receiver of the original `send`
    /// may respond; anything else — no record, a decided record, or the
    /// initiator trying to answer their own invite — is `NotFound`.
    pub fn respond(
        &mut self,
        receiver_id: &str,
        sender_id: &str,
        decision: InviteDecision,
    ) -> Result<InviteRecord, InviteError> {
        match self.records.get_mut(&PairKey::new(receiver_id, sender_id)) {
            Some(r)
                if r.state == InviteState::Pending
                    && r.sender_id == sender_id
                    && r.receiver_id == receiver_id =>
            {
                r.state = decision.into();
                r.updated_at = Utc::now();
                Ok(r.clone())
            }
            _ => Err(InviteError::NotFound {
                sender: sender_id.to_string(),
                receiver: receiver_id.to_string(),
            }),
        }
    }
}
