//! Invite handshake wire types.
//!
//! State lifecycle: `none → pending → {accepted, rejected}`.
//! `accepted` and `rejected` are terminal — a rejected pair cannot
//! currently re-invite. Records are never deleted, so "already decided"
//! stays detectable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InviteState {
    /// No record exists between the pair.
    #[default]
    None,
    Pending,
    Accepted,
    Rejected,
}

impl InviteState {
    /// Terminal states accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, InviteState::Accepted | InviteState::Rejected)
    }
}

/// The receiver's answer to a pending invite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InviteDecision {
    Accepted,
    Rejected,
}

impl From<InviteDecision> for InviteState {
    fn from(d: InviteDecision) -> Self {
        match d {
            InviteDecision::Accepted => InviteState::Accepted,
            InviteDecision::Rejected => InviteState::Rejected,
        }
    }
}

/// One invite record per unordered user pair. `sender_id` is always the
/// party who initiated the invite, regardless of who queries it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviteRecord {
    pub sender_id: String,
    pub receiver_id: String,
    pub state: InviteState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Direction-agnostic status answer for a pair lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviteStatusView {
    pub state: InviteState,
    /// Who sent the original invite; `None` when no record exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initiated_by: Option<String>,
}

impl InviteStatusView {
    pub fn none() -> Self {
        Self {
            state: InviteState::None,
            initiated_by: None,
        }
    }
}

impl From<&InviteRecord> for InviteStatusView {
    fn from(r: &InviteRecord) -> Self {
        Self {
            state: r.state,
            initiated_by: Some(r.sender_id.clone()),
        }
    }
}
